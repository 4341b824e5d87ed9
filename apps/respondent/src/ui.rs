//! Plain-text rendering of the survey view.

use std::fmt::Write as _;

use client_core::{render_plan, AnswerTrigger, ContinueControl, Phase, RenderPlan};
use shared::domain::Question;

use crate::controller::reducer::{SurveyView, ViewStatus};

pub fn render(view: &SurveyView, phase: Phase) -> String {
    let mut out = String::new();
    match &view.status {
        ViewStatus::PassphraseNotFound => {
            out.push_str("That passphrase did not match any survey. Check it and start again.\n");
            return out;
        }
        ViewStatus::Finished => {
            out.push_str("Thank you, your answers have been recorded.\n");
            return out;
        }
        _ => {}
    }

    match render_plan(view.ready, phase, || view.page.as_ref()) {
        RenderPlan::Loading => {
            out.push_str("Loading...\n");
            if view.can_retry() {
                out.push_str("[r] retry   [q] quit\n");
            } else {
                out.push_str("If this seems stuck, quit and resume with your passphrase.\n");
            }
        }
        RenderPlan::Page(layout) => {
            let _ = writeln!(out, "\n== {} ==", layout.title);
            if let Some(hint) = layout.hint {
                let _ = writeln!(out, "{hint}");
            }
            let mut number = 0;
            for slot in &layout.widgets {
                let _ = writeln!(out, "\n{}", slot.question.prompt());
                match (slot.question, slot.trigger) {
                    (Question::Binary(q), _) => {
                        let _ = writeln!(out, "  [y] {}   [n] {}", q.yes_label, q.no_label);
                    }
                    (Question::FreeText(q), _) => {
                        let placeholder = q.placeholder.as_deref().unwrap_or("type your answer");
                        let _ = writeln!(out, "  ({placeholder})");
                    }
                    (question, AnswerTrigger::OnChange) => {
                        for option in question.options() {
                            number += 1;
                            let _ = writeln!(out, "  {number}) {}", option.label);
                        }
                    }
                    (question, _) => {
                        for option in question.options() {
                            let _ = writeln!(out, "  - {}", option.label);
                        }
                    }
                }
            }
            match layout.continue_control {
                ContinueControl::Enabled => out.push_str("\n[enter] Continue\n"),
                ContinueControl::Disabled => out.push_str("\nSending...\n"),
                ContinueControl::Hidden => {}
            }
        }
    }

    match &view.status {
        ViewStatus::Failed(message) | ViewStatus::Notice(message) => {
            let _ = writeln!(out, "! {message}");
        }
        _ => {}
    }
    if let Some(code) = &view.friendly_code {
        let _ = writeln!(out, "(resume later with --code {code})");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::{AnswerId, AnswerOption, BinaryQuestion, ChoiceQuestion, Page, PageId};

    fn view_with(questions: Vec<Question>, ready: bool) -> SurveyView {
        SurveyView {
            ready,
            page: Some(Page {
                id: PageId(1),
                title: "Commute".to_string(),
                hint: Some("Pick the one you use most".to_string()),
                questions,
                session_id: None,
                friendly_code: None,
            }),
            friendly_code: None,
            status: ViewStatus::Idle,
        }
    }

    fn radio() -> Question {
        Question::Radio(ChoiceQuestion {
            prompt: "How do you get to work?".to_string(),
            options: vec![
                AnswerOption {
                    id: AnswerId(4),
                    label: "Bike".to_string(),
                },
                AnswerOption {
                    id: AnswerId(5),
                    label: "Train".to_string(),
                },
            ],
        })
    }

    #[test]
    fn not_ready_view_shows_loading_only() {
        let text = render(&view_with(vec![radio()], false), Phase::NotReady);
        assert!(text.starts_with("Loading..."));
        assert!(!text.contains("Commute"));
    }

    #[test]
    fn radio_page_lists_numbered_options_and_continue() {
        let text = render(&view_with(vec![radio()], true), Phase::Ready);
        assert!(text.contains("== Commute =="));
        assert!(text.contains("1) Bike"));
        assert!(text.contains("2) Train"));
        assert!(text.contains("[enter] Continue"));
    }

    #[test]
    fn binary_page_has_no_continue() {
        let question = Question::Binary(BinaryQuestion {
            prompt: "Do you cycle?".to_string(),
            yes_label: "Yes".to_string(),
            no_label: "No".to_string(),
        });
        let text = render(&view_with(vec![question], true), Phase::Ready);
        assert!(text.contains("[y] Yes   [n] No"));
        assert!(!text.contains("Continue"));
    }

    #[test]
    fn failed_opening_offers_retry() {
        let mut view = view_with(vec![radio()], false);
        view.page = None;
        view.status = ViewStatus::Failed("Survey server unreachable".to_string());
        let text = render(&view, Phase::NotReady);
        assert!(text.contains("[r] retry"));
        assert!(text.contains("! Survey server unreachable"));
        assert!(!render(&view_with(vec![radio()], false), Phase::NotReady).contains("[r] retry"));
    }

    #[test]
    fn finished_view_thanks_the_respondent() {
        let mut view = view_with(vec![radio()], false);
        view.page = None;
        view.status = ViewStatus::Finished;
        assert!(render(&view, Phase::NotReady).contains("Thank you"));
    }
}
