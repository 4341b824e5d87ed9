//! Respondent input and failure wording.

use client_core::{AnswerTrigger, ContinueControl, PageLayout, QueryFailure, Submission};
use serde_json::json;
use shared::domain::{AnswerId, Question};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Capture(AnswerId),
    Submit(Submission),
    /// Re-run the query that should have produced the first page.
    Retry,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("no option numbered {0} on this page")]
    UnknownOption(usize),
    #[error("answer this page with y or n")]
    ContinueHidden,
    #[error("please wait for the current answer to be sent")]
    ContinueDisabled,
    #[error("unrecognised input; pick an option number or press enter to continue")]
    Unrecognised,
}

/// Maps one line of input onto the page's active answer path.
///
/// Option numbers count across every capture-on-change widget in page
/// order. Free text is submitted only when nothing else matched.
pub fn parse_input(line: &str, layout: &PageLayout<'_>) -> Result<UiAction, InputError> {
    let input = line.trim();
    if matches!(input, "q" | "quit") {
        return Ok(UiAction::Quit);
    }
    if input.is_empty() {
        return match layout.continue_control {
            ContinueControl::Enabled => Ok(UiAction::Submit(Submission::Captured)),
            ContinueControl::Hidden => Err(InputError::ContinueHidden),
            ContinueControl::Disabled => Err(InputError::ContinueDisabled),
        };
    }

    let self_submitting: Vec<&Question> = layout
        .widgets
        .iter()
        .filter(|slot| slot.trigger == AnswerTrigger::SelfSubmit)
        .map(|slot| slot.question)
        .collect();

    if let Ok(number) = input.parse::<usize>() {
        let options: Vec<AnswerId> = layout
            .widgets
            .iter()
            .filter(|slot| slot.trigger == AnswerTrigger::OnChange)
            .flat_map(|slot| slot.question.options())
            .map(|option| option.id)
            .collect();
        if !options.is_empty() {
            return number
                .checked_sub(1)
                .and_then(|index| options.get(index))
                .map(|id| UiAction::Capture(*id))
                .ok_or(InputError::UnknownOption(number));
        }
    }

    if self_submitting
        .iter()
        .any(|question| matches!(question, Question::Binary(_)))
    {
        match input.to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(binary_answer("yes")),
            "n" | "no" => return Ok(binary_answer("no")),
            _ => {}
        }
    }

    if self_submitting
        .iter()
        .any(|question| matches!(question, Question::FreeText(_)))
    {
        return Ok(UiAction::Submit(Submission::from_widget(Some(
            json!({ "answer": input }),
        ))));
    }

    if layout.continue_control == ContinueControl::Hidden {
        return Err(InputError::ContinueHidden);
    }
    Err(InputError::Unrecognised)
}

/// Input accepted while no page is on screen. `None` means the line is
/// ignored.
pub fn parse_waiting_input(line: &str, can_retry: bool) -> Option<UiAction> {
    match line.trim() {
        "q" | "quit" => Some(UiAction::Quit),
        "r" | "retry" if can_retry => Some(UiAction::Retry),
        _ => None,
    }
}

fn binary_answer(answer: &str) -> UiAction {
    UiAction::Submit(Submission::from_widget(Some(json!({ "answer": answer }))))
}

pub fn describe_failure(failure: &QueryFailure) -> String {
    let lower = failure.message.to_ascii_lowercase();
    match failure.status {
        None if lower.contains("connect")
            || lower.contains("connection refused")
            || lower.contains("dns")
            || lower.contains("timed out") =>
        {
            "Survey server unreachable; check the URL or network and try again.".to_string()
        }
        Some(status) if status >= 500 => {
            format!("The survey server had a problem ({status}); try again shortly.")
        }
        Some(status) => format!(
            "The survey server refused the answer ({status}): {}",
            failure.message
        ),
        None => format!("Could not reach the survey: {}", failure.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::{render_plan, Phase, RenderPlan};
    use shared::domain::{
        AnswerOption, BinaryQuestion, ChoiceQuestion, FreeTextQuestion, Page, PageId,
    };

    fn page_with(questions: Vec<Question>) -> Page {
        Page {
            id: PageId(2),
            title: "Travel".to_string(),
            hint: None,
            questions,
            session_id: None,
            friendly_code: None,
        }
    }

    fn radio(ids: &[i64]) -> Question {
        Question::Radio(ChoiceQuestion {
            prompt: "Pick one".to_string(),
            options: ids
                .iter()
                .map(|id| AnswerOption {
                    id: AnswerId(*id),
                    label: format!("option {id}"),
                })
                .collect(),
        })
    }

    fn binary() -> Question {
        Question::Binary(BinaryQuestion {
            prompt: "Do you cycle?".to_string(),
            yes_label: "Yes".to_string(),
            no_label: "No".to_string(),
        })
    }

    fn parse(line: &str, page: &Page, phase: Phase) -> Result<UiAction, InputError> {
        match render_plan(true, phase, || Some(page)) {
            RenderPlan::Page(layout) => parse_input(line, &layout),
            RenderPlan::Loading => panic!("page should render"),
        }
    }

    #[test]
    fn option_number_captures_its_answer_id() {
        let page = page_with(vec![radio(&[7, 9])]);
        assert_eq!(
            parse("2", &page, Phase::Ready),
            Ok(UiAction::Capture(AnswerId(9)))
        );
        assert_eq!(
            parse("3", &page, Phase::Ready),
            Err(InputError::UnknownOption(3))
        );
        assert_eq!(
            parse("0", &page, Phase::Ready),
            Err(InputError::UnknownOption(0))
        );
    }

    #[test]
    fn enter_continues_with_captured_answer() {
        let page = page_with(vec![radio(&[1])]);
        assert_eq!(
            parse("", &page, Phase::Ready),
            Ok(UiAction::Submit(Submission::Captured))
        );
        assert_eq!(
            parse("  ", &page, Phase::Submitting),
            Err(InputError::ContinueDisabled)
        );
    }

    #[test]
    fn binary_page_only_accepts_its_own_answer() {
        let page = page_with(vec![binary()]);
        assert_eq!(
            parse("Y", &page, Phase::Ready),
            Ok(UiAction::Submit(Submission::Explicit(
                json!({ "answer": "yes" })
            )))
        );
        assert_eq!(parse("", &page, Phase::Ready), Err(InputError::ContinueHidden));
        assert_eq!(
            parse("maybe", &page, Phase::Ready),
            Err(InputError::ContinueHidden)
        );
    }

    #[test]
    fn free_text_is_submitted_as_written() {
        let page = page_with(vec![Question::FreeText(FreeTextQuestion {
            prompt: "Anything else?".to_string(),
            placeholder: None,
        })]);
        assert_eq!(
            parse(" more bike racks ", &page, Phase::Ready),
            Ok(UiAction::Submit(Submission::Explicit(
                json!({ "answer": "more bike racks" })
            )))
        );
        assert_eq!(parse("quit", &page, Phase::Ready), Ok(UiAction::Quit));
    }

    #[test]
    fn retry_is_offered_only_after_a_failed_opening() {
        assert_eq!(parse_waiting_input(" r ", true), Some(UiAction::Retry));
        assert_eq!(parse_waiting_input("retry", true), Some(UiAction::Retry));
        assert_eq!(parse_waiting_input("r", false), None);
        assert_eq!(parse_waiting_input("q", false), Some(UiAction::Quit));
        assert_eq!(parse_waiting_input("2", true), None);
    }

    #[test]
    fn describes_unreachable_server() {
        let failure = QueryFailure {
            status: None,
            code: None,
            message: "http transport failure: error sending request: connection refused"
                .to_string(),
        };
        assert!(describe_failure(&failure).contains("unreachable"));
    }

    #[test]
    fn describes_server_errors_with_status() {
        let failure = QueryFailure {
            status: Some(503),
            code: None,
            message: "unavailable".to_string(),
        };
        assert!(describe_failure(&failure).contains("503"));
    }
}
