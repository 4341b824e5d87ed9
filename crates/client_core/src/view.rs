//! Render gate between page data and whatever draws it.
//!
//! The presentation layer owns the `ready` flag. Until it is set the page is
//! never touched, so a half-arrived payload cannot be rendered by accident.

use shared::domain::{Page, Question};

use crate::controller::Phase;

/// How a widget hands its answer to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerTrigger {
    /// Display only; nothing is captured.
    None,
    /// Every selection change calls `capture`.
    OnChange,
    /// The widget builds its own response and calls `submit` directly.
    SelfSubmit,
}

impl AnswerTrigger {
    pub fn for_question(question: &Question) -> Self {
        match question {
            Question::Checkbox(_) => AnswerTrigger::None,
            Question::Radio(_) => AnswerTrigger::OnChange,
            Question::Binary(_) | Question::FreeText(_) => AnswerTrigger::SelfSubmit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueControl {
    /// The lead question submits itself; offering Continue would open a
    /// second submission path.
    Hidden,
    Enabled,
    /// A submission is in flight.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetSlot<'a> {
    pub question: &'a Question,
    pub trigger: AnswerTrigger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout<'a> {
    pub title: &'a str,
    pub hint: Option<&'a str>,
    pub widgets: Vec<WidgetSlot<'a>>,
    pub continue_control: ContinueControl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderPlan<'a> {
    Loading,
    Page(PageLayout<'a>),
}

/// Decides what to draw. `page` is only called once `ready` is true.
pub fn render_plan<'a, F>(ready: bool, phase: Phase, page: F) -> RenderPlan<'a>
where
    F: FnOnce() -> Option<&'a Page>,
{
    if !ready {
        return RenderPlan::Loading;
    }
    let Some(page) = page() else {
        return RenderPlan::Loading;
    };
    let Some(lead) = page.lead_question() else {
        return RenderPlan::Loading;
    };

    let continue_control = if matches!(lead, Question::Binary(_)) {
        ContinueControl::Hidden
    } else if phase == Phase::Submitting {
        ContinueControl::Disabled
    } else {
        ContinueControl::Enabled
    };

    RenderPlan::Page(PageLayout {
        title: &page.title,
        hint: page.hint.as_deref(),
        widgets: page
            .questions
            .iter()
            .map(|question| WidgetSlot {
                question,
                trigger: AnswerTrigger::for_question(question),
            })
            .collect(),
        continue_control,
    })
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
