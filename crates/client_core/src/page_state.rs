//! The answer selected on the page currently on screen.

use shared::{
    domain::{AnswerId, Page, PageId},
    protocol::PendingAnswer,
};

#[derive(Debug, Clone, Default)]
pub struct PageState {
    answer: PendingAnswer,
}

impl PageState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the respondent's selection. Any earlier selection is replaced;
    /// the ids are not checked against the page's options.
    pub fn capture(&mut self, answer_id: AnswerId, question_id: PageId) {
        self.answer = PendingAnswer {
            answer_id: Some(answer_id),
            question_id: Some(question_id),
        };
    }

    pub fn current_answer(&self) -> PendingAnswer {
        self.answer
    }

    /// True when the captured answer names `page` and one of its options.
    pub fn belongs_to(&self, page: &Page) -> bool {
        match (self.answer.answer_id, self.answer.question_id) {
            (Some(answer_id), Some(question_id)) => {
                question_id == page.id && page.offers_option(answer_id)
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.answer = PendingAnswer::default();
    }
}

#[cfg(test)]
#[path = "tests/page_state_tests.rs"]
mod tests;
