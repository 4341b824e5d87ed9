//! Holds the application's current page and folds query results into it.

use client_core::{QueryFailure, QueryResult};
use shared::domain::{FriendlyCode, Page};

use super::events::describe_failure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewStatus {
    Idle,
    Waiting,
    PassphraseNotFound,
    Failed(String),
    Notice(String),
    Finished,
}

#[derive(Debug, Clone)]
pub struct SurveyView {
    pub ready: bool,
    pub page: Option<Page>,
    pub friendly_code: Option<FriendlyCode>,
    pub status: ViewStatus,
}

impl Default for SurveyView {
    fn default() -> Self {
        Self {
            ready: false,
            page: None,
            friendly_code: None,
            status: ViewStatus::Idle,
        }
    }
}

impl SurveyView {
    /// Applies one dispatched result. Returns the page that just arrived so
    /// the caller can hand it to the transition controller.
    pub fn apply(&mut self, result: QueryResult) -> Option<Page> {
        match result {
            QueryResult::Started => {
                self.status = ViewStatus::Waiting;
                None
            }
            QueryResult::Complete(page) => {
                if let Some(code) = page.friendly_code.clone() {
                    self.friendly_code = Some(code);
                }
                self.page = Some(page.clone());
                self.ready = true;
                self.status = ViewStatus::Idle;
                Some(page)
            }
            QueryResult::NotFound => {
                self.page = None;
                self.ready = false;
                self.status = ViewStatus::PassphraseNotFound;
                None
            }
            QueryResult::Failed(failure) => {
                self.apply_failure(&failure);
                None
            }
        }
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.status = ViewStatus::Notice(message.into());
    }

    /// Nothing more can be asked of the respondent.
    pub fn is_done(&self) -> bool {
        matches!(
            self.status,
            ViewStatus::PassphraseNotFound | ViewStatus::Finished
        )
    }

    /// The opening query failed before any page arrived.
    pub fn can_retry(&self) -> bool {
        !self.ready && matches!(self.status, ViewStatus::Failed(_))
    }

    fn apply_failure(&mut self, failure: &QueryFailure) {
        if failure.is_completed() {
            self.page = None;
            self.ready = false;
            self.status = ViewStatus::Finished;
        } else {
            self.status = ViewStatus::Failed(describe_failure(failure));
        }
    }
}
