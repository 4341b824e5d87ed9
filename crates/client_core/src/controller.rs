//! Page-to-page transition state machine.
//!
//! ```text
//! NotReady --load_page--> Ready --capture--> Ready
//! Ready --submit--> Submitting
//! Submitting --Complete--> NotReady
//! Submitting --NotFound--> ErrorTerminal
//! Submitting --Failed--> Ready
//! ```
//!
//! Every query emits `QueryResult::Started` before the request goes out and
//! exactly one terminal result once it resolves.

use std::sync::Arc;

use serde_json::Value;
use shared::{
    domain::{AnswerId, FriendlyCode, Page, PageId, SessionId},
    error::ErrorCode,
    protocol::{PendingAnswer, SubmissionPayload},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    page_state::PageState,
    transport::{SurveyTransport, TransportError},
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotReady,
    Ready,
    Submitting,
    ErrorTerminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    pub status: Option<u16>,
    pub code: Option<ErrorCode>,
    pub message: String,
}

impl QueryFailure {
    /// The server has no pages left for this session.
    pub fn is_completed(&self) -> bool {
        self.code == Some(ErrorCode::Completed)
    }
}

impl From<&TransportError> for QueryFailure {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::Rejected {
                status,
                code,
                message,
            } => Self {
                status: Some(*status),
                code: *code,
                message: message.clone(),
            },
            other => Self {
                status: None,
                code: None,
                message: other.to_string(),
            },
        }
    }
}

/// Signals dispatched to whatever holds the application's current page.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Started,
    Complete(Page),
    NotFound,
    /// Any failure other than not-found. The controller returns to its
    /// previous phase so the respondent can try again.
    Failed(QueryFailure),
}

/// Which payload a submission carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Send the answer captured on the current page.
    Captured,
    /// Forward a widget-built response untouched.
    Explicit(Value),
}

impl Submission {
    /// Adapter for widgets that hand over an optional raw response. Any falsy
    /// value (nothing, `null`, `false`, a zero number or an empty string)
    /// means "use the captured answer".
    pub fn from_widget(response: Option<Value>) -> Self {
        match response {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Submission::Captured,
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Submission::Captured,
            Some(Value::String(s)) if s.is_empty() => Submission::Captured,
            Some(value) => Submission::Explicit(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("no page is ready to accept answers")]
    NotReady,
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("the access code did not resolve to a survey session")]
    Terminal,
    #[error("the current page carries no session id")]
    MissingSession,
}

struct ControllerState {
    phase: Phase,
    page: Option<Page>,
    page_state: PageState,
    session_id: Option<SessionId>,
}

pub struct TransitionController {
    transport: Arc<dyn SurveyTransport>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<QueryResult>,
}

impl TransitionController {
    pub fn new(transport: Arc<dyn SurveyTransport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self::with_events(transport, events)
    }

    pub fn with_events(
        transport: Arc<dyn SurveyTransport>,
        events: broadcast::Sender<QueryResult>,
    ) -> Self {
        Self {
            transport,
            inner: Mutex::new(ControllerState {
                phase: Phase::NotReady,
                page: None,
                page_state: PageState::new(),
                session_id: None,
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueryResult> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.lock().await.phase
    }

    pub async fn current_page(&self) -> Option<Page> {
        self.inner.lock().await.page.clone()
    }

    pub async fn current_answer(&self) -> PendingAnswer {
        self.inner.lock().await.page_state.current_answer()
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        self.inner.lock().await.session_id
    }

    /// Installs freshly arrived page data and discards the previous page's
    /// selection. A page without questions is not renderable and leaves the
    /// controller not ready.
    pub async fn load_page(&self, page: Page) {
        let mut guard = self.inner.lock().await;
        if guard.phase == Phase::Submitting {
            warn!(page_id = %page.id, "ignoring page delivered while a submission is in flight");
            return;
        }
        if let Some(session_id) = page.session_id {
            guard.session_id = Some(session_id);
        }
        guard.page_state.clear();
        if page.questions.is_empty() {
            warn!(page_id = %page.id, "page has no questions; staying not ready");
            guard.page = None;
            guard.phase = Phase::NotReady;
            return;
        }
        debug!(page_id = %page.id, questions = page.questions.len(), "page ready");
        guard.page = Some(page);
        guard.phase = Phase::Ready;
    }

    pub async fn capture(
        &self,
        answer_id: AnswerId,
        question_id: PageId,
    ) -> Result<(), TransitionError> {
        let mut guard = self.inner.lock().await;
        ensure_ready(guard.phase)?;
        guard.page_state.capture(answer_id, question_id);
        debug!(%answer_id, %question_id, "answer captured");
        Ok(())
    }

    /// Captures `answer_id` for the page on screen.
    pub async fn capture_on_current_page(&self, answer_id: AnswerId) -> Result<(), TransitionError> {
        let page_id = {
            let guard = self.inner.lock().await;
            guard
                .page
                .as_ref()
                .map(|page| page.id)
                .ok_or(TransitionError::NotReady)?
        };
        self.capture(answer_id, page_id).await
    }

    /// Sends the page's answer and waits for the outcome. `Started` is
    /// dispatched before the request leaves; the returned value is the same
    /// terminal result that subscribers receive.
    pub async fn submit(&self, submission: Submission) -> Result<QueryResult, TransitionError> {
        let (session_id, payload) = {
            let mut guard = self.inner.lock().await;
            ensure_ready(guard.phase)?;
            let session_id = guard.session_id.ok_or(TransitionError::MissingSession)?;

            let payload = match submission {
                Submission::Captured => {
                    let answer = guard.page_state.current_answer();
                    if answer.is_empty() {
                        debug!("submitting without a captured answer");
                    } else if let Some(page) = guard.page.as_ref() {
                        if !guard.page_state.belongs_to(page) {
                            warn!(
                                page_id = %page.id,
                                answer = ?answer,
                                "captured answer does not match the page on screen"
                            );
                        }
                    }
                    SubmissionPayload::Captured(answer)
                }
                Submission::Explicit(value) => SubmissionPayload::Explicit(value),
            };

            guard.phase = Phase::Submitting;
            (session_id, payload)
        };

        info!(%session_id, "submitting page response");
        self.emit(QueryResult::Started);
        let outcome = self.transport.submit_response(session_id, &payload).await;
        Ok(self.resolve(outcome, Phase::Ready).await)
    }

    /// Looks up a respondent's session by its friendly code.
    pub async fn lookup_passphrase(
        &self,
        code: &FriendlyCode,
    ) -> Result<QueryResult, TransitionError> {
        let previous = self.begin_query().await?;
        info!(%code, "looking up passphrase");
        self.emit(QueryResult::Started);
        let outcome = self.transport.lookup_passphrase(code).await;
        Ok(self.resolve(outcome, previous).await)
    }

    pub async fn start(&self) -> Result<QueryResult, TransitionError> {
        let previous = self.begin_query().await?;
        info!("starting a new survey session");
        self.emit(QueryResult::Started);
        let outcome = self.transport.start().await;
        Ok(self.resolve(outcome, previous).await)
    }

    pub async fn restore(&self, session_id: SessionId) -> Result<QueryResult, TransitionError> {
        let previous = self.begin_query().await?;
        info!(%session_id, "restoring survey session");
        self.emit(QueryResult::Started);
        let outcome = self.transport.restore(session_id).await;
        Ok(self.resolve(outcome, previous).await)
    }

    async fn begin_query(&self) -> Result<Phase, TransitionError> {
        let mut guard = self.inner.lock().await;
        if guard.phase == Phase::Submitting {
            return Err(TransitionError::SubmissionInFlight);
        }
        let previous = guard.phase;
        guard.phase = Phase::Submitting;
        Ok(previous)
    }

    async fn resolve(
        &self,
        outcome: Result<Page, TransportError>,
        on_failure: Phase,
    ) -> QueryResult {
        let result = {
            let mut guard = self.inner.lock().await;
            match outcome {
                Ok(page) => {
                    if let Some(session_id) = page.session_id {
                        guard.session_id = Some(session_id);
                    }
                    guard.page = None;
                    guard.page_state.clear();
                    guard.phase = Phase::NotReady;
                    info!(page_id = %page.id, "next page received");
                    QueryResult::Complete(page)
                }
                Err(TransportError::NotFound) => {
                    guard.page = None;
                    guard.page_state.clear();
                    guard.phase = Phase::ErrorTerminal;
                    warn!("survey session not found");
                    QueryResult::NotFound
                }
                Err(err) => {
                    guard.phase = on_failure;
                    warn!(error = %err, "survey query failed");
                    QueryResult::Failed(QueryFailure::from(&err))
                }
            }
        };
        self.emit(result.clone());
        result
    }

    fn emit(&self, result: QueryResult) {
        let _ = self.events.send(result);
    }
}

fn ensure_ready(phase: Phase) -> Result<(), TransitionError> {
    match phase {
        Phase::Ready => Ok(()),
        Phase::Submitting => Err(TransitionError::SubmissionInFlight),
        Phase::NotReady => Err(TransitionError::NotReady),
        Phase::ErrorTerminal => Err(TransitionError::Terminal),
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
