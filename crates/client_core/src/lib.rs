//! Respondent-side questionnaire flow: answer capture, submission and the
//! page-to-page transition protocol.

pub mod controller;
pub mod page_state;
pub mod transport;
pub mod view;

pub use controller::{
    Phase, QueryFailure, QueryResult, Submission, TransitionController, TransitionError,
};
pub use page_state::PageState;
pub use transport::{HttpTransport, SurveyTransport, TransportError};
pub use view::{render_plan, AnswerTrigger, ContinueControl, PageLayout, RenderPlan, WidgetSlot};
