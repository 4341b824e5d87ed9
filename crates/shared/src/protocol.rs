use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::{AnswerId, FriendlyCode, PageId, SessionId};

/// The in-progress selection on the displayed page. Both fields stay `None`
/// until the respondent picks an answer.
///
/// Both keys must be present when decoding, even as `null`, so a widget object
/// that merely shares one of the names is never read as a captured answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PendingAnswer {
    #[serde(deserialize_with = "required_key")]
    pub answer_id: Option<AnswerId>,
    #[serde(deserialize_with = "required_key")]
    pub question_id: Option<PageId>,
}

fn required_key<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

impl PendingAnswer {
    pub fn is_empty(&self) -> bool {
        self.answer_id.is_none() && self.question_id.is_none()
    }
}

/// What actually travels to the server for one page. Serialized untagged so
/// widget-supplied objects pass through byte-for-byte in shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmissionPayload {
    Captured(PendingAnswer),
    Explicit(Value),
}

/// Body of a page submission. The server decodes `response` as a raw
/// `Value` so whatever the client sent is stored as sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<R = SubmissionPayload> {
    pub session_id: SessionId,
    pub response: R,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQuery {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassphraseQuery {
    pub friendly_code: FriendlyCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAnswer {
    pub page_id: PageId,
    pub response: Value,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAnswers {
    pub session_id: SessionId,
    pub friendly_code: FriendlyCode,
    pub answers: Vec<RecordedAnswer>,
}
