use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(PageId);
id_newtype!(AnswerId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Human-friendly passphrase that identifies a respondent's session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FriendlyCode(pub String);

impl FriendlyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FriendlyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Checkbox,
    Radio,
    Binary,
    #[serde(rename = "freetext")]
    FreeText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: AnswerId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceQuestion {
    pub prompt: String,
    pub options: Vec<AnswerOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryQuestion {
    pub prompt: String,
    #[serde(default = "default_yes_label")]
    pub yes_label: String,
    #[serde(default = "default_no_label")]
    pub no_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeTextQuestion {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

fn default_yes_label() -> String {
    "Yes".to_string()
}

fn default_no_label() -> String {
    "No".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Question {
    Checkbox(ChoiceQuestion),
    Radio(ChoiceQuestion),
    Binary(BinaryQuestion),
    #[serde(rename = "freetext")]
    FreeText(FreeTextQuestion),
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        match self {
            Question::Checkbox(_) => QuestionKind::Checkbox,
            Question::Radio(_) => QuestionKind::Radio,
            Question::Binary(_) => QuestionKind::Binary,
            Question::FreeText(_) => QuestionKind::FreeText,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Question::Checkbox(q) | Question::Radio(q) => &q.prompt,
            Question::Binary(q) => &q.prompt,
            Question::FreeText(q) => &q.prompt,
        }
    }

    pub fn options(&self) -> &[AnswerOption] {
        match self {
            Question::Checkbox(q) | Question::Radio(q) => &q.options,
            Question::Binary(_) | Question::FreeText(_) => &[],
        }
    }

    /// Binary and free-text widgets build and submit their own response.
    pub fn is_self_submitting(&self) -> bool {
        matches!(self, Question::Binary(_) | Question::FreeText(_))
    }
}

/// One questionnaire step as served by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_code: Option<FriendlyCode>,
}

impl Page {
    pub fn lead_question(&self) -> Option<&Question> {
        self.questions.first()
    }

    pub fn offers_option(&self, answer_id: AnswerId) -> bool {
        self.questions
            .iter()
            .flat_map(Question::options)
            .any(|option| option.id == answer_id)
    }
}
