//! Ordered questionnaire definition served page by page.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use shared::domain::{AnswerId, Page, PageId, Question};
use thiserror::Error;

const BUILTIN_QUESTIONNAIRE: &str = include_str!("../questionnaire.toml");

#[derive(Debug, Error)]
pub enum QuestionnaireError {
    #[error("failed to read questionnaire '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse questionnaire: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("questionnaire has no pages")]
    NoPages,
    #[error("page {0} has no questions")]
    EmptyPage(PageId),
    #[error("page id {0} is used more than once")]
    DuplicatePage(PageId),
    #[error("choice question on page {0} has no options")]
    MissingOptions(PageId),
    #[error("option {option} is listed twice on page {page}")]
    DuplicateOption { page: PageId, option: AnswerId },
}

#[derive(Debug, Deserialize)]
struct QuestionnaireFile {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Clone)]
pub struct Questionnaire {
    title: Option<String>,
    pages: Vec<Page>,
}

impl Questionnaire {
    pub fn builtin() -> Result<Self, QuestionnaireError> {
        Self::from_toml_str(BUILTIN_QUESTIONNAIRE)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, QuestionnaireError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| QuestionnaireError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, QuestionnaireError> {
        let file: QuestionnaireFile = toml::from_str(raw)?;
        Self::from_pages(file.title, file.pages)
    }

    pub fn from_pages(title: Option<String>, pages: Vec<Page>) -> Result<Self, QuestionnaireError> {
        if pages.is_empty() {
            return Err(QuestionnaireError::NoPages);
        }

        let mut seen_pages = HashSet::new();
        for page in &pages {
            if !seen_pages.insert(page.id) {
                return Err(QuestionnaireError::DuplicatePage(page.id));
            }
            if page.questions.is_empty() {
                return Err(QuestionnaireError::EmptyPage(page.id));
            }

            let mut seen_options = HashSet::new();
            for question in &page.questions {
                if matches!(question, Question::Checkbox(_) | Question::Radio(_))
                    && question.options().is_empty()
                {
                    return Err(QuestionnaireError::MissingOptions(page.id));
                }
                for option in question.options() {
                    if !seen_options.insert(option.id) {
                        return Err(QuestionnaireError::DuplicateOption {
                            page: page.id,
                            option: option.id,
                        });
                    }
                }
            }
        }

        Ok(Self { title, pages })
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }
}
