use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::matcher;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExternalIdError {
    #[error("external question id cannot be empty")]
    Empty,

    #[error("external question id contains whitespace: {0:?}")]
    Whitespace(String),
}

/// Corpus-assigned addressing token of a question.
///
/// This is the path suffix of the question URL, e.g. `ef01.2/3` for
/// `https://db.chgk.info/question/ef01.2/3`. It may contain slashes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalId(String);

impl ExternalId {
    /// Validate and wrap a corpus identifier.
    ///
    /// # Errors
    ///
    /// Returns `ExternalIdError` if the id is empty or contains whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, ExternalIdError> {
        let raw = raw.into();
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(ExternalIdError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ExternalIdError::Whitespace(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExternalId({})", self.0)
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExternalId {
    type Err = ExternalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ExternalId {
    type Error = ExternalIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExternalId> for String {
    fn from(value: ExternalId) -> Self {
        value.0
    }
}

/// A question as fetched from the corpus.
///
/// `text` is ready for display: any handout block has already been joined in
/// front of the question body. Answers are plain (unescaped) text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: ExternalId,
    text: String,
    answer: String,
    pass_criteria: Option<String>,
}

impl Question {
    /// Build a question. Blank pass criteria are treated as absent.
    #[must_use]
    pub fn new(
        id: ExternalId,
        text: impl Into<String>,
        answer: impl Into<String>,
        pass_criteria: Option<String>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            answer: answer.into(),
            pass_criteria: pass_criteria.filter(|p| !p.trim().is_empty()),
        }
    }

    #[must_use]
    pub fn id(&self) -> &ExternalId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Alternate accepted answer, if the corpus supplies one.
    #[must_use]
    pub fn pass_criteria(&self) -> Option<&str> {
        self.pass_criteria.as_deref()
    }

    /// Grade a freeform answer against the primary and alternate answers.
    #[must_use]
    pub fn check_answer(&self, submitted: &str) -> bool {
        matcher::check(submitted, &self.answer, self.pass_criteria())
    }
}
