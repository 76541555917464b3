use quiz_core::model::ExternalId;
use thiserror::Error;

/// Errors surfaced by corpus clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CorpusError {
    #[error("question not found: {id}")]
    NotFound { id: ExternalId },

    #[error("unexpected corpus document structure: {what}")]
    Parse { what: String },

    #[error("corpus request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("invalid corpus base url: {0}")]
    InvalidBaseUrl(String),

    #[error("fixture error: {0}")]
    Fixture(String),
}

impl CorpusError {
    pub(crate) fn parse(what: impl Into<String>) -> Self {
        Self::Parse { what: what.into() }
    }

    /// True when the failure means "this question cannot be used", as opposed
    /// to a transport problem.
    #[must_use]
    pub fn is_unresolvable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Parse { .. })
    }
}
