//! Shared error types for the services crate.
//!
//! `Display` output is meant for logs. Anything shown to a quiz-taker goes
//! through `user_message()`, which never leaks corpus or storage details.

use thiserror::Error;

use corpus::CorpusError;
use quiz_core::model::{QuizError, QuizId, ResultId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

const MSG_NOT_ENOUGH: &str = "not enough questions found for this topic";
const MSG_LOAD_FAILED: &str = "could not load question content";
const MSG_GENERIC: &str = "something went wrong, please try again";

/// Errors emitted by `QuestionSampler`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SamplerError {
    #[error("only {available} questions can be drawn for {tag:?}, {requested} requested")]
    InsufficientCorpus {
        tag: String,
        requested: usize,
        available: u32,
    },
    #[error("gave up after {attempts} attempts with {found} of {requested} questions")]
    SamplingExhausted {
        requested: usize,
        found: usize,
        attempts: u32,
    },
    #[error(transparent)]
    Corpus(#[from] CorpusError),
}

impl SamplerError {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InsufficientCorpus { .. } | Self::SamplingExhausted { .. } => MSG_NOT_ENOUGH,
            Self::Corpus(_) => MSG_LOAD_FAILED,
        }
    }
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error(transparent)]
    Validation(#[from] QuizError),
    #[error("quiz {0} does not exist")]
    UnknownQuiz(QuizId),
    #[error(transparent)]
    Sampler(#[from] SamplerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl QuizServiceError {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(QuizError::EmptyName) => "the quiz name cannot be empty",
            Self::Validation(QuizError::NameTooLong { .. }) => "the quiz name is too long",
            Self::Validation(QuizError::EmptyTag) => "the topic cannot be empty",
            Self::Validation(QuizError::InvalidQuestionCount { .. }) => {
                "the number of questions is out of range"
            }
            Self::Validation(_) => MSG_GENERIC,
            Self::UnknownQuiz(_) => "this quiz no longer exists",
            Self::Sampler(e) => e.user_message(),
            Self::Storage(_) => MSG_GENERIC,
        }
    }
}

/// Errors emitted by quiz sessions and the session runner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no quiz is running for this session")]
    NotRunning,
    #[error("a quiz is already running for this session")]
    AlreadyRunning,
    #[error("quiz run already completed")]
    Completed,
    #[error("quiz {0} does not exist")]
    UnknownQuiz(QuizId),
    #[error("quiz {0} has no questions")]
    EmptyQuiz(QuizId),
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotRunning => "no quiz is in progress",
            Self::AlreadyRunning => "finish or cancel the current quiz first",
            Self::Completed => "this quiz is already finished",
            Self::UnknownQuiz(_) => "this quiz no longer exists",
            Self::EmptyQuiz(_) => "this quiz has no questions",
            Self::Corpus(_) => MSG_LOAD_FAILED,
            Self::Storage(_) => MSG_GENERIC,
        }
    }
}

/// Errors emitted by `ManualReviewSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewError {
    #[error("result {0} does not exist")]
    UnknownResult(ResultId),
    #[error("quiz {0} does not exist")]
    UnknownQuiz(QuizId),
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReviewError {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnknownResult(_) => "this result no longer exists",
            Self::UnknownQuiz(_) => "this quiz no longer exists",
            Self::Corpus(_) => MSG_LOAD_FAILED,
            Self::Storage(_) => MSG_GENERIC,
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Corpus(#[from] CorpusError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{ExternalId, ScoreError};

    #[test]
    fn user_messages_hide_internal_details() {
        let parse = SessionError::Corpus(CorpusError::Parse {
            what: "missing <Answer> in t1/4".into(),
        });
        assert_eq!(parse.user_message(), MSG_LOAD_FAILED);

        let missing = SamplerError::Corpus(CorpusError::NotFound {
            id: ExternalId::new("t1/4").unwrap(),
        });
        assert!(!missing.user_message().contains("t1/4"));

        let short = QuizServiceError::Sampler(SamplerError::InsufficientCorpus {
            tag: "war".into(),
            requested: 5,
            available: 2,
        });
        assert_eq!(short.user_message(), MSG_NOT_ENOUGH);
    }

    #[test]
    fn score_failures_arrive_through_storage() {
        let session = SessionError::from(StorageError::from(ScoreError::ZeroTotal));
        assert!(matches!(session, SessionError::Storage(StorageError::Score(_))));
        assert_eq!(session.user_message(), MSG_GENERIC);

        let review = ReviewError::from(StorageError::from(ScoreError::OutOfRange(101)));
        assert!(matches!(review, ReviewError::Storage(StorageError::Score(_))));
        assert_eq!(review.user_message(), MSG_GENERIC);
    }
}
