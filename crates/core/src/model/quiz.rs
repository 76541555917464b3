use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId, UserId};
use crate::model::question::ExternalId;

/// Longest accepted quiz name, in characters.
pub const MAX_QUIZ_NAME_LEN: usize = 100;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz name cannot be empty")]
    EmptyName,

    #[error("quiz name is longer than {max} characters")]
    NameTooLong { max: usize },

    #[error("topic tag cannot be empty")]
    EmptyTag,

    #[error("question count must be between 1 and {max}, got {requested}")]
    InvalidQuestionCount { requested: usize, max: usize },

    #[error("question list does not match the requested count ({expected} expected, {actual} given)")]
    CountMismatch { expected: usize, actual: usize },

    #[error("duplicate question in quiz: {0}")]
    DuplicateQuestion(ExternalId),
}

//
// ─── REQUEST ───────────────────────────────────────────────────────────────────
//

/// Validated user input for building a quiz, before any corpus access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    owner: UserId,
    name: String,
    tag: String,
    count: usize,
}

impl QuizRequest {
    /// Validate a quiz request.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` when the name or tag is blank, the name is too long,
    /// or `count` is outside `1..=max_questions`.
    pub fn new(
        owner: UserId,
        name: impl Into<String>,
        tag: impl Into<String>,
        count: usize,
        max_questions: usize,
    ) -> Result<Self, QuizError> {
        let name = validate_name(name.into())?;
        let tag = tag.into().trim().to_owned();
        if tag.is_empty() {
            return Err(QuizError::EmptyTag);
        }
        if count == 0 || count > max_questions {
            return Err(QuizError::InvalidQuestionCount {
                requested: count,
                max: max_questions,
            });
        }
        Ok(Self {
            owner,
            name,
            tag,
            count,
        })
    }

    #[must_use]
    pub fn owner(&self) -> UserId {
        self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }
}

fn validate_name(name: String) -> Result<String, QuizError> {
    let name = name.trim().to_owned();
    if name.is_empty() {
        return Err(QuizError::EmptyName);
    }
    if name.chars().count() > MAX_QUIZ_NAME_LEN {
        return Err(QuizError::NameTooLong {
            max: MAX_QUIZ_NAME_LEN,
        });
    }
    Ok(name)
}

//
// ─── NEW QUIZ ──────────────────────────────────────────────────────────────────
//

/// A quiz ready to be inserted: owner, name and the fixed external question list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuiz {
    owner: UserId,
    name: String,
    questions: Vec<ExternalId>,
    created_at: DateTime<Utc>,
}

impl NewQuiz {
    /// Combine a validated request with the sampled question list.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::CountMismatch` if the list length differs from the
    /// requested count, or `QuizError::DuplicateQuestion` on repeated ids.
    pub fn from_request(
        request: &QuizRequest,
        questions: Vec<ExternalId>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuizError> {
        if questions.len() != request.count() {
            return Err(QuizError::CountMismatch {
                expected: request.count(),
                actual: questions.len(),
            });
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for id in &questions {
            if !seen.insert(id) {
                return Err(QuizError::DuplicateQuestion(id.clone()));
            }
        }
        Ok(Self {
            owner: request.owner(),
            name: request.name().to_owned(),
            questions,
            created_at,
        })
    }

    #[must_use]
    pub fn owner(&self) -> UserId {
        self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn questions(&self) -> &[ExternalId] {
        &self.questions
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── PERSISTED QUIZ ────────────────────────────────────────────────────────────
//

/// One question slot of a persisted quiz.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: QuestionId,
    pub external_id: ExternalId,
}

/// A persisted quiz definition. The question list never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    id: QuizId,
    owner: UserId,
    name: String,
    questions: Vec<QuizQuestion>,
    created_at: DateTime<Utc>,
}

impl Quiz {
    /// Rehydrate a quiz from storage. Questions must already be in quiz order.
    #[must_use]
    pub fn from_persisted(
        id: QuizId,
        owner: UserId,
        name: String,
        questions: Vec<QuizQuestion>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            name,
            questions,
            created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn owner(&self) -> UserId {
        self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
