use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{AnswerId, QuestionId, QuizId, ResultId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("cannot score a quiz with zero questions")]
    ZeroTotal,

    #[error("correct answers ({correct}) exceed question count ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("stored score out of range: {0}")]
    OutOfRange(i64),
}

/// Percentage of correctly answered questions, always in `0..=100`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Score(u8);

impl Score {
    pub const ZERO: Score = Score(0);
    pub const PERFECT: Score = Score(100);

    /// `floor(correct * 100 / total)`.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::ZeroTotal` when `total == 0` and
    /// `ScoreError::CorrectExceedsTotal` when `correct > total`.
    pub fn from_counts(correct: u32, total: u32) -> Result<Self, ScoreError> {
        if total == 0 {
            return Err(ScoreError::ZeroTotal);
        }
        if correct > total {
            return Err(ScoreError::CorrectExceedsTotal { correct, total });
        }
        let percent = u64::from(correct) * 100 / u64::from(total);
        // correct <= total bounds percent to 0..=100
        Ok(Self(u8::try_from(percent).unwrap_or(100)))
    }

    /// Rehydrate a score from its stored integer form.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` for values outside `0..=100`.
    pub fn from_persisted(value: i64) -> Result<Self, ScoreError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(ScoreError::OutOfRange(value))
    }

    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.0 == 100
    }
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Score({})", self.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// One submitted answer for one question of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: AnswerId,
    pub result_id: ResultId,
    pub question_id: QuestionId,
    pub text: String,
    pub correct: bool,
}

/// One run of a quiz by one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub id: ResultId,
    pub quiz_id: QuizId,
    pub user_id: UserId,
    pub score: Score,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Answers in quiz question order.
    pub answers: Vec<AnswerRecord>,
}

impl QuizResult {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Number of answers currently marked correct.
    #[must_use]
    pub fn correct_count(&self) -> u32 {
        let n = self.answers.iter().filter(|a| a.correct).count();
        u32::try_from(n).unwrap_or(u32::MAX)
    }

    /// Answers currently marked incorrect, in quiz order.
    pub fn incorrect_answers(&self) -> impl Iterator<Item = &AnswerRecord> {
        self.answers.iter().filter(|a| !a.correct)
    }
}
