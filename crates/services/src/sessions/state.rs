use chrono::{DateTime, Utc};
use quiz_core::model::{QuizId, QuizQuestion, ResultId, Score};
use serde::{Deserialize, Serialize};

/// Transient state of one quiz run, owned by the conversation layer.
///
/// `position` counts delivered questions: 0 means nothing has been sent yet,
/// `questions.len()` means the last question is out and the next step finishes
/// the run. Only committed answers outlive this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    quiz_id: QuizId,
    result_id: ResultId,
    questions: Vec<QuizQuestion>,
    position: usize,
    finished: bool,
}

impl SessionState {
    pub(crate) fn new(quiz_id: QuizId, result_id: ResultId, questions: Vec<QuizQuestion>) -> Self {
        Self {
            quiz_id,
            result_id,
            questions,
            position: 0,
            finished: false,
        }
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn result_id(&self) -> ResultId {
        self.result_id
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The question whose answer the next step grades, if any.
    #[must_use]
    pub fn awaiting_answer(&self) -> Option<&QuizQuestion> {
        if self.finished {
            return None;
        }
        self.position
            .checked_sub(1)
            .and_then(|i| self.questions.get(i))
    }

    pub(crate) fn advance(&mut self) {
        self.position += 1;
    }

    pub(crate) fn finish(&mut self) {
        self.finished = true;
    }
}

/// A question delivered to the quiz-taker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionPrompt {
    /// One-based question number.
    pub number: usize,
    pub total: usize,
    pub text: String,
}

/// Final numbers of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizSummary {
    pub result_id: ResultId,
    pub score: Score,
    pub correct: u32,
    pub total: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Question(QuestionPrompt),
    Finished(QuizSummary),
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{ExternalId, QuestionId};

    fn state(len: u64) -> SessionState {
        let questions = (1..=len)
            .map(|i| QuizQuestion {
                id: QuestionId::new(i),
                external_id: ExternalId::new(format!("t/{i}")).unwrap(),
            })
            .collect();
        SessionState::new(QuizId::new(1), ResultId::new(2), questions)
    }

    #[test]
    fn awaiting_answer_follows_position() {
        let mut s = state(2);
        assert_eq!(s.awaiting_answer(), None);
        s.advance();
        assert_eq!(s.awaiting_answer().map(|q| q.id), Some(QuestionId::new(1)));
        s.advance();
        assert_eq!(s.awaiting_answer().map(|q| q.id), Some(QuestionId::new(2)));
        s.finish();
        assert_eq!(s.awaiting_answer(), None);
    }

    #[test]
    fn state_can_be_parked_as_json() {
        let mut s = state(3);
        s.advance();
        let json = serde_json::to_string(&s).unwrap();
        let restored: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, s);
        assert_eq!(restored.position(), 1);
    }
}
