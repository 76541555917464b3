use std::sync::Arc;

use corpus::CorpusClient;
use quiz_core::model::{QuizId, QuizQuestion, UserId};
use storage::repository::{AnswerDraft, QuizRepository, ResultRepository};
use tracing::{debug, info, warn};

use super::state::{QuestionPrompt, QuizSummary, SessionState, StepOutcome};
use crate::error::SessionError;
use crate::Clock;

/// Drives quiz runs: opens results and performs one transition per step.
///
/// A step runs in two scopes. Grading the pending answer ends with one
/// repository write; delivering the next question only reads the corpus. The
/// position advances after both succeed, so a failed step is retried from the
/// same position and the upsert makes re-grading idempotent.
#[derive(Clone)]
pub struct QuizSession {
    clock: Clock,
    corpus: Arc<dyn CorpusClient>,
    quizzes: Arc<dyn QuizRepository>,
    results: Arc<dyn ResultRepository>,
}

impl QuizSession {
    #[must_use]
    pub fn new(
        clock: Clock,
        corpus: Arc<dyn CorpusClient>,
        quizzes: Arc<dyn QuizRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        Self {
            clock,
            corpus,
            quizzes,
            results,
        }
    }

    /// Open a new run of `quiz_id` for `user`. Nothing is delivered yet.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuiz` or `SessionError::EmptyQuiz` for an
    /// unusable quiz and `SessionError::Storage` if the run cannot be recorded.
    pub async fn start(&self, quiz_id: QuizId, user: UserId) -> Result<SessionState, SessionError> {
        let quiz = self
            .quizzes
            .get_quiz(quiz_id)
            .await?
            .ok_or(SessionError::UnknownQuiz(quiz_id))?;
        if quiz.questions().is_empty() {
            return Err(SessionError::EmptyQuiz(quiz_id));
        }

        let result_id = self
            .results
            .create_result(quiz_id, user, self.clock.now())
            .await?;
        info!(%quiz_id, %user, %result_id, questions = quiz.question_count(), "quiz run started");
        Ok(SessionState::new(quiz_id, result_id, quiz.questions().to_vec()))
    }

    /// Perform one transition.
    ///
    /// At position `p` of `N`: for `p > 0` the answer to question `p - 1` is
    /// graded against `answer` and recorded; for `p < N` question `p` is
    /// delivered, otherwise the run is scored and completed. `answer` is
    /// ignored at position 0.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` once the run has finished,
    /// `SessionError::Corpus` when a question cannot be loaded, and
    /// `SessionError::Storage` when the step cannot be recorded. On error the
    /// position is left untouched; an answer graded before a failed delivery
    /// stays recorded.
    pub async fn step(
        &self,
        state: &mut SessionState,
        answer: &str,
    ) -> Result<StepOutcome, SessionError> {
        if state.is_finished() {
            return Err(SessionError::Completed);
        }

        let graded = match state.awaiting_answer() {
            Some(question) => Some(self.grade(question, answer).await?),
            None => None,
        };

        let position = state.position();
        let total = state.total();

        if let Some(next) = state.questions().get(position) {
            if let Some(draft) = &graded {
                self.results.upsert_answer(state.result_id(), draft).await?;
            }
            let question = self.corpus.fetch(&next.external_id).await.inspect_err(|e| {
                warn!(result_id = %state.result_id(), ext_id = %next.external_id, error = %e, "could not load question");
            })?;
            state.advance();
            debug!(result_id = %state.result_id(), position = state.position(), "question delivered");
            return Ok(StepOutcome::Question(QuestionPrompt {
                number: position + 1,
                total,
                text: question.text().to_owned(),
            }));
        }

        let total_u32 = u32::try_from(total).unwrap_or(u32::MAX);
        let completed_at = self.clock.now();
        let result = self
            .results
            .finish_result(state.result_id(), graded.as_ref(), total_u32, completed_at)
            .await?;
        state.finish();

        let summary = QuizSummary {
            result_id: result.id,
            score: result.score,
            correct: result.correct_count(),
            total: total_u32,
            completed_at: result.completed_at.unwrap_or(completed_at),
        };
        info!(result_id = %summary.result_id, score = %summary.score, correct = summary.correct, total, "quiz run finished");
        Ok(StepOutcome::Finished(summary))
    }

    async fn grade(&self, slot: &QuizQuestion, answer: &str) -> Result<AnswerDraft, SessionError> {
        let question = self.corpus.fetch(&slot.external_id).await.inspect_err(|e| {
            warn!(ext_id = %slot.external_id, error = %e, "could not load question for grading");
        })?;
        let correct = question.check_answer(answer);
        debug!(ext_id = %slot.external_id, correct, "answer graded");
        Ok(AnswerDraft::new(slot.id, answer, correct))
    }
}
