//! Manual review of incorrect answers.
//!
//! After a run, the quiz-taker walks the answers still marked incorrect and may
//! accept any of them as correct. Position in that list is a zero-based rank;
//! since accepted answers leave the list, accepting keeps the rank and
//! rejecting moves to the next one. The cursor also carries the id of the
//! answer being accepted, so a stale or repeated accept can never hit a
//! different record.

use std::sync::Arc;

use corpus::CorpusClient;
use quiz_core::model::{AnswerId, ResultId, Score};
use serde::{Deserialize, Serialize};
use storage::repository::{AcceptOutcome, QuizRepository, ResultRepository, StorageError};
use tracing::{info, warn};

use crate::error::ReviewError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    Accept,
    Reject,
}

/// Where the next review step starts, and which answer (if any) to accept first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReviewCursor {
    pub rank: usize,
    pub accept: Option<AnswerId>,
}

impl ReviewCursor {
    #[must_use]
    pub fn start() -> Self {
        Self::default()
    }
}

/// One incorrect answer shown for review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPrompt {
    pub rank: usize,
    pub remaining: usize,
    pub answer_id: AnswerId,
    pub question_text: String,
    pub reference_answer: String,
    pub alternate_answer: Option<String>,
    pub submitted: String,
    pub score: Score,
    accept_cursor: ReviewCursor,
    reject_cursor: ReviewCursor,
}

impl ReviewPrompt {
    /// Cursor that continues the review after `decision` on this prompt.
    #[must_use]
    pub fn cursor_for(&self, decision: ReviewDecision) -> ReviewCursor {
        match decision {
            ReviewDecision::Accept => self.accept_cursor,
            ReviewDecision::Reject => self.reject_cursor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewSummary {
    pub score: Score,
    pub correct: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewStep {
    Prompt(ReviewPrompt),
    Complete(ReviewSummary),
}

/// Outcome of one review step: the accept it applied, if any, and what comes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewTurn {
    pub accepted: Option<AcceptOutcome>,
    pub next: ReviewStep,
}

#[derive(Clone)]
pub struct ManualReviewSession {
    corpus: Arc<dyn CorpusClient>,
    quizzes: Arc<dyn QuizRepository>,
    results: Arc<dyn ResultRepository>,
}

impl ManualReviewSession {
    #[must_use]
    pub fn new(
        corpus: Arc<dyn CorpusClient>,
        quizzes: Arc<dyn QuizRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        Self {
            corpus,
            quizzes,
            results,
        }
    }

    /// Apply the cursor's pending accept, then show the incorrect answer at
    /// `cursor.rank` or report that the review is complete.
    ///
    /// The accept is committed before the next question is loaded; retrying
    /// the same cursor after a load failure is safe because a repeated accept
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::UnknownResult`/`UnknownQuiz` for missing records,
    /// `ReviewError::Corpus` when the question cannot be loaded, and
    /// `ReviewError::Storage` on storage failures.
    pub async fn step(
        &self,
        result_id: ResultId,
        cursor: ReviewCursor,
    ) -> Result<ReviewTurn, ReviewError> {
        let result = self
            .results
            .get_result(result_id)
            .await?
            .ok_or(ReviewError::UnknownResult(result_id))?;
        let quiz = self
            .quizzes
            .get_quiz(result.quiz_id)
            .await?
            .ok_or(ReviewError::UnknownQuiz(result.quiz_id))?;
        let total = u32::try_from(quiz.question_count()).unwrap_or(u32::MAX);

        let accepted = match cursor.accept {
            Some(answer_id) => {
                let outcome = self
                    .results
                    .accept_answer(result_id, answer_id, total)
                    .await?;
                if outcome.changed {
                    info!(%result_id, %answer_id, score = %outcome.score, "answer accepted on review");
                }
                Some(outcome)
            }
            None => None,
        };
        let (score, correct) = accepted.map_or_else(
            || (result.score, result.correct_count()),
            |a| (a.score, a.correct),
        );

        let incorrect = self.results.list_incorrect_answers(result_id).await?;
        let Some(record) = incorrect.get(cursor.rank) else {
            return Ok(ReviewTurn {
                accepted,
                next: ReviewStep::Complete(ReviewSummary {
                    score,
                    correct,
                    total,
                }),
            });
        };

        let slot = quiz
            .questions()
            .iter()
            .find(|q| q.id == record.question_id)
            .ok_or(StorageError::NotFound)?;
        let question = self.corpus.fetch(&slot.external_id).await.inspect_err(|e| {
            warn!(%result_id, ext_id = %slot.external_id, error = %e, "could not load question for review");
        })?;

        Ok(ReviewTurn {
            accepted,
            next: ReviewStep::Prompt(ReviewPrompt {
                rank: cursor.rank,
                remaining: incorrect.len() - cursor.rank,
                answer_id: record.id,
                question_text: question.text().to_owned(),
                reference_answer: question.answer().to_owned(),
                alternate_answer: question.pass_criteria().map(str::to_owned),
                submitted: record.text.clone(),
                score,
                accept_cursor: ReviewCursor {
                    rank: cursor.rank,
                    accept: Some(record.id),
                },
                reject_cursor: ReviewCursor {
                    rank: cursor.rank + 1,
                    accept: None,
                },
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus::FixtureCorpus;
    use quiz_core::model::{ExternalId, NewQuiz, QuizRequest, UserId};
    use quiz_core::time::fixed_now;
    use storage::repository::{AnswerDraft, InMemoryRepository};

    /// Three-question run answered wrong, right, wrong.
    async fn finished_run() -> (ManualReviewSession, InMemoryRepository, ResultId) {
        let repo = InMemoryRepository::new();
        let request = QuizRequest::new(UserId::new(1), "Review", "x", 3, 30).unwrap();
        let ids = ["0", "1", "2"].iter().map(|i| ExternalId::new(*i).unwrap()).collect();
        let quiz = repo
            .create_quiz(&NewQuiz::from_request(&request, ids, fixed_now()).unwrap())
            .await
            .unwrap();
        let slots = quiz.questions();
        let result_id = repo
            .create_result(quiz.id(), UserId::new(1), fixed_now())
            .await
            .unwrap();
        repo.upsert_answer(result_id, &AnswerDraft::new(slots[0].id, "nope", false))
            .await
            .unwrap();
        repo.upsert_answer(result_id, &AnswerDraft::new(slots[1].id, "answer1", true))
            .await
            .unwrap();
        let last = AnswerDraft::new(slots[2].id, "nah", false);
        repo.finish_result(result_id, Some(&last), 3, fixed_now())
            .await
            .unwrap();

        let review = ManualReviewSession::new(
            Arc::new(FixtureCorpus::numbered(3)),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        (review, repo, result_id)
    }

    fn prompt(turn: ReviewTurn) -> ReviewPrompt {
        match turn.next {
            ReviewStep::Prompt(p) => p,
            ReviewStep::Complete(s) => panic!("review ended early: {s:?}"),
        }
    }

    #[tokio::test]
    async fn accept_keeps_rank_and_raises_score_once() {
        let (review, repo, result_id) = finished_run().await;
        let first = prompt(review.step(result_id, ReviewCursor::start()).await.unwrap());
        assert_eq!(first.rank, 0);
        assert_eq!(first.remaining, 2);
        assert_eq!(first.question_text, "question0");
        assert_eq!(first.submitted, "nope");
        assert_eq!(first.score.value(), 33);

        let accept = first.cursor_for(ReviewDecision::Accept);
        let turn = review.step(result_id, accept).await.unwrap();
        let outcome = turn.accepted.unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.correct, 2);
        assert_eq!(outcome.score.value(), 66);
        let second = prompt(turn);
        assert_eq!(second.rank, 0);
        assert_eq!(second.question_text, "question2");

        // Replaying the same accept must not touch another record.
        let replay = review.step(result_id, accept).await.unwrap();
        assert!(!replay.accepted.unwrap().changed);
        let stored = repo.get_result(result_id).await.unwrap().unwrap();
        assert_eq!(stored.correct_count(), 2);
        assert_eq!(stored.score.value(), 66);
    }

    #[tokio::test]
    async fn rejecting_everything_completes_unchanged() {
        let (review, _repo, result_id) = finished_run().await;
        let first = prompt(review.step(result_id, ReviewCursor::start()).await.unwrap());
        let second = prompt(
            review
                .step(result_id, first.cursor_for(ReviewDecision::Reject))
                .await
                .unwrap(),
        );
        assert_eq!(second.rank, 1);
        assert_eq!(second.remaining, 1);

        let done = review
            .step(result_id, second.cursor_for(ReviewDecision::Reject))
            .await
            .unwrap();
        assert!(done.accepted.is_none());
        assert_eq!(
            done.next,
            ReviewStep::Complete(ReviewSummary {
                score: Score::from_counts(1, 3).unwrap(),
                correct: 1,
                total: 3,
            })
        );
    }

    #[tokio::test]
    async fn unknown_result_is_reported() {
        let (review, _repo, _) = finished_run().await;
        let err = review
            .step(ResultId::new(404), ReviewCursor::start())
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::UnknownResult(_)));
    }
}
