use std::sync::Arc;

use quiz_core::model::{NewQuiz, Quiz, QuizId, QuizRequest, UserId};
use quiz_core::Pagination;
use storage::repository::{QuizRepository, StorageError};
use tracing::info;

use crate::error::QuizServiceError;
use crate::sampler::QuestionSampler;
use crate::Clock;

/// One page of an owner's quizzes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizPage {
    pub pagination: Pagination,
    pub items: Vec<Quiz>,
}

/// Creates, lists and deletes quiz definitions.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    sampler: Arc<QuestionSampler>,
    quizzes: Arc<dyn QuizRepository>,
    max_questions: usize,
    page_size: u32,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sampler: Arc<QuestionSampler>,
        quizzes: Arc<dyn QuizRepository>,
        max_questions: usize,
        page_size: u32,
    ) -> Self {
        Self {
            clock,
            sampler,
            quizzes,
            max_questions,
            page_size: page_size.max(1),
        }
    }

    #[must_use]
    pub fn max_questions(&self) -> usize {
        self.max_questions
    }

    /// Validate the request, sample `count` questions for `tag` and persist the quiz.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Validation` for bad input before touching the
    /// corpus, `QuizServiceError::Sampler` when not enough questions can be
    /// drawn, and `QuizServiceError::Storage` if the quiz cannot be saved.
    pub async fn create_quiz(
        &self,
        owner: UserId,
        name: &str,
        tag: &str,
        count: usize,
    ) -> Result<Quiz, QuizServiceError> {
        let request = QuizRequest::new(owner, name, tag, count, self.max_questions)?;
        let questions = self
            .sampler
            .get_n_random(request.tag(), request.count())
            .await?;
        let new_quiz = NewQuiz::from_request(&request, questions, self.clock.now())?;
        let quiz = self.quizzes.create_quiz(&new_quiz).await?;
        info!(quiz_id = %quiz.id(), %owner, count, "quiz created");
        Ok(quiz)
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::UnknownQuiz` if the quiz does not exist.
    pub async fn get_quiz(&self, id: QuizId) -> Result<Quiz, QuizServiceError> {
        self.quizzes
            .get_quiz(id)
            .await?
            .ok_or(QuizServiceError::UnknownQuiz(id))
    }

    /// Delete a quiz along with every run and answer recorded for it.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::UnknownQuiz` if the quiz does not exist.
    pub async fn delete_quiz(&self, id: QuizId) -> Result<(), QuizServiceError> {
        match self.quizzes.delete_quiz(id).await {
            Ok(()) => {
                info!(quiz_id = %id, "quiz deleted");
                Ok(())
            }
            Err(StorageError::NotFound) => Err(QuizServiceError::UnknownQuiz(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// List one page of `owner`'s quizzes. A page past the end is clamped to
    /// the last page.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` on storage failures.
    pub async fn list_quizzes(&self, owner: UserId, page: u32) -> Result<QuizPage, QuizServiceError> {
        let (total, items) = self.quizzes.list_quizzes(owner, page, self.page_size).await?;
        let pagination = Pagination::new(total, self.page_size, page);
        let clamped = pagination.clamped();
        if clamped == pagination {
            return Ok(QuizPage { pagination, items });
        }

        let (total, items) = self
            .quizzes
            .list_quizzes(owner, clamped.page(), self.page_size)
            .await?;
        Ok(QuizPage {
            pagination: Pagination::new(total, self.page_size, clamped.page()),
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplingConfig;
    use corpus::FixtureCorpus;
    use quiz_core::model::QuizError;
    use quiz_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn service(corpus_size: usize) -> QuizService {
        let corpus = Arc::new(FixtureCorpus::numbered(corpus_size));
        let sampler = Arc::new(QuestionSampler::with_seed(
            corpus,
            SamplingConfig::default(),
            42,
        ));
        QuizService::new(
            fixed_clock(),
            sampler,
            Arc::new(InMemoryRepository::new()),
            30,
            5,
        )
    }

    #[tokio::test]
    async fn creates_quiz_with_requested_count() {
        let svc = service(50);
        let quiz = svc.create_quiz(UserId::new(1), " Rivers ", "geo", 10).await.unwrap();
        assert_eq!(quiz.name(), "Rivers");
        assert_eq!(quiz.question_count(), 10);
        assert_eq!(svc.get_quiz(quiz.id()).await.unwrap(), quiz);
    }

    #[tokio::test]
    async fn validation_happens_before_sampling() {
        let svc = service(0);
        let err = svc
            .create_quiz(UserId::new(1), "Rivers", "geo", 31)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QuizServiceError::Validation(QuizError::InvalidQuestionCount { .. })
        ));
    }

    #[tokio::test]
    async fn small_corpus_is_reported() {
        let svc = service(2);
        let err = svc
            .create_quiz(UserId::new(1), "Rivers", "geo", 3)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "not enough questions found for this topic");
    }

    #[tokio::test]
    async fn lists_in_pages_and_clamps() {
        let svc = service(10);
        for i in 0..23 {
            svc.create_quiz(UserId::new(1), &format!("Quiz {i}"), "geo", 1)
                .await
                .unwrap();
        }

        let first = svc.list_quizzes(UserId::new(1), 0).await.unwrap();
        assert_eq!(first.pagination.page_count(), 5);
        assert!(!first.pagination.has_prev());
        assert!(first.pagination.has_next());
        assert_eq!(first.items.len(), 5);

        let past_end = svc.list_quizzes(UserId::new(1), 9).await.unwrap();
        assert_eq!(past_end.pagination.page(), 4);
        assert!(!past_end.pagination.has_next());
        assert_eq!(past_end.items.len(), 3);
        assert_eq!(past_end.items[2].name(), "Quiz 22");
    }

    #[tokio::test]
    async fn delete_reports_unknown_quiz() {
        let svc = service(10);
        let quiz = svc.create_quiz(UserId::new(1), "Rivers", "geo", 2).await.unwrap();
        svc.delete_quiz(quiz.id()).await.unwrap();
        assert!(matches!(
            svc.delete_quiz(quiz.id()).await,
            Err(QuizServiceError::UnknownQuiz(_))
        ));
        assert!(matches!(
            svc.get_quiz(quiz.id()).await,
            Err(QuizServiceError::UnknownQuiz(_))
        ));
    }
}
