use std::sync::Arc;

use corpus::{ChgkClient, CorpusClient};
use storage::repository::Storage;
use tracing::info;

use crate::config::QuizConfig;
use crate::error::AppServicesError;
use crate::quiz_service::QuizService;
use crate::review::ManualReviewSession;
use crate::sampler::QuestionSampler;
use crate::sessions::{QuizRunner, QuizSession, SessionRegistry};
use crate::Clock;

/// Assembles the app-facing services over one storage backend and one corpus.
#[derive(Clone)]
pub struct QuizServices {
    config: QuizConfig,
    storage: Storage,
    quizzes: Arc<QuizService>,
    runner: Arc<QuizRunner>,
    review: Arc<ManualReviewSession>,
}

impl QuizServices {
    /// Build services backed by `SQLite` storage at `config.db_url` and the
    /// live corpus at `config.corpus_base_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the
    /// corpus base URL is invalid.
    pub async fn new_sqlite(config: QuizConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        let corpus: Arc<dyn CorpusClient> = Arc::new(ChgkClient::new(&config.chgk_config())?);
        info!(db = %config.db_url, corpus = %config.corpus_base_url, "services ready");
        Ok(Self::with_parts(config, clock, storage, corpus))
    }

    /// Build services from already constructed storage and corpus.
    #[must_use]
    pub fn with_parts(
        config: QuizConfig,
        clock: Clock,
        storage: Storage,
        corpus: Arc<dyn CorpusClient>,
    ) -> Self {
        let sampler = Arc::new(QuestionSampler::new(Arc::clone(&corpus), config.sampling));
        let quizzes = Arc::new(QuizService::new(
            clock,
            sampler,
            Arc::clone(&storage.quizzes),
            config.max_questions,
            config.list_page_size,
        ));
        let session = QuizSession::new(
            clock,
            Arc::clone(&corpus),
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.results),
        );
        let runner = Arc::new(QuizRunner::new(session, SessionRegistry::new()));
        let review = Arc::new(ManualReviewSession::new(
            corpus,
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.results),
        ));

        Self {
            config,
            storage,
            quizzes,
            runner,
            review,
        }
    }

    #[must_use]
    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn quizzes(&self) -> Arc<QuizService> {
        Arc::clone(&self.quizzes)
    }

    #[must_use]
    pub fn runner(&self) -> Arc<QuizRunner> {
        Arc::clone(&self.runner)
    }

    #[must_use]
    pub fn review(&self) -> Arc<ManualReviewSession> {
        Arc::clone(&self.review)
    }
}
