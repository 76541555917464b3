use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    AnswerId, AnswerRecord, NewQuiz, QuestionId, Quiz, QuizId, QuizQuestion, QuizResult, ResultId,
    Score, ScoreError, UserId,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Score(#[from] ScoreError),
}

/// Answer to be written for one question of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerDraft {
    pub question_id: QuestionId,
    pub text: String,
    pub correct: bool,
}

impl AnswerDraft {
    #[must_use]
    pub fn new(question_id: QuestionId, text: impl Into<String>, correct: bool) -> Self {
        Self {
            question_id,
            text: text.into(),
            correct,
        }
    }
}

/// Result of marking a reviewed answer as correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptOutcome {
    /// False when the answer was already correct and nothing was written.
    pub changed: bool,
    pub score: Score,
    pub correct: u32,
}

/// Repository contract for quiz definitions.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Insert a quiz and its ordered question list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the quiz cannot be stored.
    async fn create_quiz(&self, quiz: &NewQuiz) -> Result<Quiz, StorageError>;

    /// Fetch a quiz by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures; a missing quiz is `Ok(None)`.
    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError>;

    /// Delete a quiz together with its results and answers.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the quiz does not exist.
    async fn delete_quiz(&self, id: QuizId) -> Result<(), StorageError>;

    /// One page of an owner's quizzes (ordered by id) plus the owner's total.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_quizzes(
        &self,
        owner: UserId,
        page: u32,
        page_size: u32,
    ) -> Result<(u64, Vec<Quiz>), StorageError>;
}

/// Repository contract for quiz runs and their answers.
///
/// `finish_result` and `accept_answer` are single atomic units: either every
/// write they perform is visible or none is.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Open a new run of `quiz_id` for `user_id` with score zero and no completion time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the quiz does not exist.
    async fn create_result(
        &self,
        quiz_id: QuizId,
        user_id: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<ResultId, StorageError>;

    /// Fetch a run with its answers in quiz order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures; a missing run is `Ok(None)`.
    async fn get_result(&self, id: ResultId) -> Result<Option<QuizResult>, StorageError>;

    /// Insert the answer for (result, question), or overwrite its text and correctness.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown run or a question outside
    /// the run's quiz, and `StorageError::Conflict` once the run is complete.
    async fn upsert_answer(
        &self,
        result_id: ResultId,
        answer: &AnswerDraft,
    ) -> Result<AnswerId, StorageError>;

    /// Currently incorrect answers of a run, in quiz order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_incorrect_answers(
        &self,
        result_id: ResultId,
    ) -> Result<Vec<AnswerRecord>, StorageError>;

    /// Store `floor(correct * 100 / total)` as the run's score.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Score` for invalid counts and
    /// `StorageError::NotFound` for an unknown run.
    async fn set_score(
        &self,
        result_id: ResultId,
        correct: u32,
        total: u32,
    ) -> Result<Score, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown run.
    async fn set_completion_time(
        &self,
        result_id: ResultId,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Record the final answer (if any), score the run over `total` questions
    /// from its persisted answers, and stamp the completion time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the run is already complete,
    /// `StorageError::NotFound` for an unknown run, and `StorageError::Score`
    /// for an invalid `total`.
    async fn finish_result(
        &self,
        result_id: ResultId,
        final_answer: Option<&AnswerDraft>,
        total: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<QuizResult, StorageError>;

    /// Mark one answer correct and rescore the run from its persisted correct count.
    /// Accepting an answer that is already correct changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the answer does not belong to the run.
    async fn accept_answer(
        &self,
        result_id: ResultId,
        answer_id: AnswerId,
        total: u32,
    ) -> Result<AcceptOutcome, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct ResultRow {
    quiz_id: QuizId,
    user_id: UserId,
    score: Score,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    last_quiz: u64,
    last_question: u64,
    last_result: u64,
    last_answer: u64,
    quizzes: BTreeMap<QuizId, Quiz>,
    results: BTreeMap<ResultId, ResultRow>,
    answers: BTreeMap<AnswerId, AnswerRecord>,
}

impl MemoryState {
    fn result_row(&self, id: ResultId) -> Result<&ResultRow, StorageError> {
        self.results.get(&id).ok_or(StorageError::NotFound)
    }

    /// Answers of a run ordered by their question's position in the quiz.
    fn answers_in_order(&self, id: ResultId) -> Result<Vec<AnswerRecord>, StorageError> {
        let row = self.result_row(id)?;
        let quiz = self.quizzes.get(&row.quiz_id).ok_or(StorageError::NotFound)?;
        let mut answers: Vec<_> = self
            .answers
            .values()
            .filter(|a| a.result_id == id)
            .cloned()
            .collect();
        answers.sort_by_key(|a| {
            quiz.questions()
                .iter()
                .position(|q| q.id == a.question_id)
                .unwrap_or(usize::MAX)
        });
        Ok(answers)
    }

    fn correct_count(&self, id: ResultId) -> u32 {
        let n = self
            .answers
            .values()
            .filter(|a| a.result_id == id && a.correct)
            .count();
        u32::try_from(n).unwrap_or(u32::MAX)
    }

    fn snapshot(&self, id: ResultId) -> Result<QuizResult, StorageError> {
        let row = self.result_row(id)?;
        Ok(QuizResult {
            id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            score: row.score,
            started_at: row.started_at,
            completed_at: row.completed_at,
            answers: self.answers_in_order(id)?,
        })
    }

    fn upsert(&mut self, result_id: ResultId, draft: &AnswerDraft) -> Result<AnswerId, StorageError> {
        let row = self.result_row(result_id)?;
        if row.completed_at.is_some() {
            return Err(StorageError::Conflict);
        }
        let quiz = self.quizzes.get(&row.quiz_id).ok_or(StorageError::NotFound)?;
        if !quiz.questions().iter().any(|q| q.id == draft.question_id) {
            return Err(StorageError::NotFound);
        }

        if let Some(existing) = self
            .answers
            .values_mut()
            .find(|a| a.result_id == result_id && a.question_id == draft.question_id)
        {
            existing.text.clone_from(&draft.text);
            existing.correct = draft.correct;
            return Ok(existing.id);
        }

        self.last_answer += 1;
        let id = AnswerId::new(self.last_answer);
        self.answers.insert(
            id,
            AnswerRecord {
                id,
                result_id,
                question_id: draft.question_id,
                text: draft.text.clone(),
                correct: draft.correct,
            },
        );
        Ok(id)
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All state sits behind one lock, so each trait call is atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn create_quiz(&self, quiz: &NewQuiz) -> Result<Quiz, StorageError> {
        let mut guard = self.lock()?;
        guard.last_quiz += 1;
        let id = QuizId::new(guard.last_quiz);

        let mut questions = Vec::with_capacity(quiz.questions().len());
        for external_id in quiz.questions() {
            guard.last_question += 1;
            questions.push(QuizQuestion {
                id: QuestionId::new(guard.last_question),
                external_id: external_id.clone(),
            });
        }

        let stored = Quiz::from_persisted(
            id,
            quiz.owner(),
            quiz.name().to_owned(),
            questions,
            quiz.created_at(),
        );
        guard.quizzes.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.quizzes.get(&id).cloned())
    }

    async fn delete_quiz(&self, id: QuizId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.quizzes.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        let runs: Vec<ResultId> = guard
            .results
            .iter()
            .filter(|(_, row)| row.quiz_id == id)
            .map(|(rid, _)| *rid)
            .collect();
        for rid in &runs {
            guard.results.remove(rid);
        }
        guard.answers.retain(|_, a| !runs.contains(&a.result_id));
        Ok(())
    }

    async fn list_quizzes(
        &self,
        owner: UserId,
        page: u32,
        page_size: u32,
    ) -> Result<(u64, Vec<Quiz>), StorageError> {
        let guard = self.lock()?;
        let owned: Vec<&Quiz> = guard.quizzes.values().filter(|q| q.owner() == owner).collect();
        let total = owned.len() as u64;
        let size = page_size.max(1) as usize;
        let items = owned
            .into_iter()
            .skip((page as usize).saturating_mul(size))
            .take(size)
            .cloned()
            .collect();
        Ok((total, items))
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn create_result(
        &self,
        quiz_id: QuizId,
        user_id: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<ResultId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.quizzes.contains_key(&quiz_id) {
            return Err(StorageError::NotFound);
        }
        guard.last_result += 1;
        let id = ResultId::new(guard.last_result);
        guard.results.insert(
            id,
            ResultRow {
                quiz_id,
                user_id,
                score: Score::ZERO,
                started_at,
                completed_at: None,
            },
        );
        Ok(id)
    }

    async fn get_result(&self, id: ResultId) -> Result<Option<QuizResult>, StorageError> {
        let guard = self.lock()?;
        if !guard.results.contains_key(&id) {
            return Ok(None);
        }
        guard.snapshot(id).map(Some)
    }

    async fn upsert_answer(
        &self,
        result_id: ResultId,
        answer: &AnswerDraft,
    ) -> Result<AnswerId, StorageError> {
        let mut guard = self.lock()?;
        guard.upsert(result_id, answer)
    }

    async fn list_incorrect_answers(
        &self,
        result_id: ResultId,
    ) -> Result<Vec<AnswerRecord>, StorageError> {
        let guard = self.lock()?;
        if !guard.results.contains_key(&result_id) {
            return Ok(Vec::new());
        }
        let mut answers = guard.answers_in_order(result_id)?;
        answers.retain(|a| !a.correct);
        Ok(answers)
    }

    async fn set_score(
        &self,
        result_id: ResultId,
        correct: u32,
        total: u32,
    ) -> Result<Score, StorageError> {
        let score = Score::from_counts(correct, total)?;
        let mut guard = self.lock()?;
        let row = guard
            .results
            .get_mut(&result_id)
            .ok_or(StorageError::NotFound)?;
        row.score = score;
        Ok(score)
    }

    async fn set_completion_time(
        &self,
        result_id: ResultId,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let row = guard
            .results
            .get_mut(&result_id)
            .ok_or(StorageError::NotFound)?;
        row.completed_at = Some(completed_at);
        Ok(())
    }

    async fn finish_result(
        &self,
        result_id: ResultId,
        final_answer: Option<&AnswerDraft>,
        total: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<QuizResult, StorageError> {
        let mut guard = self.lock()?;
        if guard.result_row(result_id)?.completed_at.is_some() {
            return Err(StorageError::Conflict);
        }

        // Validate everything before the first mutation so a failure leaves no trace.
        let previous = final_answer.and_then(|draft| {
            guard
                .answers
                .values()
                .find(|a| a.result_id == result_id && a.question_id == draft.question_id)
                .cloned()
        });
        let mut correct = guard.correct_count(result_id);
        if let Some(draft) = final_answer {
            let was_correct = previous.as_ref().is_some_and(|a| a.correct);
            match (was_correct, draft.correct) {
                (false, true) => correct += 1,
                (true, false) => correct -= 1,
                _ => {}
            }
        }
        let score = Score::from_counts(correct, total)?;

        if let Some(draft) = final_answer {
            guard.upsert(result_id, draft)?;
        }
        let row = guard
            .results
            .get_mut(&result_id)
            .ok_or(StorageError::NotFound)?;
        row.score = score;
        row.completed_at = Some(completed_at);
        guard.snapshot(result_id)
    }

    async fn accept_answer(
        &self,
        result_id: ResultId,
        answer_id: AnswerId,
        total: u32,
    ) -> Result<AcceptOutcome, StorageError> {
        let mut guard = self.lock()?;
        guard.result_row(result_id)?;
        let already = match guard.answers.get(&answer_id) {
            Some(a) if a.result_id == result_id => a.correct,
            _ => return Err(StorageError::NotFound),
        };
        let correct = guard.correct_count(result_id) + u32::from(!already);
        let score = Score::from_counts(correct, total)?;

        if let Some(a) = guard.answers.get_mut(&answer_id) {
            a.correct = true;
        }
        let row = guard
            .results
            .get_mut(&result_id)
            .ok_or(StorageError::NotFound)?;
        row.score = score;

        Ok(AcceptOutcome {
            changed: !already,
            score,
            correct,
        })
    }
}

/// Aggregates quiz and result repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub quizzes: Arc<dyn QuizRepository>,
    pub results: Arc<dyn ResultRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let quizzes: Arc<dyn QuizRepository> = Arc::new(repo.clone());
        let results: Arc<dyn ResultRepository> = Arc::new(repo);
        Self { quizzes, results }
    }
}
