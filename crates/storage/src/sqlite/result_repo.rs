use chrono::{DateTime, Utc};
use quiz_core::model::{AnswerId, AnswerRecord, QuizId, QuizResult, ResultId, Score, UserId};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::mapping::{
    answer_id_from_i64, conn, id_i64, map_answer_row, quiz_id_from_i64, result_id_from_i64, ser,
    score_from_row, u32_from_i64, user_id_from_i64,
};
use crate::repository::{AcceptOutcome, AnswerDraft, ResultRepository, StorageError};

const ANSWERS_IN_QUIZ_ORDER: &str = r"
    SELECT a.id, a.result_id, a.question_id, a.text, a.correct
    FROM answers a
    JOIN quiz_questions q ON q.id = a.question_id
    WHERE a.result_id = ?1
    ORDER BY q.position ASC
";

const INCORRECT_IN_QUIZ_ORDER: &str = r"
    SELECT a.id, a.result_id, a.question_id, a.text, a.correct
    FROM answers a
    JOIN quiz_questions q ON q.id = a.question_id
    WHERE a.result_id = ?1 AND a.correct = 0
    ORDER BY q.position ASC
";

/// Insert or overwrite one answer inside an open transaction.
async fn upsert_answer_in(
    db: &mut SqliteConnection,
    result_id: i64,
    draft: &AnswerDraft,
) -> Result<i64, StorageError> {
    let run = sqlx::query("SELECT quiz_id, completed_at FROM quiz_results WHERE id = ?1")
        .bind(result_id)
        .fetch_optional(&mut *db)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;
    let completed_at: Option<DateTime<Utc>> = run.try_get("completed_at").map_err(ser)?;
    if completed_at.is_some() {
        return Err(StorageError::Conflict);
    }
    let quiz_id: i64 = run.try_get("quiz_id").map_err(ser)?;
    let question_id = id_i64("question_id", draft.question_id.value())?;

    sqlx::query("SELECT 1 FROM quiz_questions WHERE id = ?1 AND quiz_id = ?2")
        .bind(question_id)
        .bind(quiz_id)
        .fetch_optional(&mut *db)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

    let row = sqlx::query(
        r"
        INSERT INTO answers (result_id, question_id, text, correct)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(result_id, question_id) DO UPDATE SET
            text = excluded.text,
            correct = excluded.correct
        RETURNING id
        ",
    )
    .bind(result_id)
    .bind(question_id)
    .bind(draft.text.as_str())
    .bind(i64::from(draft.correct))
    .fetch_one(&mut *db)
    .await
    .map_err(conn)?;

    row.try_get("id").map_err(ser)
}

async fn correct_count_in(db: &mut SqliteConnection, result_id: i64) -> Result<u32, StorageError> {
    let n: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM answers WHERE result_id = ?1 AND correct = 1",
    )
    .bind(result_id)
    .fetch_one(&mut *db)
    .await
    .map_err(conn)?
    .try_get("n")
    .map_err(ser)?;
    u32_from_i64("correct count", n)
}

async fn store_score_in(
    db: &mut SqliteConnection,
    result_id: i64,
    score: Score,
) -> Result<(), StorageError> {
    sqlx::query("UPDATE quiz_results SET score = ?1 WHERE id = ?2")
        .bind(i64::from(score.value()))
        .bind(result_id)
        .execute(&mut *db)
        .await
        .map_err(conn)?;
    Ok(())
}

impl SqliteRepository {
    async fn answers_for(&self, query: &str, result_id: i64) -> Result<Vec<AnswerRecord>, StorageError> {
        let rows = sqlx::query(query)
            .bind(result_id)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_answer_row).collect()
    }
}

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn create_result(
        &self,
        quiz_id: QuizId,
        user_id: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<ResultId, StorageError> {
        let quiz = id_i64("quiz_id", quiz_id.value())?;
        sqlx::query("SELECT 1 FROM quizzes WHERE id = ?1")
            .bind(quiz)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        let res = sqlx::query(
            r"
            INSERT INTO quiz_results (quiz_id, user_id, score, started_at, completed_at)
            VALUES (?1, ?2, 0, ?3, NULL)
            ",
        )
        .bind(quiz)
        .bind(id_i64("user_id", user_id.value())?)
        .bind(started_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        result_id_from_i64(res.last_insert_rowid())
    }

    async fn get_result(&self, id: ResultId) -> Result<Option<QuizResult>, StorageError> {
        let raw_id = id_i64("result_id", id.value())?;
        let Some(row) = sqlx::query(
            r"
            SELECT id, quiz_id, user_id, score, started_at, completed_at
            FROM quiz_results WHERE id = ?1
            ",
        )
        .bind(raw_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        else {
            return Ok(None);
        };

        Ok(Some(QuizResult {
            id,
            quiz_id: quiz_id_from_i64(row.try_get::<i64, _>("quiz_id").map_err(ser)?)?,
            user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
            score: score_from_row(&row)?,
            started_at: row.try_get("started_at").map_err(ser)?,
            completed_at: row.try_get("completed_at").map_err(ser)?,
            answers: self.answers_for(ANSWERS_IN_QUIZ_ORDER, raw_id).await?,
        }))
    }

    async fn upsert_answer(
        &self,
        result_id: ResultId,
        answer: &AnswerDraft,
    ) -> Result<AnswerId, StorageError> {
        let raw_id = id_i64("result_id", result_id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let answer_id = upsert_answer_in(&mut *tx, raw_id, answer).await?;
        tx.commit().await.map_err(conn)?;
        answer_id_from_i64(answer_id)
    }

    async fn list_incorrect_answers(
        &self,
        result_id: ResultId,
    ) -> Result<Vec<AnswerRecord>, StorageError> {
        self.answers_for(
            INCORRECT_IN_QUIZ_ORDER,
            id_i64("result_id", result_id.value())?,
        )
        .await
    }

    async fn set_score(
        &self,
        result_id: ResultId,
        correct: u32,
        total: u32,
    ) -> Result<Score, StorageError> {
        let score = Score::from_counts(correct, total)?;
        let res = sqlx::query("UPDATE quiz_results SET score = ?1 WHERE id = ?2")
            .bind(i64::from(score.value()))
            .bind(id_i64("result_id", result_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(score)
    }

    async fn set_completion_time(
        &self,
        result_id: ResultId,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE quiz_results SET completed_at = ?1 WHERE id = ?2")
            .bind(completed_at)
            .bind(id_i64("result_id", result_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn finish_result(
        &self,
        result_id: ResultId,
        final_answer: Option<&AnswerDraft>,
        total: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<QuizResult, StorageError> {
        let raw_id = id_i64("result_id", result_id.value())?;
        // Dropping `tx` on any early return rolls every write back.
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let completed: Option<DateTime<Utc>> =
            sqlx::query("SELECT completed_at FROM quiz_results WHERE id = ?1")
                .bind(raw_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(conn)?
                .ok_or(StorageError::NotFound)?
                .try_get("completed_at")
                .map_err(ser)?;
        if completed.is_some() {
            return Err(StorageError::Conflict);
        }

        if let Some(draft) = final_answer {
            upsert_answer_in(&mut *tx, raw_id, draft).await?;
        }
        let correct = correct_count_in(&mut *tx, raw_id).await?;
        let score = Score::from_counts(correct, total)?;

        sqlx::query("UPDATE quiz_results SET score = ?1, completed_at = ?2 WHERE id = ?3")
            .bind(i64::from(score.value()))
            .bind(completed_at)
            .bind(raw_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;

        self.get_result(result_id)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn accept_answer(
        &self,
        result_id: ResultId,
        answer_id: AnswerId,
        total: u32,
    ) -> Result<AcceptOutcome, StorageError> {
        let raw_result = id_i64("result_id", result_id.value())?;
        let raw_answer = id_i64("answer_id", answer_id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let already: i64 = sqlx::query("SELECT correct FROM answers WHERE id = ?1 AND result_id = ?2")
            .bind(raw_answer)
            .bind(raw_result)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?
            .try_get("correct")
            .map_err(ser)?;
        let changed = already == 0;

        if changed {
            sqlx::query("UPDATE answers SET correct = 1 WHERE id = ?1")
                .bind(raw_answer)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
        }
        let correct = correct_count_in(&mut *tx, raw_result).await?;
        let score = Score::from_counts(correct, total)?;
        store_score_in(&mut *tx, raw_result, score).await?;

        tx.commit().await.map_err(conn)?;

        Ok(AcceptOutcome {
            changed,
            score,
            correct,
        })
    }
}
