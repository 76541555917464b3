use quiz_core::model::{NewQuiz, Quiz, QuizId, QuizQuestion, UserId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::SqliteRepository;
use super::mapping::{
    conn, id_i64, map_question_row, question_id_from_i64, quiz_id_from_i64, ser, user_id_from_i64,
};
use crate::repository::{QuizRepository, StorageError};

async fn load_questions(pool: &SqlitePool, quiz_id: i64) -> Result<Vec<QuizQuestion>, StorageError> {
    let rows = sqlx::query(
        r"
        SELECT id, ext_id FROM quiz_questions
        WHERE quiz_id = ?1
        ORDER BY position ASC
        ",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await
    .map_err(conn)?;

    rows.iter().map(map_question_row).collect()
}

async fn quiz_from_row(pool: &SqlitePool, row: &SqliteRow) -> Result<Quiz, StorageError> {
    let raw_id: i64 = row.try_get("id").map_err(ser)?;
    let questions = load_questions(pool, raw_id).await?;
    Ok(Quiz::from_persisted(
        quiz_id_from_i64(raw_id)?,
        user_id_from_i64(row.try_get::<i64, _>("owner_id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        questions,
        row.try_get("created_at").map_err(ser)?,
    ))
}

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn create_quiz(&self, quiz: &NewQuiz) -> Result<Quiz, StorageError> {
        let owner = id_i64("owner_id", quiz.owner().value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            INSERT INTO quizzes (owner_id, name, created_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(owner)
        .bind(quiz.name())
        .bind(quiz.created_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        let raw_quiz_id = res.last_insert_rowid();

        let mut questions = Vec::with_capacity(quiz.questions().len());
        for (position, external_id) in quiz.questions().iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            let res = sqlx::query(
                r"
                INSERT INTO quiz_questions (quiz_id, position, ext_id)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(raw_quiz_id)
            .bind(position)
            .bind(external_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
            questions.push(QuizQuestion {
                id: question_id_from_i64(res.last_insert_rowid())?,
                external_id: external_id.clone(),
            });
        }

        tx.commit().await.map_err(conn)?;

        Ok(Quiz::from_persisted(
            quiz_id_from_i64(raw_quiz_id)?,
            quiz.owner(),
            quiz.name().to_owned(),
            questions,
            quiz.created_at(),
        ))
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, owner_id, name, created_at
            FROM quizzes WHERE id = ?1
            ",
        )
        .bind(id_i64("quiz_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => quiz_from_row(&self.pool, &row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn delete_quiz(&self, id: QuizId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM quizzes WHERE id = ?1")
            .bind(id_i64("quiz_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_quizzes(
        &self,
        owner: UserId,
        page: u32,
        page_size: u32,
    ) -> Result<(u64, Vec<Quiz>), StorageError> {
        let owner = id_i64("owner_id", owner.value())?;
        let page_size = page_size.max(1);

        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM quizzes WHERE owner_id = ?1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?
            .try_get("total")
            .map_err(ser)?;
        let total = u64::try_from(total).map_err(ser)?;

        let offset = i64::from(page).saturating_mul(i64::from(page_size));
        let rows = sqlx::query(
            r"
            SELECT id, owner_id, name, created_at
            FROM quizzes
            WHERE owner_id = ?1
            ORDER BY id ASC
            LIMIT ?2 OFFSET ?3
            ",
        )
        .bind(owner)
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut quizzes = Vec::with_capacity(rows.len());
        for row in &rows {
            quizzes.push(quiz_from_row(&self.pool, row).await?);
        }
        Ok((total, quizzes))
    }
}
