use quiz_core::model::{
    AnswerId, AnswerRecord, ExternalId, QuestionId, QuizId, QuizQuestion, ResultId, Score, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    if e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation() || db.is_foreign_key_violation())
    {
        return StorageError::Conflict;
    }
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn quiz_id_from_i64(v: i64) -> Result<QuizId, StorageError> {
    Ok(QuizId::new(i64_to_u64("quiz_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn result_id_from_i64(v: i64) -> Result<ResultId, StorageError> {
    Ok(ResultId::new(i64_to_u64("result_id", v)?))
}

pub(crate) fn answer_id_from_i64(v: i64) -> Result<AnswerId, StorageError> {
    Ok(AnswerId::new(i64_to_u64("answer_id", v)?))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn score_from_row(row: &SqliteRow) -> Result<Score, StorageError> {
    Score::from_persisted(row.try_get::<i64, _>("score").map_err(ser)?).map_err(ser)
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<QuizQuestion, StorageError> {
    Ok(QuizQuestion {
        id: question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        external_id: ExternalId::new(row.try_get::<String, _>("ext_id").map_err(ser)?)
            .map_err(ser)?,
    })
}

pub(crate) fn map_answer_row(row: &SqliteRow) -> Result<AnswerRecord, StorageError> {
    Ok(AnswerRecord {
        id: answer_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        result_id: result_id_from_i64(row.try_get::<i64, _>("result_id").map_err(ser)?)?,
        question_id: question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
        text: row.try_get("text").map_err(ser)?,
        correct: row.try_get::<i64, _>("correct").map_err(ser)? != 0,
    })
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}
