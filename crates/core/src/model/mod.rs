mod ids;
mod question;
mod quiz;
mod result;

pub use ids::{AnswerId, ParseIdError, QuestionId, QuizId, ResultId, UserId};
pub use question::{ExternalId, ExternalIdError, Question};
pub use quiz::{MAX_QUIZ_NAME_LEN, NewQuiz, Quiz, QuizError, QuizQuestion, QuizRequest};
pub use result::{AnswerRecord, QuizResult, Score, ScoreError};
