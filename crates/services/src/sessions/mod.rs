mod quiz_session;
mod registry;
mod state;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use quiz_session::QuizSession;
pub use registry::{QuizRunner, SessionKey, SessionRegistry};
pub use state::{QuestionPrompt, QuizSummary, SessionState, StepOutcome};
