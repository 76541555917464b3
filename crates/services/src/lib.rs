//! Quiz application services: quiz definitions, question sampling, quiz runs
//! and manual review of incorrect answers.

#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod quiz_service;
pub mod review;
pub mod sampler;
pub mod sessions;

pub use quiz_core::Clock;

pub use app_services::QuizServices;
pub use config::{QuizConfig, SamplingConfig};
pub use error::{AppServicesError, QuizServiceError, ReviewError, SamplerError, SessionError};
pub use quiz_service::{QuizPage, QuizService};
pub use review::{
    ManualReviewSession, ReviewCursor, ReviewDecision, ReviewPrompt, ReviewStep, ReviewSummary,
    ReviewTurn,
};
pub use sampler::QuestionSampler;
pub use sessions::{
    QuestionPrompt, QuizRunner, QuizSession, QuizSummary, SessionKey, SessionRegistry,
    SessionState, StepOutcome,
};
