#![forbid(unsafe_code)]

pub mod matcher;
pub mod model;
pub mod pagination;
pub mod time;

pub use matcher::AnswerMatcher;
pub use pagination::Pagination;
pub use time::Clock;
