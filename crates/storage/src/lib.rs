//! Persistence for quizzes, runs and answers.
//!
//! [`repository::Storage`] bundles the repository traits behind trait objects;
//! pick [`repository::InMemoryRepository`] for tests or [`sqlite::SqliteRepository`]
//! for a durable store.

#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;
