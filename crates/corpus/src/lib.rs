//! Access to the external question corpus.
//!
//! [`CorpusClient`] is the seam the rest of the workspace programs against.
//! [`ChgkClient`] talks to the live db.chgk.info site; [`FixtureCorpus`] is an
//! in-memory stand-in for tests and offline runs.

#![forbid(unsafe_code)]

pub mod chgk;
pub mod error;
pub mod fixture;
pub mod search;

use async_trait::async_trait;
use quiz_core::model::{ExternalId, Question};

pub use chgk::{ChgkClient, ChgkConfig};
pub use error::CorpusError;
pub use fixture::{BoundMode, FixtureCorpus};
pub use search::{SearchBound, SearchPage};

/// Contract for a searchable, paginated question corpus.
///
/// Implementations perform exactly one round trip per call: no caching and no
/// retries. Retrying past unavailable questions is the caller's concern.
#[async_trait]
pub trait CorpusClient: Send + Sync {
    /// Search questions matching `tag`, returning the `page`-th page of `page_size` ids.
    ///
    /// # Errors
    ///
    /// Returns `CorpusError` when the request fails or the page cannot be parsed.
    async fn search(&self, tag: &str, page: u32, page_size: u32)
    -> Result<SearchPage, CorpusError>;

    /// Fetch and parse a single question.
    ///
    /// # Errors
    ///
    /// Returns `CorpusError::NotFound` when the question is absent or the id
    /// resolves to an unrelated aggregate document, and `CorpusError::Parse`
    /// when the document lacks the expected structure.
    async fn fetch(&self, id: &ExternalId) -> Result<Question, CorpusError>;
}
