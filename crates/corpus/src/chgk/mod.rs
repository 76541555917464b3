//! Live client for the db.chgk.info question database.

pub mod parse;

use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{ExternalId, Question};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::error::CorpusError;
use crate::search::SearchPage;
use crate::CorpusClient;

pub const DEFAULT_BASE_URL: &str = "https://db.chgk.info";

/// Search result type filter: plain "what? where? when?" questions.
const QUESTION_TYPE_FILTER: &str = "types1";

#[derive(Clone, Debug)]
pub struct ChgkConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ChgkConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// HTTP client for db.chgk.info. Build once and share; it holds a connection pool.
#[derive(Clone, Debug)]
pub struct ChgkClient {
    client: Client,
    base: Url,
}

impl ChgkClient {
    /// Build a client for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `CorpusError::InvalidBaseUrl` for an unusable base URL and
    /// `CorpusError::Http` if the HTTP client cannot be constructed.
    pub fn new(config: &ChgkConfig) -> Result<Self, CorpusError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| CorpusError::InvalidBaseUrl(format!("{}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(CorpusError::InvalidBaseUrl(config.base_url.clone()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, base })
    }

    fn url_with_segments<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, CorpusError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| CorpusError::InvalidBaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn search_url(&self, tag: &str, page: u32, page_size: u32) -> Result<Url, CorpusError> {
        let limit = format!("limit{page_size}");
        let mut url = self.url_with_segments([
            "search",
            "questions",
            tag,
            QUESTION_TYPE_FILTER,
            limit.as_str(),
        ])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    fn document_url(&self, id: &ExternalId) -> Result<Url, CorpusError> {
        let segments = std::iter::once("question")
            .chain(id.as_str().split('/'))
            .chain(std::iter::once("xml"));
        self.url_with_segments(segments)
    }
}

/// A fetch that followed redirects must still land on a question document;
/// anything else is an aggregate page (tournament, tour) and not our question.
fn points_at_question(url: &Url) -> bool {
    url.path_segments()
        .and_then(|mut segments| segments.next())
        .is_some_and(|first| first == "question")
}

#[async_trait]
impl CorpusClient for ChgkClient {
    async fn search(
        &self,
        tag: &str,
        page: u32,
        page_size: u32,
    ) -> Result<SearchPage, CorpusError> {
        let url = self.search_url(tag, page, page_size)?;
        debug!(%url, "corpus search");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CorpusError::HttpStatus(status));
        }
        let body = response.text().await?;

        parse::parse_search_page(&body).inspect_err(|e| {
            warn!(tag, page, page_size, error = %e, "search page has unexpected structure");
        })
    }

    async fn fetch(&self, id: &ExternalId) -> Result<Question, CorpusError> {
        let url = self.document_url(id)?;
        debug!(%url, "corpus fetch");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CorpusError::NotFound { id: id.clone() });
        }
        if !status.is_success() {
            return Err(CorpusError::HttpStatus(status));
        }
        if !points_at_question(response.url()) {
            warn!(%id, landed = %response.url(), "question id redirected to an aggregate page");
            return Err(CorpusError::NotFound { id: id.clone() });
        }
        let body = response.text().await?;

        parse::parse_question_xml(id, &body).inspect_err(|e| {
            if matches!(e, CorpusError::Parse { .. }) {
                warn!(%id, error = %e, "question document has unexpected structure");
            }
        })
    }
}
