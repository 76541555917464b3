use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use quiz_core::model::{ExternalId, Question};
use serde::Deserialize;

use crate::error::CorpusError;
use crate::search::{SearchBound, SearchPage};
use crate::CorpusClient;

/// Which bound reading the fixture reports from `search`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundMode {
    #[default]
    Count,
    Pages,
}

#[derive(Debug, Deserialize)]
struct FixtureEntry {
    id: String,
    question: String,
    answer: String,
    #[serde(default)]
    pass_criteria: Option<String>,
}

/// In-memory corpus for tests and offline runs.
///
/// Every tag matches the whole fixture. Ids marked unresolvable are still
/// listed by `search` but fail to `fetch`, which mirrors ids on the live site
/// that redirect to tournament pages.
#[derive(Debug, Default)]
pub struct FixtureCorpus {
    questions: Vec<Question>,
    by_id: HashMap<ExternalId, usize>,
    unresolvable: HashSet<ExternalId>,
    bound_mode: BoundMode,
    reported_total: Option<u32>,
    searches: AtomicUsize,
    fetches: AtomicUsize,
}

impl FixtureCorpus {
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Self {
        let by_id = questions
            .iter()
            .enumerate()
            .map(|(i, q)| (q.id().clone(), i))
            .collect();
        Self {
            questions,
            by_id,
            ..Self::default()
        }
    }

    /// `total` questions with ids `"0"`, `"1"`, ... and texts `question{i}` / `answer{i}`.
    #[must_use]
    pub fn numbered(total: usize) -> Self {
        let questions = (0..total)
            .filter_map(|i| {
                let id = ExternalId::new(i.to_string()).ok()?;
                Some(Question::new(id, format!("question{i}"), format!("answer{i}"), None))
            })
            .collect();
        Self::new(questions)
    }

    /// Load a fixture from a JSON array of `{id, question, answer, pass_criteria?}`.
    ///
    /// # Errors
    ///
    /// Returns `CorpusError::Fixture` for malformed JSON, invalid ids or
    /// duplicate ids.
    pub fn from_json_reader(reader: impl Read) -> Result<Self, CorpusError> {
        let entries: Vec<FixtureEntry> = serde_json::from_reader(reader)
            .map_err(|e| CorpusError::Fixture(format!("invalid fixture json: {e}")))?;

        let mut seen = HashSet::with_capacity(entries.len());
        let mut questions = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = ExternalId::new(entry.id)
                .map_err(|e| CorpusError::Fixture(format!("invalid fixture id: {e}")))?;
            if !seen.insert(id.clone()) {
                return Err(CorpusError::Fixture(format!("duplicate fixture id: {id}")));
            }
            questions.push(Question::new(
                id,
                entry.question,
                entry.answer,
                entry.pass_criteria,
            ));
        }
        Ok(Self::new(questions))
    }

    /// Mark ids that `search` lists but `fetch` cannot resolve.
    #[must_use]
    pub fn with_unresolvable<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = ExternalId>,
    {
        self.unresolvable.extend(ids);
        self
    }

    #[must_use]
    pub fn with_bound_mode(mut self, mode: BoundMode) -> Self {
        self.bound_mode = mode;
        self
    }

    /// Report a different total than the number of stored questions, the way
    /// the live site over-counts.
    #[must_use]
    pub fn with_reported_total(mut self, total: u32) -> Self {
        self.reported_total = Some(total);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Number of `search` calls served so far.
    #[must_use]
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }

    /// Number of `fetch` calls served so far, failed ones included.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn total(&self) -> u32 {
        self.reported_total
            .unwrap_or_else(|| u32::try_from(self.questions.len()).unwrap_or(u32::MAX))
    }

    fn bound(&self, page_size: u32) -> SearchBound {
        let total = self.total();
        match self.bound_mode {
            BoundMode::Count => SearchBound::Count(total),
            BoundMode::Pages => SearchBound::Pages(total.div_ceil(page_size.max(1))),
        }
    }
}

#[async_trait]
impl CorpusClient for FixtureCorpus {
    async fn search(
        &self,
        _tag: &str,
        page: u32,
        page_size: u32,
    ) -> Result<SearchPage, CorpusError> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        if self.total() == 0 {
            return Ok(SearchPage::empty());
        }
        let size = page_size.max(1) as usize;
        let start = (page as usize).saturating_mul(size);
        let ids = self
            .questions
            .iter()
            .skip(start)
            .take(size)
            .map(|q| q.id().clone())
            .collect();
        Ok(SearchPage {
            bound: self.bound(page_size),
            ids,
        })
    }

    async fn fetch(&self, id: &ExternalId) -> Result<Question, CorpusError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        if self.unresolvable.contains(id) {
            return Err(CorpusError::NotFound { id: id.clone() });
        }
        self.by_id
            .get(id)
            .and_then(|&i| self.questions.get(i))
            .cloned()
            .ok_or_else(|| CorpusError::NotFound { id: id.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(raw: &str) -> ExternalId {
        ExternalId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn numbered_fixture_pages_through_ids() {
        let corpus = FixtureCorpus::numbered(7);
        let page = corpus.search("anything", 1, 3).await.unwrap();
        assert_eq!(page.bound, SearchBound::Count(7));
        assert_eq!(page.ids, vec![ext("3"), ext("4"), ext("5")]);

        let tail = corpus.search("anything", 2, 3).await.unwrap();
        assert_eq!(tail.ids, vec![ext("6")]);
        assert_eq!(corpus.search_count(), 2);
    }

    #[tokio::test]
    async fn pages_mode_reports_page_count() {
        let corpus = FixtureCorpus::numbered(7).with_bound_mode(BoundMode::Pages);
        let page = corpus.search("x", 0, 3).await.unwrap();
        assert_eq!(page.bound, SearchBound::Pages(3));
        assert_eq!(page.bound.upper_estimate(3), 9);
    }

    #[tokio::test]
    async fn empty_fixture_reports_zero() {
        let page = FixtureCorpus::numbered(0).search("x", 0, 1).await.unwrap();
        assert_eq!(page, SearchPage::empty());
    }

    #[tokio::test]
    async fn unresolvable_ids_are_listed_but_not_fetchable() {
        let corpus = FixtureCorpus::numbered(3).with_unresolvable([ext("1")]);
        let page = corpus.search("x", 1, 1).await.unwrap();
        assert_eq!(page.ids, vec![ext("1")]);

        let err = corpus.fetch(&ext("1")).await.unwrap_err();
        assert!(err.is_unresolvable());

        let q = corpus.fetch(&ext("2")).await.unwrap();
        assert_eq!(q.text(), "question2");
        assert_eq!(q.answer(), "answer2");
        assert_eq!(corpus.fetch_count(), 2);
    }

    #[test]
    fn loads_json_fixture() {
        let json = r#"[
            {"id": "ef01.2/3", "question": "Who?", "answer": "Him", "pass_criteria": "He"},
            {"id": "ef01.2/4", "question": "What?", "answer": "That"}
        ]"#;
        let corpus = FixtureCorpus::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(corpus.len(), 2);
    }

    #[test]
    fn json_fixture_rejects_duplicates() {
        let json = r#"[
            {"id": "a/1", "question": "Q", "answer": "A"},
            {"id": "/a/1/", "question": "Q", "answer": "A"}
        ]"#;
        let err = FixtureCorpus::from_json_reader(json.as_bytes()).unwrap_err();
        assert!(matches!(err, CorpusError::Fixture(_)));
    }
}
