use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use corpus::CorpusClient;
use quiz_core::model::ExternalId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::SamplingConfig;
use crate::error::SamplerError;

/// Draws random, fetch-verified questions for a topic.
///
/// Corpus calls are issued one at a time; a sampling run never has more than
/// one request in flight.
pub struct QuestionSampler {
    corpus: Arc<dyn CorpusClient>,
    config: SamplingConfig,
    rng: Mutex<StdRng>,
}

impl QuestionSampler {
    #[must_use]
    pub fn new(corpus: Arc<dyn CorpusClient>, config: SamplingConfig) -> Self {
        Self::with_rng(corpus, config, StdRng::from_rng(&mut rand::rng()))
    }

    /// Deterministic sampler for tests and reproducible runs.
    #[must_use]
    pub fn with_seed(corpus: Arc<dyn CorpusClient>, config: SamplingConfig, seed: u64) -> Self {
        Self::with_rng(corpus, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(corpus: Arc<dyn CorpusClient>, config: SamplingConfig, rng: StdRng) -> Self {
        Self {
            corpus,
            config,
            rng: Mutex::new(rng),
        }
    }

    #[must_use]
    pub fn config(&self) -> SamplingConfig {
        self.config
    }

    fn draw(&self, universe: u32) -> u32 {
        match self.rng.lock() {
            Ok(mut rng) => rng.random_range(0..universe),
            // a poisoned generator is still a usable generator
            Err(poisoned) => poisoned.into_inner().random_range(0..universe),
        }
    }

    /// Return exactly `count` distinct identifiers for `tag`, each of which
    /// was fetched successfully during sampling.
    ///
    /// # Errors
    ///
    /// Returns `SamplerError::InsufficientCorpus` when the corpus bound is
    /// below `count`, `SamplerError::SamplingExhausted` when the attempt budget
    /// runs out, and `SamplerError::Corpus` when the initial search fails.
    pub async fn get_n_random(
        &self,
        tag: &str,
        count: usize,
    ) -> Result<Vec<ExternalId>, SamplerError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let head = self.corpus.search(tag, 0, 1).await?;
        let bound = head.bound.upper_estimate(1);
        let universe = bound.min(self.config.universe_cap);
        debug!(tag, bound = ?head.bound, universe, "sampling universe");
        if (universe as usize) < count {
            info!(tag, count, bound, universe, "corpus too small for requested quiz");
            return Err(SamplerError::InsufficientCorpus {
                tag: tag.to_owned(),
                requested: count,
                available: universe,
            });
        }

        let max_attempts = self.config.max_attempts(count);
        let mut chosen = Vec::with_capacity(count);
        let mut seen = HashSet::with_capacity(count);
        let mut attempts = 0;

        while attempts < max_attempts {
            attempts += 1;
            let index = self.draw(universe);

            let page = match self.corpus.search(tag, index, 1).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(tag, index, error = %e, "search failed while sampling");
                    continue;
                }
            };
            let Some(id) = page.ids.into_iter().next() else {
                debug!(tag, index, "no question at sampled index");
                continue;
            };
            if seen.contains(&id) {
                debug!(tag, %id, "duplicate draw");
                continue;
            }
            if let Err(e) = self.corpus.fetch(&id).await {
                warn!(tag, %id, error = %e, "sampled question is not fetchable");
                continue;
            }

            seen.insert(id.clone());
            chosen.push(id);
            if chosen.len() == count {
                debug!(tag, count, attempts, "sampling complete");
                return Ok(chosen);
            }
        }

        warn!(tag, count, found = chosen.len(), attempts, "sampling attempt budget exhausted");
        Err(SamplerError::SamplingExhausted {
            requested: count,
            found: chosen.len(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus::{BoundMode, FixtureCorpus};

    fn config(cap: u32, attempts: u32) -> SamplingConfig {
        SamplingConfig {
            universe_cap: cap,
            attempts_per_question: attempts,
        }
    }

    fn ext(raw: &str) -> ExternalId {
        ExternalId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn returns_exactly_count_distinct_fetchable_ids() {
        let corpus = Arc::new(FixtureCorpus::numbered(20));
        let sampler = QuestionSampler::with_seed(corpus.clone(), config(999, 200), 7);

        let ids = sampler.get_n_random("war", 8).await.unwrap();
        assert_eq!(ids.len(), 8);
        let distinct: HashSet<_> = ids.iter().collect();
        assert_eq!(distinct.len(), 8);
        for id in &ids {
            assert!(corpus.fetch(id).await.is_ok());
        }
    }

    #[tokio::test]
    async fn whole_universe_can_be_drawn() {
        let corpus = Arc::new(FixtureCorpus::numbered(5));
        let sampler = QuestionSampler::with_seed(corpus, config(999, 200), 1);
        let mut ids = sampler.get_n_random("war", 5).await.unwrap();
        ids.sort();
        assert_eq!(ids, ["0", "1", "2", "3", "4"].map(ext).to_vec());
    }

    #[tokio::test]
    async fn skips_unresolvable_ids() {
        let corpus = Arc::new(
            FixtureCorpus::numbered(6).with_unresolvable([ext("0"), ext("2"), ext("4")]),
        );
        let sampler = QuestionSampler::with_seed(corpus, config(999, 200), 3);
        let mut ids = sampler.get_n_random("war", 3).await.unwrap();
        ids.sort();
        assert_eq!(ids, vec![ext("1"), ext("3"), ext("5")]);
    }

    #[tokio::test]
    async fn rejects_when_bound_below_count() {
        let corpus = Arc::new(FixtureCorpus::numbered(2));
        let sampler = QuestionSampler::with_seed(corpus.clone(), config(999, 200), 1);
        let err = sampler.get_n_random("war", 3).await.unwrap_err();
        assert!(matches!(
            err,
            SamplerError::InsufficientCorpus {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(corpus.fetch_count(), 0);
    }

    #[tokio::test]
    async fn shortfall_reports_the_capped_universe() {
        let corpus = Arc::new(FixtureCorpus::numbered(100));
        let sampler = QuestionSampler::with_seed(corpus.clone(), config(4, 200), 1);
        let err = sampler.get_n_random("war", 10).await.unwrap_err();
        assert!(matches!(
            err,
            SamplerError::InsufficientCorpus {
                requested: 10,
                available: 4,
                ..
            }
        ));
        assert_eq!(corpus.fetch_count(), 0);
    }

    #[tokio::test]
    async fn page_count_bound_uses_page_size_one() {
        let corpus = Arc::new(FixtureCorpus::numbered(4).with_bound_mode(BoundMode::Pages));
        let sampler = QuestionSampler::with_seed(corpus, config(999, 200), 11);
        assert_eq!(sampler.get_n_random("war", 4).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn gives_up_after_attempt_budget() {
        // the corpus claims 50 questions but only 3 exist
        let corpus = Arc::new(FixtureCorpus::numbered(3).with_reported_total(50));
        let sampler = QuestionSampler::with_seed(corpus.clone(), config(999, 5), 5);
        let err = sampler.get_n_random("war", 4).await.unwrap_err();
        match err {
            SamplerError::SamplingExhausted {
                requested,
                found,
                attempts,
            } => {
                assert_eq!(requested, 4);
                assert!(found < 4);
                assert_eq!(attempts, 20);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // one bound query plus one search per attempt
        assert_eq!(corpus.search_count(), 21);
    }

    /// Fails every other search after the bound query.
    struct FlakySearch {
        inner: FixtureCorpus,
        calls: std::sync::atomic::AtomicU32,
    }

    #[async_trait::async_trait]
    impl CorpusClient for FlakySearch {
        async fn search(
            &self,
            tag: &str,
            page: u32,
            page_size: u32,
        ) -> Result<corpus::SearchPage, corpus::CorpusError> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            if n % 2 == 1 {
                return Err(corpus::CorpusError::Parse {
                    what: "truncated search page".into(),
                });
            }
            self.inner.search(tag, page, page_size).await
        }

        async fn fetch(
            &self,
            id: &ExternalId,
        ) -> Result<quiz_core::model::Question, corpus::CorpusError> {
            self.inner.fetch(id).await
        }
    }

    #[tokio::test]
    async fn zero_count_needs_no_corpus_access() {
        let corpus = Arc::new(FixtureCorpus::numbered(0));
        let sampler = QuestionSampler::with_seed(corpus.clone(), config(999, 5), 5);
        assert!(sampler.get_n_random("war", 0).await.unwrap().is_empty());
        assert_eq!(corpus.search_count(), 0);
    }

    #[tokio::test]
    async fn failed_searches_are_redrawn() {
        let corpus = Arc::new(FlakySearch {
            inner: FixtureCorpus::numbered(10),
            calls: std::sync::atomic::AtomicU32::new(0),
        });
        let sampler = QuestionSampler::with_seed(corpus, config(999, 200), 9);
        let ids = sampler.get_n_random("war", 4).await.unwrap();
        assert_eq!(ids.len(), 4);
    }
}
