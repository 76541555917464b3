use std::env;
use std::str::FromStr;
use std::time::Duration;

use corpus::ChgkConfig;
use corpus::chgk::DEFAULT_BASE_URL;
use tracing::warn;

/// Limits for `QuestionSampler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingConfig {
    /// Upper bound on the random index range, whatever the corpus reports.
    pub universe_cap: u32,
    /// Draw attempts allowed per requested question before giving up.
    pub attempts_per_question: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            universe_cap: 999,
            attempts_per_question: 200,
        }
    }
}

impl SamplingConfig {
    /// Total attempt budget for a request of `count` questions.
    #[must_use]
    pub fn max_attempts(&self, count: usize) -> u32 {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.attempts_per_question.saturating_mul(count).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizConfig {
    pub corpus_base_url: String,
    pub http_timeout: Duration,
    pub max_questions: usize,
    pub list_page_size: u32,
    pub sampling: SamplingConfig,
    pub db_url: String,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            corpus_base_url: DEFAULT_BASE_URL.into(),
            http_timeout: Duration::from_secs(15),
            max_questions: 30,
            list_page_size: 5,
            sampling: SamplingConfig::default(),
            db_url: "sqlite://quiz.sqlite3".into(),
        }
    }
}

impl QuizConfig {
    /// Defaults overridden by `QUIZ_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns. Blank, unparsable or
    /// zero numeric values are ignored with a warning.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &'static str| positive::<u64>(key, text(key));

        Self {
            corpus_base_url: text("QUIZ_CORPUS_BASE_URL").unwrap_or(defaults.corpus_base_url),
            http_timeout: number("QUIZ_HTTP_TIMEOUT_SECS")
                .map_or(defaults.http_timeout, Duration::from_secs),
            max_questions: number("QUIZ_MAX_QUESTIONS")
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(defaults.max_questions),
            list_page_size: number("QUIZ_LIST_PAGE_SIZE")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.list_page_size),
            sampling: SamplingConfig {
                universe_cap: number("QUIZ_SAMPLING_UNIVERSE_CAP")
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(defaults.sampling.universe_cap),
                attempts_per_question: number("QUIZ_SAMPLING_MAX_ATTEMPTS")
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(defaults.sampling.attempts_per_question),
            },
            db_url: text("QUIZ_DB_URL").unwrap_or(defaults.db_url),
        }
    }

    #[must_use]
    pub fn chgk_config(&self) -> ChgkConfig {
        ChgkConfig {
            base_url: self.corpus_base_url.clone(),
            timeout: self.http_timeout,
        }
    }
}

fn positive<T>(key: &'static str, raw: Option<String>) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    let raw = raw?;
    match raw.parse::<T>() {
        Ok(v) if v > T::default() => Some(v),
        _ => {
            warn!(key, value = %raw, "ignoring invalid configuration value");
            None
        }
    }
}
