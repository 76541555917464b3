//! Freeform answer matching.
//!
//! Answers are compared as ordered token sequences: the text is lowercased and
//! split into maximal runs of Unicode word characters. Punctuation and
//! whitespace never take part in the comparison, while token order and
//! repetition do.

use std::sync::LazyLock;

use regex::Regex;

static WORD_RUN: LazyLock<Regex> = LazyLock::new(|| {
    // `\w` is Unicode-aware in the regex crate: letters, marks, digits and connectors.
    Regex::new(r"\w+").expect("word pattern should compile")
});

/// Lowercase `text` and return its word/digit runs in order.
#[must_use]
pub fn normalize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_RUN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_owned())
        .collect()
}

/// Returns true when `submitted` matches `primary`, or `alternate` when present.
#[must_use]
pub fn check(submitted: &str, primary: &str, alternate: Option<&str>) -> bool {
    let submitted = normalize(submitted);
    if submitted == normalize(primary) {
        return true;
    }
    alternate.is_some_and(|alt| submitted == normalize(alt))
}

/// Stateless matcher handle, handy where a value is injected instead of free functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerMatcher;

impl AnswerMatcher {
    #[must_use]
    pub fn normalize(&self, text: &str) -> Vec<String> {
        normalize(text)
    }

    #[must_use]
    pub fn check(&self, submitted: &str, primary: &str, alternate: Option<&str>) -> bool {
        check(submitted, primary, alternate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_drops_punctuation() {
        assert_eq!(
            normalize("  Пётр  Первый!... (1672)"),
            vec!["пётр", "первый", "1672"]
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        for text in ["Hello, World!", "Ёжик в тумане", "a-b_c  d", "", "...", "R2-D2"] {
            let once = normalize(text);
            let twice = normalize(&once.join(" "));
            assert_eq!(once, twice, "input: {text:?}");
        }
    }

    #[test]
    fn check_is_reflexive() {
        for primary in ["Наполеон", "The Beatles", "42", "рок-н-ролл"] {
            assert!(check(primary, primary, None));
        }
    }

    #[test]
    fn check_ignores_case_and_punctuation() {
        assert!(check("наполеон бонапарт", "Наполеон Бонапарт.", None));
        assert!(check("«Война и мир»", "война и мир", None));
    }

    #[test]
    fn check_is_order_and_repetition_sensitive() {
        assert!(!check("мир и война", "война и мир", None));
        assert!(!check("война война", "война", None));
        assert!(!check("", "война", None));
    }

    #[test]
    fn check_accepts_alternate() {
        assert!(check("Бонапарт", "Наполеон", Some("Бонапарт")));
        assert!(!check("Цезарь", "Наполеон", Some("Бонапарт")));
    }
}
