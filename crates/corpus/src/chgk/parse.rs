//! Markup parsing for db.chgk.info search pages and question documents.

use std::collections::HashSet;
use std::sync::LazyLock;

use quiz_core::model::{ExternalId, Question};
use regex::Regex;
use tracing::debug;

use crate::error::CorpusError;
use crate::search::{SearchBound, SearchPage};

/// Label placed in front of a handout block in the displayed question text.
pub const HANDOUT_LABEL: &str = "Handout:";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("corpus pattern should compile")
}

static QUESTION_LINK: LazyLock<Regex> = LazyLock::new(|| compile(r#"href="/question/([^"?#]+)""#));

static TITLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    compile(r#"(?is)<h[1-3][^>]*class="[^"]*title[^"]*"[^>]*>(.*?)</h[1-3]>\s*(?:<p[^>]*>(.*?)</p>)?"#)
});

static COUNT_TEXT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)(?:найдено|found)\D{0,64}?(\d+)"));

static PAGER_LAST: LazyLock<Regex> = LazyLock::new(|| {
    compile(r#"(?is)<li[^>]*class="[^"]*pager-last[^"]*"[^>]*>\s*<a[^>]*href="[^"]*[?&]page=(\d+)"#)
});

static TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"<[^>]*>"));

static QUESTION_ELEMENT: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)<question>(.*?)</question>"));

static HANDOUT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?s)<раздатка>(.*?)</раздатка>|\[Раздаточный материал:(.*?)\]")
});

//
// ─── SEARCH PAGE ───────────────────────────────────────────────────────────────
//

/// Parse a search result page into its bound indicator and ordered ids.
///
/// # Errors
///
/// Returns `CorpusError::Parse` when results are listed but no bound
/// indicator can be found.
pub fn parse_search_page(html: &str) -> Result<SearchPage, CorpusError> {
    let ids = question_links(html);
    match find_bound(html) {
        Some(bound) => Ok(SearchPage { bound, ids }),
        None if ids.is_empty() => Ok(SearchPage::empty()),
        None => Err(CorpusError::parse("search page lists results without a bound indicator")),
    }
}

fn question_links(html: &str) -> Vec<ExternalId> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for cap in QUESTION_LINK.captures_iter(html) {
        let Ok(id) = ExternalId::new(&cap[1]) else {
            debug!(raw = &cap[1], "skipping malformed question link");
            continue;
        };
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }
    ids
}

fn find_bound(html: &str) -> Option<SearchBound> {
    if let Some(title) = TITLE_BLOCK.captures(html) {
        let text = title
            .iter()
            .skip(1)
            .flatten()
            .map(|m| TAG.replace_all(m.as_str(), " ").into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(n) = COUNT_TEXT
            .captures(&text)
            .and_then(|c| c[1].parse::<u32>().ok())
        {
            return Some(SearchBound::Count(n));
        }
    }

    PAGER_LAST
        .captures(html)
        .and_then(|c| c[1].parse::<u32>().ok())
        // the pager links zero-based page numbers
        .map(|last| SearchBound::Pages(last.saturating_add(1)))
}

//
// ─── QUESTION DOCUMENT ─────────────────────────────────────────────────────────
//

/// Parse the structured (XML) variant of a question document.
///
/// # Errors
///
/// Returns `CorpusError::NotFound` when the document holds no question at all
/// and `CorpusError::Parse` when the question or answer field is missing.
pub fn parse_question_xml(id: &ExternalId, xml: &str) -> Result<Question, CorpusError> {
    let Some(element) = QUESTION_ELEMENT.captures(xml) else {
        return Err(CorpusError::NotFound { id: id.clone() });
    };
    let element = element.get(1).map_or("", |m| m.as_str());

    let raw_text = field(element, "Question")
        .ok_or_else(|| CorpusError::parse(format!("{id}: missing Question field")))?;
    let answer = field(element, "Answer")
        .map(|a| normalize_whitespace(&unescape(&a)))
        .filter(|a| !a.is_empty())
        .ok_or_else(|| CorpusError::parse(format!("{id}: missing Answer field")))?;
    let pass_criteria = field(element, "PassCriteria").map(|p| normalize_whitespace(&unescape(&p)));

    let text = question_text(&unescape(&raw_text));
    if text.is_empty() {
        return Err(CorpusError::parse(format!("{id}: empty Question field")));
    }

    Ok(Question::new(id.clone(), text, answer, pass_criteria))
}

/// Contents of `<name>…</name>`; `None` for a missing or self-closing element.
fn field(element: &str, name: &str) -> Option<String> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = element.find(&open)? + open.len();
    let len = element[start..].find(&close)?;
    let raw = element[start..start + len].trim();
    let raw = raw
        .strip_prefix("<![CDATA[")
        .and_then(|r| r.strip_suffix("]]>"))
        .unwrap_or(raw);
    Some(raw.to_owned())
}

fn unescape(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Collapse every whitespace run, newlines included, into a single space.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the display text: an optional labelled handout block, then the body.
#[must_use]
pub fn question_text(raw: &str) -> String {
    let mut handouts = Vec::new();
    for cap in HANDOUT.captures_iter(raw) {
        if let Some(m) = cap.get(1).or_else(|| cap.get(2)) {
            let block = normalize_whitespace(m.as_str());
            if !block.is_empty() {
                handouts.push(block);
            }
        }
    }
    let body = normalize_whitespace(&HANDOUT.replace_all(raw, " "));

    if handouts.is_empty() {
        body
    } else {
        format!("{HANDOUT_LABEL}\n{}\n\n{body}", handouts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(raw: &str) -> ExternalId {
        ExternalId::new(raw).unwrap()
    }

    #[test]
    fn search_page_with_count_in_title() {
        let html = r#"
            <h2 class="title">Поиск</h2>
            <p>Найдено вопросов: 1523</p>
            <div class="question"><a href="/question/ef01.2/3">Вопрос 3</a></div>
            <div class="question"><a href="/question/ef01.2/3">ещё раз</a></div>
            <div class="question"><a href="/question/abc17/5">Вопрос 5</a></div>
        "#;
        let page = parse_search_page(html).unwrap();
        assert_eq!(page.bound, SearchBound::Count(1523));
        assert_eq!(page.ids, vec![ext("ef01.2/3"), ext("abc17/5")]);
    }

    #[test]
    fn search_page_with_pager_only() {
        let html = r#"
            <h2 class="title">Вопросы</h2>
            <a href="/question/t1/1">1</a>
            <ul class="pager">
              <li class="pager-next"><a href="/search/questions/x/types1/limit1?page=1">next</a></li>
              <li class="pager-last last"><a href="/search/questions/x/types1/limit1?page=41">last</a></li>
            </ul>
        "#;
        let page = parse_search_page(html).unwrap();
        assert_eq!(page.bound, SearchBound::Pages(42));
        assert_eq!(page.ids, vec![ext("t1/1")]);
    }

    #[test]
    fn empty_search_page_has_zero_bound() {
        let page = parse_search_page("<html><body>Ничего</body></html>").unwrap();
        assert_eq!(page, SearchPage::empty());
    }

    #[test]
    fn results_without_bound_are_a_parse_error() {
        let err = parse_search_page(r#"<a href="/question/t1/1">1</a>"#).unwrap_err();
        assert!(matches!(err, CorpusError::Parse { .. }));
    }

    #[test]
    fn question_xml_is_unescaped_and_normalized() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <search><question>
              <Question>Этот   &quot;персонаж&quot;
                 появился в 1928 году.</Question>
              <Answer>Микки &amp; Маус</Answer>
              <PassCriteria>Mickey   Mouse</PassCriteria>
              <Comments>...</Comments>
            </question></search>"#;
        let q = parse_question_xml(&ext("t1/1"), xml).unwrap();
        assert_eq!(q.text(), "Этот \"персонаж\" появился в 1928 году.");
        assert_eq!(q.answer(), "Микки & Маус");
        assert_eq!(q.pass_criteria(), Some("Mickey Mouse"));
    }

    #[test]
    fn handout_is_prefixed_with_label() {
        let xml = "<search><question><Question>&lt;раздатка&gt;Кот\n   в сапогах&lt;/раздатка&gt;\n Назовите   автора.</Question><Answer>Перро</Answer><PassCriteria/></question></search>";
        let q = parse_question_xml(&ext("t1/2"), xml).unwrap();
        assert_eq!(q.text(), "Handout:\nКот в сапогах\n\nНазовите автора.");
        assert_eq!(q.pass_criteria(), None);
    }

    #[test]
    fn bracketed_handout_is_recognised() {
        assert_eq!(
            question_text("[Раздаточный материал: 3 1 4] Продолжите."),
            "Handout:\n3 1 4\n\nПродолжите."
        );
    }

    #[test]
    fn document_without_question_is_not_found() {
        let err = parse_question_xml(&ext("t1/3"), "<search></search>").unwrap_err();
        assert!(matches!(err, CorpusError::NotFound { .. }));
    }

    #[test]
    fn missing_answer_is_a_parse_error() {
        let xml = "<search><question><Question>Q?</Question></question></search>";
        let err = parse_question_xml(&ext("t1/4"), xml).unwrap_err();
        assert!(matches!(err, CorpusError::Parse { .. }));
    }
}
