use quiz_core::model::ExternalId;

/// Upper-bound indicator reported by a corpus search.
///
/// Depending on the corpus revision the page reports either a result count or
/// only a page count for the requested page size. Neither is exact, and the two
/// readings are kept apart so a caller always states which one it relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBound {
    /// The corpus reported a number of matching questions.
    Count(u32),
    /// The corpus reported a number of pages for the requested page size.
    Pages(u32),
}

impl SearchBound {
    /// Upper estimate of matching items, given the page size the search used.
    #[must_use]
    pub fn upper_estimate(&self, page_size: u32) -> u32 {
        match *self {
            SearchBound::Count(n) => n,
            SearchBound::Pages(p) => p.saturating_mul(page_size.max(1)),
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    pub bound: SearchBound,
    pub ids: Vec<ExternalId>,
}

impl SearchPage {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            bound: SearchBound::Count(0),
            ids: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_estimate_depends_on_reading() {
        assert_eq!(SearchBound::Count(23).upper_estimate(5), 23);
        assert_eq!(SearchBound::Pages(5).upper_estimate(5), 25);
        assert_eq!(SearchBound::Pages(7).upper_estimate(1), 7);
        assert_eq!(SearchBound::Pages(3).upper_estimate(0), 3);
    }
}
