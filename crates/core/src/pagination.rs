/// Page arithmetic for listing quizzes.
///
/// `page` is zero-based. An empty listing still has one (empty) page so the
/// navigation controls always have something to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    total: u64,
    page_size: u32,
    page: u32,
}

impl Pagination {
    /// `page_size` of zero is treated as one.
    #[must_use]
    pub fn new(total: u64, page_size: u32, page: u32) -> Self {
        Self {
            total,
            page_size: page_size.max(1),
            page,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Number of pages, at least one.
    #[must_use]
    pub fn page_count(&self) -> u32 {
        let pages = self.total.div_ceil(u64::from(self.page_size)).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Row offset of the first item on this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.page_size)
    }

    #[must_use]
    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page.saturating_add(1) < self.page_count()
    }

    /// Same listing, clamped to the last existing page.
    #[must_use]
    pub fn clamped(self) -> Self {
        let last = self.page_count() - 1;
        Self {
            page: self.page.min(last),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_three_items_in_pages_of_five() {
        let first = Pagination::new(23, 5, 0);
        assert_eq!(first.page_count(), 5);
        assert!(!first.has_prev());
        assert!(first.has_next());

        let last = Pagination::new(23, 5, 4);
        assert!(last.has_prev());
        assert!(!last.has_next());
        assert_eq!(last.offset(), 20);
    }

    #[test]
    fn empty_listing_has_one_page() {
        let p = Pagination::new(0, 5, 0);
        assert_eq!(p.page_count(), 1);
        assert!(!p.has_prev());
        assert!(!p.has_next());
    }

    #[test]
    fn exact_multiple_does_not_add_a_page() {
        assert_eq!(Pagination::new(10, 5, 0).page_count(), 2);
    }

    #[test]
    fn clamps_past_the_end() {
        let p = Pagination::new(7, 5, 9).clamped();
        assert_eq!(p.page(), 1);
        assert!(!p.has_next());
    }
}
