use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    pub fn page(&self) -> u32 {
        self.page.filter(|page| *page > 0).unwrap_or(1)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * self.limit()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: &PageRequest, count: i64, results: Vec<T>) -> Self {
        let page = request.page();
        let consumed = i64::from(page) * request.limit();
        Self {
            count,
            next: page.checked_add(1).filter(|_| consumed < count),
            previous: (page > 1).then_some(page - 1),
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_caps() {
        let request = PageRequest::default();
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), DEFAULT_PAGE_SIZE);

        let request = PageRequest::new(0, 1_000);
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn offsets_follow_page() {
        let request = PageRequest::new(3, 10);
        assert_eq!(request.offset(), 20);
        assert_eq!(request.limit(), 10);
    }

    #[test]
    fn next_and_previous_links() {
        let first: Page<u8> = Page::new(&PageRequest::new(1, 10), 25, vec![]);
        assert_eq!(first.next, Some(2));
        assert_eq!(first.previous, None);

        let last: Page<u8> = Page::new(&PageRequest::new(3, 10), 25, vec![]);
        assert_eq!(last.next, None);
        assert_eq!(last.previous, Some(2));
    }

    #[test]
    fn last_representable_page_has_no_next() {
        let page: Page<()> = Page::new(&PageRequest::new(u32::MAX, 20), 3, vec![]);
        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(u32::MAX - 1));
        assert_eq!(PageRequest::new(u32::MAX, 20).offset(), i64::from(u32::MAX - 1) * 20);
    }
}
