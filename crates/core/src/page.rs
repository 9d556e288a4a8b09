//! Offset pagination shared by every list endpoint.

use serde::Deserialize;

/// `?skip=&limit=` window.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Page {
    pub skip: u32,
    pub limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 100;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(skip: u32, limit: u32) -> Self {
        Self { skip, limit }.clamped()
    }

    /// Cap `limit` at [`Page::MAX_LIMIT`].
    pub fn clamped(self) -> Self {
        Self {
            skip: self.skip,
            limit: self.limit.min(Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        self.skip as usize
    }

    pub fn len(&self) -> usize {
        self.limit as usize
    }

    /// Apply the window to an already-ordered iterator.
    pub fn slice<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items.into_iter().skip(self.offset()).take(self.len()).collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_capped() {
        assert_eq!(Page::new(0, 50_000).limit, Page::MAX_LIMIT);
    }

    #[test]
    fn slice_applies_offset_and_limit() {
        let page = Page::new(2, 3);
        assert_eq!(page.slice(0..10), vec![2, 3, 4]);
        assert!(Page::new(20, 3).slice(0..10).is_empty());
    }

    #[test]
    fn missing_query_fields_use_defaults() {
        let page: Page = serde_json::from_str(r#"{"skip": 5}"#).unwrap();
        assert_eq!(page, Page { skip: 5, limit: 100 });
    }
}
