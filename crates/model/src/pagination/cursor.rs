use serde::{Deserialize, Serialize};

/// Skip/limit position of a paginated reader within one source collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// Documents already requested from the source.
    pub skip: usize,
    /// Fixed page size used for every fetch.
    pub page_size: usize,
    /// Whether the last fetch returned a full page.
    pub has_more: bool,
}

impl PageCursor {
    pub fn new(page_size: usize) -> Self {
        Self {
            skip: 0,
            page_size: page_size.max(1),
            has_more: true,
        }
    }

    /// Records the size of a page that was fetched at the current position.
    pub fn advance(&mut self, returned: usize) {
        self.skip += self.page_size;
        self.has_more = returned == self.page_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_page_ends_the_stream() {
        let mut cursor = PageCursor::new(10);
        cursor.advance(10);
        assert!(cursor.has_more);
        assert_eq!(cursor.skip, 10);

        cursor.advance(5);
        assert!(!cursor.has_more);
        assert_eq!(cursor.skip, 20);
    }

    #[test]
    fn zero_page_size_is_clamped() {
        assert_eq!(PageCursor::new(0).page_size, 1);
    }
}
