//! Cache key definitions.

use std::fmt;

/// Keys of the cached book views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Book list without per-user bookmark flags.
    AllBooks,
    /// Detail view of one book, including rating statistics.
    BookDetail(i64),
}

impl CacheKey {
    /// Entries a committed bookmark or rating write for `book_id` makes stale.
    pub fn affected_by_write(book_id: i64) -> [CacheKey; 2] {
        [CacheKey::AllBooks, CacheKey::BookDetail(book_id)]
    }

    /// Low-cardinality label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheKey::AllBooks => "all_books",
            CacheKey::BookDetail(_) => "book_detail",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::AllBooks => f.write_str("all_books"),
            CacheKey::BookDetail(id) => write!(f, "book_detail_{id}"),
        }
    }
}
