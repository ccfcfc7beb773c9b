//! Read-through cache for the book views.
//!
//! Two payload shapes are cached: the actor-independent book list (`all_books`) and one detail
//! view per book (`book_detail_{id}`). Writers invalidate both after their transaction commits.
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 900
//! max_entries = 1024
//! ```

mod config;
mod keys;
mod lock;
mod store;
mod view;

pub use config::CacheConfig;
pub use keys::CacheKey;
pub use store::{CacheError, CacheStore, MemoryCacheStore};
pub use view::{FillTicket, ViewCache};
