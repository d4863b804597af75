//! ComicStore - JSON-file store of followed comics
//!
//! Keeps every followed comic, its known pages and its followers in a
//! single JSON document that other processes may also write.
//!
//! # Layout
//!
//! ```text
//! <store-dir>/
//! ├── comics.json       # { "<comic id>": { id, name, pages, users, updated_at } }
//! └── comics.json.lock  # advisory lock held during each change
//! ```
//!
//! # Example
//!
//! ```ignore
//! use comicstore::ComicStore;
//!
//! let mut store = ComicStore::open("data")?;
//! if store.add_user_to_comic("alice", 1234)? {
//!     store.update_comic(1234, "Some Comic", vec![1, 2, 3])?;
//! }
//! ```

mod record;
mod store;

pub use record::{ComicId, ComicRecord, PageId};
pub use store::ComicStore;

/// File name of the store document
pub const STORE_FILE: &str = "comics.json";
