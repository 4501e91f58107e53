//! Storage side of the store: the records, the cache contract they are kept
//! behind, an in-process cache, and snapshots of it on disk.

mod cache;
mod entry;
mod memory_cache;
mod snapshot;

pub use cache::{CacheError, KeyValueCache};
pub use entry::{Content, Entry};
pub use memory_cache::MemoryCache;
pub use snapshot::{Snapshot, SnapshotError};
