// crates/homestead-store/src/lib.rs
//
// homestead-store: Storage backends for Homestead.
//
// Provides a RocksDB-backed object store for a validator's local view of
// shared storage, an in-memory store for tests and single-node runs, and the
// JSON-persisted epoch assignment cache.

pub mod epoch_cache;
pub mod memory;
pub mod rocks;

// Re-export key types for ergonomic access from downstream crates.
pub use epoch_cache::{CachedAssignment, EpochCacheFile, DEFAULT_CACHE_RETENTION};
pub use memory::MemoryObjectStore;
pub use rocks::RocksObjectStore;
