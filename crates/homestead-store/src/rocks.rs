// crates/homestead-store/src/rocks.rs
//
// RocksDB-backed object store.
//
// Keys are the object paths themselves (`submissions/{epoch}/{miner}/{zip}.json`,
// `consensus/{epoch}/{validator}.json`, ...). Byte-wise key ordering keeps
// each path prefix contiguous, so `list` is a single prefix scan.

use async_trait::async_trait;
use rocksdb::{DBWithThreadMode, MultiThreaded, Options};

use homestead_core::error::HomesteadError;
use homestead_core::traits::ObjectStore;

/// RocksDB wrapper implementing the `ObjectStore` trait.
#[derive(Debug)]
pub struct RocksObjectStore {
    db: DBWithThreadMode<MultiThreaded>,
}

impl RocksObjectStore {
    /// Open a RocksDB database at the given filesystem path.
    ///
    /// Creates the database directory if it does not exist.
    pub fn open(path: &str) -> Result<Self, HomesteadError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path).map_err(|e| {
            HomesteadError::Storage(format!("Failed to open RocksDB at {}: {}", path, e))
        })?;

        Ok(Self { db })
    }

    fn put_raw(&self, key: &[u8], value: &[u8]) -> Result<(), HomesteadError> {
        self.db
            .put(key, value)
            .map_err(|e| HomesteadError::Storage(format!("RocksDB put failed: {}", e)))
    }

    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HomesteadError> {
        self.db
            .get(key)
            .map_err(|e| HomesteadError::Storage(format!("RocksDB get failed: {}", e)))
    }

    /// All keys starting with `prefix`, in byte order.
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, HomesteadError> {
        let prefix = prefix.as_bytes();
        let mut keys = Vec::new();

        for item in self.db.prefix_iterator(prefix) {
            let (key, _value) = item
                .map_err(|e| HomesteadError::Storage(format!("RocksDB iteration error: {}", e)))?;

            // Without a prefix extractor the iterator runs to the end of the
            // keyspace; stop once past the prefix.
            if !key.starts_with(prefix) {
                break;
            }

            match std::str::from_utf8(&key) {
                Ok(path) => keys.push(path.to_string()),
                Err(_) => tracing::warn!("Skipping non-UTF-8 key under {:?}", prefix),
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for RocksObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), HomesteadError> {
        self.put_raw(path.as_bytes(), &bytes)
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, HomesteadError> {
        self.get_raw(path.as_bytes())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, HomesteadError> {
        self.keys_with_prefix(prefix)
    }
}
