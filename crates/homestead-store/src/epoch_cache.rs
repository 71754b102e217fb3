// crates/homestead-store/src/epoch_cache.rs
//
// Persisted cache of epoch assignments.
//
// File format: a JSON object mapping `epoch_id -> {assignment, cached_at}`.
// After every insert the cache is pruned to the newest `retention` entries
// by `cached_at`, and the whole map is rewritten atomically (temp file then
// rename). A missing file loads as an empty cache.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use homestead_core::{EpochAssignment, HomesteadError};

/// Number of epochs kept when no retention is configured (30 days of 4-hour
/// epochs).
pub const DEFAULT_CACHE_RETENTION: usize = 180;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAssignment {
    pub assignment: EpochAssignment,
    pub cached_at: DateTime<Utc>,
}

/// In-memory image of the cache file. Not synchronized; the daemon wraps it
/// in a single-writer actor.
#[derive(Debug)]
pub struct EpochCacheFile {
    path: PathBuf,
    retention: usize,
    entries: BTreeMap<String, CachedAssignment>,
}

impl EpochCacheFile {
    /// Load the cache from `path`, or start empty if the file does not exist.
    pub fn load(path: impl Into<PathBuf>, retention: usize) -> Result<Self, HomesteadError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                HomesteadError::Serialization(format!(
                    "Corrupt epoch cache {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(HomesteadError::Storage(format!(
                    "Failed to read epoch cache {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut cache = Self {
            path,
            retention: retention.max(1),
            entries,
        };
        cache.prune();
        tracing::debug!(
            "Loaded epoch cache {} ({} entries)",
            cache.path.display(),
            cache.entries.len()
        );
        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, epoch_id: &str) -> Option<&EpochAssignment> {
        self.entries.get(epoch_id).map(|c| &c.assignment)
    }

    pub fn contains(&self, epoch_id: &str) -> bool {
        self.entries.contains_key(epoch_id)
    }

    /// Insert or replace an assignment, prune, and persist.
    pub fn insert(
        &mut self,
        assignment: EpochAssignment,
        cached_at: DateTime<Utc>,
    ) -> Result<(), HomesteadError> {
        self.entries.insert(
            assignment.epoch_id.clone(),
            CachedAssignment {
                assignment,
                cached_at,
            },
        );
        self.prune();
        self.save()
    }

    /// Drop all but the newest `retention` entries by `cached_at`.
    /// Returns the number of entries removed.
    pub fn prune(&mut self) -> usize {
        if self.entries.len() <= self.retention {
            return 0;
        }
        let mut by_age: Vec<(DateTime<Utc>, String)> = self
            .entries
            .iter()
            .map(|(id, c)| (c.cached_at, id.clone()))
            .collect();
        // Newest first; equal timestamps keep the later epoch id.
        by_age.sort_by(|a, b| b.cmp(a));

        let excess: Vec<String> = by_age
            .into_iter()
            .skip(self.retention)
            .map(|(_, id)| id)
            .collect();
        for id in &excess {
            self.entries.remove(id);
        }
        excess.len()
    }

    /// Write the cache to disk.
    pub fn save(&self) -> Result<(), HomesteadError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HomesteadError::Storage(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let json = serde_json::to_vec_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| {
            HomesteadError::Storage(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            HomesteadError::Storage(format!(
                "Failed to replace epoch cache {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn temp_cache_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("homestead-cache-test-{}", Uuid::now_v7()))
            .join("epoch_cache.json")
    }

    fn assignment(epoch_id: &str) -> EpochAssignment {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap();
        EpochAssignment {
            epoch_id: epoch_id.to_string(),
            nonce: format!("nonce-{}", epoch_id),
            zipcodes: vec![homestead_core::ZipcodeAssignment {
                zipcode: "90210".to_string(),
                expected_listings: 100,
            }],
            start_time: start,
            end_time: start + Duration::hours(4),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let cache = EpochCacheFile::load(temp_cache_path(), 10).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_persists_across_reload() {
        let path = temp_cache_path();
        let mut cache = EpochCacheFile::load(&path, 10).unwrap();
        cache.insert(assignment("e1"), Utc::now()).unwrap();

        let reloaded = EpochCacheFile::load(&path, 10).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("e1").unwrap().nonce, "nonce-e1");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_prunes_oldest_by_cached_at() {
        let path = temp_cache_path();
        let mut cache = EpochCacheFile::load(&path, 2).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        // Insertion order differs from cached_at order.
        cache.insert(assignment("b"), t0 + Duration::hours(2)).unwrap();
        cache.insert(assignment("a"), t0).unwrap();
        cache.insert(assignment("c"), t0 + Duration::hours(1)).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(!cache.contains("a"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = temp_cache_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();
        let err = EpochCacheFile::load(&path, 10).unwrap_err();
        assert!(matches!(err, HomesteadError::Serialization(_)));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
