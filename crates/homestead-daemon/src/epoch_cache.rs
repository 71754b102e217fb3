// crates/homestead-daemon/src/epoch_cache.rs
//
// Epoch assignment cache with a single writer.
//
// Readers take the shared read lock. All writes happen on the refresh task,
// which owns the only code path that mutates the cache file: it prefetches
// the current epoch's assignment on a timer and serves cache-miss requests
// sent over a channel. Every mutation is persisted before the lock is
// released.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, RwLock};

use homestead_consensus::epoch::EpochClock;
use homestead_core::{AssignmentSource, EpochAssignment, HomesteadError};
use homestead_store::EpochCacheFile;

struct FetchRequest {
    epoch_id: String,
    reply: oneshot::Sender<Result<EpochAssignment, HomesteadError>>,
}

/// Cloneable read handle to the epoch cache.
#[derive(Clone)]
pub struct EpochCache {
    inner: Arc<RwLock<EpochCacheFile>>,
    requests: mpsc::Sender<FetchRequest>,
}

/// The writer half. Must be driven by `run` for misses to be served.
pub struct EpochCacheRefresher {
    inner: Arc<RwLock<EpochCacheFile>>,
    requests: mpsc::Receiver<FetchRequest>,
    source: Arc<dyn AssignmentSource>,
}

/// Split a loaded cache file into its read handle and writer task.
pub fn epoch_cache(
    file: EpochCacheFile,
    source: Arc<dyn AssignmentSource>,
) -> (EpochCache, EpochCacheRefresher) {
    let inner = Arc::new(RwLock::new(file));
    let (tx, rx) = mpsc::channel(32);
    (
        EpochCache {
            inner: inner.clone(),
            requests: tx,
        },
        EpochCacheRefresher {
            inner,
            requests: rx,
            source,
        },
    )
}

fn writer_gone(msg: &str) -> HomesteadError {
    HomesteadError::InvalidState(msg.to_string())
}

impl EpochCache {
    /// Cached assignment, if present. Never touches the network.
    pub async fn get(&self, epoch_id: &str) -> Option<EpochAssignment> {
        self.inner.read().await.get(epoch_id).cloned()
    }

    /// Cached assignment, fetching it through the writer task on a miss.
    pub async fn get_or_fetch(&self, epoch_id: &str) -> Result<EpochAssignment, HomesteadError> {
        if let Some(assignment) = self.get(epoch_id).await {
            return Ok(assignment);
        }

        let (reply, rx) = oneshot::channel();
        self.requests
            .send(FetchRequest {
                epoch_id: epoch_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| writer_gone("Epoch cache writer has stopped"))?;
        rx.await
            .map_err(|_| writer_gone("Epoch cache writer dropped request"))?
    }
}

impl EpochCacheRefresher {
    /// Fetch and store an assignment unless it is already cached.
    async fn ensure(&self, epoch_id: &str) -> Result<EpochAssignment, HomesteadError> {
        if let Some(assignment) = self.inner.read().await.get(epoch_id) {
            return Ok(assignment.clone());
        }

        let assignment = self.source.get_epoch_assignment(epoch_id).await?;
        let mut cache = self.inner.write().await;
        cache.insert(assignment.clone(), Utc::now())?;
        tracing::info!(
            "Cached assignment for epoch {} ({} zipcodes, {} cached epochs)",
            epoch_id,
            assignment.zipcodes.len(),
            cache.len()
        );
        Ok(assignment)
    }

    /// Serve misses and prefetch the current epoch every `interval` until
    /// every read handle is dropped.
    pub async fn run(mut self, clock: EpochClock, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        tracing::debug!("Epoch cache handles dropped, refresher exiting");
                        break;
                    };
                    let result = self.ensure(&request.epoch_id).await;
                    let _ = request.reply.send(result);
                }
                _ = ticker.tick() => {
                    let epoch_id = clock.epoch_id_for(Utc::now());
                    if let Err(e) = self.ensure(&epoch_id).await {
                        tracing::warn!("Prefetch of epoch {} assignment failed: {}", epoch_id, e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use homestead_core::ZipcodeAssignment;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AssignmentSource for CountingSource {
        async fn get_epoch_assignment(
            &self,
            epoch_id: &str,
        ) -> Result<EpochAssignment, HomesteadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if epoch_id == "missing" {
                return Err(HomesteadError::NotFound(epoch_id.to_string()));
            }
            let start = Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap();
            Ok(EpochAssignment {
                epoch_id: epoch_id.to_string(),
                nonce: "n".to_string(),
                zipcodes: vec![ZipcodeAssignment {
                    zipcode: "90210".to_string(),
                    expected_listings: 100,
                }],
                start_time: start,
                end_time: start + chrono::Duration::hours(4),
            })
        }
    }

    fn temp_cache_path() -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("homestead-daemon-cache-{}", Uuid::now_v7()))
            .join("epoch_cache.json")
    }

    #[tokio::test]
    async fn test_miss_is_fetched_once_and_persisted() {
        let path = temp_cache_path();
        let file = EpochCacheFile::load(&path, 10).unwrap();
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let (cache, refresher) = epoch_cache(file, source.clone());
        let writer = tokio::spawn(refresher.run(EpochClock::default(), Duration::from_secs(3600)));

        let id = "2024-05-01T04-00-00Z";
        let first = cache.get_or_fetch(id).await.unwrap();
        let second = cache.get_or_fetch(id).await.unwrap();
        assert_eq!(first, second);
        assert!(cache.get(id).await.is_some());

        // The interval's immediate first tick may prefetch the current epoch,
        // but the requested epoch is only fetched once.
        let reloaded = EpochCacheFile::load(&path, 10).unwrap();
        assert!(reloaded.contains(id));
        assert!(source.calls.load(Ordering::SeqCst) <= 2);

        drop(cache);
        let _ = writer.await;
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_fetch_error_is_returned() {
        let path = temp_cache_path();
        let file = EpochCacheFile::load(&path, 10).unwrap();
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let (cache, refresher) = epoch_cache(file, source);
        let writer = tokio::spawn(refresher.run(EpochClock::default(), Duration::from_secs(3600)));

        let err = cache.get_or_fetch("missing").await.unwrap_err();
        assert!(matches!(err, HomesteadError::NotFound(_)));
        assert!(cache.get("missing").await.is_none());

        drop(cache);
        let _ = writer.await;
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
