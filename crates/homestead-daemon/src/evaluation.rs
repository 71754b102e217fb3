// crates/homestead-daemon/src/evaluation.rs
//
// Batch evaluation worker pool.
//
// Each miner in a batch is one task: list the miner's submission objects for
// the epoch, fetch and parse each one. At most `max_concurrent` tasks hold a
// permit at once, and the whole batch runs under one timeout. On timeout the
// unfinished tasks are aborted and the finished ones are kept.
//
// Ranking is not done here. Parsed submissions go into the epoch's
// `SubmissionPool` and are ranked per zipcode once the epoch completes, so
// the timestamp-ordered early stop sees every miner's submission.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use homestead_core::paths;
use homestead_core::{EpochContext, HomesteadError, ObjectStore, Submission};

use crate::retry::retry_default;

/// Submissions collected for one epoch, keyed by `(zipcode, miner)`.
/// Re-evaluating a miner replaces its earlier entries.
#[derive(Debug, Default)]
pub struct SubmissionPool {
    epoch_id: String,
    entries: BTreeMap<(String, String), Submission>,
}

impl SubmissionPool {
    pub fn new(epoch_id: impl Into<String>) -> Self {
        Self {
            epoch_id: epoch_id.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn insert(&mut self, submission: Submission) {
        if submission.epoch_id != self.epoch_id {
            tracing::warn!(
                "Pool for epoch {} ignoring submission from {} for epoch {}",
                self.epoch_id,
                submission.miner_hotkey,
                submission.epoch_id
            );
            return;
        }
        self.entries.insert(
            (submission.zipcode.clone(), submission.miner_hotkey.clone()),
            submission,
        );
    }

    /// Submissions grouped by zipcode, ready for ranking. Every assigned
    /// zipcode appears, even with no submissions.
    pub fn by_zipcode(&self, epoch: &EpochContext) -> BTreeMap<String, Vec<Submission>> {
        let mut grouped: BTreeMap<String, Vec<Submission>> = epoch
            .expected
            .keys()
            .map(|zip| (zip.clone(), Vec::new()))
            .collect();
        for ((zip, _), submission) in &self.entries {
            grouped.entry(zip.clone()).or_default().push(submission.clone());
        }
        grouped
    }
}

/// Result of evaluating one batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub submissions: Vec<Submission>,
    /// Miners whose task ran to completion (with or without submissions).
    pub completed: Vec<String>,
    /// Miners whose task was aborted by the batch timeout.
    pub timed_out: Vec<String>,
    /// Submission objects that could not be parsed or did not belong here.
    pub rejected: usize,
}

#[derive(Clone)]
pub struct BatchEvaluator {
    store: Arc<dyn ObjectStore>,
    max_concurrent: usize,
    timeout: Duration,
}

struct MinerSubmissions {
    miner: String,
    submissions: Vec<Submission>,
    rejected: usize,
}

impl BatchEvaluator {
    pub fn new(store: Arc<dyn ObjectStore>, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            store,
            max_concurrent: max_concurrent.max(1),
            timeout,
        }
    }

    /// Fetch and parse every listed miner's submissions for the epoch.
    pub async fn evaluate_batch(&self, epoch: &EpochContext, miners: &[String]) -> BatchOutcome {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut task_miners = BTreeMap::new();

        for miner in miners {
            let store = self.store.clone();
            let epoch = epoch.clone();
            let key = miner.clone();
            let miner = miner.clone();
            let semaphore = semaphore.clone();
            let handle = tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| HomesteadError::InvalidState("Semaphore closed".to_string()))?;
                fetch_miner_submissions(store.as_ref(), &epoch, &miner).await
            });
            task_miners.insert(handle.id(), key);
        }

        let mut outcome = BatchOutcome::default();
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = tasks.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok((id, Ok(found))) => {
                            task_miners.remove(&id);
                            outcome.rejected += found.rejected;
                            outcome.submissions.extend(found.submissions);
                            outcome.completed.push(found.miner);
                        }
                        Ok((id, Err(e))) => {
                            let miner = task_miners.remove(&id).unwrap_or_default();
                            tracing::warn!("Miner {}: no submissions this cycle: {}", miner, e);
                            outcome.completed.push(miner);
                        }
                        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                        Err(e) => {
                            task_miners.remove(&e.id());
                            tracing::error!("Evaluation task cancelled: {}", e);
                        }
                    }
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        "Batch timeout after {:?}: aborting {} unfinished evaluations",
                        self.timeout,
                        tasks.len()
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        outcome.timed_out = task_miners.into_values().collect();
        outcome.timed_out.sort();
        outcome.completed.sort();
        tracing::info!(
            "Epoch {}: batch of {} miners yielded {} submissions ({} rejected, {} timed out)",
            epoch.epoch_id,
            miners.len(),
            outcome.submissions.len(),
            outcome.rejected,
            outcome.timed_out.len()
        );
        outcome
    }
}

async fn fetch_miner_submissions(
    store: &dyn ObjectStore,
    epoch: &EpochContext,
    miner: &str,
) -> Result<MinerSubmissions, HomesteadError> {
    let prefix = paths::miner_submissions_prefix(&epoch.epoch_id, miner);
    let object_paths = retry_default("list_submissions", || store.list(&prefix)).await?;

    let mut found = MinerSubmissions {
        miner: miner.to_string(),
        submissions: Vec::new(),
        rejected: 0,
    };

    for path in object_paths {
        let Some(bytes) = retry_default("get_submission", || store.get(&path)).await? else {
            continue;
        };
        let parsed = match Submission::from_json_slice(&bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Miner {}: rejected {}: {}", miner, path, e);
                found.rejected += 1;
                continue;
            }
        };
        let submission = parsed.submission;

        if submission.miner_hotkey != miner
            || submission.epoch_id != epoch.epoch_id
            || epoch.expected_for(&submission.zipcode).is_none()
        {
            tracing::warn!(
                "Miner {}: {} claims miner {} epoch {} zipcode {}, ignoring",
                miner,
                path,
                submission.miner_hotkey,
                submission.epoch_id,
                submission.zipcode
            );
            found.rejected += 1;
            continue;
        }
        if parsed.dropped_listings > 0 {
            tracing::debug!(
                "Miner {} zipcode {}: dropped {} malformed listings",
                miner,
                submission.zipcode,
                parsed.dropped_listings
            );
        }
        found.submissions.push(submission);
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use homestead_store::MemoryObjectStore;

    fn epoch() -> EpochContext {
        EpochContext::new("e1", "nonce", vec![("90210".to_string(), 10)])
    }

    fn submission_json(miner: &str, epoch_id: &str, zipcode: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "miner_hotkey": miner,
            "epoch_id": epoch_id,
            "zipcode": zipcode,
            "submitted_at": "2024-05-01T10:00:00Z",
            "listings": [
                {"listing_id": "a", "address": "1 Main St 90210", "price": 500000.0},
                "not a listing"
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_collects_valid_and_rejects_foreign() {
        let store = Arc::new(MemoryObjectStore::new());
        store
            .put(&paths::submission_path("e1", "m1", "90210"), submission_json("m1", "e1", "90210"))
            .await
            .unwrap();
        // Wrong zipcode for this epoch.
        store
            .put(&paths::submission_path("e1", "m1", "10001"), submission_json("m1", "e1", "10001"))
            .await
            .unwrap();
        // Claims to be another miner.
        store
            .put(&paths::submission_path("e1", "m2", "90210"), submission_json("m9", "e1", "90210"))
            .await
            .unwrap();
        store
            .put(&paths::submission_path("e1", "m3", "90210"), b"garbage".to_vec())
            .await
            .unwrap();

        let evaluator = BatchEvaluator::new(store, 4, Duration::from_secs(5));
        let miners: Vec<String> = ["m1", "m2", "m3", "m4"].iter().map(|s| s.to_string()).collect();
        let outcome = evaluator.evaluate_batch(&epoch(), &miners).await;

        assert_eq!(outcome.submissions.len(), 1);
        assert_eq!(outcome.submissions[0].listings.len(), 1);
        assert_eq!(outcome.rejected, 3);
        assert_eq!(outcome.completed, miners);
        assert!(outcome.timed_out.is_empty());
    }

    struct SlowStore;

    #[async_trait]
    impl ObjectStore for SlowStore {
        async fn put(&self, _path: &str, _bytes: Vec<u8>) -> Result<(), HomesteadError> {
            Ok(())
        }
        async fn get(&self, _path: &str) -> Result<Option<Vec<u8>>, HomesteadError> {
            Ok(None)
        }
        async fn list(&self, prefix: &str) -> Result<Vec<String>, HomesteadError> {
            if prefix.contains("/slow/") {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_timeout_keeps_finished_results() {
        let evaluator = BatchEvaluator::new(Arc::new(SlowStore), 2, Duration::from_millis(200));
        let miners = vec!["fast".to_string(), "slow".to_string()];
        let outcome = evaluator.evaluate_batch(&epoch(), &miners).await;
        assert_eq!(outcome.completed, vec!["fast".to_string()]);
        assert_eq!(outcome.timed_out, vec!["slow".to_string()]);
    }

    #[test]
    fn test_pool_groups_by_zipcode_and_replaces() {
        let mut pool = SubmissionPool::new("e1");
        let parsed = Submission::from_json_slice(&submission_json("m1", "e1", "90210")).unwrap();
        pool.insert(parsed.submission.clone());
        pool.insert(parsed.submission);
        assert_eq!(pool.len(), 1);

        let ctx = EpochContext::new(
            "e1",
            "n",
            vec![("90210".to_string(), 10), ("10001".to_string(), 5)],
        );
        let grouped = pool.by_zipcode(&ctx);
        assert_eq!(grouped["90210"].len(), 1);
        assert!(grouped["10001"].is_empty());
    }
}
