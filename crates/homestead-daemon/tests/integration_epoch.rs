// crates/homestead-daemon/tests/integration_epoch.rs
//
// Epoch pipeline integration tests for the Homestead daemon.
//
// Exercises the wired-up judgment pipeline: stored submissions -> parsing ->
// zipcode ranking -> aggregation -> consensus across several validators
// sharing one object store.
//
// These tests use the public APIs of the underlying library crates directly
// (homestead-consensus, homestead-validate, homestead-store, homestead-core)
// since the daemon is a binary crate with no lib.rs.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use homestead_consensus::aggregation::aggregate;
use homestead_consensus::agreement::{ConsensusManager, ConsensusThresholds};
use homestead_consensus::scoring::ZipcodeScorer;
use homestead_core::paths;
use homestead_core::{
    ConsensusStatus, EpochContext, EpochScoreSet, HomesteadError, Listing, ListingVerifier,
    ObjectStore, Submission,
};
use homestead_store::{MemoryObjectStore, RocksObjectStore};
use homestead_validate::{MultiTierValidator, ValidationThresholds};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const EPOCH: &str = "2024-05-01T08-00-00Z";
const NONCE: &str = "nonce-8f1c";

/// Create a temporary directory path using UUID to avoid conflicts.
fn temp_db_path(label: &str) -> String {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("homestead_test_{}_{}", label, Uuid::now_v7()));
    path.to_string_lossy().to_string()
}

/// Re-scrape stub that confirms every listing.
struct AlwaysMatches;

#[async_trait]
impl ListingVerifier for AlwaysMatches {
    async fn verify(&self, _listing: &Listing) -> Result<bool, HomesteadError> {
        Ok(true)
    }
}

fn scorer() -> ZipcodeScorer {
    ZipcodeScorer::new(MultiTierValidator::new(
        ValidationThresholds::default(),
        Arc::new(AlwaysMatches),
    ))
}

fn context() -> EpochContext {
    EpochContext::new(EPOCH, NONCE, vec![("90210".to_string(), 100)])
}

/// A complete, plausible listing unique to `(miner, i)`.
fn listing(miner: &str, i: usize) -> serde_json::Value {
    serde_json::json!({
        "listing_id": format!("{}-{}", miner, i),
        "address": format!("{} Palm Dr, Beverly Hills, CA 90210", 100 + i),
        "price": 1_250_000.0 + i as f64 * 1_000.0,
        "bedrooms": 3.0,
        "bathrooms": 2.0,
        "living_area_sqft": 1_850.0,
        "property_type": "SINGLE_FAMILY",
        "listing_status": "FOR_SALE",
        "days_on_market": 14,
        "source_url": format!("https://listings.example.com/{}/{}", miner, i),
    })
}

fn submission_bytes(miner: &str, minute: u32, count: usize) -> Vec<u8> {
    let submitted_at = Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap();
    serde_json::to_vec(&serde_json::json!({
        "miner_hotkey": miner,
        "epoch_id": EPOCH,
        "zipcode": "90210",
        "submitted_at": submitted_at,
        "listings": (0..count).map(|i| listing(miner, i)).collect::<Vec<_>>(),
    }))
    .unwrap()
}

/// The 90210 scenario: three passing miners, one short submission, and a
/// late fifth that arrives after the podium is full.
async fn seed_submissions(store: &dyn ObjectStore) {
    let entries = [
        ("M1", 0, 98),
        ("M3", 2, 40),
        ("M2", 5, 95),
        ("M4", 10, 97),
        ("M5", 15, 99),
    ];
    for (miner, minute, count) in entries {
        store
            .put(
                &paths::submission_path(EPOCH, miner, "90210"),
                submission_bytes(miner, minute, count),
            )
            .await
            .unwrap();
    }
}

/// Load every stored submission for the epoch, grouped by zipcode.
async fn load_submissions(store: &dyn ObjectStore) -> BTreeMap<String, Vec<Submission>> {
    let mut grouped: BTreeMap<String, Vec<Submission>> = BTreeMap::new();
    for path in store.list(&paths::submissions_prefix(EPOCH)).await.unwrap() {
        let bytes = store.get(&path).await.unwrap().unwrap();
        let parsed = Submission::from_json_slice(&bytes).unwrap();
        assert_eq!(parsed.dropped_listings, 0);
        grouped
            .entry(parsed.submission.zipcode.clone())
            .or_default()
            .push(parsed.submission);
    }
    grouped
}

async fn score_epoch(store: &dyn ObjectStore) -> EpochScoreSet {
    let ctx = context();
    let results = scorer().rank_epoch(&ctx, load_submissions(store).await).await;
    aggregate(EPOCH, &results)
}

// ---------------------------------------------------------------------------
// Ranking and aggregation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_zipcode_scenario_ranks_in_submission_order() {
    let store = MemoryObjectStore::new();
    seed_submissions(&store).await;

    let ctx = context();
    let mut by_zip = load_submissions(&store).await;
    let submissions = by_zip.remove("90210").unwrap();
    assert_eq!(submissions.len(), 5);

    let result = scorer()
        .rank("90210", submissions, ctx.expected_for("90210"), &ctx)
        .await;

    let podium: Vec<(&str, u8, f64)> = result
        .winners
        .iter()
        .map(|w| (w.miner_hotkey.as_str(), w.rank, w.reward_fraction))
        .collect();
    assert_eq!(
        podium,
        vec![("M1", 1, 0.55), ("M2", 2, 0.30), ("M4", 3, 0.10)]
    );
    // M3 failed tier 1 (40 < 85) and is neither winner nor participant.
    assert!(result.participants.is_empty());
    // M3 was evaluated; M5 never was.
    assert_eq!(result.evaluated, 4);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.total_listings_found, 98 + 95 + 97);
}

#[tokio::test]
async fn test_aggregated_scores_are_normalized() {
    let store = MemoryObjectStore::new();
    seed_submissions(&store).await;

    let scores = score_epoch(&store).await;
    assert_eq!(scores.epoch_id, EPOCH);
    assert_eq!(scores.miner_scores.len(), 3);
    assert!(!scores.miner_scores.contains_key("M3"));
    assert!(!scores.miner_scores.contains_key("M5"));

    let sum: f64 = scores.miner_scores.values().sum();
    assert!((sum - 1.0).abs() < 1e-9);
    assert!((scores.miner_scores["M1"] - 0.55 / 0.95).abs() < 1e-12);
    assert!((scores.miner_scores["M2"] - 0.30 / 0.95).abs() < 1e-12);
    assert!((scores.miner_scores["M4"] - 0.10 / 0.95).abs() < 1e-12);
    assert_eq!(scores.top_miner().map(|(m, _)| m), Some("M1"));
}

#[tokio::test]
async fn test_pipeline_on_rocksdb_store() {
    let path = temp_db_path("pipeline");
    {
        let store = RocksObjectStore::open(&path).unwrap();
        seed_submissions(&store).await;

        let from_rocks = score_epoch(&store).await;
        let from_memory = {
            let memory = MemoryObjectStore::new();
            seed_submissions(&memory).await;
            score_epoch(&memory).await
        };
        assert_eq!(from_rocks.miner_scores, from_memory.miner_scores);
    }
    let _ = std::fs::remove_dir_all(&path);
}

// ---------------------------------------------------------------------------
// Cross-validator consensus
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_independent_validators_reach_perfect_consensus() {
    let submissions = MemoryObjectStore::new();
    seed_submissions(&submissions).await;

    let shared: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let managers: Vec<ConsensusManager> = (0..3)
        .map(|i| {
            ConsensusManager::new(
                format!("validator-{}", i),
                shared.clone(),
                ConsensusThresholds::default(),
            )
        })
        .collect();

    // Each validator scores the epoch on its own.
    let mut records = Vec::new();
    for manager in &managers {
        let scores = score_epoch(&submissions).await;
        let record = manager.build_record(scores, NONCE);
        manager.publish(&record).await.unwrap();
        records.push(record);
    }
    assert!(records
        .iter()
        .all(|r| r.consensus_hash == records[0].consensus_hash));

    for (manager, record) in managers.iter().zip(&records) {
        let verdict = manager.verify(&record.consensus_hash, EPOCH).await.unwrap();
        assert_eq!(verdict.status, ConsensusStatus::PerfectConsensus);
        assert_eq!(verdict.reporting_validators, 3);
        assert!((verdict.agreement_rate - 1.0).abs() < 1e-12);
        assert!(verdict.outliers.is_empty());

        let released = manager.resolve(&verdict, record).await.unwrap();
        assert_eq!(released.miner_scores, record.scores.miner_scores);
    }
}

#[tokio::test]
async fn test_outlier_adopts_majority_in_fallback_band() {
    let submissions = MemoryObjectStore::new();
    seed_submissions(&submissions).await;
    let honest_scores = score_epoch(&submissions).await;

    let shared: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let manager = |hotkey: &str| {
        ConsensusManager::new(hotkey, shared.clone(), ConsensusThresholds::default())
    };

    for hotkey in ["v0", "v1", "v2"] {
        let m = manager(hotkey);
        m.publish(&m.build_record(honest_scores.clone(), NONCE))
            .await
            .unwrap();
    }

    // v3 missed M4's submission and ends up with a different score set.
    let mut skewed = honest_scores.clone();
    skewed.miner_scores.remove("M4");
    let outlier = manager("v3");
    let outlier_record = outlier.build_record(skewed, NONCE);
    outlier.publish(&outlier_record).await.unwrap();

    let verdict = outlier
        .verify(&outlier_record.consensus_hash, EPOCH)
        .await
        .unwrap();
    // 3 of 4 agree: below the 0.90 majority threshold, above the 0.70 floor.
    assert_eq!(verdict.status, ConsensusStatus::MajorityFallback);
    assert!((verdict.agreement_rate - 0.75).abs() < 1e-12);
    assert_eq!(verdict.outliers, vec!["v3".to_string()]);
    assert_ne!(verdict.majority_hash, outlier_record.consensus_hash);

    let released = outlier.resolve(&verdict, &outlier_record).await.unwrap();
    assert_eq!(released.miner_scores, honest_scores.miner_scores);
}

#[tokio::test]
async fn test_even_split_fails_consensus() {
    let submissions = MemoryObjectStore::new();
    seed_submissions(&submissions).await;
    let scores = score_epoch(&submissions).await;

    let mut other = scores.clone();
    other.miner_scores.remove("M2");

    let shared: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let mut records = Vec::new();
    for (hotkey, set) in [("v0", &scores), ("v1", &scores), ("v2", &other), ("v3", &other)] {
        let m = ConsensusManager::new(hotkey, shared.clone(), ConsensusThresholds::default());
        let record = m.build_record(set.clone(), NONCE);
        m.publish(&record).await.unwrap();
        records.push((m, record));
    }

    for (manager, record) in &records {
        let verdict = manager.verify(&record.consensus_hash, EPOCH).await.unwrap();
        assert_eq!(verdict.status, ConsensusStatus::ConsensusFailed);
        assert!((verdict.agreement_rate - 0.5).abs() < 1e-12);

        let err = manager.resolve(&verdict, record).await.unwrap_err();
        assert!(matches!(err, HomesteadError::ConsensusFailed { .. }));
    }
}

#[tokio::test]
async fn test_records_for_other_epochs_are_ignored() {
    let shared: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());

    let peer = ConsensusManager::new("v1", shared.clone(), ConsensusThresholds::default());
    let mut earlier = EpochScoreSet::empty("2024-05-01T04-00-00Z");
    earlier.miner_scores.insert("M9".to_string(), 1.0);
    peer.publish(&peer.build_record(earlier, "older-nonce"))
        .await
        .unwrap();

    let me = ConsensusManager::new("v0", shared, ConsensusThresholds::default());
    let record = me.build_record(EpochScoreSet::empty(EPOCH), NONCE);
    me.publish(&record).await.unwrap();

    let verdict = me.verify(&record.consensus_hash, EPOCH).await.unwrap();
    assert_eq!(verdict.status, ConsensusStatus::NoOtherValidators);
    assert_eq!(verdict.reporting_validators, 1);
}
