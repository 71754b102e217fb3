// crates/homestead-consensus/src/hashing.rs
//
// Canonical consensus hash of an epoch's score set.
//
// Wire form (compact JSON, keys sorted, UTF-8):
//   {"epoch_nonce":"..","miner_scores":{..},"summary":{"total_listings":N,
//    "total_participants":N,"total_winners":N},"zipcode_weights":{..}}
//
// Struct fields are declared in alphabetical order and maps are BTreeMaps,
// so serde_json emits keys in sorted order with `,` and `:` separators and
// no whitespace. Floats are rounded to HASH_DECIMALS places first. Any
// reimplementation must reproduce these bytes exactly.

use std::collections::BTreeMap;

use serde::Serialize;

use homestead_core::crypto::sha256_hex;
use homestead_core::EpochScoreSet;

/// Decimal places kept for scores and weights in the hash input.
pub const HASH_DECIMALS: i32 = 10;

#[derive(Serialize)]
struct CanonicalSummary {
    total_listings: usize,
    total_participants: usize,
    total_winners: usize,
}

#[derive(Serialize)]
struct CanonicalScores<'a> {
    epoch_nonce: &'a str,
    miner_scores: BTreeMap<&'a str, f64>,
    summary: CanonicalSummary,
    zipcode_weights: BTreeMap<&'a str, f64>,
}

/// Round a value to `HASH_DECIMALS` decimal places.
pub fn round_for_hash(value: f64) -> f64 {
    let scale = 10f64.powi(HASH_DECIMALS);
    let rounded = (value * scale).round() / scale;
    // Collapse -0.0 so it serializes the same as 0.0.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn rounded_map(map: &BTreeMap<String, f64>) -> BTreeMap<&str, f64> {
    map.iter()
        .map(|(k, &v)| (k.as_str(), round_for_hash(v)))
        .collect()
}

/// The exact bytes fed to SHA-256.
pub fn canonical_bytes(scores: &EpochScoreSet, epoch_nonce: &str) -> Vec<u8> {
    let canonical = CanonicalScores {
        epoch_nonce,
        miner_scores: rounded_map(&scores.miner_scores),
        summary: CanonicalSummary {
            total_listings: scores.summary.total_listings,
            total_participants: scores.summary.total_participants,
            total_winners: scores.summary.total_winners,
        },
        zipcode_weights: rounded_map(&scores.zipcode_weights),
    };
    // Finite floats, string keys and integers: serialization cannot fail.
    serde_json::to_vec(&canonical).unwrap_or_default()
}

/// Lowercase hex SHA-256 of the canonical representation.
pub fn consensus_hash(scores: &EpochScoreSet, epoch_nonce: &str) -> String {
    sha256_hex(&canonical_bytes(scores, epoch_nonce))
}
