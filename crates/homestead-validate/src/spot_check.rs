// crates/homestead-validate/src/spot_check.rs
//
// Tier 3: deterministic spot-check.
//
// seed = first 32 bits of SHA-256("{nonce}:{miner}:{submitted_at}:{count}")
// The seed drives a StdRng that samples distinct listing indices. Every
// validator derives the same sample for the same submission, so every
// validator re-scrapes the same listings.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use homestead_core::crypto::seed_from_bytes;
use homestead_core::{Listing, ListingVerifier};

/// Sampling parameters for the spot-check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleParams {
    /// Fraction of listings to sample before clamping.
    pub fraction: f64,
    pub min: usize,
    pub max: usize,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            fraction: 0.10,
            min: 3,
            max: 10,
        }
    }
}

/// Canonical timestamp form used in the seed input.
pub fn seed_timestamp(submitted_at: &DateTime<Utc>) -> String {
    submitted_at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Derive the 32-bit spot-check seed for a submission.
pub fn spot_check_seed(
    epoch_nonce: &str,
    miner_hotkey: &str,
    submitted_at: &DateTime<Utc>,
    listing_count: usize,
) -> u32 {
    let input = format!(
        "{}:{}:{}:{}",
        epoch_nonce,
        miner_hotkey,
        seed_timestamp(submitted_at),
        listing_count
    );
    seed_from_bytes(input.as_bytes())
}

/// Number of listings to sample: clamp(round(fraction * count), min, max).
pub fn sample_size(listing_count: usize, params: &SampleParams) -> usize {
    let raw = (params.fraction * listing_count as f64).round() as usize;
    raw.clamp(params.min, params.max)
}

/// Deterministically select the listing indices to spot-check.
///
/// Returns the seed and the selected indices in ascending order. When the
/// submission has no more listings than the sample size, every index is
/// selected.
pub fn select_sample(
    epoch_nonce: &str,
    miner_hotkey: &str,
    submitted_at: &DateTime<Utc>,
    listing_count: usize,
    params: &SampleParams,
) -> (u32, Vec<usize>) {
    let seed = spot_check_seed(epoch_nonce, miner_hotkey, submitted_at, listing_count);
    let size = sample_size(listing_count, params);

    if listing_count <= size {
        return (seed, (0..listing_count).collect());
    }

    let mut rng = StdRng::seed_from_u64(seed as u64);
    let mut indices = rand::seq::index::sample(&mut rng, listing_count, size).into_vec();
    indices.sort_unstable();
    (seed, indices)
}

/// Re-scrape the sampled listings and count matches.
///
/// A collaborator error counts as a failed check for that listing.
pub async fn count_matches(
    verifier: &dyn ListingVerifier,
    listings: &[Listing],
    indices: &[usize],
) -> usize {
    let mut matches = 0;
    for &idx in indices {
        let Some(listing) = listings.get(idx) else {
            continue;
        };
        match verifier.verify(listing).await {
            Ok(true) => matches += 1,
            Ok(false) => {
                tracing::debug!(
                    "Spot-check mismatch at index {} (listing {:?})",
                    idx,
                    listing.listing_id
                );
            }
            Err(e) => {
                tracing::warn!(
                    "Spot-check verifier error at index {} (listing {:?}): {}",
                    idx,
                    listing.listing_id,
                    e
                );
            }
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_sample_size_clamped() {
        let p = SampleParams::default();
        assert_eq!(sample_size(5, &p), 3);
        assert_eq!(sample_size(50, &p), 5);
        assert_eq!(sample_size(55, &p), 6); // 5.5 rounds away from zero
        assert_eq!(sample_size(1000, &p), 10);
    }

    #[test]
    fn test_sample_is_deterministic() {
        let p = SampleParams::default();
        let a = select_sample("nonce", "5Fminer", &ts(), 98, &p);
        let b = select_sample("nonce", "5Fminer", &ts(), 98, &p);
        assert_eq!(a, b);
        assert_eq!(a.1.len(), 10);
        assert!(a.1.windows(2).all(|w| w[0] < w[1]));
        assert!(a.1.iter().all(|&i| i < 98));
    }

    #[test]
    fn test_sample_changes_with_any_input() {
        let p = SampleParams::default();
        let base = select_sample("nonce", "5Fminer", &ts(), 98, &p);
        let other_nonce = select_sample("nonce2", "5Fminer", &ts(), 98, &p);
        let other_miner = select_sample("nonce", "5Gminer", &ts(), 98, &p);
        let other_ts = select_sample(
            "nonce",
            "5Fminer",
            &(ts() + chrono::Duration::seconds(1)),
            98,
            &p,
        );
        let other_count = select_sample("nonce", "5Fminer", &ts(), 97, &p);

        for variant in [&other_nonce, &other_miner, &other_ts, &other_count] {
            assert_ne!(base.0, variant.0);
        }
        for variant in [&other_nonce, &other_miner, &other_ts, &other_count] {
            assert_eq!(variant.1.len(), base.1.len());
            assert_ne!(base.1, variant.1);
        }
    }

    #[test]
    fn test_small_submission_samples_everything() {
        let p = SampleParams::default();
        let (_, indices) = select_sample("n", "m", &ts(), 2, &p);
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_seed_input_format() {
        let expected = seed_from_bytes(b"n:m:2024-05-01T10:00:00Z:98");
        assert_eq!(spot_check_seed("n", "m", &ts(), 98), expected);
    }
}
