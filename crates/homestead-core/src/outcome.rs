// crates/homestead-core/src/outcome.rs
//
// Result of running one submission through the multi-tier validation funnel.
//
//   Duplicate (0) --> Quantity (1) --> Quality (2) --> SpotCheck (3) --> passed
//
// A tier is only evaluated if every earlier tier passed, so the report for
// tier N is present only when tier N-1 passed, and `failed_at` is always the
// first tier that rejected the submission.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Validation tiers in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Pre-check: duplicate content hashes or source URIs.
    Duplicate,
    /// Listing count against the expected count.
    Quantity,
    /// Field completeness, value plausibility, zipcode compliance.
    Quality,
    /// Deterministic re-scrape of a sample of listings.
    SpotCheck,
}

impl Tier {
    /// Numeric tier level (0 for the duplicate pre-check).
    pub fn level(&self) -> u8 {
        match self {
            Tier::Duplicate => 0,
            Tier::Quantity => 1,
            Tier::Quality => 2,
            Tier::SpotCheck => 3,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Duplicate => write!(f, "duplicate"),
            Tier::Quantity => write!(f, "quantity"),
            Tier::Quality => write!(f, "quality"),
            Tier::SpotCheck => write!(f, "spot_check"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Number of listings sharing a content hash with an earlier listing.
    pub duplicate_content: usize,
    /// Number of listings sharing a normalized source URI with an earlier listing.
    pub duplicate_uris: usize,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityReport {
    pub listing_count: usize,
    /// Expected count from the epoch assignment, if known.
    pub expected_count: Option<u32>,
    /// Minimum count required to pass.
    pub minimum_required: usize,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub completeness_rate: f64,
    pub reasonable_rate: f64,
    /// `None` when no epoch zipcode set was available.
    pub compliance_rate: Option<f64>,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotCheckReport {
    /// 32-bit seed derived from nonce, miner, timestamp and count.
    pub seed: u32,
    /// Sampled listing indices, ascending.
    pub sampled_indices: Vec<usize>,
    pub matches: usize,
    pub match_rate: f64,
    pub passed: bool,
}

/// Per-submission result of the validation funnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub miner_hotkey: String,
    pub zipcode: String,
    pub listing_count: usize,
    /// First tier that rejected the submission; `None` if all passed.
    pub failed_at: Option<Tier>,
    pub duplicates: DuplicateReport,
    pub quantity: Option<QuantityReport>,
    pub quality: Option<QualityReport>,
    pub spot_check: Option<SpotCheckReport>,
}

impl ValidationOutcome {
    /// Whether the submission passed every tier.
    pub fn passed_all(&self) -> bool {
        self.failed_at.is_none()
    }

    /// Whether the submission qualifies for participant status: it cleared
    /// the duplicate pre-check and quantity tier but failed a later tier.
    pub fn is_participant(&self) -> bool {
        matches!(self.failed_at, Some(Tier::Quality) | Some(Tier::SpotCheck))
    }
}
