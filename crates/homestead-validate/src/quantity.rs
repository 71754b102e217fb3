// crates/homestead-validate/src/quantity.rs
//
// Tier 1: listing count against the epoch's expected count.
//
// Accept iff count >= ceil(expected * (1 - tolerance)). Only the lower bound
// is enforced; over-delivery is not penalized here (duplicates and quality
// catch padded submissions). The tolerance is held in basis points so the
// threshold is computed in integers and is identical on every validator.

use homestead_core::QuantityReport;

/// Basis points in 1.0.
const BPS_SCALE: u64 = 10_000;

/// Minimum listing count required to pass tier 1.
///
/// Unknown or zero expected count falls back to a minimum of one listing.
pub fn minimum_required(expected: Option<u32>, tolerance_bps: u32) -> usize {
    match expected {
        Some(expected) if expected > 0 => {
            let keep_bps = BPS_SCALE.saturating_sub(tolerance_bps as u64);
            let scaled = expected as u64 * keep_bps;
            let min = (scaled + BPS_SCALE - 1) / BPS_SCALE;
            (min as usize).max(1)
        }
        _ => 1,
    }
}

/// Run the quantity tier.
pub fn check_quantity(
    listing_count: usize,
    expected: Option<u32>,
    tolerance_bps: u32,
) -> QuantityReport {
    let minimum = minimum_required(expected, tolerance_bps);
    QuantityReport {
        listing_count,
        expected_count: expected,
        minimum_required: minimum,
        passed: listing_count >= minimum,
    }
}
