// crates/homestead-validate/src/quality.rs
//
// Tier 2: data quality of the listings in a submission.
//
// Three rates are computed over all listings:
// 1. **Completeness**: listings carrying every required field.
// 2. **Reasonable values**: listings whose present numeric fields fall in
//    plausible ranges.
// 3. **Zipcode compliance**: listings whose zipcode (explicit or extracted
//    from the address) is in the epoch's assigned set. Skipped when the
//    epoch zipcode set is empty.
//
// Each computed rate must clear its own threshold.

use std::collections::BTreeSet;

use homestead_core::{Listing, QualityReport};

pub const PRICE_RANGE: (f64, f64) = (10_000.0, 50_000_000.0);
pub const ROOM_RANGE: (f64, f64) = (0.0, 20.0);
pub const SQFT_RANGE: (f64, f64) = (100.0, 100_000.0);

/// Minimum rates a submission must reach to pass tier 2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    pub min_completeness: f64,
    pub min_reasonable: f64,
    pub min_compliance: f64,
}

fn in_range(value: Option<f64>, (lo, hi): (f64, f64)) -> bool {
    match value {
        Some(v) => v.is_finite() && v >= lo && v <= hi,
        None => true,
    }
}

/// Whether every numeric field present on the listing is plausible.
pub fn has_reasonable_values(listing: &Listing) -> bool {
    in_range(listing.price, PRICE_RANGE)
        && in_range(listing.bedrooms, ROOM_RANGE)
        && in_range(listing.bathrooms, ROOM_RANGE)
        && in_range(listing.living_area_sqft, SQFT_RANGE)
}

fn rate(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Run the quality tier. An empty listing set cannot pass.
pub fn check_quality(
    listings: &[Listing],
    epoch_zipcodes: &BTreeSet<String>,
    thresholds: &QualityThresholds,
) -> QualityReport {
    let total = listings.len();
    let complete = listings.iter().filter(|l| l.is_complete()).count();
    let reasonable = listings.iter().filter(|l| has_reasonable_values(l)).count();

    let completeness_rate = rate(complete, total);
    let reasonable_rate = rate(reasonable, total);

    let compliance_rate = if epoch_zipcodes.is_empty() {
        None
    } else {
        let compliant = listings
            .iter()
            .filter(|l| {
                l.effective_zipcode()
                    .map(|z| epoch_zipcodes.contains(&z))
                    .unwrap_or(false)
            })
            .count();
        Some(rate(compliant, total))
    };

    let passed = total > 0
        && completeness_rate >= thresholds.min_completeness
        && reasonable_rate >= thresholds.min_reasonable
        && compliance_rate.map_or(true, |r| r >= thresholds.min_compliance);

    QualityReport {
        completeness_rate,
        reasonable_rate,
        compliance_rate,
        passed,
    }
}
