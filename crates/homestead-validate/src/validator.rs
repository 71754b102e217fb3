// crates/homestead-validate/src/validator.rs
//
// MultiTierValidator: runs one submission through the validation funnel.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use homestead_core::{ListingVerifier, SpotCheckReport, Submission, Tier, ValidationOutcome};

use crate::duplicates::check_duplicates;
use crate::quality::{check_quality, QualityThresholds};
use crate::quantity::check_quantity;
use crate::spot_check::{count_matches, select_sample, SampleParams};

/// Canonical thresholds applied by every validator.
///
/// All validators on the network must run with identical values, otherwise
/// their zipcode rankings (and therefore their consensus hashes) diverge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationThresholds {
    /// Tier 1 tolerance below the expected count, in basis points.
    pub quantity_tolerance_bps: u32,
    pub min_completeness: f64,
    pub min_reasonable: f64,
    pub min_compliance: f64,
    pub spot_check_fraction: f64,
    pub spot_check_min: usize,
    pub spot_check_max: usize,
    /// Minimum fraction of sampled listings that must match their source.
    pub spot_check_pass_rate: f64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            quantity_tolerance_bps: 1_500,
            min_completeness: 0.90,
            min_reasonable: 0.90,
            min_compliance: 0.60,
            spot_check_fraction: 0.10,
            spot_check_min: 3,
            spot_check_max: 10,
            spot_check_pass_rate: 0.80,
        }
    }
}

impl ValidationThresholds {
    fn quality(&self) -> QualityThresholds {
        QualityThresholds {
            min_completeness: self.min_completeness,
            min_reasonable: self.min_reasonable,
            min_compliance: self.min_compliance,
        }
    }

    fn sample_params(&self) -> SampleParams {
        SampleParams {
            fraction: self.spot_check_fraction,
            min: self.spot_check_min,
            max: self.spot_check_max,
        }
    }
}

/// Judges individual submissions.
#[derive(Clone)]
pub struct MultiTierValidator {
    thresholds: ValidationThresholds,
    verifier: Arc<dyn ListingVerifier>,
}

impl MultiTierValidator {
    pub fn new(thresholds: ValidationThresholds, verifier: Arc<dyn ListingVerifier>) -> Self {
        Self {
            thresholds,
            verifier,
        }
    }

    pub fn thresholds(&self) -> &ValidationThresholds {
        &self.thresholds
    }

    /// Validate one submission.
    ///
    /// Never fails: every rejection is expressed in the returned outcome.
    pub async fn validate(
        &self,
        submission: &Submission,
        expected_count: Option<u32>,
        epoch_zipcodes: &BTreeSet<String>,
        epoch_nonce: &str,
    ) -> ValidationOutcome {
        let listings = &submission.listings;
        let mut outcome = ValidationOutcome {
            miner_hotkey: submission.miner_hotkey.clone(),
            zipcode: submission.zipcode.clone(),
            listing_count: listings.len(),
            failed_at: None,
            duplicates: check_duplicates(listings),
            quantity: None,
            quality: None,
            spot_check: None,
        };

        if !outcome.duplicates.passed {
            outcome.failed_at = Some(Tier::Duplicate);
            tracing::debug!(
                "Miner {} zipcode {}: duplicate pre-check failed ({} content, {} uri)",
                submission.miner_hotkey,
                submission.zipcode,
                outcome.duplicates.duplicate_content,
                outcome.duplicates.duplicate_uris
            );
            return outcome;
        }

        // Tier 1
        let quantity = check_quantity(
            listings.len(),
            expected_count,
            self.thresholds.quantity_tolerance_bps,
        );
        let quantity_passed = quantity.passed;
        outcome.quantity = Some(quantity);
        if !quantity_passed {
            outcome.failed_at = Some(Tier::Quantity);
            tracing::debug!(
                "Miner {} zipcode {}: tier 1 failed ({} listings, expected {:?})",
                submission.miner_hotkey,
                submission.zipcode,
                listings.len(),
                expected_count
            );
            return outcome;
        }

        // Tier 2
        let quality = check_quality(listings, epoch_zipcodes, &self.thresholds.quality());
        let quality_passed = quality.passed;
        if !quality_passed {
            tracing::debug!(
                "Miner {} zipcode {}: tier 2 failed \
                 (complete {:.3}, reasonable {:.3}, compliance {:?})",
                submission.miner_hotkey,
                submission.zipcode,
                quality.completeness_rate,
                quality.reasonable_rate,
                quality.compliance_rate
            );
        }
        outcome.quality = Some(quality);
        if !quality_passed {
            outcome.failed_at = Some(Tier::Quality);
            return outcome;
        }

        // Tier 3
        let (seed, sampled_indices) = select_sample(
            epoch_nonce,
            &submission.miner_hotkey,
            &submission.submitted_at,
            listings.len(),
            &self.thresholds.sample_params(),
        );
        let matches = count_matches(self.verifier.as_ref(), listings, &sampled_indices).await;
        let match_rate = if sampled_indices.is_empty() {
            0.0
        } else {
            matches as f64 / sampled_indices.len() as f64
        };
        let passed = match_rate >= self.thresholds.spot_check_pass_rate;

        tracing::debug!(
            "Miner {} zipcode {}: tier 3 {} ({}/{} matched, seed {:#010x})",
            submission.miner_hotkey,
            submission.zipcode,
            if passed { "passed" } else { "failed" },
            matches,
            sampled_indices.len(),
            seed
        );

        outcome.spot_check = Some(SpotCheckReport {
            seed,
            sampled_indices,
            matches,
            match_rate,
            passed,
        });
        if !passed {
            outcome.failed_at = Some(Tier::SpotCheck);
        }
        outcome
    }
}
