// crates/homestead-validate/src/lib.rs
//
// homestead-validate: The multi-tier validator that judges a single miner
// submission.
//
// Funnel: duplicate pre-check -> tier 1 quantity -> tier 2 quality ->
// tier 3 deterministic spot-check. Each tier only runs if the previous one
// passed. The validator is a pure function of its inputs apart from the
// tier-3 call to the re-scrape collaborator.

pub mod duplicates;
pub mod quality;
pub mod quantity;
pub mod spot_check;
pub mod validator;

// Re-export key types for ergonomic access from downstream crates.
pub use spot_check::{sample_size, select_sample, SampleParams};
pub use validator::{MultiTierValidator, ValidationThresholds};
