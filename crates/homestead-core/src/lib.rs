// crates/homestead-core/src/lib.rs
//
// homestead-core: Core types, traits, and hashing primitives for the
// Homestead listing scoring engine.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the listing/submission model, validation outcomes, zipcode and
// epoch results, consensus records, the error type, and the trait interfaces
// of the external collaborators (chain, object storage, re-scrape service,
// assignment service).

pub mod assignment;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod listing;
pub mod outcome;
pub mod paths;
pub mod results;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use homestead_core::Submission;`

// Listing types
pub use listing::{Listing, ParsedSubmission, Submission};

// Assignment types
pub use assignment::{EpochAssignment, EpochContext, ZipcodeAssignment};

// Validation outcome types
pub use outcome::{
    DuplicateReport, QualityReport, QuantityReport, SpotCheckReport, Tier, ValidationOutcome,
};

// Result types
pub use results::{EpochScoreSet, ScoreSummary, ZipcodeResult, ZipcodeWinner};

// Consensus types
pub use consensus::{ConsensusRecord, ConsensusStatus, ConsensusVerdict};

// Error type
pub use error::HomesteadError;

// Traits
pub use traits::{AssignmentSource, ChainClient, ListingVerifier, ObjectStore};
