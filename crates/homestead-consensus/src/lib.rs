// crates/homestead-consensus/src/lib.rs
//
// homestead-consensus: Zipcode competition, epoch aggregation, consensus
// hashing, cross-validator agreement, and deterministic batch scheduling.
//
// Everything in this crate that feeds the consensus hash is a deterministic
// function of its inputs: independently running validators that observe the
// same submissions and chain state must arrive at bit-identical scores.

pub mod aggregation;
pub mod agreement;
pub mod batch;
pub mod epoch;
pub mod hashing;
pub mod scoring;
pub mod state;
