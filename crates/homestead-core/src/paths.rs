// crates/homestead-core/src/paths.rs
//
// Object storage key layout:
//   submissions/{epoch_id}/{miner}/{zipcode}.json  -> Submission
//   consensus/{epoch_id}/{validator}.json          -> ConsensusRecord
//   winners/{epoch_id}.json                        -> epoch winner announcement

pub fn submissions_prefix(epoch_id: &str) -> String {
    format!("submissions/{}/", epoch_id)
}

pub fn miner_submissions_prefix(epoch_id: &str, miner: &str) -> String {
    format!("submissions/{}/{}/", epoch_id, miner)
}

pub fn submission_path(epoch_id: &str, miner: &str, zipcode: &str) -> String {
    format!("submissions/{}/{}/{}.json", epoch_id, miner, zipcode)
}

pub fn consensus_prefix(epoch_id: &str) -> String {
    format!("consensus/{}/", epoch_id)
}

pub fn consensus_path(epoch_id: &str, validator: &str) -> String {
    format!("consensus/{}/{}.json", epoch_id, validator)
}

pub fn winner_path(epoch_id: &str) -> String {
    format!("winners/{}.json", epoch_id)
}

/// Extract the validator hotkey from a consensus record path.
pub fn validator_from_consensus_path(path: &str) -> Option<&str> {
    path.rsplit('/').next()?.strip_suffix(".json")
}
