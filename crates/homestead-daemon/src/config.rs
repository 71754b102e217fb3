// crates/homestead-daemon/src/config.rs
//
// Runtime configuration for the Homestead validator daemon.
// Loaded from a TOML file or populated with sensible defaults.
//
// Validation thresholds are network-wide constants and are not
// configurable here.

use serde::Deserialize;
use std::fs;
use std::time::Duration;

use homestead_consensus::agreement::ConsensusThresholds;
use homestead_core::HomesteadError;

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// This validator's hotkey, used to name its consensus records.
    #[serde(default = "default_validator_hotkey")]
    pub validator_hotkey: String,

    /// Directory for local data storage (RocksDB, epoch cache).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Base URL of the chain gateway (miners, block height, weights).
    #[serde(default = "default_chain_url")]
    pub chain_url: String,

    /// Base URL of the epoch assignment service.
    #[serde(default = "default_assignment_url")]
    pub assignment_url: String,

    /// Base URL of the listing re-scrape service used for spot-checks.
    #[serde(default = "default_verifier_url")]
    pub verifier_url: String,

    /// Miners evaluated per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Blocks per batch cycle (1200 blocks is ~4 hours at 12s blocks).
    #[serde(default = "default_blocks_per_cycle")]
    pub blocks_per_cycle: u64,

    /// Length of one epoch in hours.
    #[serde(default = "default_epoch_length_hours")]
    pub epoch_length_hours: u32,

    /// Upper bound on concurrently evaluated miners within a batch.
    #[serde(default = "default_max_concurrent_evaluations")]
    pub max_concurrent_evaluations: usize,

    /// Overall timeout for one batch, in seconds. Also bounds the ranking
    /// (validation and re-scrapes) at epoch completion.
    #[serde(default = "default_batch_timeout_secs")]
    pub batch_timeout_secs: u64,

    /// Agreement rate required for MAJORITY_CONSENSUS.
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold: f64,

    /// Agreement rate below which consensus fails outright.
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: f64,

    /// Seconds to wait after publishing a consensus record before reading
    /// peers' records.
    #[serde(default = "default_consensus_wait_secs")]
    pub consensus_wait_secs: u64,

    /// Number of epoch assignments kept in the local cache.
    #[serde(default = "default_cache_retention")]
    pub cache_retention: usize,

    /// Seconds between scheduler ticks.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Per-request HTTP timeout for collaborator calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_validator_hotkey() -> String {
    "validator-local".to_string()
}

fn default_data_dir() -> String {
    "~/.homestead/data".to_string()
}

fn default_chain_url() -> String {
    "http://127.0.0.1:9944".to_string()
}

fn default_assignment_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_verifier_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_blocks_per_cycle() -> u64 {
    1200
}

fn default_epoch_length_hours() -> u32 {
    4
}

fn default_max_concurrent_evaluations() -> usize {
    100
}

fn default_batch_timeout_secs() -> u64 {
    25 * 60
}

fn default_consensus_threshold() -> f64 {
    0.90
}

fn default_fallback_threshold() -> f64 {
    0.70
}

fn default_consensus_wait_secs() -> u64 {
    60
}

fn default_cache_retention() -> usize {
    homestead_store::DEFAULT_CACHE_RETENTION
}

fn default_poll_interval_secs() -> u64 {
    12
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            validator_hotkey: default_validator_hotkey(),
            data_dir: default_data_dir(),
            chain_url: default_chain_url(),
            assignment_url: default_assignment_url(),
            verifier_url: default_verifier_url(),
            batch_size: default_batch_size(),
            blocks_per_cycle: default_blocks_per_cycle(),
            epoch_length_hours: default_epoch_length_hours(),
            max_concurrent_evaluations: default_max_concurrent_evaluations(),
            batch_timeout_secs: default_batch_timeout_secs(),
            consensus_threshold: default_consensus_threshold(),
            fallback_threshold: default_fallback_threshold(),
            consensus_wait_secs: default_consensus_wait_secs(),
            cache_retention: default_cache_retention(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read, parsed, or holds
    /// inconsistent values.
    pub fn load(path: &str) -> Result<Self, HomesteadError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| HomesteadError::Config(format!("Cannot read {}: {}", path, e)))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, HomesteadError> {
        let config: DaemonConfig = toml::from_str(contents)
            .map_err(|e| HomesteadError::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HomesteadError> {
        if self.validator_hotkey.trim().is_empty() {
            return Err(HomesteadError::Config(
                "validator_hotkey must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 || self.max_concurrent_evaluations == 0 {
            return Err(HomesteadError::Config(
                "batch_size and max_concurrent_evaluations must be positive".to_string(),
            ));
        }
        if self.blocks_per_cycle == 0 || self.epoch_length_hours == 0 {
            return Err(HomesteadError::Config(
                "blocks_per_cycle and epoch_length_hours must be positive".to_string(),
            ));
        }
        if 24 % self.epoch_length_hours != 0 {
            return Err(HomesteadError::Config(format!(
                "epoch_length_hours ({}) must divide 24",
                self.epoch_length_hours
            )));
        }
        if !(0.0 < self.fallback_threshold
            && self.fallback_threshold <= self.consensus_threshold
            && self.consensus_threshold <= 1.0)
        {
            return Err(HomesteadError::Config(format!(
                "thresholds must satisfy 0 < fallback ({}) <= consensus ({}) <= 1",
                self.fallback_threshold, self.consensus_threshold
            )));
        }
        Ok(())
    }

    pub fn consensus_thresholds(&self) -> ConsensusThresholds {
        ConsensusThresholds {
            majority: self.consensus_threshold,
            fallback: self.fallback_threshold,
        }
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn consensus_wait(&self) -> Duration {
        Duration::from_secs(self.consensus_wait_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.blocks_per_cycle, 1200);
        assert_eq!(config.batch_timeout(), Duration::from_secs(1500));
        assert_eq!(config.cache_retention, 180);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = DaemonConfig::from_toml(
            r#"
            validator_hotkey = "5Gvalidator"
            batch_size = 50
            consensus_threshold = 0.75
            "#,
        )
        .unwrap();
        assert_eq!(config.validator_hotkey, "5Gvalidator");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_concurrent_evaluations, 100);
        assert!((config.consensus_thresholds().majority - 0.75).abs() < 1e-12);
        assert!((config.consensus_thresholds().fallback - 0.70).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let err = DaemonConfig::from_toml("consensus_threshold = 0.5\nfallback_threshold = 0.8\n")
            .unwrap_err();
        assert!(matches!(err, HomesteadError::Config(_)));
    }

    #[test]
    fn test_rejects_misaligned_epoch_length() {
        assert!(DaemonConfig::from_toml("epoch_length_hours = 5\n").is_err());
    }
}
