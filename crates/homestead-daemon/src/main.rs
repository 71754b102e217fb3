// crates/homestead-daemon/src/main.rs
//
// Binary entrypoint for the Homestead validator daemon.
//
// Parses CLI arguments, loads configuration, initializes tracing, wires the
// collaborator clients and object store, spawns the epoch cache refresher
// and event reporter, and runs the epoch scheduler until ctrl-c.

mod clients;
mod config;
mod consensus_runner;
mod epoch_cache;
mod epoch_events;
mod evaluation;
mod retry;
mod scheduler;
mod shared;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use homestead_consensus::agreement::ConsensusManager;
use homestead_consensus::epoch::EpochClock;
use homestead_consensus::scoring::ZipcodeScorer;
use homestead_core::{AssignmentSource, ChainClient, ListingVerifier, ObjectStore};
use homestead_store::{EpochCacheFile, MemoryObjectStore, RocksObjectStore};
use homestead_validate::{MultiTierValidator, ValidationThresholds};

use clients::{build_http_client, HttpAssignmentClient, HttpChainClient, HttpListingVerifier};
use config::DaemonConfig;
use consensus_runner::ConsensusRunner;
use evaluation::BatchEvaluator;
use scheduler::EpochScheduler;
use shared::DaemonSharedState;

/// Homestead validator daemon: scores listing submissions and agrees on
/// rewards with peer validators.
#[derive(Parser, Debug)]
#[command(name = "homestead-daemon", version = "0.1.0", about = "Homestead validator daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.homestead/config.toml")]
    config: String,

    /// Validator hotkey; overrides the config file value.
    #[arg(long)]
    hotkey: Option<String>,

    /// Keep objects in memory instead of RocksDB.
    #[arg(long)]
    memory_store: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration from TOML, falling back to defaults if the file is
    // not found. A file that exists but is invalid is fatal.
    let config_path = expand_tilde(&args.config);
    let config_found = Path::new(&config_path).exists();
    let mut daemon_config = if config_found {
        DaemonConfig::load(&config_path)?
    } else {
        DaemonConfig::default()
    };

    if let Some(hotkey) = args.hotkey {
        daemon_config.validator_hotkey = hotkey;
        daemon_config.validate()?;
    }

    // Initialize tracing subscriber for structured logging. RUST_LOG wins
    // over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&daemon_config.log_level)),
        )
        .init();

    if config_found {
        tracing::info!("Loaded configuration from {}", config_path);
    } else {
        tracing::warn!("No config at {}, using defaults", config_path);
    }

    tracing::info!("Homestead Validator Daemon v0.1.0");
    tracing::info!("Validator hotkey: {}", daemon_config.validator_hotkey);
    tracing::info!("Data directory: {}", daemon_config.data_dir);
    tracing::info!("Chain: {}", daemon_config.chain_url);
    tracing::info!("Assignments: {}", daemon_config.assignment_url);
    tracing::info!("Verifier: {}", daemon_config.verifier_url);
    tracing::info!(
        "Batch size {} every {} blocks, {} concurrent evaluations, {}s batch timeout",
        daemon_config.batch_size,
        daemon_config.blocks_per_cycle,
        daemon_config.max_concurrent_evaluations,
        daemon_config.batch_timeout_secs
    );

    let data_dir = expand_tilde(&daemon_config.data_dir);

    // ---------------------------------------------------------------
    // Object store
    // ---------------------------------------------------------------
    let store: Arc<dyn ObjectStore> = if args.memory_store {
        tracing::warn!("Using in-memory object store; nothing survives a restart");
        Arc::new(MemoryObjectStore::new())
    } else {
        let rocksdb_path = format!("{}/rocksdb", data_dir);
        let rocks = RocksObjectStore::open(&rocksdb_path)?;
        tracing::info!("Object store opened at {}", rocksdb_path);
        Arc::new(rocks)
    };

    // ---------------------------------------------------------------
    // Collaborators
    // ---------------------------------------------------------------
    let http = build_http_client(daemon_config.request_timeout());
    let chain: Arc<dyn ChainClient> =
        Arc::new(HttpChainClient::new(&daemon_config.chain_url, http.clone()));
    let assignments: Arc<dyn AssignmentSource> =
        Arc::new(HttpAssignmentClient::new(&daemon_config.assignment_url, http.clone()));
    let verifier: Arc<dyn ListingVerifier> =
        Arc::new(HttpListingVerifier::new(&daemon_config.verifier_url, http));

    // ---------------------------------------------------------------
    // Epoch cache (single writer)
    // ---------------------------------------------------------------
    let clock = EpochClock::from_hours(daemon_config.epoch_length_hours);
    let cache_file = EpochCacheFile::load(
        format!("{}/epoch_cache.json", data_dir),
        daemon_config.cache_retention,
    )?;
    tracing::info!("Epoch cache holds {} assignments", cache_file.len());
    let (cache, refresher) = epoch_cache::epoch_cache(cache_file, assignments);
    let refresh_interval = daemon_config.poll_interval() * 25;
    tokio::spawn(refresher.run(clock, refresh_interval));

    // ---------------------------------------------------------------
    // Events, scoring, consensus
    // ---------------------------------------------------------------
    let shared_state = DaemonSharedState::new();
    let (event_tx, event_rx) = tokio::sync::broadcast::channel::<epoch_events::EpochEvent>(64);
    tokio::spawn(epoch_events::run_event_reporter(event_rx));

    let validator = MultiTierValidator::new(ValidationThresholds::default(), verifier);
    let consensus = ConsensusManager::new(
        daemon_config.validator_hotkey.clone(),
        store.clone(),
        daemon_config.consensus_thresholds(),
    );
    let runner = ConsensusRunner::new(
        ZipcodeScorer::new(validator),
        consensus,
        store.clone(),
        chain.clone(),
        shared_state.clone(),
        event_tx.clone(),
        daemon_config.consensus_wait(),
        daemon_config.batch_timeout(),
    );
    let evaluator = BatchEvaluator::new(
        store,
        daemon_config.max_concurrent_evaluations,
        daemon_config.batch_timeout(),
    );

    let mut scheduler = EpochScheduler::new(
        chain,
        cache,
        evaluator,
        runner,
        shared_state.clone(),
        event_tx,
        clock,
        daemon_config.batch_size,
        daemon_config.blocks_per_cycle,
        daemon_config.poll_interval(),
    );

    scheduler.run().await?;

    tracing::info!(
        "Homestead daemon shut down gracefully after {:?}",
        shared_state.start_time.elapsed()
    );
    Ok(())
}

/// Expand `~` at the start of a path to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
