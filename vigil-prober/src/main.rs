//! Vigil prober binary.
//!
//! Runs the configured roles against a Kafka cluster until interrupted.
//!
//! # Single instance
//!
//! ```bash
//! vigil --cluster-name main --bootstrap-servers localhost:9092
//! ```
//!
//! # Fleet of three
//!
//! Every instance gets the same ordered `--peer` list and its own
//! `--service-address`:
//!
//! ```bash
//! vigil --cluster-name main --bootstrap-servers kafka:9092 \
//!     --peer vigil-0:8080 --peer vigil-1:8080 --peer vigil-2:8080 \
//!     --service-address vigil-1:8080 --role consumer --role metadata
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use vigil_core::{PeerList, Role};
use vigil_metrics::LogReporter;
use vigil_prober::{AppProperties, Fleet, ProberConfig};

/// Barrier-synchronized availability prober for Kafka clusters.
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name of the monitored cluster.
    #[arg(long, default_value = "kafka-cluster")]
    cluster_name: String,

    /// Kafka bootstrap servers.
    #[arg(long, default_value = "localhost:9092")]
    bootstrap_servers: String,

    /// Prober instance address, in fleet order.
    /// Can be specified multiple times; every instance must list the same peers
    /// in the same order. Omit to probe every topic from this instance.
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// This instance's address as it appears in the peer list.
    #[arg(long, default_value = "localhost:8080")]
    service_address: String,

    /// Path to `appProperties.json` with metric publication switches.
    #[arg(long)]
    app_properties: Option<PathBuf>,

    /// Role to run (consumer, metadata). Can be specified multiple times.
    #[arg(long = "role", value_parser = parse_role)]
    roles: Vec<Role>,

    /// Pause between synchronized rounds, in milliseconds.
    #[arg(long, default_value = "1000")]
    round_interval_ms: u64,

    /// Stop after this many rounds.
    #[arg(long)]
    max_rounds: Option<u64>,

    /// Bound on a metadata fetch, in milliseconds.
    #[arg(long, default_value = "10000")]
    metadata_timeout_ms: u64,

    /// Bound on a probe read, in milliseconds.
    #[arg(long, default_value = "5000")]
    read_timeout_ms: u64,

    /// Probe `__`-prefixed internal topics too.
    #[arg(long)]
    include_internal_topics: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: Level,
}

/// Parses a role name.
fn parse_role(s: &str) -> Result<Role, String> {
    match s.parse::<Role>() {
        Ok(Role::Producer) => Err("the producer role is not supported".to_string()),
        Ok(role) => Ok(role),
        Err(err) => Err(err.to_string()),
    }
}

impl Args {
    fn into_config(self) -> Result<ProberConfig, Box<dyn std::error::Error>> {
        let properties = match &self.app_properties {
            Some(path) => AppProperties::load(path)?,
            None => AppProperties::default(),
        };
        let roles = if self.roles.is_empty() {
            vec![Role::Consumer]
        } else {
            self.roles
        };

        let config = ProberConfig::new(self.cluster_name, self.bootstrap_servers, self.service_address)
            .with_peers(self.peers.into_iter().collect::<PeerList>())
            .with_roles(roles)
            .with_properties(properties)
            .with_timeouts(
                Duration::from_millis(self.metadata_timeout_ms),
                Duration::from_millis(self.read_timeout_ms),
            )
            .with_round_interval(Duration::from_millis(self.round_interval_ms))
            .with_max_rounds(self.max_rounds)
            .with_internal_topics(self.include_internal_topics);
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = args.into_config()?;
    info!(
        cluster_name = %config.cluster_name,
        bootstrap_servers = %config.bootstrap_servers,
        service_address = %config.service_address,
        peer_count = config.peers.len(),
        roles = ?config.roles,
        max_rounds = ?config.max_rounds,
        "Starting Vigil prober"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let fleet = Fleet::start(
        &config,
        &config.kafka_settings(),
        Arc::new(LogReporter::new(config.report_label())),
        Arc::clone(&shutdown),
    )?;

    let signal_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested, finishing current round");
            signal_shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    let results = tokio::task::spawn_blocking(move || fleet.join()).await?;

    let mut failed = 0;
    for result in results {
        match result {
            Ok(summary) => info!(
                role = %summary.role,
                rounds = summary.rounds,
                failed_rounds = summary.failed_rounds,
                final_phase = summary.final_phase,
                "worker finished"
            ),
            Err(err) => {
                failed += 1;
                error!(error = %err, "worker failed");
            }
        }
    }

    if failed > 0 {
        return Err(format!("{failed} worker(s) failed").into());
    }
    info!("Vigil prober stopped");
    Ok(())
}
