//! Command line auditor for Go checksum databases
//!
//! Clones a log into a local store, checks the signed root against the
//! leaves and reports what it found. Rerunning against the same store picks
//! up where the previous run stopped.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use sumdb_audit::{AuditConfig, AuditError, AuditReport, Auditor, DEFAULT_VERIFIER_KEY};
use sumdb_client::HttpLogClient;
use sumdb_store::{FileSystemStore, LocalStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Audit a tile-based checksum database
#[derive(Parser, Debug)]
#[clap(name = "sumdb-audit", author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the log
    #[clap(long, default_value = sumdb_client::DEFAULT_LOG_URL)]
    url: String,

    /// Verifier key checkpoints must be signed with
    #[clap(short = 'k', long, default_value = DEFAULT_VERIFIER_KEY)]
    key: String,

    /// Tile height the log is served with
    #[clap(short = 'H', long, default_value_t = 8)]
    height: u8,

    /// Directory of the local store
    #[clap(long, default_value = sumdb_audit::DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Re-verify every stored tile from raw leaves after the root check
    #[clap(short = 'x', long)]
    extra_verify: bool,

    /// Compare the log's hash tiles with locally computed hashes
    #[clap(long)]
    remote_tiles: bool,

    /// Maximum number of tile fetches in flight
    #[clap(short = 'j', long, default_value_t = sumdb_audit::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Enable verbose logging (can be specified multiple times)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> AuditConfig {
        AuditConfig::for_log(self.url.clone(), self.key.clone())
            .tile_height(self.height)
            .concurrency(self.concurrency)
            .db_path(self.db.clone())
            .extra_verify(self.extra_verify)
            .remote_tiles(self.remote_tiles)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "sumdb_audit=info,sumdb_audit_cli=info".into()),
        1 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping after the current step");
            on_signal.cancel();
        }
    });

    match run(cli.config(), cancel).await {
        Ok(report) => {
            print_summary(&report);
            process::exit(0);
        }
        Err(err) => {
            let kind = err.kind();
            eprintln!("sumdb-audit: {}: {}", kind.as_str(), err);
            process::exit(kind.exit_code());
        }
    }
}

async fn run(config: AuditConfig, cancel: CancellationToken) -> Result<AuditReport, AuditError> {
    let store = Arc::new(FileSystemStore::new(&config.db_path)?);
    store.init().await?;

    let client = Arc::new(HttpLogClient::new(
        config.log_url.clone(),
        config.parse_verifier_key()?,
        config.geometry()?,
    ));

    info!(url = %config.log_url, db = %config.db_path.display(), "starting audit");
    let auditor = Auditor::new(store, client, config)?.with_cancellation_token(cancel);
    auditor.run().await
}

fn print_summary(report: &AuditReport) {
    println!(
        "verified {} leaves, root {}",
        report.checkpoint.tree_size, report.checkpoint.root_hash
    );
    println!(
        "  fetched {} data tiles ({} new leaves), wrote {} node hashes",
        report.clone.tiles_fetched,
        report.clone.new_size - report.clone.previous_size,
        report.hashes.nodes_written
    );
    println!(
        "  processed {} leaves into {} records, {} could not be decoded",
        report.metadata.leaves_processed,
        report.metadata.records_stored,
        report.metadata.warnings.len()
    );
    if let Some(verify) = &report.verify {
        println!(
            "  re-verified {} tiles ({} nodes) from raw leaves",
            verify.tiles_checked, verify.nodes_checked
        );
    }
    if let Some(remote) = &report.remote_tiles {
        println!(
            "  {} hash tiles served by the log match local hashes",
            remote.tiles_compared
        );
    }
}
