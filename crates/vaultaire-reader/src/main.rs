//! Vaultaire reader daemon entry point.
//!
//! ```bash
//! # Development: local store, demo origin enabled, chatty telemetry
//! VAULTAIRE_STORE_PATH=./data vaultaire-readerd --demo -d localhost
//!
//! # Production: S3-compatible gateway from the environment
//! VAULTAIRE_BUCKET=vaultaire vaultaire-readerd -w 16 broker.internal
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `info`). The process
//! exits 0 on a clean signal-driven shutdown and non-zero when any linked
//! task fails.

use clap::Parser;
use vaultaire_reader::{supervisor, ReaderConfig};
use vaultaire_store::StoreConfig;

#[derive(Parser)]
#[command(name = "vaultaire-readerd", about = "Vaultaire reader daemon", version)]
struct Cli {
    /// Echo telemetry to stdout
    #[arg(short, long)]
    debug: bool,

    /// Number of reader workers (default: logical CPU count)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Store pool to read from
    #[arg(short, long, default_value = "vaultaire")]
    pool: String,

    /// Store user to connect as
    #[arg(short, long, default_value = "vaultaire")]
    user: String,

    /// Serve synthetic data for the demo origin
    #[arg(long)]
    demo: bool,

    /// Broker hostname to connect to
    broker: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Worker count resolves after parsing: the unset sentinel becomes the
    // machine's parallelism, not a side effect inside the parser.
    let workers = match cli.workers {
        Some(n) if n > 0 => n,
        _ => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    };

    let config = ReaderConfig {
        broker: cli.broker,
        workers,
        debug: cli.debug,
        demo: cli.demo,
        user: cli.user,
        pool: cli.pool,
        store: StoreConfig::from_env(),
    };

    tracing::info!(
        broker = %config.broker,
        workers = config.workers,
        pool = %config.pool,
        user = %config.user,
        demo = config.demo,
        "vaultaire reader starting"
    );

    supervisor::run(config).await?;

    tracing::info!("vaultaire reader shut down cleanly");
    Ok(())
}
