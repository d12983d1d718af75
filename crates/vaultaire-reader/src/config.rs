//! Daemon configuration
//!
//! Everything the supervisor needs to bring the daemon up, assembled by
//! the binary from CLI arguments and the environment.

use vaultaire_store::StoreConfig;

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Broker hostname; the daemon connects out to its router sockets.
    pub broker: String,
    /// Number of reader workers.
    pub workers: usize,
    /// Echo telemetry to stdout as well as the pub socket.
    pub debug: bool,
    /// Serve synthetic data for the demo origin instead of hitting the
    /// store. Off in production.
    pub demo: bool,
    /// Store user the pools are scoped to.
    pub user: String,
    /// Store pool name.
    pub pool: String,
    /// Object store backend selection.
    pub store: StoreConfig,
}
