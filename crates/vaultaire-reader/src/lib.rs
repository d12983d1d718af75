//! Vaultaire Reader Daemon
//!
//! The read side of the vault: accepts point queries and contents queries
//! from a broker over router sockets, fetches compressed bucket objects
//! from the store, filters by time range, and streams re-encoded bursts
//! back.
//!
//! ## Data Flow
//!
//! ```text
//! broker ──router 5571──► query pump ──inbound(1)──► reader workers ×W
//!                             ▲                          │
//!                             └───────outbound───────────┘
//! broker ──router 5573──► contents pump ──contents_in(1)──► contents worker
//!                             ▲                                │
//!                             └────────contents_out────────────┘
//! workers ──telemetry──► telemetry pump ──pub 5581──► broker
//! ```
//!
//! The hand-off channels (`inbound`, `contents_in`) hold a single slot:
//! the socket pump cannot out-run the workers, which is the only
//! backpressure in the daemon (reply channels are unbounded and the
//! broker applies its own). All long-running tasks are linked under one
//! supervisor; the first failure anywhere tears the process down.

pub mod config;
pub mod contents;
pub mod demo;
pub mod error;
pub mod metrics;
pub mod router;
pub mod supervisor;
pub mod telemetry;
pub mod worker;

pub use config::ReaderConfig;
pub use error::{Error, Result};

use bytes::Bytes;

/// A point-query message as received from the broker: four frames.
/// The first two are opaque routing envelopes echoed back on every reply.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub broker_env: Bytes,
    pub client_env: Bytes,
    pub origin: Bytes,
    pub body: Bytes,
}

/// A contents-query message: same envelope discipline, origin in the
/// final frame.
#[derive(Debug, Clone)]
pub struct ContentsRequest {
    pub broker_env: Bytes,
    pub client_env: Bytes,
    pub origin: Bytes,
}

/// One reply on its way back to the broker. An empty payload is the
/// end-of-burst marker closing out a request.
#[derive(Debug, Clone)]
pub struct Reply {
    pub broker_env: Bytes,
    pub client_env: Bytes,
    pub payload: Bytes,
}

impl Reply {
    /// The end-of-burst marker for a request under these envelopes.
    pub fn end_of_burst(broker_env: Bytes, client_env: Bytes) -> Self {
        Reply {
            broker_env,
            client_env,
            payload: Bytes::new(),
        }
    }
}
