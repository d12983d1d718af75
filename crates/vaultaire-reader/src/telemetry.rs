//! Telemetry Side-Channel
//!
//! Workers report coarse events (how long a request took, that a parse
//! failed) as `(key, value, unit)` tuples on an unbounded channel. The
//! telemetry pump decorates each tuple with the daemon's identity
//! (`progname/pid`) and hostname and publishes the five frames to the
//! broker's pub socket. Cooperative and lossy by design: telemetry must
//! never block or fail a query.

use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEvent {
    pub key: String,
    pub value: String,
    pub unit: String,
}

impl TelemetryEvent {
    /// Wall-clock duration of one handled request.
    pub fn duration(elapsed: Duration) -> Self {
        TelemetryEvent {
            key: "duration".to_string(),
            value: format!("{:9.3}", elapsed.as_secs_f64()),
            unit: "seconds".to_string(),
        }
    }

    /// A recovered ingress failure.
    pub fn error(message: impl Into<String>) -> Self {
        TelemetryEvent {
            key: "error".to_string(),
            value: message.into(),
            unit: String::new(),
        }
    }
}

pub type TelemetrySender = mpsc::UnboundedSender<TelemetryEvent>;
pub type TelemetryReceiver = mpsc::UnboundedReceiver<TelemetryEvent>;

/// `progname/pid`, the identifier frame of every published tuple.
pub fn identity() -> String {
    let progname = std::env::args()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
    format!("{}/{}", progname, std::process::id())
}

/// The local hostname frame.
pub fn local_hostname() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}
