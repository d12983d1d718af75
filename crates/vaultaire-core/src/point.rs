//! Points
//!
//! A point is one observation in one metric series: who (origin + source
//! dictionary), when (nanoseconds since the Unix epoch), and what (a
//! tagged payload). Fixed-width payloads (counters, gauges) live in the
//! *simple* half of the vault; variable-width payloads (text, blobs) live
//! in the *extended* half and are tracked by a separate day map.

use crate::origin::Origin;
use crate::source::{Address, SourceDict};
use bytes::Bytes;

/// The value carried by a [`Point`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Presence only: "this series existed at this instant".
    Empty,
    /// Signed 64-bit counter or gauge.
    Numeric(i64),
    /// Floating-point measurement.
    Measurement(f64),
    /// Free-form text (extended storage).
    Textual(String),
    /// Opaque bytes (extended storage).
    Blob(Bytes),
}

impl Payload {
    /// Whether this payload is stored out in the extended bucket family.
    pub fn is_extended(&self) -> bool {
        matches!(self, Payload::Textual(_) | Payload::Blob(_))
    }
}

/// One observation in one series.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub origin: Origin,
    pub source: SourceDict,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: u64,
    pub payload: Payload,
}

impl Point {
    pub fn new(origin: Origin, source: SourceDict, timestamp: u64, payload: Payload) -> Self {
        Point {
            origin,
            source,
            timestamp,
            payload,
        }
    }

    /// Fingerprint of the source dictionary; decides the bucket index.
    pub fn address(&self) -> Address {
        self.source.address()
    }
}
