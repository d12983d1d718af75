//! Client-Facing Wire Codec
//!
//! Everything that crosses the broker is a length-delimited tagged-field
//! record, wire-compatible with Protocol Buffers v2. The schema is small
//! enough that the message structs are written out by hand with prost
//! derives instead of a build-script proto pass:
//!
//! ```text
//! SourceTag           { 1: field (string), 2: value (string) }
//! DataFrame           { 1: source (repeated SourceTag), 2: timestamp (u64),
//!                       3: payload (PayloadKind),
//!                       4: value_numeric (optional i64),
//!                       5: value_measurement (optional f64),
//!                       6: value_textual (optional string),
//!                       7: value_blob (optional bytes) }
//! DataBurst           { 1: frames (repeated DataFrame) }
//! ReadRequest         { 1: address (u64), 2: alpha (u64), 3: omega (u64) }
//! ReadRequestMulti    { 1: requests (repeated ReadRequest) }
//! SourceResponse      { 1: address (u64), 2: source (repeated SourceTag) }
//! SourceResponseBurst { 1: sources (repeated SourceResponse) }
//! ```
//!
//! Forward compatibility: the decoder skips tag numbers it does not know,
//! so a newer writer can add fields without breaking an older reader.
//! A client message may carry several `ReadRequestMulti` encodings
//! back-to-back; protobuf concatenation merges the repeated field, so
//! [`decode_request_multi`] sees one flat request list either way.

use crate::error::{Error, Result};
use crate::origin::Origin;
use crate::point::{Payload, Point};
use crate::source::{Address, SourceDict};
use bytes::Bytes;
use prost::Message;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SourceTag {
    #[prost(string, tag = "1")]
    pub field: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ::prost::Enumeration)]
#[repr(i32)]
pub enum PayloadKind {
    Empty = 0,
    Number = 1,
    Real = 2,
    Text = 3,
    Binary = 4,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataFrame {
    #[prost(message, repeated, tag = "1")]
    pub source: Vec<SourceTag>,
    #[prost(uint64, tag = "2")]
    pub timestamp: u64,
    #[prost(enumeration = "PayloadKind", tag = "3")]
    pub payload: i32,
    #[prost(int64, optional, tag = "4")]
    pub value_numeric: Option<i64>,
    #[prost(double, optional, tag = "5")]
    pub value_measurement: Option<f64>,
    #[prost(string, optional, tag = "6")]
    pub value_textual: Option<String>,
    #[prost(bytes = "bytes", optional, tag = "7")]
    pub value_blob: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataBurst {
    #[prost(message, repeated, tag = "1")]
    pub frames: Vec<DataFrame>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ReadRequest {
    #[prost(uint64, tag = "1")]
    pub address: u64,
    #[prost(uint64, tag = "2")]
    pub alpha: u64,
    #[prost(uint64, tag = "3")]
    pub omega: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadRequestMulti {
    #[prost(message, repeated, tag = "1")]
    pub requests: Vec<ReadRequest>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SourceResponse {
    #[prost(uint64, tag = "1")]
    pub address: u64,
    #[prost(message, repeated, tag = "2")]
    pub source: Vec<SourceTag>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SourceResponseBurst {
    #[prost(message, repeated, tag = "1")]
    pub sources: Vec<SourceResponse>,
}

/// One parsed client query: "give me the points for this series between
/// alpha and omega", scoped to the origin the message arrived under.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadQuery {
    pub origin: Origin,
    pub address: Address,
    pub alpha: u64,
    pub omega: u64,
}

impl DataFrame {
    /// Build a frame from a point. Exactly one value field is populated
    /// unless the payload is `Empty`.
    pub fn from_point(point: &Point) -> Self {
        let mut frame = DataFrame {
            source: tags_from_dict(&point.source),
            timestamp: point.timestamp,
            ..Default::default()
        };
        match &point.payload {
            Payload::Empty => frame.payload = PayloadKind::Empty as i32,
            Payload::Numeric(n) => {
                frame.payload = PayloadKind::Number as i32;
                frame.value_numeric = Some(*n);
            }
            Payload::Measurement(r) => {
                frame.payload = PayloadKind::Real as i32;
                frame.value_measurement = Some(*r);
            }
            Payload::Textual(t) => {
                frame.payload = PayloadKind::Text as i32;
                frame.value_textual = Some(t.clone());
            }
            Payload::Blob(b) => {
                frame.payload = PayloadKind::Binary as i32;
                frame.value_blob = Some(b.clone());
            }
        }
        frame
    }

    /// Reconstruct the point this frame describes. A missing value field
    /// decodes as that kind's default, matching proto2 canonicalization
    /// of default-valued fields.
    pub fn into_point(self, origin: Origin) -> Result<Point> {
        let kind =
            PayloadKind::try_from(self.payload).map_err(|_| Error::UnknownPayloadKind(self.payload))?;
        let payload = match kind {
            PayloadKind::Empty => Payload::Empty,
            PayloadKind::Number => Payload::Numeric(self.value_numeric.unwrap_or(0)),
            PayloadKind::Real => Payload::Measurement(self.value_measurement.unwrap_or(0.0)),
            PayloadKind::Text => Payload::Textual(self.value_textual.unwrap_or_default()),
            PayloadKind::Binary => Payload::Blob(self.value_blob.unwrap_or_default()),
        };
        Ok(Point {
            origin,
            source: dict_from_tags(&self.source),
            timestamp: self.timestamp,
            payload,
        })
    }
}

fn tags_from_dict(dict: &SourceDict) -> Vec<SourceTag> {
    dict.iter()
        .map(|(k, v)| SourceTag {
            field: k.to_owned(),
            value: v.to_owned(),
        })
        .collect()
}

fn dict_from_tags(tags: &[SourceTag]) -> SourceDict {
    tags.iter()
        .map(|t| (t.field.clone(), t.value.clone()))
        .collect()
}

/// Encode points as a `DataBurst`, preserving input order.
pub fn encode_points(points: &[Point]) -> Bytes {
    encode_frames(points.iter().map(DataFrame::from_point).collect())
}

/// Encode already-built frames as a `DataBurst`, preserving input order.
pub fn encode_frames(frames: Vec<DataFrame>) -> Bytes {
    let burst = DataBurst { frames };
    Bytes::from(burst.encode_to_vec())
}

/// Decode a `DataBurst` back into points under the given origin.
pub fn decode_burst(origin: &Origin, bytes: &[u8]) -> Result<Vec<Point>> {
    let burst = DataBurst::decode(bytes)?;
    burst
        .frames
        .into_iter()
        .map(|f| f.into_point(origin.clone()))
        .collect()
}

/// Parse the request body of a client message: zero or more read requests.
///
/// Malformed bytes fail the whole batch; there is no partial recovery
/// because the framing gives no resynchronization point.
pub fn decode_request_multi(origin: &Origin, bytes: &[u8]) -> Result<Vec<ReadQuery>> {
    let multi = ReadRequestMulti::decode(bytes)?;
    Ok(multi
        .requests
        .into_iter()
        .map(|r| ReadQuery {
            origin: origin.clone(),
            address: Address(r.address),
            alpha: r.alpha,
            omega: r.omega,
        })
        .collect())
}

/// Encode a source listing for a contents reply.
pub fn encode_sources<'a>(entries: impl IntoIterator<Item = (Address, &'a SourceDict)>) -> Bytes {
    let burst = SourceResponseBurst {
        sources: entries
            .into_iter()
            .map(|(address, dict)| SourceResponse {
                address: address.0,
                source: tags_from_dict(dict),
            })
            .collect(),
    };
    Bytes::from(burst.encode_to_vec())
}

/// Keep only the frames whose timestamp falls inside `[alpha, omega]`
/// (both bounds inclusive).
pub fn frames_in_range(alpha: u64, omega: u64, mut frames: Vec<DataFrame>) -> Vec<DataFrame> {
    frames.retain(|f| alpha <= f.timestamp && f.timestamp <= omega);
    frames
}
