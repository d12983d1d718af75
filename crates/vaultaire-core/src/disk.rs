//! On-Disk Bucket Codec
//!
//! A bucket object's body is a plain concatenation of entries. Each entry
//! is a two-byte [`VaultPrefix`] followed by `size` payload bytes:
//!
//! ```text
//! ┌────────┬───────────────┬────────┬───────────────┬─ ─ ─
//! │ prefix │ payload       │ prefix │ payload       │ ...
//! │ 2 B    │ size bytes    │ 2 B    │ size bytes    │
//! └────────┴───────────────┴────────┴───────────────┴─ ─ ─
//! ```
//!
//! With the compression bit set the payload is an LZ4 block in the
//! size-prepended framing. After decompression (or directly, for a raw
//! entry) a `Single` payload is one wire-format [`DataFrame`]; a
//! `Multiple` payload is itself a concatenation of `Single` entries,
//! which the decoder walks with the same loop. Entries within a bucket
//! carry no ordering guarantee; callers filter and sort as they need.
//!
//! Decoding is strict: a truncated prefix, a payload running past the end
//! of the body, or a stray trailing byte all fail the bucket rather than
//! salvaging a partial read. A bucket that cannot be decoded completely
//! cannot be trusted at all.

use crate::error::{Error, Result};
use crate::prefix::{Compression, Quantity, VaultPrefix, DISK_VERSION, MAX_ENTRY_PAYLOAD};
use crate::wire::DataFrame;
use bytes::{BufMut, BytesMut};
use prost::Message;

/// Decode a full bucket body into frames.
pub fn decode_bucket(body: &[u8]) -> Result<Vec<DataFrame>> {
    let mut frames = Vec::new();
    decode_entries(body, &mut frames)?;
    Ok(frames)
}

fn decode_entries(mut body: &[u8], frames: &mut Vec<DataFrame>) -> Result<()> {
    while !body.is_empty() {
        if body.len() < 2 {
            return Err(Error::TruncatedEntry {
                need: 2,
                have: body.len(),
            });
        }
        let prefix = VaultPrefix::decode([body[0], body[1]]);
        let size = prefix.size as usize;
        if body.len() < 2 + size {
            return Err(Error::TruncatedEntry {
                need: 2 + size,
                have: body.len(),
            });
        }
        let payload = &body[2..2 + size];
        body = &body[2 + size..];

        let raw;
        let payload = match prefix.compression {
            Compression::Normal => payload,
            Compression::Compressed => {
                raw = lz4_flex::decompress_size_prepended(payload)?;
                raw.as_slice()
            }
        };
        match prefix.quantity {
            Quantity::Single => frames.push(DataFrame::decode(payload)?),
            Quantity::Multiple => decode_entries(payload, frames)?,
        }
    }
    Ok(())
}

/// Encode one frame as a `Single` entry, compressed when that fits the
/// entry size limit better (or at all).
pub fn encode_frame(frame: &DataFrame, extended: bool) -> Result<BytesMut> {
    let body = frame.encode_to_vec();
    let compressed = lz4_flex::compress_prepend_size(&body);
    let (payload, compression) = if compressed.len() < body.len() {
        (compressed, Compression::Compressed)
    } else {
        (body, Compression::Normal)
    };
    if payload.len() > MAX_ENTRY_PAYLOAD {
        return Err(Error::EntryTooLarge(payload.len()));
    }
    let prefix = VaultPrefix {
        extended,
        version: DISK_VERSION,
        compression,
        quantity: Quantity::Single,
        size: payload.len() as u16,
    };
    let mut out = BytesMut::with_capacity(2 + payload.len());
    out.put_slice(&prefix.encode());
    out.put_slice(&payload);
    Ok(out)
}

/// Encode a whole bucket body, one `Single` entry per frame.
pub fn encode_bucket(frames: &[DataFrame], extended: bool) -> Result<BytesMut> {
    let mut out = BytesMut::new();
    for frame in frames {
        out.extend_from_slice(&encode_frame(frame, extended)?);
    }
    Ok(out)
}

/// Encode frames as one compressed `Multiple` entry: the payload is the
/// concatenation of uncompressed `Single` entries, LZ4'd as a block.
/// Used when many small frames share an upload.
pub fn encode_multiple(frames: &[DataFrame], extended: bool) -> Result<BytesMut> {
    let mut inner = BytesMut::new();
    for frame in frames {
        let body = frame.encode_to_vec();
        if body.len() > MAX_ENTRY_PAYLOAD {
            return Err(Error::EntryTooLarge(body.len()));
        }
        let prefix = VaultPrefix {
            extended,
            version: DISK_VERSION,
            compression: Compression::Normal,
            quantity: Quantity::Single,
            size: body.len() as u16,
        };
        inner.put_slice(&prefix.encode());
        inner.put_slice(&body);
    }
    let payload = lz4_flex::compress_prepend_size(&inner);
    if payload.len() > MAX_ENTRY_PAYLOAD {
        return Err(Error::EntryTooLarge(payload.len()));
    }
    let prefix = VaultPrefix {
        extended,
        version: DISK_VERSION,
        compression: Compression::Compressed,
        quantity: Quantity::Multiple,
        size: payload.len() as u16,
    };
    let mut out = BytesMut::with_capacity(2 + payload.len());
    out.put_slice(&prefix.encode());
    out.put_slice(&payload);
    Ok(out)
}
