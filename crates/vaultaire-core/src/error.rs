//! Core Error Types
//!
//! Everything in this crate is a pure codec or arithmetic, so errors are
//! all of the "these bytes are not what they claim to be" family. Store
//! and transport failures live in the crates that own those concerns.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid origin {0:?}: origins are non-empty ASCII alphanumerics")]
    InvalidOrigin(String),

    #[error("wire decode error: {0}")]
    WireDecode(#[from] prost::DecodeError),

    #[error("unknown payload kind {0}")]
    UnknownPayloadKind(i32),

    #[error("bucket entry truncated: need {need} bytes, have {have}")]
    TruncatedEntry { need: usize, have: usize },

    #[error("bucket entry payload of {0} bytes exceeds the 1023-byte entry limit")]
    EntryTooLarge(usize),

    #[error("LZ4 decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    #[error("day map of {0} bytes is not a whole number of 16-byte entries")]
    MalformedDayMap(usize),
}
