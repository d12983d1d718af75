//! Day Maps
//!
//! A day map is the per-origin table of `(epoch start, bucket count)`
//! pairs that tells the reader how the keyspace was sharded at any point
//! in history. Rebucketing an origin appends an entry; existing data is
//! never rewritten, so the map only grows. That growth is what makes the
//! file's byte length usable as a cache-validity token: same length,
//! same map.
//!
//! The serialized form is the bare table: consecutive little-endian
//! `u64` pairs, sixteen bytes per entry, no header. A file whose length
//! is not a multiple of sixteen was torn mid-write and is rejected.

use crate::error::{Error, Result};
use bytes::Buf;

/// Ordered `(epoch start, bucket count)` table for one origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayMap {
    entries: Vec<(u64, u64)>,
}

impl DayMap {
    /// Parse a day file body. Entries are sorted by start on the way in,
    /// so lookups can binary-search regardless of on-disk order.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 16 != 0 {
            return Err(Error::MalformedDayMap(bytes.len()));
        }
        let mut buf = bytes;
        let mut entries = Vec::with_capacity(bytes.len() / 16);
        while buf.remaining() >= 16 {
            let start = buf.get_u64_le();
            let count = buf.get_u64_le();
            entries.push((start, count));
        }
        entries.sort_unstable_by_key(|&(start, _)| start);
        Ok(DayMap { entries })
    }

    /// The epoch governing `t`: the entry with the greatest start ≤ t.
    /// `None` when `t` predates the first epoch (or the map is empty).
    pub fn lookup(&self, t: u64) -> Option<(u64, u64)> {
        match self.entries.binary_search_by_key(&t, |&(start, _)| start) {
            Ok(i) => Some(self.entries[i]),
            Err(0) => None,
            Err(i) => Some(self.entries[i - 1]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(u64, u64)] {
        &self.entries
    }
}

/// Serialize a day map table; the writer-side inverse of [`DayMap::parse`],
/// used here by tooling and tests.
pub fn serialize_entries(entries: &[(u64, u64)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * 16);
    for &(start, count) in entries {
        out.extend_from_slice(&start.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
    }
    out
}
