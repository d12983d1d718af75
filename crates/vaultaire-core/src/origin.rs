//! Origin identifiers
//!
//! An origin names a tenant namespace. It is spliced verbatim into every
//! object key in the vault (`02_<origin>_...`), so the constructor rejects
//! anything that would corrupt key parsing: empty strings and non-ASCII or
//! non-alphanumeric bytes (underscores are the key separator).

use crate::error::{Error, Result};
use std::fmt;

/// Tenant namespace identifier, used as a prefix in every object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin(String);

impl Origin {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(Error::InvalidOrigin(name));
        }
        Ok(Origin(name))
    }

    /// Parse an origin from a raw message frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let s = std::str::from_utf8(bytes)
            .map_err(|_| Error::InvalidOrigin(String::from_utf8_lossy(bytes).into_owned()))?;
        Origin::new(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
