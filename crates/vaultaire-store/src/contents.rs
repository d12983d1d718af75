//! Source Directory
//!
//! The per-origin catalogue behind contents queries: which source
//! dictionaries exist under an origin, keyed by address. The on-store
//! form is the `02_<origin>_contents` object, a `SourceResponseBurst` in
//! the wire encoding; the in-memory form is a map the contents worker
//! refreshes on demand and then enumerates.
//!
//! Refreshing merges rather than replaces: a contents object written by
//! an older writer may lag the directory, and forgetting sources the
//! daemon has already served would make listings flap.

use crate::error::Result;
use crate::pool::StorePool;
use prost::Message;
use std::collections::{BTreeMap, HashMap};
use vaultaire_core::bucket::contents_oid;
use vaultaire_core::wire::SourceResponseBurst;
use vaultaire_core::{Address, Origin, SourceDict};

/// In-memory catalogue of source dictionaries per origin.
#[derive(Debug, Default)]
pub struct SourceDirectory {
    origins: HashMap<String, BTreeMap<u64, SourceDict>>,
}

impl SourceDirectory {
    pub fn new() -> Self {
        SourceDirectory::default()
    }

    /// Pull the contents object for `origin` and merge it in. A missing
    /// object leaves the directory as it was.
    pub async fn refresh(&mut self, pool: &StorePool, origin: &Origin) -> Result<()> {
        let oid = contents_oid(origin);
        let Some(bytes) = pool.read_full(&oid).await? else {
            tracing::debug!(origin = %origin, "no contents object");
            return Ok(());
        };
        let burst = SourceResponseBurst::decode(bytes.as_ref())?;
        let entry = self.origins.entry(origin.as_str().to_string()).or_default();
        for response in burst.sources {
            let dict: SourceDict = response
                .source
                .iter()
                .map(|t| (t.field.clone(), t.value.clone()))
                .collect();
            entry.insert(response.address, dict);
        }
        tracing::debug!(origin = %origin, sources = entry.len(), "directory refreshed");
        Ok(())
    }

    /// All known sources for `origin`, in address order.
    pub fn enumerate(&self, origin: &Origin) -> Vec<(Address, SourceDict)> {
        self.origins
            .get(origin.as_str())
            .map(|entry| {
                entry
                    .iter()
                    .map(|(&address, dict)| (Address(address), dict.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Record a source directly, bypassing the store.
    pub fn insert(&mut self, origin: &Origin, dict: SourceDict) {
        self.origins
            .entry(origin.as_str().to_string())
            .or_default()
            .insert(dict.address().0, dict);
    }
}
