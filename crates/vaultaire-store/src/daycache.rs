//! Day-Map Cache
//!
//! Every point query needs the origin's day maps to turn timemarks into
//! `(epoch, bucket count)` pairs. Loading both day files on every request
//! would double the store round-trips, so each worker keeps a private
//! per-origin cache and validates it with a cheap token: day files only
//! ever grow (rebucketing appends an entry), so *byte length* is a
//! reliable freshness check. Same length, same map: two `stat` calls
//! replace two reads.
//!
//! ## Failure Policy
//!
//! - Load failure (missing or unreadable day files on a refresh): log and
//!   keep whatever is cached. Serving from a slightly stale map beats
//!   serving nothing.
//! - `stat` failure on an origin we *have* cached: fatal. If the store
//!   cannot even describe a file we previously read, the cache cannot be
//!   trusted, and a reader serving untrusted data is worse than a dead
//!   one. The error propagates out and takes the daemon down through
//!   linked supervision.

use crate::error::{Error, Result};
use crate::lock::with_shared_lock;
use crate::pool::StorePool;
use std::collections::HashMap;
use vaultaire_core::bucket::{extended_day_oid, simple_day_oid};
use vaultaire_core::{DayMap, Origin};

/// Cached day maps for one origin, with the byte-length tokens of the
/// loads that produced them.
#[derive(Debug, Clone, Default)]
pub struct OriginDays {
    pub simple_len: u64,
    pub simple: DayMap,
    pub extended_len: u64,
    pub extended: DayMap,
}

/// Per-worker day-map cache. Not shared across workers: each worker pays
/// for its own loads, and in exchange no query ever contends on a lock
/// for map access.
#[derive(Debug, Default)]
pub struct DayCache {
    origins: HashMap<String, OriginDays>,
}

impl DayCache {
    pub fn new() -> Self {
        DayCache::default()
    }

    /// Read-only view of the cached simple day map, or `None` when the
    /// origin is not cached.
    pub fn with_simple_day_map<T>(&self, origin: &Origin, f: impl FnOnce(&DayMap) -> T) -> Option<T> {
        self.origins.get(origin.as_str()).map(|days| f(&days.simple))
    }

    /// Read-only view of the cached extended day map, or `None` when the
    /// origin is not cached.
    pub fn with_extended_day_map<T>(
        &self,
        origin: &Origin,
        f: impl FnOnce(&DayMap) -> T,
    ) -> Option<T> {
        self.origins
            .get(origin.as_str())
            .map(|days| f(&days.extended))
    }

    /// Make the cached maps for `origin` current: a no-op when the cached
    /// entry is still valid, a (re)load of both day files otherwise.
    /// Returns whether the day files were actually re-read.
    pub async fn refresh_origin_days(&mut self, pool: &StorePool, origin: &Origin) -> Result<bool> {
        if self.origins.contains_key(origin.as_str())
            && !self.cache_expired(pool, origin).await?
        {
            return Ok(false);
        }

        match Self::load(pool, origin).await {
            Ok(Some(days)) => {
                tracing::debug!(
                    origin = %origin,
                    simple_epochs = days.simple.len(),
                    extended_epochs = days.extended.len(),
                    "day maps loaded"
                );
                self.origins.insert(origin.as_str().to_string(), days);
                Ok(true)
            }
            Ok(None) => {
                tracing::debug!(origin = %origin, "origin has no day files");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "day map load failed, cache unchanged");
                Ok(false)
            }
        }
    }

    /// Compare the cached byte-length tokens against the store. Any
    /// `stat` surprise on a cached origin is a [`Error::CacheInconsistent`].
    async fn cache_expired(&self, pool: &StorePool, origin: &Origin) -> Result<bool> {
        let days = match self.origins.get(origin.as_str()) {
            Some(days) => days,
            None => return Ok(true),
        };

        let simple_oid = simple_day_oid(origin);
        match pool.stat(&simple_oid).await {
            Ok(Some(len)) if len != days.simple_len => return Ok(true),
            Ok(Some(_)) => {}
            Ok(None) if days.simple_len == 0 => {}
            Ok(None) => {
                return Err(Error::CacheInconsistent {
                    oid: simple_oid,
                    detail: "previously loaded day file is gone".into(),
                })
            }
            Err(e) => {
                return Err(Error::CacheInconsistent {
                    oid: simple_oid,
                    detail: e.to_string(),
                })
            }
        }

        let extended_oid = extended_day_oid(origin);
        match pool.stat(&extended_oid).await {
            Ok(Some(len)) => Ok(len != days.extended_len),
            Ok(None) if days.extended_len == 0 => Ok(false),
            Ok(None) => Err(Error::CacheInconsistent {
                oid: extended_oid,
                detail: "previously loaded day file is gone".into(),
            }),
            Err(e) => Err(Error::CacheInconsistent {
                oid: extended_oid,
                detail: e.to_string(),
            }),
        }
    }

    /// Load both day files under a shared lease on the simple day file
    /// (writers take the exclusive side when rolling an origin over).
    /// `None` when the origin has neither file.
    async fn load(pool: &StorePool, origin: &Origin) -> Result<Option<OriginDays>> {
        let simple_oid = simple_day_oid(origin);
        let extended_oid = extended_day_oid(origin);
        with_shared_lock(pool, &simple_oid, || async {
            let simple_bytes = pool.read_full(&simple_oid).await?;
            let extended_bytes = pool.read_full(&extended_oid).await?;
            if simple_bytes.is_none() && extended_bytes.is_none() {
                return Ok(None);
            }
            let simple_bytes = simple_bytes.unwrap_or_default();
            let extended_bytes = extended_bytes.unwrap_or_default();
            Ok(Some(OriginDays {
                simple_len: simple_bytes.len() as u64,
                simple: DayMap::parse(&simple_bytes)?,
                extended_len: extended_bytes.len() as u64,
                extended: DayMap::parse(&extended_bytes)?,
            }))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::StoreConfig;
    use bytes::Bytes;
    use vaultaire_core::daymap::serialize_entries;

    async fn scratch_pool(dir: &tempfile::TempDir) -> StorePool {
        StorePool::connect(
            "testuser",
            "testpool",
            &StoreConfig::Local {
                path: dir.path().to_path_buf(),
            },
        )
        .await
        .unwrap()
    }

    fn origin() -> Origin {
        Origin::new("testorigin").unwrap()
    }

    async fn seed_days(pool: &StorePool, simple: &[(u64, u64)], extended: &[(u64, u64)]) {
        pool.put_full(
            &simple_day_oid(&origin()),
            Bytes::from(serialize_entries(simple)),
        )
        .await
        .unwrap();
        pool.put_full(
            &extended_day_oid(&origin()),
            Bytes::from(serialize_entries(extended)),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_uncached_origin_reports_none() {
        let cache = DayCache::new();
        assert!(cache
            .with_simple_day_map(&origin(), |m| m.len())
            .is_none());
        assert!(cache
            .with_extended_day_map(&origin(), |m| m.len())
            .is_none());
    }

    #[tokio::test]
    async fn test_refresh_loads_both_maps() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir).await;
        seed_days(&pool, &[(0, 128)], &[(0, 8)]).await;

        let mut cache = DayCache::new();
        assert!(cache.refresh_origin_days(&pool, &origin()).await.unwrap());

        assert_eq!(
            cache.with_simple_day_map(&origin(), |m| m.lookup(10)),
            Some(Some((0, 128)))
        );
        assert_eq!(
            cache.with_extended_day_map(&origin(), |m| m.lookup(10)),
            Some(Some((0, 8)))
        );
    }

    #[tokio::test]
    async fn test_unchanged_sizes_skip_the_reload() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir).await;
        seed_days(&pool, &[(0, 128)], &[]).await;

        let mut cache = DayCache::new();
        cache.refresh_origin_days(&pool, &origin()).await.unwrap();

        // Rewrite the simple day file with different content but the SAME
        // length. A second refresh must trust its token and keep the old
        // map: proof that no read happened.
        pool.put_full(
            &simple_day_oid(&origin()),
            Bytes::from(serialize_entries(&[(999, 7)])),
        )
        .await
        .unwrap();
        assert!(!cache.refresh_origin_days(&pool, &origin()).await.unwrap());
        assert_eq!(
            cache.with_simple_day_map(&origin(), |m| m.lookup(1_000)),
            Some(Some((0, 128)))
        );
    }

    #[tokio::test]
    async fn test_grown_day_file_forces_reload_of_both() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir).await;
        seed_days(&pool, &[(0, 128)], &[(0, 8)]).await;

        let mut cache = DayCache::new();
        cache.refresh_origin_days(&pool, &origin()).await.unwrap();

        // Rebucketing appended an epoch to the simple file; the extended
        // file changed content at the same length. The reload triggered by
        // the simple token must refresh both.
        seed_days(&pool, &[(0, 128), (5_000, 256)], &[(0, 16)]).await;
        assert!(cache.refresh_origin_days(&pool, &origin()).await.unwrap());

        assert_eq!(
            cache.with_simple_day_map(&origin(), |m| m.lookup(6_000)),
            Some(Some((5_000, 256)))
        );
        assert_eq!(
            cache.with_extended_day_map(&origin(), |m| m.lookup(0)),
            Some(Some((0, 16)))
        );
    }

    #[tokio::test]
    async fn test_missing_day_files_leave_cache_unpopulated() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir).await;

        let mut cache = DayCache::new();
        cache.refresh_origin_days(&pool, &origin()).await.unwrap();
        assert!(cache.with_simple_day_map(&origin(), |_| ()).is_none());
    }

    #[tokio::test]
    async fn test_malformed_day_file_keeps_previous_maps() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir).await;
        seed_days(&pool, &[(0, 128)], &[]).await;

        let mut cache = DayCache::new();
        cache.refresh_origin_days(&pool, &origin()).await.unwrap();

        // Torn write: 17 bytes. Load fails, cached map survives.
        pool.put_full(&simple_day_oid(&origin()), Bytes::from(vec![0u8; 17]))
            .await
            .unwrap();
        cache.refresh_origin_days(&pool, &origin()).await.unwrap();
        assert_eq!(
            cache.with_simple_day_map(&origin(), |m| m.lookup(5)),
            Some(Some((0, 128)))
        );
    }

    #[tokio::test]
    async fn test_vanished_day_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir).await;
        seed_days(&pool, &[(0, 128)], &[(0, 8)]).await;

        let mut cache = DayCache::new();
        cache.refresh_origin_days(&pool, &origin()).await.unwrap();

        pool.delete(&simple_day_oid(&origin())).await.unwrap();
        let result = cache.refresh_origin_days(&pool, &origin()).await;
        assert!(matches!(result, Err(Error::CacheInconsistent { .. })));
    }
}
