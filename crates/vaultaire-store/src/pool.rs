//! Object Store Pool
//!
//! `StorePool` is the façade every worker talks to the vault through. It
//! wraps an `object_store` backend (S3-compatible gateway in production,
//! local filesystem in development and tests) with the small operation
//! set the readers need: read-full, stat, exists, and the conditional
//! create that the lock layer builds leases from.
//!
//! ## The Connect Mutex
//!
//! The native store client's connect routine is not safe to run from two
//! threads at once (librados issue #2525: racing connects corrupt shared
//! client state). Every pool construction therefore serializes on a
//! process-wide mutex, held from the start of backend construction until
//! the liveness probe has succeeded. Only connection setup is serialized;
//! operations on a live pool run fully concurrently.

use crate::error::{Error, Result};
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::{ObjectStore, PutMode, PutPayload};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Serializes pool construction process-wide. Held across connect and the
/// liveness probe, released only once the pool is usable.
static CONNECT_MUTEX: Mutex<()> = Mutex::const_new(());

/// Which backend a pool connects to.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Local filesystem rooted at the given directory.
    Local { path: PathBuf },
    /// S3-compatible gateway; credentials and endpoint come from the
    /// environment (`AWS_*`, `S3_ENDPOINT`).
    S3 { bucket: String },
}

impl StoreConfig {
    /// Backend selection from the environment: `VAULTAIRE_STORE_PATH`
    /// forces a local store, otherwise S3 with `VAULTAIRE_BUCKET`
    /// (default `vaultaire`).
    pub fn from_env() -> Self {
        match std::env::var("VAULTAIRE_STORE_PATH") {
            Ok(path) => StoreConfig::Local { path: path.into() },
            Err(_) => StoreConfig::S3 {
                bucket: std::env::var("VAULTAIRE_BUCKET")
                    .unwrap_or_else(|_| "vaultaire".to_string()),
            },
        }
    }
}

/// A live connection to one storage pool, scoped to a user.
#[derive(Clone)]
pub struct StorePool {
    backend: Arc<dyn ObjectStore>,
    user: String,
    pool: String,
}

impl StorePool {
    /// Connect to the configured backend. Serialized on the global
    /// connect mutex; see the module docs.
    pub async fn connect(user: &str, pool: &str, config: &StoreConfig) -> Result<Self> {
        let guard = CONNECT_MUTEX.lock().await;
        let backend: Arc<dyn ObjectStore> = match config {
            StoreConfig::Local { path } => {
                std::fs::create_dir_all(path).map_err(|source| object_store::Error::Generic {
                    store: "LocalFileSystem",
                    source: Box::new(source),
                })?;
                Arc::new(LocalFileSystem::new_with_prefix(path)?)
            }
            StoreConfig::S3 { bucket } => Arc::new(
                AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .build()?,
            ),
        };
        let connected = Self::probe(backend, user, pool).await?;
        drop(guard);
        Ok(connected)
    }

    /// Connect over an already-built backend. Also serialized; tests and
    /// embedding tools use this to share one in-memory or scratch store.
    pub async fn connect_with(
        user: &str,
        pool: &str,
        backend: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        let guard = CONNECT_MUTEX.lock().await;
        let connected = Self::probe(backend, user, pool).await?;
        drop(guard);
        Ok(connected)
    }

    /// Liveness probe: stat a sentinel key. Absence is fine (a fresh pool
    /// has no objects); only transport or auth failures propagate.
    async fn probe(backend: Arc<dyn ObjectStore>, user: &str, pool: &str) -> Result<Self> {
        let sentinel = Path::from(format!("00_{}_probe", pool));
        match backend.head(&sentinel).await {
            Ok(_) | Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(user = %user, pool = %pool, "store pool connected");
        Ok(StorePool {
            backend,
            user: user.to_string(),
            pool: pool.to_string(),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Read an entire object. `None` when it does not exist.
    pub async fn read_full(&self, oid: &str) -> Result<Option<Bytes>> {
        match self.backend.get(&Path::from(oid)).await {
            Ok(result) => Ok(Some(result.bytes().await?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Object size in bytes. `None` when it does not exist.
    pub async fn stat(&self, oid: &str) -> Result<Option<u64>> {
        match self.backend.head(&Path::from(oid)).await {
            Ok(meta) => Ok(Some(meta.size as u64)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, oid: &str) -> Result<bool> {
        Ok(self.stat(oid).await?.is_some())
    }

    /// Write an object unconditionally.
    pub async fn put_full(&self, oid: &str, bytes: Bytes) -> Result<()> {
        self.backend
            .put(&Path::from(oid), PutPayload::from(bytes))
            .await?;
        Ok(())
    }

    /// Create an object only if it does not already exist. Returns
    /// `false` when someone else holds the name. This is the atomic
    /// primitive the lock layer is built on.
    pub async fn put_create(&self, oid: &str, bytes: Bytes) -> Result<bool> {
        match self
            .backend
            .put_opts(&Path::from(oid), PutPayload::from(bytes), PutMode::Create.into())
            .await
        {
            Ok(_) => Ok(true),
            Err(object_store::Error::AlreadyExists { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, oid: &str) -> Result<()> {
        match self.backend.delete(&Path::from(oid)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for StorePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorePool")
            .field("user", &self.user)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
