use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error(transparent)]
    Core(#[from] vaultaire_core::Error),

    #[error("wire decode error: {0}")]
    WireDecode(#[from] prost::DecodeError),

    /// A day file we previously loaded can no longer be stat'd. The cache
    /// cannot be trusted once the store disagrees with it; callers treat
    /// this as fatal.
    #[error("day file {oid} cannot be trusted: {detail}")]
    CacheInconsistent { oid: String, detail: String },
}
