use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] zeromq::ZmqError),

    #[error(transparent)]
    Store(#[from] vaultaire_store::Error),

    #[error(transparent)]
    Core(#[from] vaultaire_core::Error),

    #[error("linked task panicked")]
    TaskPanicked,
}
