//! Vaultaire Store Layer
//!
//! This crate sits between the pure codecs in `vaultaire-core` and the
//! reader daemon: everything that touches the object store lives here.
//!
//! ## Components
//!
//! - [`pool::StorePool`]: the thread-safe façade over the object-store
//!   client. Construction is serialized behind a global connect mutex
//!   (the native client's connect path has a documented race); every
//!   per-object operation after that runs concurrently.
//! - [`lock`]: lease locks built from atomically-created lock objects,
//!   with a watchdog that kills the process rather than let a wedged
//!   store hold a lock forever.
//! - [`daycache::DayCache`]: per-origin day maps with byte-length
//!   validity tokens, so an unchanged origin costs two `stat` calls and
//!   zero reads.
//! - [`contents::SourceDirectory`]: the cached per-origin source
//!   dictionary listing behind contents queries.

pub mod contents;
pub mod daycache;
pub mod error;
pub mod lock;
pub mod pool;

pub use contents::SourceDirectory;
pub use daycache::{DayCache, OriginDays};
pub use error::{Error, Result};
pub use pool::{StoreConfig, StorePool};
