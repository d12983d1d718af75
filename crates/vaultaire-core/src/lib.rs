//! Vaultaire Core Types and Codecs
//!
//! This crate contains everything the Vaultaire daemons agree on without
//! talking to each other: the domain types (origins, source dictionaries,
//! points), the client-facing wire codec, the on-disk bucket codec, and the
//! arithmetic that maps a `(origin, address, timestamp)` triple onto an
//! object in the vault.
//!
//! ## The Shape of the Vault
//!
//! ```text
//! ┌────────────┐   DataBurst (wire codec)    ┌──────────────┐
//! │   Client   │ ◄────────────────────────── │ Reader daemon│
//! └────────────┘                             └──────┬───────┘
//!                                                   │ bucket objects
//!                                                   ▼ (disk codec)
//!                                          ┌─────────────────┐
//!                                          │  Object store    │
//!                                          │ 02_<origin>_...  │
//!                                          └─────────────────┘
//! ```
//!
//! ## Main Components
//!
//! - [`Origin`], [`SourceDict`], [`Address`], [`Point`]: the data model.
//! - [`wire`]: tagged-record encoding of bursts, read requests and source
//!   listings (Protocol Buffers v2 compatible; unknown tags are skipped).
//! - [`prefix`] and [`disk`]: the two-byte packed [`prefix::VaultPrefix`]
//!   and the length-framed, optionally LZ4-compressed bucket entry format.
//! - [`bucket`]: timemark arithmetic and the `02_` object-naming schema.
//! - [`daymap`]: the per-origin epoch → bucket-count maps.
//!
//! Everything here is pure: no sockets, no store handles, no clocks.

pub mod bucket;
pub mod daymap;
pub mod disk;
pub mod error;
pub mod origin;
pub mod point;
pub mod prefix;
pub mod source;
pub mod wire;

pub use bucket::{BucketKind, EPOCH_WINDOW_NS};
pub use daymap::DayMap;
pub use error::{Error, Result};
pub use origin::Origin;
pub use point::{Payload, Point};
pub use source::{Address, SourceDict};
