//! Lease Locks
//!
//! Advisory locks built from atomically-created lock objects. The store
//! offers no native locking, only create-if-absent, so a lock on `oid` is
//! the object `<oid>.lock` whose nine-byte body records the holder's mode
//! and lease deadline:
//!
//! ```text
//! ┌──────┬──────────────────────────────┐
//! │ mode │ lease deadline (unix secs LE)│
//! │ 1 B  │ 8 B                          │
//! └──────┴──────────────────────────────┘
//! ```
//!
//! - An **exclusive** holder creates the object with mode `x`; everyone
//!   else waits.
//! - A **shared** holder creates it with mode `s`, or piggybacks on an
//!   existing live `s` object. Shared holders are not reference-counted;
//!   the lease deadline is what eventually clears the object if the
//!   creating reader dies. Only the creator deletes on release.
//! - A lock object whose deadline has passed is stale and is broken by
//!   the next contender.
//!
//! Acquisition polls on a 10 ms tick. The lease runs `LOCK_TIMEOUT + 5`
//! seconds; a watchdog armed at acquisition aborts the whole process if
//! `LOCK_TIMEOUT` elapses before release. A daemon wedged inside a lock
//! for ten minutes is serving nobody, and a hard stop under supervision
//! beats holding the vault hostage.

use crate::error::Result;
use crate::pool::StorePool;
use bytes::Bytes;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

/// How long a lock may be held before the watchdog kills the process.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(600);

/// Lease recorded in the lock object: `LOCK_TIMEOUT` plus slack so the
/// watchdog always fires before the lease lapses out from under a live
/// holder.
pub const LOCK_LEASE: Duration = Duration::from_secs(605);

const ACQUIRE_POLL: Duration = Duration::from_millis(10);

const MODE_SHARED: u8 = b's';
const MODE_EXCLUSIVE: u8 = b'x';

fn lock_oid(oid: &str) -> String {
    format!("{}.lock", oid)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn lock_body(mode: u8) -> Bytes {
    let mut body = Vec::with_capacity(9);
    body.push(mode);
    body.extend_from_slice(&(now_secs() + LOCK_LEASE.as_secs()).to_le_bytes());
    Bytes::from(body)
}

fn parse_lock_body(body: &[u8]) -> Option<(u8, u64)> {
    if body.len() != 9 {
        return None;
    }
    let deadline = u64::from_le_bytes(body[1..9].try_into().ok()?);
    Some((body[0], deadline))
}

struct Watchdog {
    handle: JoinHandle<()>,
}

impl Watchdog {
    fn arm(oid: String) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(LOCK_TIMEOUT).await;
            tracing::error!(oid = %oid, "lock held past watchdog timeout, aborting");
            std::process::abort();
        });
        Watchdog { handle }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Run `action` while holding a shared lease on `oid`.
pub async fn with_shared_lock<F, Fut, T>(pool: &StorePool, oid: &str, action: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let lock = lock_oid(oid);
    let created = loop {
        match pool.read_full(&lock).await? {
            None => {
                if pool.put_create(&lock, lock_body(MODE_SHARED)).await? {
                    break true;
                }
                // Lost the create race; look again at what won.
            }
            Some(body) => match parse_lock_body(&body) {
                Some((_, deadline)) if deadline < now_secs() => {
                    pool.delete(&lock).await?;
                }
                Some((MODE_SHARED, _)) => break false,
                _ => tokio::time::sleep(ACQUIRE_POLL).await,
            },
        }
    };

    let watchdog = Watchdog::arm(lock.clone());
    let result = action().await;
    if created {
        pool.delete(&lock).await?;
    }
    drop(watchdog);
    result
}

/// Run `action` while holding an exclusive lease on `oid`.
pub async fn with_exclusive_lock<F, Fut, T>(pool: &StorePool, oid: &str, action: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let lock = lock_oid(oid);
    loop {
        if pool.put_create(&lock, lock_body(MODE_EXCLUSIVE)).await? {
            break;
        }
        match pool.read_full(&lock).await? {
            Some(body) => match parse_lock_body(&body) {
                Some((_, deadline)) if deadline < now_secs() => {
                    pool.delete(&lock).await?;
                }
                _ => tokio::time::sleep(ACQUIRE_POLL).await,
            },
            None => {} // released between create and read; retry at once
        }
    }

    let watchdog = Watchdog::arm(lock.clone());
    let result = action().await;
    pool.delete(&lock).await?;
    drop(watchdog);
    result
}
