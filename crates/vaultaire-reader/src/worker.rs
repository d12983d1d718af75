//! Reader Workers
//!
//! Each worker owns a store pool and a private day-map cache and drains
//! the shared single-slot inbound channel. For every request in a
//! message it walks the intersecting timemarks, fetches the simple and
//! extended bucket objects the day maps point at, filters the decoded
//! frames to the query range, and streams each bucket back as one
//! LZ4-compressed burst. A request always ends with exactly one
//! empty-payload reply (the end-of-burst marker) and one `duration`
//! telemetry line.
//!
//! Failure handling follows the daemon's split: ingress problems (bad
//! origin, unparsable body) are recovered locally with an error
//! telemetry line and an immediate end-of-burst; a bucket that cannot be
//! read or decoded is skipped and the traversal continues; a distrusted
//! day-map cache is fatal and propagates to the supervisor.

use crate::demo::{self, DEMO_ORIGIN};
use crate::error::Result;
use crate::metrics;
use crate::telemetry::{TelemetryEvent, TelemetrySender};
use crate::{InboundMessage, Reply};
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use vaultaire_core::bucket::{bucket_oid, calculate_timemarks, BucketKind};
use vaultaire_core::disk::decode_bucket;
use vaultaire_core::wire::{
    decode_request_multi, encode_frames, frames_in_range, DataFrame, ReadQuery,
};
use vaultaire_core::{DayMap, Origin};
use vaultaire_store::{DayCache, StorePool};

/// Receiver end of a single-slot hand-off channel, shared by the pool.
pub type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Everything one reader worker operates on. Built once per worker; the
/// day cache is deliberately private to the worker so map lookups never
/// cross a lock.
pub struct WorkerContext {
    pub pool: StorePool,
    pub day_cache: DayCache,
    pub inbound: SharedReceiver<InboundMessage>,
    pub outbound: mpsc::UnboundedSender<Reply>,
    pub telemetry: TelemetrySender,
    pub demo: bool,
}

/// Worker main loop: drain the inbound channel until it closes.
pub async fn run_reader(mut ctx: WorkerContext) -> Result<()> {
    loop {
        let message = {
            let mut inbound = ctx.inbound.lock().await;
            inbound.recv().await
        };
        let Some(message) = message else {
            tracing::debug!("inbound channel closed, reader exiting");
            return Ok(());
        };
        handle_message(&mut ctx, message).await?;
    }
}

/// Handle one 4-frame message: decode, process each request in order.
pub async fn handle_message(ctx: &mut WorkerContext, message: InboundMessage) -> Result<()> {
    metrics::MESSAGES_TOTAL.inc();
    let InboundMessage {
        broker_env,
        client_env,
        origin,
        body,
    } = message;

    let origin = match Origin::from_bytes(&origin) {
        Ok(origin) => origin,
        Err(e) => {
            ingress_failure(ctx, broker_env, client_env, &e.to_string());
            return Ok(());
        }
    };
    let queries = match decode_request_multi(&origin, &body) {
        Ok(queries) => queries,
        Err(e) => {
            tracing::warn!(origin = %origin, error = %e, "unparsable request body");
            ingress_failure(ctx, broker_env, client_env, &e.to_string());
            return Ok(());
        }
    };

    for query in queries {
        let started = Instant::now();
        process_query(ctx, &broker_env, &client_env, &query).await?;
        let _ = ctx
            .outbound
            .send(Reply::end_of_burst(broker_env.clone(), client_env.clone()));
        let _ = ctx.telemetry.send(TelemetryEvent::duration(started.elapsed()));
        metrics::QUERIES_TOTAL.inc();
    }
    Ok(())
}

/// Recovered ingress error: one telemetry tuple, one end-of-burst.
fn ingress_failure(ctx: &WorkerContext, broker_env: Bytes, client_env: Bytes, detail: &str) {
    metrics::INGRESS_ERRORS_TOTAL.inc();
    let _ = ctx.telemetry.send(TelemetryEvent::error(detail));
    let _ = ctx.outbound.send(Reply::end_of_burst(broker_env, client_env));
}

/// Walk one request's timemarks and stream its bucket bursts.
async fn process_query(
    ctx: &mut WorkerContext,
    broker_env: &Bytes,
    client_env: &Bytes,
    query: &ReadQuery,
) -> Result<()> {
    if ctx.demo && query.origin.as_str() == DEMO_ORIGIN {
        send_burst(
            ctx,
            broker_env,
            client_env,
            demo::demo_frames(query.alpha, query.omega),
        );
        return Ok(());
    }

    let reloaded = ctx
        .day_cache
        .refresh_origin_days(&ctx.pool, &query.origin)
        .await?;
    if reloaded {
        metrics::DAY_MAP_RELOADS_TOTAL.inc();
    }

    // Consecutive timemarks frequently land in the same epoch; the oid
    // set keeps each bucket object to a single read and a single burst.
    let mut read_oids: HashSet<String> = HashSet::new();
    for mark in calculate_timemarks(query.alpha, query.omega) {
        for kind in [BucketKind::Simple, BucketKind::Extended] {
            let lookup = |map: &DayMap| map.lookup(mark);
            let resolved = match kind {
                BucketKind::Simple => ctx.day_cache.with_simple_day_map(&query.origin, lookup),
                BucketKind::Extended => ctx.day_cache.with_extended_day_map(&query.origin, lookup),
            };
            let Some(Some((epoch, bucket_count))) = resolved else {
                continue;
            };
            if bucket_count == 0 {
                continue;
            }

            let oid = bucket_oid(&query.origin, epoch, query.address.0 % bucket_count, kind);
            if !read_oids.insert(oid.clone()) {
                continue;
            }

            let body = match ctx.pool.read_full(&oid).await {
                Ok(Some(body)) => body,
                Ok(None) => continue,
                Err(e) => {
                    metrics::BUCKET_READ_FAILURES_TOTAL.inc();
                    tracing::warn!(oid = %oid, error = %e, "bucket read failed, skipping");
                    continue;
                }
            };
            metrics::BUCKET_READS_TOTAL.inc();

            let frames = match decode_bucket(&body) {
                Ok(frames) => frames,
                Err(e) => {
                    metrics::BUCKET_READ_FAILURES_TOTAL.inc();
                    tracing::warn!(oid = %oid, error = %e, "bucket decode failed, skipping");
                    continue;
                }
            };
            send_burst(
                ctx,
                broker_env,
                client_env,
                frames_in_range(query.alpha, query.omega, frames),
            );
        }
    }
    Ok(())
}

/// Encode frames as a burst, compress, enqueue one reply.
fn send_burst(ctx: &WorkerContext, broker_env: &Bytes, client_env: &Bytes, frames: Vec<DataFrame>) {
    let burst = encode_frames(frames);
    let payload = Bytes::from(lz4_flex::compress_prepend_size(&burst));
    let _ = ctx.outbound.send(Reply {
        broker_env: broker_env.clone(),
        client_env: client_env.clone(),
        payload,
    });
}
