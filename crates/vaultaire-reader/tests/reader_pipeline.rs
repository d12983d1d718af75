//! End-to-end tests of the worker pipeline against a scratch store,
//! driven through the channel seams the socket pumps normally feed.

use bytes::Bytes;
use prost::Message;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use vaultaire_core::bucket::{bucket_oid, contents_oid, extended_day_oid, simple_day_oid, BucketKind};
use vaultaire_core::daymap::serialize_entries;
use vaultaire_core::disk::encode_bucket;
use vaultaire_core::wire::{
    decode_burst, encode_sources, DataFrame, PayloadKind, ReadRequest, ReadRequestMulti,
    SourceResponseBurst, SourceTag,
};
use vaultaire_core::{Origin, Payload, SourceDict};
use vaultaire_reader::contents::{self, ContentsContext};
use vaultaire_reader::telemetry::TelemetryEvent;
use vaultaire_reader::worker::{self, WorkerContext};
use vaultaire_reader::{ContentsRequest, InboundMessage, Reply};
use vaultaire_store::{DayCache, SourceDirectory, StoreConfig, StorePool};

const SIMPLE_BUCKETS: u64 = 128;
const EXTENDED_BUCKETS: u64 = 16;

struct Harness {
    ctx: WorkerContext,
    replies: mpsc::UnboundedReceiver<Reply>,
    telemetry: mpsc::UnboundedReceiver<TelemetryEvent>,
}

async fn harness(dir: &tempfile::TempDir, demo: bool) -> Harness {
    let pool = StorePool::connect(
        "testuser",
        "testpool",
        &StoreConfig::Local {
            path: dir.path().to_path_buf(),
        },
    )
    .await
    .unwrap();

    let (_inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(1);
    let (outbound_tx, replies) = mpsc::unbounded_channel();
    let (telemetry_tx, telemetry) = mpsc::unbounded_channel();

    Harness {
        ctx: WorkerContext {
            pool,
            day_cache: DayCache::new(),
            inbound: Arc::new(Mutex::new(inbound_rx)),
            outbound: outbound_tx,
            telemetry: telemetry_tx,
            demo,
        },
        replies,
        telemetry,
    }
}

fn origin() -> Origin {
    Origin::new("arithmetic").unwrap()
}

fn source() -> SourceDict {
    SourceDict::from_pairs([("metric", "cpu"), ("hostname", "web01")])
}

fn simple_frame(ts: u64, value: f64) -> DataFrame {
    DataFrame {
        source: vec![SourceTag {
            field: "metric".into(),
            value: "cpu".into(),
        }],
        timestamp: ts,
        payload: PayloadKind::Real as i32,
        value_measurement: Some(value),
        ..Default::default()
    }
}

async fn seed_day_files(pool: &StorePool, simple: &[(u64, u64)], extended: &[(u64, u64)]) {
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

fn request_body(address: u64, alpha: u64, omega: u64) -> Bytes {
    let multi = ReadRequestMulti {
        requests: vec![ReadRequest {
            address,
            alpha,
            omega,
        }],
    };
    Bytes::from(multi.encode_to_vec())
}

fn message(body: Bytes) -> InboundMessage {
    InboundMessage {
        broker_env: Bytes::from_static(b"broker-1"),
        client_env: Bytes::from_static(b"client-7"),
        origin: Bytes::from_static(b"arithmetic"),
        body,
    }
}

fn decompress_points(reply: &Reply) -> Vec<vaultaire_core::Point> {
    let burst = lz4_flex::decompress_size_prepended(&reply.payload).unwrap();
    decode_burst(&origin(), &burst).unwrap()
}

fn drain_replies(replies: &mut mpsc::UnboundedReceiver<Reply>) -> Vec<Reply> {
    let mut out = Vec::new();
    while let Ok(reply) = replies.try_recv() {
        out.push(reply);
    }
    out
}

fn drain_telemetry(events: &mut mpsc::UnboundedReceiver<TelemetryEvent>) -> Vec<TelemetryEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// -------------------------------------------------------------------
// Point queries
// -------------------------------------------------------------------

#[tokio::test]
async fn test_query_returns_filtered_burst_and_end_of_burst() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, false).await;
    seed_day_files(&h.ctx.pool, &[(0, SIMPLE_BUCKETS)], &[]).await;

    // Three points on disk, only the middle one inside the query range.
    let address = source().address();
    let bucket = address.0 % SIMPLE_BUCKETS;
    let frames = vec![
        simple_frame(500, 0.5),
        simple_frame(1_500, 1.5),
        simple_frame(9_000, 9.0),
    ];
    h.ctx
        .pool
        .put_full(
            &bucket_oid(&origin(), 0, bucket, BucketKind::Simple),
            encode_bucket(&frames, false).unwrap().freeze(),
        )
        .await
        .unwrap();

    worker::handle_message(&mut h.ctx, message(request_body(address.0, 1_000, 2_000)))
        .await
        .unwrap();

    let replies = drain_replies(&mut h.replies);
    assert_eq!(replies.len(), 2);
    assert!(!replies[0].payload.is_empty());
    assert!(replies[1].payload.is_empty(), "last reply is end-of-burst");
    assert_eq!(replies[0].broker_env, Bytes::from_static(b"broker-1"));
    assert_eq!(replies[0].client_env, Bytes::from_static(b"client-7"));

    let points = decompress_points(&replies[0]);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].timestamp, 1_500);
    assert_eq!(points[0].payload, Payload::Measurement(1.5));
    assert_eq!(points[0].source, source());

    let events = drain_telemetry(&mut h.telemetry);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, "duration");
    assert_eq!(events[0].unit, "seconds");
}

#[tokio::test]
async fn test_query_reads_simple_and_extended_buckets() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, false).await;
    seed_day_files(&h.ctx.pool, &[(0, SIMPLE_BUCKETS)], &[(0, EXTENDED_BUCKETS)]).await;

    let address = source().address();
    h.ctx
        .pool
        .put_full(
            &bucket_oid(&origin(), 0, address.0 % SIMPLE_BUCKETS, BucketKind::Simple),
            encode_bucket(&[simple_frame(1_000, 1.0)], false)
                .unwrap()
                .freeze(),
        )
        .await
        .unwrap();

    let textual = DataFrame {
        source: vec![SourceTag {
            field: "metric".into(),
            value: "cpu".into(),
        }],
        timestamp: 1_200,
        payload: PayloadKind::Text as i32,
        value_textual: Some("burst".into()),
        ..Default::default()
    };
    h.ctx
        .pool
        .put_full(
            &bucket_oid(&origin(), 0, address.0 % EXTENDED_BUCKETS, BucketKind::Extended),
            encode_bucket(&[textual], true).unwrap().freeze(),
        )
        .await
        .unwrap();

    worker::handle_message(&mut h.ctx, message(request_body(address.0, 0, 5_000)))
        .await
        .unwrap();

    let replies = drain_replies(&mut h.replies);
    // One burst per bucket family, then the end-of-burst.
    assert_eq!(replies.len(), 3);
    assert!(replies[2].payload.is_empty());

    let simple_points = decompress_points(&replies[0]);
    assert_eq!(simple_points[0].payload, Payload::Measurement(1.0));
    let extended_points = decompress_points(&replies[1]);
    assert_eq!(extended_points[0].payload, Payload::Textual("burst".into()));
}

#[tokio::test]
async fn test_unknown_origin_yields_bare_end_of_burst() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, false).await;

    worker::handle_message(&mut h.ctx, message(request_body(42, 0, 1_000)))
        .await
        .unwrap();

    let replies = drain_replies(&mut h.replies);
    assert_eq!(replies.len(), 1);
    assert!(replies[0].payload.is_empty());
}

#[tokio::test]
async fn test_malformed_request_sends_one_empty_reply_and_error_telemetry() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, false).await;

    worker::handle_message(&mut h.ctx, message(Bytes::from_static(&[0xff, 0xff, 0xff])))
        .await
        .unwrap();

    let replies = drain_replies(&mut h.replies);
    assert_eq!(replies.len(), 1);
    assert!(replies[0].payload.is_empty());
    assert_eq!(replies[0].broker_env, Bytes::from_static(b"broker-1"));
    assert_eq!(replies[0].client_env, Bytes::from_static(b"client-7"));

    let events = drain_telemetry(&mut h.telemetry);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, "error");
    assert_eq!(events[0].unit, "");
}

#[tokio::test]
async fn test_multi_request_message_preserves_order_and_terminators() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, false).await;
    seed_day_files(&h.ctx.pool, &[(0, SIMPLE_BUCKETS)], &[]).await;

    let address = source().address();
    h.ctx
        .pool
        .put_full(
            &bucket_oid(&origin(), 0, address.0 % SIMPLE_BUCKETS, BucketKind::Simple),
            encode_bucket(
                &[simple_frame(1_000, 1.0), simple_frame(2_000, 2.0)],
                false,
            )
            .unwrap()
            .freeze(),
        )
        .await
        .unwrap();

    let multi = ReadRequestMulti {
        requests: vec![
            ReadRequest {
                address: address.0,
                alpha: 0,
                omega: 1_500,
            },
            ReadRequest {
                address: address.0,
                alpha: 1_500,
                omega: 3_000,
            },
        ],
    };
    worker::handle_message(&mut h.ctx, message(Bytes::from(multi.encode_to_vec())))
        .await
        .unwrap();

    let replies = drain_replies(&mut h.replies);
    // burst, end-of-burst, burst, end-of-burst: submission order held.
    assert_eq!(replies.len(), 4);
    assert!(!replies[0].payload.is_empty());
    assert!(replies[1].payload.is_empty());
    assert!(!replies[2].payload.is_empty());
    assert!(replies[3].payload.is_empty());

    assert_eq!(decompress_points(&replies[0])[0].timestamp, 1_000);
    assert_eq!(decompress_points(&replies[2])[0].timestamp, 2_000);

    // One duration line per request.
    let durations = drain_telemetry(&mut h.telemetry)
        .into_iter()
        .filter(|e| e.key == "duration")
        .count();
    assert_eq!(durations, 2);
}

#[tokio::test]
async fn test_points_outside_every_bucket_still_terminate() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, false).await;
    seed_day_files(&h.ctx.pool, &[(0, SIMPLE_BUCKETS)], &[]).await;
    // Day maps exist but no bucket object was ever written.
    worker::handle_message(&mut h.ctx, message(request_body(7, 0, 10_000)))
        .await
        .unwrap();

    let replies = drain_replies(&mut h.replies);
    assert_eq!(replies.len(), 1);
    assert!(replies[0].payload.is_empty());
}

// -------------------------------------------------------------------
// Demo origin
// -------------------------------------------------------------------

#[tokio::test]
async fn test_demo_origin_serves_the_sine_wave() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, true).await;

    let alpha = 1_000_000_000_000u64;
    let omega = alpha + 100_000_000_000;
    let demo_origin = Origin::new("BENHUR").unwrap();
    let msg = InboundMessage {
        broker_env: Bytes::from_static(b"broker-1"),
        client_env: Bytes::from_static(b"client-7"),
        origin: Bytes::from_static(b"BENHUR"),
        body: request_body(1, alpha, omega),
    };
    worker::handle_message(&mut h.ctx, msg).await.unwrap();

    let replies = drain_replies(&mut h.replies);
    assert_eq!(replies.len(), 2);
    assert!(replies[1].payload.is_empty());

    let burst = lz4_flex::decompress_size_prepended(&replies[0].payload).unwrap();
    let points = decode_burst(&demo_origin, &burst).unwrap();
    assert_eq!(points.len(), 21);
    let wave = SourceDict::from_pairs([("wave", "sine")]);
    for point in &points {
        assert_eq!(point.source, wave);
        assert!(point.timestamp >= alpha && point.timestamp <= omega);
        let seconds = (point.timestamp / 1_000_000_000) as f64;
        let expected = (2.0 * std::f64::consts::PI * seconds / 10_800.0).sin();
        match point.payload {
            Payload::Measurement(v) => assert!((v - expected).abs() < 1e-12),
            ref other => panic!("unexpected payload {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_demo_origin_is_ordinary_without_the_flag() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, false).await;

    let msg = InboundMessage {
        broker_env: Bytes::from_static(b"broker-1"),
        client_env: Bytes::from_static(b"client-7"),
        origin: Bytes::from_static(b"BENHUR"),
        body: request_body(1, 0, 1_000_000_000_000),
    };
    worker::handle_message(&mut h.ctx, msg).await.unwrap();

    // No day files for BENHUR, so nothing but the terminator.
    let replies = drain_replies(&mut h.replies);
    assert_eq!(replies.len(), 1);
    assert!(replies[0].payload.is_empty());
}

// -------------------------------------------------------------------
// Contents queries
// -------------------------------------------------------------------

struct ContentsHarness {
    ctx: ContentsContext,
    replies: mpsc::UnboundedReceiver<Reply>,
}

async fn contents_harness(dir: &tempfile::TempDir, demo: bool) -> ContentsHarness {
    let pool = StorePool::connect(
        "testuser",
        "testpool",
        &StoreConfig::Local {
            path: dir.path().to_path_buf(),
        },
    )
    .await
    .unwrap();
    let (_inbound_tx, inbound_rx) = mpsc::channel::<ContentsRequest>(1);
    let (outbound_tx, replies) = mpsc::unbounded_channel();
    ContentsHarness {
        ctx: ContentsContext {
            pool,
            directory: Arc::new(Mutex::new(SourceDirectory::new())),
            inbound: inbound_rx,
            outbound: outbound_tx,
            demo,
        },
        replies,
    }
}

fn contents_request(origin: &'static [u8]) -> ContentsRequest {
    ContentsRequest {
        broker_env: Bytes::from_static(b"broker-1"),
        client_env: Bytes::from_static(b"client-7"),
        origin: Bytes::from_static(origin),
    }
}

#[tokio::test]
async fn test_contents_enumerates_stored_sources() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = contents_harness(&dir, false).await;

    let cpu = SourceDict::from_pairs([("metric", "cpu")]);
    let mem = SourceDict::from_pairs([("metric", "mem")]);
    h.ctx
        .pool
        .put_full(
            &contents_oid(&origin()),
            encode_sources([(cpu.address(), &cpu), (mem.address(), &mem)]),
        )
        .await
        .unwrap();

    contents::handle_request(&mut h.ctx, contents_request(b"arithmetic"))
        .await
        .unwrap();

    let reply = h.replies.try_recv().unwrap();
    let burst = SourceResponseBurst::decode(reply.payload.as_ref()).unwrap();
    assert_eq!(burst.sources.len(), 2);
    let addresses: Vec<u64> = burst.sources.iter().map(|s| s.address).collect();
    assert!(addresses.contains(&cpu.address().0));
    assert!(addresses.contains(&mem.address().0));
}

#[tokio::test]
async fn test_contents_demo_origin_lists_the_sine_source() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = contents_harness(&dir, true).await;

    contents::handle_request(&mut h.ctx, contents_request(b"BENHUR"))
        .await
        .unwrap();

    let reply = h.replies.try_recv().unwrap();
    let burst = SourceResponseBurst::decode(reply.payload.as_ref()).unwrap();
    assert_eq!(burst.sources.len(), 1);
    assert_eq!(burst.sources[0].source[0].field, "wave");
    assert_eq!(burst.sources[0].source[0].value, "sine");
}

#[tokio::test]
async fn test_contents_unknown_origin_is_an_empty_listing() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = contents_harness(&dir, false).await;

    contents::handle_request(&mut h.ctx, contents_request(b"arithmetic"))
        .await
        .unwrap();

    let reply = h.replies.try_recv().unwrap();
    let burst = SourceResponseBurst::decode(reply.payload.as_ref()).unwrap();
    assert!(burst.sources.is_empty());
}
