use lazy_static::lazy_static;
use prometheus::{IntCounter, Registry};
use std::sync::Once;

static REGISTER: Once = Once::new();

lazy_static! {
    /// Daemon-local Prometheus registry.
    pub static ref REGISTRY: Registry = Registry::new();

    /// Query messages taken off the inbound channel.
    pub static ref MESSAGES_TOTAL: IntCounter = IntCounter::new(
        "vaultaire_reader_messages_total",
        "Total query messages received"
    ).expect("metric can be created");

    /// Individual requests handled (one message may carry several).
    pub static ref QUERIES_TOTAL: IntCounter = IntCounter::new(
        "vaultaire_reader_queries_total",
        "Total read requests handled"
    ).expect("metric can be created");

    /// Messages dropped or failed at ingress (bad frames, bad origin,
    /// unparsable request body).
    pub static ref INGRESS_ERRORS_TOTAL: IntCounter = IntCounter::new(
        "vaultaire_reader_ingress_errors_total",
        "Total malformed inbound messages"
    ).expect("metric can be created");

    /// Bucket objects fetched from the store.
    pub static ref BUCKET_READS_TOTAL: IntCounter = IntCounter::new(
        "vaultaire_reader_bucket_reads_total",
        "Total bucket objects read"
    ).expect("metric can be created");

    /// Bucket fetches skipped on store or decode failure.
    pub static ref BUCKET_READ_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "vaultaire_reader_bucket_read_failures_total",
        "Total bucket reads skipped on failure"
    ).expect("metric can be created");

    /// Contents queries handled.
    pub static ref CONTENTS_QUERIES_TOTAL: IntCounter = IntCounter::new(
        "vaultaire_reader_contents_queries_total",
        "Total contents requests handled"
    ).expect("metric can be created");

    /// Day-map cache reloads (a refresh that actually re-read the day
    /// files, as opposed to a token-validated no-op).
    pub static ref DAY_MAP_RELOADS_TOTAL: IntCounter = IntCounter::new(
        "vaultaire_reader_day_map_reloads_total",
        "Total day map reloads from the store"
    ).expect("metric can be created");

    /// Source directory refreshes from contents objects.
    pub static ref CONTENTS_REFRESHES_TOTAL: IntCounter = IntCounter::new(
        "vaultaire_reader_contents_refreshes_total",
        "Total source directory refreshes from the store"
    ).expect("metric can be created");
}

/// Register every metric with the daemon registry. Idempotent.
pub fn register() {
    REGISTER.call_once(|| {
        for metric in [
            &*MESSAGES_TOTAL,
            &*QUERIES_TOTAL,
            &*INGRESS_ERRORS_TOTAL,
            &*BUCKET_READS_TOTAL,
            &*BUCKET_READ_FAILURES_TOTAL,
            &*CONTENTS_QUERIES_TOTAL,
            &*DAY_MAP_RELOADS_TOTAL,
            &*CONTENTS_REFRESHES_TOTAL,
        ] {
            REGISTRY
                .register(Box::new(metric.clone()))
                .expect("metric can be registered");
        }
    });
}
