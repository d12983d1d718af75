//! Supervisor
//!
//! Brings the daemon up and keeps its tasks linked: socket pumps, the
//! reader pool, and the contents worker all live in one `JoinSet`. Tasks
//! have no meaningful way to recover each other's failures, so the
//! policy is all-or-nothing: the first task that fails (or panics) tears
//! every sibling down and the error becomes the process exit cause.
//! SIGINT/SIGTERM trigger the same teardown with a clean exit.
//!
//! Workers connect their own store pools from inside their tasks, so
//! startup connects run concurrently and serialize only on the global
//! connect mutex: the queue forms exactly where the unsafe window is.

use crate::config::ReaderConfig;
use crate::contents::{self, ContentsContext};
use crate::error::{Error, Result};
use crate::metrics;
use crate::router;
use crate::worker::{self, WorkerContext};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use vaultaire_store::{DayCache, SourceDirectory, StorePool};

/// Run the daemon until shutdown or first failure.
pub async fn run(config: ReaderConfig) -> Result<()> {
    metrics::register();

    let (inbound_tx, inbound_rx) = mpsc::channel(1);
    let inbound_rx = Arc::new(Mutex::new(inbound_rx));
    let (contents_in_tx, contents_in_rx) = mpsc::channel(1);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (contents_out_tx, contents_out_rx) = mpsc::unbounded_channel();
    let (telemetry_tx, telemetry_rx) = mpsc::unbounded_channel();

    let mut tasks: JoinSet<Result<()>> = JoinSet::new();
    tasks.spawn(router::run_query_pump(
        config.broker.clone(),
        inbound_tx,
        outbound_rx,
    ));
    tasks.spawn(router::run_contents_pump(
        config.broker.clone(),
        contents_in_tx,
        contents_out_rx,
    ));
    tasks.spawn(router::run_telemetry_pump(
        config.broker.clone(),
        telemetry_rx,
        config.debug,
    ));

    for worker_id in 0..config.workers {
        let inbound = inbound_rx.clone();
        let outbound = outbound_tx.clone();
        let telemetry = telemetry_tx.clone();
        let user = config.user.clone();
        let pool_name = config.pool.clone();
        let store = config.store.clone();
        let demo = config.demo;
        tasks.spawn(async move {
            let pool = StorePool::connect(&user, &pool_name, &store).await?;
            tracing::debug!(worker = worker_id, "reader worker pool up");
            worker::run_reader(WorkerContext {
                pool,
                day_cache: DayCache::new(),
                inbound,
                outbound,
                telemetry,
                demo,
            })
            .await
        });
    }

    {
        let user = config.user.clone();
        let pool_name = config.pool.clone();
        let store = config.store.clone();
        let demo = config.demo;
        tasks.spawn(async move {
            let pool = StorePool::connect(&user, &pool_name, &store).await?;
            tracing::debug!("contents worker pool up");
            contents::run_contents(ContentsContext {
                pool,
                directory: Arc::new(Mutex::new(SourceDirectory::new())),
                inbound: contents_in_rx,
                outbound: contents_out_tx,
                demo,
            })
            .await
        });
    }

    // The spawned tasks hold the only live senders now.
    drop(outbound_tx);
    drop(telemetry_tx);

    supervise(tasks).await
}

/// Wait for the first failure or a shutdown signal; either way, no task
/// outlives the decision.
async fn supervise(mut tasks: JoinSet<Result<()>>) -> Result<()> {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let verdict = loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break Ok(());
            }
            joined = tasks.join_next() => match joined {
                None => break Ok(()),
                Some(Ok(Ok(()))) => tracing::debug!("linked task finished"),
                Some(Ok(Err(e))) => {
                    tracing::error!(error = %e, "linked task failed, tearing down");
                    break Err(e);
                }
                Some(Err(join_error)) if join_error.is_panic() => {
                    tracing::error!("linked task panicked, tearing down");
                    break Err(Error::TaskPanicked);
                }
                Some(Err(_)) => {}
            }
        }
    };
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
    verdict
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
