//! Contents Worker
//!
//! A single long-running task answering "what sources exist under this
//! origin?". One task, not a pool: contents queries are rare, and every
//! one of them serializes on the shared source directory anyway, so
//! extra workers would only queue on the mutex.

use crate::demo::DEMO_ORIGIN;
use crate::error::Result;
use crate::metrics;
use crate::{ContentsRequest, Reply};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use vaultaire_core::wire::encode_sources;
use vaultaire_core::{Origin, SourceDict};
use vaultaire_store::{SourceDirectory, StorePool};

pub struct ContentsContext {
    pub pool: StorePool,
    pub directory: Arc<Mutex<SourceDirectory>>,
    pub inbound: mpsc::Receiver<ContentsRequest>,
    pub outbound: mpsc::UnboundedSender<Reply>,
    pub demo: bool,
}

/// Contents main loop: drain the channel until it closes.
pub async fn run_contents(mut ctx: ContentsContext) -> Result<()> {
    loop {
        let Some(request) = ctx.inbound.recv().await else {
            tracing::debug!("contents channel closed, worker exiting");
            return Ok(());
        };
        handle_request(&mut ctx, request).await?;
    }
}

/// Answer one contents query with a source listing.
pub async fn handle_request(ctx: &mut ContentsContext, request: ContentsRequest) -> Result<()> {
    metrics::CONTENTS_QUERIES_TOTAL.inc();
    let ContentsRequest {
        broker_env,
        client_env,
        origin,
    } = request;

    let payload = match Origin::from_bytes(&origin) {
        Ok(origin) => {
            let mut directory = ctx.directory.lock().await;
            if ctx.demo && origin.as_str() == DEMO_ORIGIN {
                directory.insert(&origin, SourceDict::from_pairs([("wave", "sine")]));
            } else {
                match directory.refresh(&ctx.pool, &origin).await {
                    Ok(()) => metrics::CONTENTS_REFRESHES_TOTAL.inc(),
                    Err(e) => {
                        tracing::warn!(origin = %origin, error = %e, "contents refresh failed, serving cached listing");
                    }
                }
            }
            let entries = directory.enumerate(&origin);
            encode_sources(entries.iter().map(|(address, dict)| (*address, dict)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "contents request with invalid origin");
            Bytes::new()
        }
    };

    let _ = ctx.outbound.send(Reply {
        broker_env,
        client_env,
        payload,
    });
    Ok(())
}
