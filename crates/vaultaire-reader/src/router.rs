//! Router I/O
//!
//! The daemon's three sockets, one pump task each:
//!
//! - query router (`tcp://<broker>:5571`): 4-frame messages in, 3-frame
//!   replies out;
//! - contents router (`tcp://<broker>:5573`): 4-frame messages in,
//!   4-frame replies out with an empty delimiter frame;
//! - telemetry pub (`tcp://<broker>:5581`): 5-frame tuples out.
//!
//! Router sockets carry the peer identity as the leading frame on both
//! directions, which is exactly the `broker_env` slot of the protocol:
//! frame 0 of a received message names the broker connection, and a
//! reply leading with it routes back there. A message with the wrong
//! frame count is logged and dropped at ingress; nothing downstream ever
//! sees a partial message.

use crate::error::Result;
use crate::metrics;
use crate::telemetry::{self, TelemetryReceiver};
use crate::{ContentsRequest, InboundMessage, Reply};
use bytes::Bytes;
use tokio::sync::mpsc;
use zeromq::{PubSocket, RouterSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

const QUERY_PORT: u16 = 5571;
const CONTENTS_PORT: u16 = 5573;
const TELEMETRY_PORT: u16 = 5581;

pub fn query_endpoint(broker: &str) -> String {
    format!("tcp://{}:{}", broker, QUERY_PORT)
}

pub fn contents_endpoint(broker: &str) -> String {
    format!("tcp://{}:{}", broker, CONTENTS_PORT)
}

pub fn telemetry_endpoint(broker: &str) -> String {
    format!("tcp://{}:{}", broker, TELEMETRY_PORT)
}

/// Query socket pump: fan inbound messages into the hand-off channel,
/// fan replies back out. Ends cleanly when either channel closes.
pub async fn run_query_pump(
    broker: String,
    inbound: mpsc::Sender<InboundMessage>,
    mut outbound: mpsc::UnboundedReceiver<Reply>,
) -> Result<()> {
    let endpoint = query_endpoint(&broker);
    let mut socket = RouterSocket::new();
    socket.connect(&endpoint).await?;
    tracing::info!(endpoint = %endpoint, "query router connected");

    loop {
        tokio::select! {
            received = socket.recv() => {
                let frames = received?.into_vec();
                if frames.len() != 4 {
                    metrics::INGRESS_ERRORS_TOTAL.inc();
                    tracing::warn!(frames = frames.len(), "dropping query message with bad frame count");
                    continue;
                }
                let message = InboundMessage {
                    broker_env: frames[0].clone(),
                    client_env: frames[1].clone(),
                    origin: frames[2].clone(),
                    body: frames[3].clone(),
                };
                if inbound.send(message).await.is_err() {
                    return Ok(());
                }
            }
            reply = outbound.recv() => {
                let Some(reply) = reply else { return Ok(()); };
                let mut message = ZmqMessage::from(reply.broker_env);
                message.push_back(reply.client_env);
                message.push_back(reply.payload);
                socket.send(message).await?;
            }
        }
    }
}

/// Contents socket pump. Inbound frame 3 is reserved and ignored; the
/// origin rides in frame 4. Outbound inserts the empty delimiter frame
/// between the client envelope and the payload.
pub async fn run_contents_pump(
    broker: String,
    inbound: mpsc::Sender<ContentsRequest>,
    mut outbound: mpsc::UnboundedReceiver<Reply>,
) -> Result<()> {
    let endpoint = contents_endpoint(&broker);
    let mut socket = RouterSocket::new();
    socket.connect(&endpoint).await?;
    tracing::info!(endpoint = %endpoint, "contents router connected");

    loop {
        tokio::select! {
            received = socket.recv() => {
                let frames = received?.into_vec();
                if frames.len() != 4 {
                    metrics::INGRESS_ERRORS_TOTAL.inc();
                    tracing::warn!(frames = frames.len(), "dropping contents message with bad frame count");
                    continue;
                }
                let request = ContentsRequest {
                    broker_env: frames[0].clone(),
                    client_env: frames[1].clone(),
                    origin: frames[3].clone(),
                };
                if inbound.send(request).await.is_err() {
                    return Ok(());
                }
            }
            reply = outbound.recv() => {
                let Some(reply) = reply else { return Ok(()); };
                let mut message = ZmqMessage::from(reply.broker_env);
                message.push_back(reply.client_env);
                message.push_back(Bytes::new());
                message.push_back(reply.payload);
                socket.send(message).await?;
            }
        }
    }
}

/// Telemetry pump: decorate each event with the daemon identity and
/// hostname, publish five frames. With `--debug` the tuple is echoed to
/// stdout as well.
pub async fn run_telemetry_pump(
    broker: String,
    mut events: TelemetryReceiver,
    debug: bool,
) -> Result<()> {
    let endpoint = telemetry_endpoint(&broker);
    let mut socket = PubSocket::new();
    socket.connect(&endpoint).await?;
    tracing::info!(endpoint = %endpoint, "telemetry publisher connected");

    let identity = telemetry::identity();
    let host = telemetry::local_hostname();

    while let Some(event) = events.recv().await {
        if debug {
            println!("{} {} {}", event.key, event.value, event.unit);
        }
        let mut message = ZmqMessage::from(event.key);
        message.push_back(Bytes::from(event.value));
        message.push_back(Bytes::from(event.unit));
        message.push_back(Bytes::from(identity.clone()));
        message.push_back(Bytes::from(host.clone()));
        socket.send(message).await?;
    }
    Ok(())
}
