//! One subscribed WebSocket session
//!
//! After a successful upgrade the session:
//! - creates a `Connection` and subscribes it to the hub
//! - spawns a writer task draining the connection's buffer into the socket,
//!   each write bounded by the configured deadline
//! - reads the socket only to notice the peer going away; inbound frames are
//!   discarded, the channel is broadcast-only
//!
//! The reading task owns the `SubscriptionHandle`, so however the session
//! ends (close frame, read error, failed write, forced close) the hub's
//! teardown runs, and runs once.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::connection::Connection;
use crate::hub::{Hub, TopicKey};

pub async fn run_session<S, K>(ws_stream: WebSocketStream<S>, hub: Hub<K>, topic: K, peer: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    K: TopicKey,
{
    let (connection, outbound) = Connection::channel(hub.settings().send_buffer);
    let connection = Arc::new(connection);
    let conn_id = connection.id;
    let closed = connection.close_token();

    // Register before anything can be written or read
    let subscription = match hub.subscribe(topic.clone(), connection.clone()) {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(namespace = K::NAMESPACE, topic = %topic, conn_id = %conn_id, %peer, error = %e, "subscribe refused");
            return;
        }
    };
    let (ws_sender, mut ws_receiver) = ws_stream.split();
    info!(namespace = K::NAMESPACE, topic = %topic, conn_id = %conn_id, %peer, "client connected");

    let writer = tokio::spawn(write_loop(
        ws_sender,
        outbound,
        hub.clone(),
        topic.clone(),
        connection,
    ));

    loop {
        tokio::select! {
            () = closed.cancelled() => break,
            frame = ws_receiver.next() => match frame {
                Some(Ok(WsMessage::Close(_))) | None => break,
                // broadcast-only: whatever the client sends is ignored
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(conn_id = %conn_id, error = %e, "read failed");
                    break;
                }
            },
        }
    }

    drop(subscription);
    if let Err(e) = writer.await {
        warn!(conn_id = %conn_id, error = %e, "writer task failed");
    }
    info!(namespace = K::NAMESPACE, topic = %topic, conn_id = %conn_id, %peer, "client disconnected");
}

async fn write_loop<S, K>(
    mut ws_sender: SplitSink<WebSocketStream<S>, WsMessage>,
    mut outbound: mpsc::Receiver<WsMessage>,
    hub: Hub<K>,
    topic: K,
    connection: Arc<Connection>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
    K: TopicKey,
{
    let write_timeout = hub.settings().write_timeout();
    let mut heartbeat = hub.settings().heartbeat_interval().map(|period| {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });
    let closed = connection.close_token();

    loop {
        let frame = tokio::select! {
            () = closed.cancelled() => break,
            next = outbound.recv() => match next {
                Some(frame) => frame,
                None => break,
            },
            () = tick(&mut heartbeat) => WsMessage::Ping(Default::default()),
        };

        match time::timeout(write_timeout, ws_sender.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(conn_id = %connection.id, error = %e, "failed to send message");
                hub.unsubscribe(&topic, &connection);
                break;
            }
            Err(_) => {
                warn!(
                    conn_id = %connection.id,
                    timeout_ms = write_timeout.as_millis() as u64,
                    "write deadline exceeded"
                );
                hub.unsubscribe(&topic, &connection);
                break;
            }
        }
    }

    // Best effort close frame; the peer may already be gone
    let _ = time::timeout(write_timeout, ws_sender.close()).await;
    debug!(conn_id = %connection.id, "send loop closed");
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
