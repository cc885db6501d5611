//! Per-client socket pumps.

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::{ClientId, HubHandle};
use crate::metrics::ServerMetrics;

/// Drain the client's queue onto the socket as text frames.
///
/// The queue closes when the hub drops the client (unregister, eviction or
/// hub shutdown); the socket is then closed too.
pub(super) async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<Utf8Bytes>,
    metrics: Arc<ServerMetrics>,
) {
    while let Some(payload) = queue.recv().await {
        if let Err(e) = sink.send(Message::Text(payload)).await {
            debug!("Websocket write failed: {}", e);
            return;
        }
        metrics.frame_sent();
    }
    debug!("Send queue closed, closing websocket");
    let _ = sink.close().await;
}

/// Read and discard client frames until the connection ends, then
/// unregister.
pub(super) async fn read_pump(id: ClientId, mut stream: SplitStream<WebSocket>, hub: HubHandle) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Websocket read failed: {}", e);
                break;
            }
        }
    }
    debug!("Websocket closed by peer");
    hub.unregister(id).await;
}
