//! Broadcast Hub
//!
//! A single task owns the set of connected clients and mutates it only in
//! response to `register`, `unregister` and `broadcast` events, handled in
//! the order they were posted. Each client
//! gets a bounded send queue; a client whose queue is full when a broadcast
//! arrives is evicted rather than slowing everyone else down.

mod client;
pub mod protocol;

use axum::extract::ws::{Utf8Bytes, WebSocket};
use futures::StreamExt;
use pane_collector::{PaneUpdate, SharedRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::metrics::ServerMetrics;
pub use protocol::{PaneSize, PaneSummary, ServerMessage};

/// Capacity of each client's send queue.
pub const CLIENT_QUEUE_CAPACITY: usize = 256;

/// Capacity of the hub's event queue, which carries broadcasts.
pub const BROADCAST_CAPACITY: usize = 256;

pub type ClientId = Uuid;

#[derive(Debug, thiserror::Error)]
#[error("hub is not running")]
pub struct HubClosed;

struct Registration {
    id: ClientId,
    queue: mpsc::Sender<Utf8Bytes>,
    /// Fired once the client is in the set and its `pane_list` is queued
    ack: oneshot::Sender<()>,
}

enum HubEvent {
    Register(Registration),
    Unregister(ClientId),
    Broadcast(Utf8Bytes),
}

/// The hub's event loop state. Consumed by [`Hub::run`].
pub struct Hub {
    /// Sole owner of every client's queue sender
    clients: HashMap<ClientId, mpsc::Sender<Utf8Bytes>>,
    events_rx: mpsc::Receiver<HubEvent>,
    registry: SharedRegistry,
    metrics: Arc<ServerMetrics>,
    shutdown: CancellationToken,
}

/// Cheap, clonable entry point to a running [`Hub`].
#[derive(Clone)]
pub struct HubHandle {
    events_tx: mpsc::Sender<HubEvent>,
    metrics: Arc<ServerMetrics>,
}

impl Hub {
    pub fn new(
        registry: SharedRegistry,
        metrics: Arc<ServerMetrics>,
        shutdown: CancellationToken,
    ) -> (Self, HubHandle) {
        let (events_tx, events_rx) = mpsc::channel(BROADCAST_CAPACITY);

        let hub = Self {
            clients: HashMap::new(),
            events_rx,
            registry,
            metrics: metrics.clone(),
            shutdown,
        };
        let handle = HubHandle {
            events_tx,
            metrics,
        };
        (hub, handle)
    }

    /// Run the event loop until shutdown is requested or every handle is
    /// gone. Dropping the hub drops every client queue, which closes them;
    /// registrations still queued at that point fail with [`HubClosed`].
    pub async fn run(mut self) {
        debug!("Hub started");
        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = self.events_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            match event {
                HubEvent::Register(reg) => self.handle_register(reg).await,
                HubEvent::Unregister(id) => self.handle_unregister(id),
                HubEvent::Broadcast(payload) => self.handle_broadcast(payload),
            }
        }
        info!(clients = self.clients.len(), "Hub stopped, closing client queues");
        for _ in self.clients.drain() {
            self.metrics.connection_closed();
        }
    }

    /// Insert the client and queue its `pane_list` before handling anything
    /// else, so no broadcast can overtake it.
    async fn handle_register(&mut self, reg: Registration) {
        let Registration { id, queue, ack } = reg;

        let snapshot = self.registry.snapshot().await;
        let pane_count = snapshot.len();
        match ServerMessage::pane_list(snapshot).encode() {
            Ok(payload) => {
                if queue.try_send(payload).is_err() {
                    self.metrics.initial_snapshot_dropped();
                    debug!(client = %id, "Initial pane list did not fit, dropping it");
                }
            }
            Err(e) => {
                self.metrics.encode_failed();
                error!(client = %id, "Failed to encode pane list: {}", e);
            }
        }

        self.clients.insert(id, queue);
        self.metrics.connection_opened();
        info!(client = %id, panes = pane_count, clients = self.clients.len(), "Client registered");
        // The caller may have given up waiting; the client stays registered
        // until its pumps unregister it or a broadcast finds it closed.
        let _ = ack.send(());
    }

    fn handle_unregister(&mut self, id: ClientId) {
        if self.clients.remove(&id).is_some() {
            self.metrics.connection_closed();
            info!(client = %id, clients = self.clients.len(), "Client unregistered");
        }
    }

    fn handle_broadcast(&mut self, payload: Utf8Bytes) {
        self.metrics.broadcast();

        let metrics = &self.metrics;
        self.clients
            .retain(|id, queue| match queue.try_send(payload.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    metrics.client_evicted();
                    warn!(client = %id, "Client send queue full, evicting");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    metrics.connection_closed();
                    debug!(client = %id, "Client queue already closed, removing");
                    false
                }
            });
    }
}

impl HubHandle {
    /// Add a client and wait until the hub has taken it in. The returned
    /// queue yields its `pane_list` first, then every broadcast posted after
    /// this call, and closes when the client is removed.
    pub async fn register(&self) -> Result<(ClientId, mpsc::Receiver<Utf8Bytes>), HubClosed> {
        let id = Uuid::new_v4();
        let (queue, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        let (ack, acked) = oneshot::channel();
        self.events_tx
            .send(HubEvent::Register(Registration { id, queue, ack }))
            .await
            .map_err(|_| HubClosed)?;
        acked.await.map_err(|_| HubClosed)?;
        Ok((id, rx))
    }

    /// Remove a client. Unknown ids are ignored.
    pub async fn unregister(&self, id: ClientId) {
        // A stopped hub has already dropped every client.
        let _ = self.events_tx.send(HubEvent::Unregister(id)).await;
    }

    pub async fn broadcast(&self, payload: Utf8Bytes) -> Result<(), HubClosed> {
        self.events_tx
            .send(HubEvent::Broadcast(payload))
            .await
            .map_err(|_| HubClosed)
    }

    /// Attach an upgraded websocket: register it, then start its write and
    /// read pumps.
    pub async fn serve(&self, socket: WebSocket) {
        let (id, queue) = match self.register().await {
            Ok(registered) => registered,
            Err(e) => {
                warn!("Rejecting websocket: {}", e);
                return;
            }
        };

        let (sink, stream) = socket.split();
        let span = info_span!("client", id = %id);

        tokio::spawn(client::write_pump(sink, queue, self.metrics.clone()).instrument(span.clone()));
        tokio::spawn(client::read_pump(id, stream, self.clone()).instrument(span));
    }

    /// Number of clients currently in the hub's set.
    pub fn client_count(&self) -> u64 {
        self.metrics
            .active_connections
            .load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }
}

/// Encode every collector update and post it to the hub.
///
/// Exits when the collector closes its channel or the hub stops.
pub fn start_forwarder(mut updates: mpsc::Receiver<PaneUpdate>, hub: HubHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            let pane = update.info.id.clone();
            match ServerMessage::from(update).encode() {
                Ok(payload) => {
                    if hub.broadcast(payload).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    hub.metrics.encode_failed();
                    error!(pane = %pane, "Failed to encode pane update: {}", e);
                }
            }
        }
        debug!("Forwarder stopped");
    })
}
