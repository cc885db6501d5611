use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;

/// Upgrade to a websocket and hand the connection to the hub.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| async move { hub.serve(socket).await })
}
