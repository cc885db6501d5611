//! Wire Protocol Types
//!
//! Server-to-client JSON messages. Clients never send anything the server
//! interprets.

use axum::extract::ws::Utf8Bytes;
use pane_collector::{PaneInfo, PaneUpdate};
use serde::{Deserialize, Serialize};

/// Pane metadata as listed in `pane_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaneSummary {
    pub session: String,
    pub window: String,
    pub pane: String,
    pub title: String,
    pub cols: u16,
    pub rows: u16,
}

impl From<PaneInfo> for PaneSummary {
    fn from(info: PaneInfo) -> Self {
        Self {
            session: info.id.session,
            window: info.id.window,
            pane: info.id.pane,
            title: info.title,
            cols: info.cols,
            rows: info.rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaneSize {
    pub cols: u16,
    pub rows: u16,
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once per client, right after it registers
    PaneList { panes: Vec<PaneSummary> },
    /// Full current content of one pane; the fingerprint stays server-side
    PaneUpdate {
        session: String,
        window: String,
        pane: String,
        content: String,
        size: PaneSize,
    },
}

impl ServerMessage {
    pub fn pane_list(panes: Vec<PaneInfo>) -> Self {
        ServerMessage::PaneList {
            panes: panes.into_iter().map(PaneSummary::from).collect(),
        }
    }

    /// Encode as a text frame payload.
    pub fn encode(&self) -> Result<Utf8Bytes, serde_json::Error> {
        serde_json::to_string(self).map(Utf8Bytes::from)
    }
}

impl From<PaneUpdate> for ServerMessage {
    fn from(update: PaneUpdate) -> Self {
        let PaneUpdate { info, content, .. } = update;
        ServerMessage::PaneUpdate {
            session: info.id.session,
            window: info.id.window,
            pane: info.id.pane,
            content,
            size: PaneSize {
                cols: info.cols,
                rows: info.rows,
            },
        }
    }
}
