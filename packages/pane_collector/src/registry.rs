use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::fingerprint::ContentFingerprint;
use crate::pane::{PaneIdentity, PaneInfo};

/// Result of recording a pane's fingerprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observation {
    /// First sighting, or the fingerprint differs from the previous one.
    Changed,
    Unchanged,
}

#[derive(Clone, Debug)]
struct Entry {
    info: PaneInfo,
    fingerprint: ContentFingerprint,
}

/// Last-observed metadata and content fingerprint for each live pane.
///
/// Not synchronized; see [`SharedRegistry`] for the locked form used by the
/// collector and its readers.
#[derive(Debug, Default)]
pub struct PaneRegistry {
    entries: HashMap<PaneIdentity, Entry>,
}

impl PaneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of every pane's metadata. Order is unspecified.
    pub fn snapshot(&self) -> Vec<PaneInfo> {
        self.entries.values().map(|e| e.info.clone()).collect()
    }

    /// Upsert a pane. Metadata is always replaced; the return value only
    /// reflects the content fingerprint.
    pub fn observe(&mut self, info: PaneInfo, fingerprint: ContentFingerprint) -> Observation {
        match self.entries.get_mut(&info.id) {
            Some(entry) => {
                let changed = entry.fingerprint != fingerprint;
                entry.info = info;
                entry.fingerprint = fingerprint;
                if changed {
                    Observation::Changed
                } else {
                    Observation::Unchanged
                }
            }
            None => {
                self.entries
                    .insert(info.id.clone(), Entry { info, fingerprint });
                Observation::Changed
            }
        }
    }

    /// Drop every pane not in `live`.
    pub fn retain(&mut self, live: &HashSet<PaneIdentity>) {
        self.entries.retain(|id, _| live.contains(id));
    }

    pub fn fingerprint(&self, id: &PaneIdentity) -> Option<ContentFingerprint> {
        self.entries.get(id).map(|e| e.fingerprint)
    }

    pub fn identities(&self) -> HashSet<PaneIdentity> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registry behind a reader-writer lock.
///
/// The collector takes the writer lock for the observe/retain step of a
/// sample; any number of readers may take snapshots concurrently.
#[derive(Clone, Debug, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<PaneRegistry>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<PaneInfo> {
        self.inner.read().await.snapshot()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, PaneRegistry> {
        self.inner.write().await
    }
}
