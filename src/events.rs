use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::Draw;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StaticLoaded,
    Loading,
    LoadingYear,
    LoadingDeep,
    Updated,
    Live,
    Waiting,
    Refreshing,
    Refreshed,
    HistoryLoaded,
    YearLoaded,
    DeepLoaded,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncEvent {
    pub kind: EventKind,
    pub draw: Option<Draw>,
    /// The only signal consumers should turn into a visible notification.
    pub significant: bool,
}

/// Fan-out of update events. Slow subscribers lag rather than block the engine.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, kind: EventKind, draw: Option<Draw>, significant: bool) {
        debug!(?kind, significant, "event");
        // no subscribers is fine
        let _ = self.tx.send(SyncEvent {
            kind,
            draw,
            significant,
        });
    }
}
