//! Per-session event bus (component C9): a broadcast stream of dispatched
//! engine callbacks, for observers and tests to watch delivery order without
//! polling.

use tokio::sync::broadcast;

use crate::handle::{HandleId, TorrentHandleState};

const EVENT_BUS_CAPACITY: usize = 128;

#[derive(Debug, Clone)]
pub enum SessionEventKind {
    Added,
    StateChanged(TorrentHandleState),
    StatsUpdated,
    ResumeDataSaved,
    PieceFinished(i32),
    Errored(String),
}

#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub handle_id: HandleId,
    pub kind: SessionEventKind,
}

/// Wraps a `tokio::sync::broadcast` channel. Subscribers that join late only
/// see events published after they subscribed — the channel's own semantics,
/// not something this wrapper works around.
#[derive(Clone)]
pub struct SessionEventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// No subscribers is a normal, silent no-op.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for SessionEventBus {
    fn default() -> Self {
        Self::new()
    }
}
