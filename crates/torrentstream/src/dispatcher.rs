//! Session dispatcher (component C6): routes engine callbacks to the live
//! `DownloadSession` for a handle id. Must never block the engine's callback
//! thread — lookup is a single sharded-lock read, delivery fans out into
//! each session's own broadcast channel.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::handle::{HandleId, TorrentHandleState, TorrentResumeData, TorrentStats};

/// What a dispatched session must expose to the dispatcher. Kept
/// non-generic (trait-object-based) so `SessionRegistry` itself doesn't need
/// to know the concrete engine's `TorrentHandle`/`TorrentAddInfo` types.
pub trait DownloadSessionObserver: Send + Sync {
    fn handle_id(&self) -> HandleId;
    fn on_stats_update(&self, stats: TorrentStats);
    fn on_save_resume_data(&self, data: TorrentResumeData);
    fn on_state_changed(&self, state: TorrentHandleState);
    fn on_piece_finished(&self, piece_index: i32);
}

/// `HandleId -> DownloadSession` registry. No two entries share a `HandleId`.
#[derive(Default)]
pub struct SessionDispatcher {
    sessions: DashMap<HandleId, Arc<dyn DownloadSessionObserver>>,
}

impl SessionDispatcher {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Entry point used by `startDownload`.
    pub fn register(&self, session: Arc<dyn DownloadSessionObserver>) {
        let id = session.handle_id();
        self.sessions.insert(id, session);
        debug!(handle_id = id, "session registered");
    }

    /// Entry point used by `releaseHandle`.
    pub fn unregister(&self, id: HandleId) {
        if self.sessions.remove(&id).is_some() {
            debug!(handle_id = id, "session unregistered");
        }
    }

    /// Runs `action` against the session registered for `id`, if any.
    /// Dropping silently for an unknown id is expected: engine callbacks can
    /// race a session's release.
    pub fn dispatch_to_session(&self, id: HandleId, action: impl FnOnce(&Arc<dyn DownloadSessionObserver>)) {
        match self.sessions.get(&id) {
            Some(session) => action(&session),
            None => warn!(handle_id = id, "dropping callback for unregistered handle"),
        }
    }

    pub fn on_stats_update(&self, id: HandleId, stats: TorrentStats) {
        trace!(handle_id = id, "dispatching stats update");
        self.dispatch_to_session(id, |session| session.on_stats_update(stats));
    }

    pub fn on_save_resume_data(&self, id: HandleId, data: TorrentResumeData) {
        trace!(handle_id = id, "dispatching resume data");
        self.dispatch_to_session(id, |session| session.on_save_resume_data(data));
    }

    pub fn on_state_changed(&self, id: HandleId, state: TorrentHandleState) {
        debug!(handle_id = id, ?state, "dispatching state change");
        self.dispatch_to_session(id, |session| session.on_state_changed(state));
    }

    pub fn on_piece_finished(&self, id: HandleId, piece_index: i32) {
        trace!(handle_id = id, piece_index, "dispatching piece finished");
        self.dispatch_to_session(id, |session| session.on_piece_finished(piece_index));
    }
}
