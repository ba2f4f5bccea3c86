//! In-memory, reloadable downloader tuning knobs (component C8).

use parking_lot::RwLock;

use crate::handle::FilePriority;

#[derive(Debug, Clone, Copy)]
pub struct DownloaderConfig {
    pub default_piece_deadline_ms: u32,
    pub read_ahead_buffer_bytes: i64,
    pub default_file_priority: FilePriority,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            default_piece_deadline_ms: 0,
            read_ahead_buffer_bytes: 4 * 1024 * 1024,
            default_file_priority: FilePriority::Normal,
        }
    }
}

/// Holds the active config behind a lock; `apply` replaces it as one atomic
/// swap. Readers take a snapshot at construction time — a `TorrentInput`
/// built before a reload keeps the buffer size it was built with, since
/// changing buffer geometry under a live `BufferWindow` would violate its
/// invariants.
pub struct ConfigHandle {
    inner: RwLock<DownloaderConfig>,
}

impl ConfigHandle {
    pub fn new(config: DownloaderConfig) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }

    pub fn snapshot(&self) -> DownloaderConfig {
        *self.inner.read()
    }

    pub fn apply(&self, config: DownloaderConfig) {
        *self.inner.write() = config;
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(DownloaderConfig::default())
    }
}
