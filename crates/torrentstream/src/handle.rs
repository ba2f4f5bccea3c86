//! Engine handle contract (component C5): the abstraction boundary between
//! a native BitTorrent engine and the session layer above it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[cfg(feature = "testing")]
use mockall::automock;

use crate::config::DownloaderConfig;
use crate::error::Result;
use crate::file_view::TorrentDescriptor;

pub type HandleId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TorrentHandleState {
    QueuedForChecking,
    CheckingFiles,
    DownloadingMetadata,
    Downloading,
    Finished,
    Seeding,
    Allocating,
    CheckingResumeData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePriority {
    Ignore,
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub handle: HandleId,
    pub id: torrentstream_core::Id20,
    pub client: String,
    pub ip_addr: String,
    pub ip_port: u16,
    pub progress: f32,
    pub total_download: u64,
    pub total_upload: u64,
    pub flags: u64,
}

/// Engine-reported counters plus rates derived by the owning session's
/// `SpeedEstimator` — the engine itself only supplies cumulative counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TorrentStats {
    pub total: u64,
    pub total_done: u64,
    pub all_time_upload: u64,
    pub all_time_download: u64,
    pub download_payload_rate: u64,
    pub upload_payload_rate: u64,
    pub progress: f32,
    pub total_payload_download: u64,
    pub total_payload_upload: u64,
}

/// Opaque bytes-in/bytes-out resume data blob.
#[derive(Debug, Clone)]
pub struct TorrentResumeData(pub Vec<u8>);

impl TorrentResumeData {
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.0)?;
        Ok(())
    }
}

/// One instance per active torrent. A production implementer wraps the real
/// engine; a test implementer drives the state machine deterministically —
/// both satisfy this contract bit-for-bit.
#[cfg_attr(feature = "testing", automock)]
#[async_trait]
pub trait TorrentHandle: Send + Sync {
    fn id(&self) -> HandleId;
    fn is_valid(&self) -> bool;
    fn get_state(&self) -> Option<TorrentHandleState>;
    async fn post_status_updates(&self);
    async fn post_save_resume(&self);
    async fn resume(&self) -> Result<()>;
    async fn set_file_priority(&self, index: usize, priority: FilePriority) -> Result<()>;
    async fn reload_file(&self) -> Result<TorrentDescriptor>;
    async fn get_peers(&self) -> Result<Vec<PeerInfo>>;
    fn set_piece_deadline(&self, index: i32, deadline_ms: u32);
    fn clear_piece_deadlines(&self);
    fn add_tracker(&self, url: &str, tier: u8, fail_limit: u32);
    fn get_magnet_uri(&self) -> Option<String>;
}

/// Write-only builder. Exactly one of magnet URI / torrent file path must be
/// set before `start_download`; resume data path is optional.
#[cfg_attr(feature = "testing", automock)]
pub trait TorrentAddInfo: Send {
    fn set_magnet_uri(&mut self, uri: String);
    fn set_torrent_file_path(&mut self, path: PathBuf);
    fn set_resume_data_path(&mut self, path: PathBuf);
}

/// Owns handle creation and lifecycle. Parameterized by the concrete handle
/// and add-info variants of one engine so the session layer never downcasts.
#[async_trait]
pub trait TorrentManagerSession<H: TorrentHandle, A: TorrentAddInfo>: Send + Sync {
    fn create_torrent_handle(&self) -> H;
    fn create_torrent_add_info(&self) -> A;

    /// Returns `Ok(false)` if the engine rejected the add (duplicate,
    /// malformed metadata); `Err` for a caller misuse such as restarting an
    /// already-started handle.
    async fn start_download(&self, handle: &H, add_info: A, save_dir: &Path) -> Result<bool>;

    fn release_handle(&self, handle: &H);
    async fn resume(&self) -> Result<()>;
    fn apply_config(&self, config: DownloaderConfig);
}
