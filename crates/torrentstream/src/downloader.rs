//! Downloader facade (component C7): lifecycle operations over an engine
//! session plus the dispatcher and config it wires together.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{ConfigHandle, DownloaderConfig};
use crate::dispatcher::SessionDispatcher;
use crate::error::{Error, Result};
use crate::events::SessionEventKind;
use crate::file_view::{self, LogicalFileView};
use crate::handle::{TorrentAddInfo, TorrentHandle, TorrentManagerSession};
use crate::session::DownloadSession;
use crate::torrent_input::{EngineWaitHook, PieceWaitHook, TorrentInput};

/// Where to add a torrent from. Exactly one of magnet URI or torrent-file
/// path; resume data is optional.
pub enum TorrentSource {
    MagnetUri(String),
    TorrentFilePath(PathBuf),
}

pub struct Downloader<S, H, A>
where
    H: TorrentHandle,
    A: TorrentAddInfo,
    S: TorrentManagerSession<H, A>,
{
    native: S,
    dispatcher: Arc<SessionDispatcher>,
    config: ConfigHandle,
    data_root: PathBuf,
    cancellation: CancellationToken,
    _marker: std::marker::PhantomData<(H, A)>,
}

impl<S, H, A> Downloader<S, H, A>
where
    H: TorrentHandle + 'static,
    A: TorrentAddInfo,
    S: TorrentManagerSession<H, A>,
{
    pub fn new(native: S, data_root: PathBuf, config: DownloaderConfig) -> Self {
        Self {
            native,
            dispatcher: Arc::new(SessionDispatcher::new()),
            config: ConfigHandle::new(config),
            data_root,
            cancellation: CancellationToken::new(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn dispatcher(&self) -> &Arc<SessionDispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> DownloaderConfig {
        self.config.snapshot()
    }

    /// Constructs the add-info, creates a handle, starts it, and on success
    /// reloads the engine's metadata to derive the torrent's piece geometry
    /// and one `TorrentInput` per file, each biasing the swarm toward its own
    /// read cursor via an [`EngineWaitHook`] bound to `set_piece_deadline`.
    pub async fn add_torrent(
        &self,
        source: TorrentSource,
        resume_data_path: Option<PathBuf>,
    ) -> Result<(Arc<DownloadSession>, Vec<TorrentInput>)> {
        let handle = Arc::new(self.native.create_torrent_handle());
        let mut add_info = self.native.create_torrent_add_info();
        match source {
            TorrentSource::MagnetUri(uri) => add_info.set_magnet_uri(uri),
            TorrentSource::TorrentFilePath(path) => add_info.set_torrent_file_path(path),
        }
        if let Some(path) = resume_data_path {
            add_info.set_resume_data_path(path);
        }

        let accepted = self
            .native
            .start_download(handle.as_ref(), add_info, &self.data_root)
            .await?;
        if !accepted {
            return Err(Error::StartRejected(format!(
                "engine rejected handle {}",
                handle.id()
            )));
        }

        let descriptor = handle.reload_file().await?;
        let pieces = file_view::torrent_piece_list(&descriptor)?;

        let session = Arc::new(DownloadSession::new(handle.id(), pieces.clone()));
        self.dispatcher.register(session.clone());
        session.publish(SessionEventKind::Added);
        info!(handle_id = handle.id(), "torrent added");

        let snapshot = self.config.snapshot();
        let wait_hook: Arc<dyn PieceWaitHook> =
            Arc::new(EngineWaitHook::new(handle.clone(), snapshot.default_piece_deadline_ms));

        let mut inputs = Vec::with_capacity(descriptor.files.len());
        for file_index in 0..descriptor.files.len() {
            let view = LogicalFileView::from_descriptor(&descriptor, file_index, pieces.clone())?;
            let file_path = self.data_root.join(&view.file().path);
            let file = tokio::fs::File::open(&file_path).await?;
            inputs.push(TorrentInput::new(
                view,
                snapshot.read_ahead_buffer_bytes,
                file,
                wait_hook.clone(),
                self.cancellation.clone(),
            )?);
        }

        Ok((session, inputs))
    }

    pub fn apply_config(&self, config: DownloaderConfig) {
        debug!("applying new downloader config");
        self.config.apply(config);
        self.native.apply_config(self.config.snapshot());
    }

    /// Releases every registered session's handle, drains the dispatcher, and
    /// cancels every in-flight read against a `TorrentInput` this downloader
    /// handed out. `handles` must contain every handle currently registered
    /// with this downloader — the core keeps no handle table of its own
    /// beyond the dispatcher's session map.
    pub fn close(&self, handles: &[H]) {
        self.cancellation.cancel();
        for handle in handles {
            self.native.release_handle(handle);
            self.dispatcher.unregister(handle.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_view::{TorrentDescriptor, TorrentFileInfo};
    use crate::handle::{FilePriority, HandleId, PeerInfo, TorrentHandleState};
    use async_trait::async_trait;
    use std::io::Write as _;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    fn one_file_descriptor(name: &str, size: i64) -> TorrentDescriptor {
        let piece_length = 16;
        let num_pieces = size.div_ceil(piece_length) as i32;
        let last_piece_size = size - piece_length * (num_pieces as i64 - 1);
        TorrentDescriptor {
            name: "test torrent".into(),
            num_pieces,
            piece_length,
            last_piece_size,
            files: vec![TorrentFileInfo {
                name: name.into(),
                path: PathBuf::from(name),
                size,
            }],
        }
    }

    struct FakeHandle {
        id: HandleId,
        valid: AtomicBool,
        descriptor: TorrentDescriptor,
    }

    #[async_trait]
    impl TorrentHandle for FakeHandle {
        fn id(&self) -> HandleId {
            self.id
        }
        fn is_valid(&self) -> bool {
            self.valid.load(Ordering::SeqCst)
        }
        fn get_state(&self) -> Option<TorrentHandleState> {
            Some(TorrentHandleState::Downloading)
        }
        async fn post_status_updates(&self) {}
        async fn post_save_resume(&self) {}
        async fn resume(&self) -> Result<()> {
            Ok(())
        }
        async fn set_file_priority(&self, _index: usize, _priority: FilePriority) -> Result<()> {
            Ok(())
        }
        async fn reload_file(&self) -> Result<TorrentDescriptor> {
            Ok(self.descriptor.clone())
        }
        async fn get_peers(&self) -> Result<Vec<PeerInfo>> {
            Ok(vec![])
        }
        fn set_piece_deadline(&self, _index: i32, _deadline_ms: u32) {}
        fn clear_piece_deadlines(&self) {}
        fn add_tracker(&self, _url: &str, _tier: u8, _fail_limit: u32) {}
        fn get_magnet_uri(&self) -> Option<String> {
            None
        }
    }

    #[derive(Default)]
    struct FakeAddInfo {
        magnet: Option<String>,
        torrent_path: Option<PathBuf>,
        resume_path: Option<PathBuf>,
    }

    impl TorrentAddInfo for FakeAddInfo {
        fn set_magnet_uri(&mut self, uri: String) {
            self.magnet = Some(uri);
        }
        fn set_torrent_file_path(&mut self, path: PathBuf) {
            self.torrent_path = Some(path);
        }
        fn set_resume_data_path(&mut self, path: PathBuf) {
            self.resume_path = Some(path);
        }
    }

    struct FakeSession {
        next_id: AtomicU64,
        reject_next: AtomicBool,
        descriptor: TorrentDescriptor,
    }

    #[async_trait]
    impl TorrentManagerSession<FakeHandle, FakeAddInfo> for FakeSession {
        fn create_torrent_handle(&self) -> FakeHandle {
            FakeHandle {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                valid: AtomicBool::new(true),
                descriptor: self.descriptor.clone(),
            }
        }
        fn create_torrent_add_info(&self) -> FakeAddInfo {
            FakeAddInfo::default()
        }
        async fn start_download(
            &self,
            _handle: &FakeHandle,
            _add_info: FakeAddInfo,
            _save_dir: &std::path::Path,
        ) -> Result<bool> {
            Ok(!self.reject_next.swap(false, Ordering::SeqCst))
        }
        fn release_handle(&self, handle: &FakeHandle) {
            handle.valid.store(false, Ordering::SeqCst);
        }
        async fn resume(&self) -> Result<()> {
            Ok(())
        }
        fn apply_config(&self, _config: DownloaderConfig) {}
    }

    #[tokio::test]
    async fn test_add_torrent_registers_session() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("movie.bin"))
            .unwrap()
            .write_all(&[0u8; 16])
            .unwrap();

        let native = FakeSession {
            next_id: AtomicU64::new(1),
            reject_next: AtomicBool::new(false),
            descriptor: one_file_descriptor("movie.bin", 16),
        };
        let downloader = Downloader::new(native, dir.path().to_path_buf(), DownloaderConfig::default());
        let (session, inputs) = downloader
            .add_torrent(TorrentSource::MagnetUri("magnet:?xt=urn:btih:deadbeef".into()), None)
            .await
            .unwrap();
        assert_eq!(session.handle_id(), 1);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].size(), 16);
    }

    #[tokio::test]
    async fn test_add_torrent_rejected_by_engine() {
        let native = FakeSession {
            next_id: AtomicU64::new(1),
            reject_next: AtomicBool::new(true),
            descriptor: one_file_descriptor("movie.bin", 16),
        };
        let downloader = Downloader::new(native, PathBuf::from("/tmp"), DownloaderConfig::default());
        let err = downloader
            .add_torrent(TorrentSource::MagnetUri("magnet:?xt=urn:btih:deadbeef".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StartRejected(_)));
    }
}
