//! `TorrentInput`: the piece-aware specialization of the buffered seekable
//! input (component C4) — the core of the streaming read plane.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::sync::CancellationToken;

use crate::buffered_input::{BufferFiller, BufferWindow, BufferedSeekableInput};
use crate::error::{Error, Result};
use crate::file_view::LogicalFileView;
use crate::handle::TorrentHandle;
use crate::piece::{Piece, PieceState};

/// Hook invoked when a read blocks on a not-yet-finished piece. Implemented
/// by the owning session as `handle.setPieceDeadline(index, 0)`.
#[async_trait]
pub trait PieceWaitHook: Send + Sync {
    async fn on_wait(&self, absolute_piece_index: i32);
}

/// A no-op hook, useful for tests that don't care about deadline hints.
pub struct NoopWaitHook;

#[async_trait]
impl PieceWaitHook for NoopWaitHook {
    async fn on_wait(&self, _absolute_piece_index: i32) {}
}

/// Biases the swarm toward the playback cursor: a blocked read bumps the
/// missing piece's deadline to the front of the engine's request queue.
pub struct EngineWaitHook<H: TorrentHandle> {
    handle: Arc<H>,
    deadline_ms: u32,
}

impl<H: TorrentHandle> EngineWaitHook<H> {
    pub fn new(handle: Arc<H>, deadline_ms: u32) -> Self {
        Self { handle, deadline_ms }
    }
}

#[async_trait]
impl<H: TorrentHandle + 'static> PieceWaitHook for EngineWaitHook<H> {
    async fn on_wait(&self, absolute_piece_index: i32) {
        self.handle.set_piece_deadline(absolute_piece_index, self.deadline_ms);
    }
}

/// Converts a file-relative `view_offset` to the absolute piece index that
/// contains it, or `-1` if no piece in the view's piece list covers it.
pub fn find_piece_index(view: &LogicalFileView, view_offset: i64) -> Result<i32> {
    if view_offset < 0 {
        return Err(Error::InvariantViolation(format!(
            "viewOffset {view_offset} must be >= 0"
        )));
    }
    let absolute = view.absolute_offset(view_offset);
    let pos = view.pieces().find_position_by_absolute_offset(absolute);
    if pos < 0 {
        return Ok(-1);
    }
    Ok(view.pieces().get_at(pos as usize).unwrap().piece_index())
}

fn find_piece_index_or_fail(view: &LogicalFileView, view_offset: i64) -> Result<i32> {
    match find_piece_index(view, view_offset)? {
        -1 => Err(Error::InvariantViolation(format!(
            "no piece contains view offset {view_offset}"
        ))),
        idx => Ok(idx),
    }
}

/// How many contiguous, already-FINISHED bytes follow `view_offset` (inclusive),
/// clamped to `cap` and to the file's logical end.
pub fn compute_max_buffer_size_forward(
    view: &LogicalFileView,
    view_offset: i64,
    cap: i64,
    piece: &Arc<Piece>,
) -> Result<i64> {
    if cap <= 0 {
        return Err(Error::InvariantViolation(format!("cap {cap} must be > 0")));
    }
    if view_offset < 0 {
        return Err(Error::InvariantViolation(format!(
            "viewOffset {view_offset} must be >= 0"
        )));
    }
    let last_logical_offset = view.logical_start_offset() + view.size() - 1;
    let mut curr = piece;
    let mut curr_offset = view.absolute_offset(view_offset);
    let mut acc: i64 = 0;
    loop {
        if curr.state() != PieceState::Finished {
            return Ok(acc);
        }
        let end_of_curr = curr.data_last_offset().min(last_logical_offset);
        acc += end_of_curr - curr_offset + 1;
        if acc >= cap {
            return Ok(cap);
        }
        match view.pieces().get_by_piece_index(curr.piece_index() + 1) {
            None => return Ok(acc),
            Some(next) => {
                curr_offset = end_of_curr + 1;
                curr = next;
            }
        }
    }
}

/// How many contiguous, already-FINISHED bytes precede `view_offset`
/// (exclusive of the byte at `view_offset` itself), clamped to `cap` and to
/// the file's logical start.
pub fn compute_max_buffer_size_backward(
    view: &LogicalFileView,
    view_offset: i64,
    cap: i64,
    piece: &Arc<Piece>,
) -> Result<i64> {
    if cap <= 0 {
        return Err(Error::InvariantViolation(format!("cap {cap} must be > 0")));
    }
    if view_offset < 0 {
        return Err(Error::InvariantViolation(format!(
            "viewOffset {view_offset} must be >= 0"
        )));
    }
    let first_logical_offset = view.logical_start_offset();
    let mut curr = piece;
    let mut curr_offset = view.absolute_offset(view_offset);
    let mut acc: i64 = 0;
    loop {
        if curr.state() != PieceState::Finished {
            return Ok(acc);
        }
        let length = curr_offset - curr.data_start_offset().max(first_logical_offset);
        acc += length;
        if acc >= cap {
            return Ok(cap);
        }
        match view.pieces().get_by_piece_index(curr.piece_index() - 1) {
            None => return Ok(acc),
            Some(prev) => {
                curr_offset = curr.data_start_offset().max(first_logical_offset);
                curr = prev;
            }
        }
    }
}

struct TorrentFiller {
    file: File,
    view: LogicalFileView,
    wait_hook: Arc<dyn PieceWaitHook>,
    cancellation: CancellationToken,
}

#[async_trait]
impl BufferFiller for TorrentFiller {
    async fn fill_buffer(&mut self, position: i64, size: i64, buffer_size: i64) -> Result<BufferWindow> {
        let idx = find_piece_index_or_fail(&self.view, position)?;
        let piece = self
            .view
            .pieces()
            .get_by_piece_index(idx)
            .expect("find_piece_index_or_fail guarantees the piece exists")
            .clone();

        if piece.state() != PieceState::Finished {
            self.wait_hook.on_wait(idx).await;
            tokio::select! {
                _ = self.cancellation.cancelled() => return Err(Error::Cancelled),
                _ = piece.await_finished() => {}
            }
        }

        let max_fwd = compute_max_buffer_size_forward(&self.view, position, buffer_size, &piece)?;
        let max_back = compute_max_buffer_size_backward(&self.view, position, buffer_size, &piece)?;

        let read_start = (position - max_back).max(0);
        let read_end = (position + max_fwd).min(size);
        let len = (read_end - read_start) as usize;

        self.file.seek(SeekFrom::Start(read_start as u64)).await?;
        let mut buffer = vec![0u8; len];
        self.file.read_exact(&mut buffer).await?;

        Ok(BufferWindow {
            buf_start: read_start,
            buf_end: read_end,
            buffer,
        })
    }
}

/// A seekable, buffered byte source over a torrent's save file that waits
/// for required pieces to finish and coalesces adjacent finished pieces into
/// a single disk read per fill.
///
/// Deliberately `!Sync`: the contract forbids concurrent reads on one
/// `TorrentInput` without enforcing it at runtime; making it `!Sync` turns a
/// would-be race into a compile error instead of paying for an internal lock.
pub struct TorrentInput {
    inner: BufferedSeekableInput<TorrentFiller>,
    _not_sync: PhantomData<std::cell::Cell<()>>,
}

impl TorrentInput {
    pub fn new(
        view: LogicalFileView,
        buffer_size: i64,
        file: File,
        wait_hook: Arc<dyn PieceWaitHook>,
        cancellation: CancellationToken,
    ) -> Result<Self> {
        let first_piece = view.pieces().first();
        let total_piece_bytes: i64 = view.pieces().iter().map(|p| p.size()).sum();
        let required = view.size() + (view.logical_start_offset() - first_piece.data_start_offset());
        if total_piece_bytes < required {
            return Err(Error::InvariantViolation(format!(
                "piece list covers {total_piece_bytes} bytes, file needs {required}"
            )));
        }
        if find_piece_index(&view, 0)? == -1 {
            return Err(Error::InvariantViolation(
                "file's first byte is not inside any piece".into(),
            ));
        }
        if view.size() != 0 && find_piece_index(&view, view.size() - 1)? == -1 {
            return Err(Error::InvariantViolation(
                "file's last byte is not inside any piece".into(),
            ));
        }

        let size = view.size();
        let filler = TorrentFiller {
            file,
            view,
            wait_hook,
            cancellation,
        };
        Ok(Self {
            inner: BufferedSeekableInput::new(size, buffer_size, filler),
            _not_sync: PhantomData,
        })
    }

    pub const fn position(&self) -> i64 {
        self.inner.position()
    }

    pub const fn size(&self) -> i64 {
        self.inner.size()
    }

    pub fn seek(&mut self, offset: i64) -> Result<()> {
        self.inner.seek(offset)
    }

    pub async fn read(&mut self, out: &mut [u8]) -> Result<i32> {
        self.inner.read(out).await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}
