//! Generic buffered/seekable byte source (component C3).
//!
//! `BufferedSeekableInput` is generic over a [`BufferFiller`] strategy rather
//! than relying on a fill method overridden by a subclass: it owns the cursor
//! and buffer window bookkeeping, and the filler owns the policy for what
//! goes into the buffer on a miss.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Which file-relative byte range is currently resident in the buffer.
#[derive(Debug, Clone)]
pub struct BufferWindow {
    pub buf_start: i64,
    pub buf_end: i64,
    pub buffer: Vec<u8>,
}

impl BufferWindow {
    pub fn empty_at(position: i64) -> Self {
        Self {
            buf_start: position,
            buf_end: position,
            buffer: Vec::new(),
        }
    }
}

/// Strategy that fills the buffer on a miss. Implemented by [`crate::torrent_input::TorrentInput`].
#[async_trait]
pub trait BufferFiller: Send {
    /// Must return a window containing byte `position` (unless `position == size`,
    /// the EOF sentinel, which callers never ask to be filled).
    async fn fill_buffer(&mut self, position: i64, size: i64, buffer_size: i64) -> Result<BufferWindow>;

    /// Idempotent resource release. Default no-op.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A seekable byte source backed by a buffer that's refilled, on miss, by a
/// [`BufferFiller`].
pub struct BufferedSeekableInput<F: BufferFiller> {
    position: i64,
    size: i64,
    buffer_size: i64,
    window: BufferWindow,
    filler: F,
    closed: bool,
}

impl<F: BufferFiller> BufferedSeekableInput<F> {
    pub fn new(size: i64, buffer_size: i64, filler: F) -> Self {
        Self {
            position: 0,
            size,
            buffer_size,
            window: BufferWindow::empty_at(0),
            filler,
            closed: false,
        }
    }

    pub const fn position(&self) -> i64 {
        self.position
    }

    pub const fn size(&self) -> i64 {
        self.size
    }

    pub fn seek(&mut self, offset: i64) -> Result<()> {
        if offset < 0 || offset > self.size {
            return Err(Error::OutOfRange(format!(
                "seek target {offset} outside [0, {}]",
                self.size
            )));
        }
        self.position = offset;
        Ok(())
    }

    fn buffer_hit(&self) -> bool {
        self.window.buf_start <= self.position && self.position < self.window.buf_end
    }

    /// Reads at most `out.len()` bytes into `out`. Returns `-1` at EOF,
    /// otherwise the number of bytes read (at least 1, possibly fewer than
    /// requested). If the buffer misses, calls through to the filler; a
    /// cancelled read leaves `position` and the buffer window untouched,
    /// since both are only mutated after the filler's future resolves.
    pub async fn read(&mut self, out: &mut [u8]) -> Result<i32> {
        if self.position == self.size {
            return Ok(-1);
        }
        if !self.buffer_hit() {
            let window = self
                .filler
                .fill_buffer(self.position, self.size, self.buffer_size)
                .await?;
            self.window = window;
        }

        let rel_start = (self.position - self.window.buf_start) as usize;
        let available = (self.window.buf_end - self.position) as usize;
        let n = available.min(out.len());
        out[..n].copy_from_slice(&self.window.buffer[rel_start..rel_start + n]);
        self.position += n as i64;
        Ok(n as i32)
    }

    /// Idempotent; releases the underlying resource via the filler.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.filler.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFiller {
        data: Vec<u8>,
    }

    #[async_trait]
    impl BufferFiller for FixedFiller {
        async fn fill_buffer(&mut self, position: i64, _size: i64, buffer_size: i64) -> Result<BufferWindow> {
            let end = (position + buffer_size).min(self.data.len() as i64);
            Ok(BufferWindow {
                buf_start: position,
                buf_end: end,
                buffer: self.data[position as usize..end as usize].to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn test_seek_out_of_range() {
        let mut input = BufferedSeekableInput::new(10, 4, FixedFiller { data: vec![0u8; 10] });
        assert!(input.seek(-1).is_err());
        assert!(input.seek(11).is_err());
        assert!(input.seek(10).is_ok());
    }

    #[tokio::test]
    async fn test_round_trip_position() {
        let data: Vec<u8> = (0..20u8).collect();
        let mut input = BufferedSeekableInput::new(20, 8, FixedFiller { data });
        input.seek(5).unwrap();
        let mut buf = [0u8; 3];
        let n = input.read(&mut buf).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(input.position(), 8);
        assert_eq!(&buf, &[5, 6, 7]);
    }

    #[tokio::test]
    async fn test_eof() {
        let mut input = BufferedSeekableInput::new(4, 8, FixedFiller { data: vec![1, 2, 3, 4] });
        input.seek(4).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(input.read(&mut buf).await.unwrap(), -1);
    }
}
