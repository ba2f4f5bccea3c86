//! Torrent metadata and the mapping between a single file's logical byte
//! range and the torrent's absolute piece/byte coordinate space.

use std::path::PathBuf;
use std::sync::Arc;

use torrentstream_core::lengths::Lengths;

use crate::error::{Error, Result};
use crate::piece::Piece;
use crate::piece_list::PieceList;

/// One file inside a (possibly multi-file) torrent.
#[derive(Debug, Clone)]
pub struct TorrentFileInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: i64,
}

/// Torrent metadata as reported by the engine once available (`reloadFile`
/// in the engine handle contract).
#[derive(Debug, Clone)]
pub struct TorrentDescriptor {
    pub name: String,
    pub num_pieces: i32,
    pub piece_length: i64,
    pub last_piece_size: i64,
    pub files: Vec<TorrentFileInfo>,
}

/// Derives the torrent-wide [`PieceList`] from a [`TorrentDescriptor`]'s
/// piece geometry. Every `LogicalFileView` for the same torrent should share
/// one `PieceList` built from this, so a piece finishing is visible to every
/// file view at once.
pub fn torrent_piece_list(descriptor: &TorrentDescriptor) -> Result<PieceList> {
    let total_length = (descriptor.num_pieces as u64 - 1) * descriptor.piece_length as u64
        + descriptor.last_piece_size as u64;
    let lengths = Lengths::new(total_length, descriptor.piece_length as u32)
        .map_err(|e| Error::InvariantViolation(e.to_string()))?;

    let pieces = lengths
        .iter_piece_infos()
        .map(|info| {
            let piece_index = info.piece_index.get() as i32;
            let start = lengths.piece_offset(info.piece_index) as i64;
            Piece::new(piece_index, start, info.len as i64).map(Arc::new)
        })
        .collect::<Result<Vec<_>>>()?;
    PieceList::new(pieces)
}

/// A single file's view onto a sub-range of the torrent's piece space.
///
/// `logical_start_offset` is the absolute byte offset (in the torrent's
/// concatenated piece stream) of the file's first byte; a read at
/// file-relative position `p` targets absolute offset
/// `logical_start_offset + p`.
#[derive(Clone)]
pub struct LogicalFileView {
    file: TorrentFileInfo,
    pieces: PieceList,
    logical_start_offset: i64,
    size: i64,
}

impl LogicalFileView {
    pub fn new(
        file: TorrentFileInfo,
        pieces: PieceList,
        logical_start_offset: i64,
        size: i64,
    ) -> Result<Self> {
        if file.size < size {
            return Err(Error::InvariantViolation(format!(
                "file {:?} has length {} shorter than logical view size {}",
                file.path, file.size, size
            )));
        }
        if pieces.find_position_by_absolute_offset(logical_start_offset) < 0 {
            return Err(Error::InvariantViolation(
                "logicalStartOffset does not lie inside any piece of the list".into(),
            ));
        }
        if size > 0 && pieces.find_position_by_absolute_offset(logical_start_offset + size - 1) < 0
        {
            return Err(Error::InvariantViolation(
                "logicalStartOffset + size - 1 does not lie inside any piece of the list".into(),
            ));
        }
        Ok(Self {
            file,
            pieces,
            logical_start_offset,
            size,
        })
    }

    pub fn file(&self) -> &TorrentFileInfo {
        &self.file
    }

    pub fn pieces(&self) -> &PieceList {
        &self.pieces
    }

    pub const fn logical_start_offset(&self) -> i64 {
        self.logical_start_offset
    }

    pub const fn size(&self) -> i64 {
        self.size
    }

    pub const fn absolute_offset(&self, view_offset: i64) -> i64 {
        self.logical_start_offset + view_offset
    }

    /// Builds the view for `descriptor.files[file_index]` against a
    /// torrent-wide `pieces` list (see [`torrent_piece_list`]). Files are
    /// concatenated in declaration order in the torrent's byte stream, so a
    /// file's `logical_start_offset` is the sum of the sizes of the files
    /// before it.
    pub fn from_descriptor(
        descriptor: &TorrentDescriptor,
        file_index: usize,
        pieces: PieceList,
    ) -> Result<Self> {
        let file = descriptor.files.get(file_index).ok_or_else(|| {
            Error::InvariantViolation(format!(
                "file index {file_index} out of range for torrent with {} files",
                descriptor.files.len()
            ))
        })?;
        let logical_start_offset: i64 = descriptor.files[..file_index]
            .iter()
            .map(|f| f.size)
            .sum();
        let size = file.size;
        Self::new(file.clone(), pieces, logical_start_offset, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn file(size: i64) -> TorrentFileInfo {
        TorrentFileInfo {
            name: "movie.mkv".into(),
            path: PathBuf::from("movie.mkv"),
            size,
        }
    }

    fn pieces(piece_len: i64, count: i32) -> PieceList {
        let pieces = (0..count)
            .map(|i| Arc::new(Piece::new(i, i as i64 * piece_len, piece_len).unwrap()))
            .collect();
        PieceList::new(pieces).unwrap()
    }

    #[test]
    fn test_valid_view() {
        let view = LogicalFileView::new(file(40), pieces(16, 3), 8, 40).unwrap();
        assert_eq!(view.absolute_offset(10), 18);
    }

    #[test]
    fn test_file_too_short_rejected() {
        assert!(LogicalFileView::new(file(10), pieces(16, 3), 8, 40).is_err());
    }

    #[test]
    fn test_start_outside_pieces_rejected() {
        assert!(LogicalFileView::new(file(40), pieces(16, 3), 100, 40).is_err());
    }

    fn descriptor(files: Vec<TorrentFileInfo>) -> TorrentDescriptor {
        let total: i64 = files.iter().map(|f| f.size).sum();
        let piece_length = 16i64;
        let num_pieces = total.div_ceil(piece_length) as i32;
        let last_piece_size = total - piece_length * (num_pieces as i64 - 1);
        TorrentDescriptor {
            name: "test torrent".into(),
            num_pieces,
            piece_length,
            last_piece_size,
            files,
        }
    }

    #[test]
    fn test_torrent_piece_list_covers_whole_torrent() {
        let descriptor = descriptor(vec![file(40)]);
        let pieces = torrent_piece_list(&descriptor).unwrap();
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces.get_at(0).unwrap().size(), 16);
        assert_eq!(pieces.get_at(2).unwrap().size(), 8);
    }

    #[test]
    fn test_from_descriptor_second_file_offset_follows_first() {
        let descriptor = descriptor(vec![
            TorrentFileInfo { name: "a".into(), path: PathBuf::from("a"), size: 20 },
            TorrentFileInfo { name: "b".into(), path: PathBuf::from("b"), size: 20 },
        ]);
        let pieces = torrent_piece_list(&descriptor).unwrap();

        let first = LogicalFileView::from_descriptor(&descriptor, 0, pieces.clone()).unwrap();
        assert_eq!(first.logical_start_offset(), 0);
        assert_eq!(first.size(), 20);

        let second = LogicalFileView::from_descriptor(&descriptor, 1, pieces).unwrap();
        assert_eq!(second.logical_start_offset(), 20);
        assert_eq!(second.size(), 20);
    }

    #[test]
    fn test_from_descriptor_out_of_range_index_rejected() {
        let descriptor = descriptor(vec![file(40)]);
        let pieces = torrent_piece_list(&descriptor).unwrap();
        assert!(LogicalFileView::from_descriptor(&descriptor, 1, pieces).is_err());
    }
}
