//! Ordered, binary-searchable collection of pieces (component C2).

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::piece::Piece;

/// A view over a contiguous range of the torrent's global piece space: pieces
/// are ordered by `data_start_offset` and their absolute piece indices are
/// contiguous, so lookup by absolute index is O(1) via a base offset.
#[derive(Clone)]
pub struct PieceList {
    pieces: Arc<Vec<Arc<Piece>>>,
    min_piece_index: i32,
}

impl PieceList {
    /// Builds a list from pieces already in increasing, non-overlapping
    /// `data_start_offset` order with contiguous absolute piece indices.
    pub fn new(pieces: Vec<Arc<Piece>>) -> Result<Self> {
        if pieces.is_empty() {
            return Err(Error::InvariantViolation("empty piece list".into()));
        }
        for w in pieces.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            if b.data_start_offset() <= a.data_start_offset() {
                return Err(Error::InvariantViolation(
                    "piece list is not strictly increasing by data_start_offset".into(),
                ));
            }
            if a.data_last_offset() >= b.data_start_offset() {
                return Err(Error::InvariantViolation(
                    "overlapping pieces in piece list".into(),
                ));
            }
            if b.piece_index() != a.piece_index() + 1 {
                return Err(Error::InvariantViolation(
                    "piece list has non-contiguous absolute piece indices".into(),
                ));
            }
        }
        let min_piece_index = pieces[0].piece_index();
        Ok(Self {
            pieces: Arc::new(pieces),
            min_piece_index,
        })
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn first(&self) -> &Arc<Piece> {
        self.pieces.first().expect("piece list is never empty")
    }

    pub fn last(&self) -> &Arc<Piece> {
        self.pieces.last().expect("piece list is never empty")
    }

    pub fn get_at(&self, position: usize) -> Option<&Arc<Piece>> {
        self.pieces.get(position)
    }

    pub fn contains_absolute_piece_index(&self, index: i32) -> bool {
        index >= self.min_piece_index && (index - self.min_piece_index) < self.pieces.len() as i32
    }

    pub fn get_by_piece_index(&self, absolute_index: i32) -> Option<&Arc<Piece>> {
        if !self.contains_absolute_piece_index(absolute_index) {
            return None;
        }
        self.pieces
            .get((absolute_index - self.min_piece_index) as usize)
    }

    /// Binary search by a custom predicate over byte offsets. `predicate`
    /// receives a piece and must return `-1` if the target is greater than
    /// everything in this piece (search right), `0` on a hit, `+1` if the
    /// target is less than everything in this piece (search left).
    /// Returns the *list position* (not absolute piece index), or `-1` if
    /// nothing matches.
    pub fn binary_search(&self, predicate: impl Fn(&Piece) -> i32) -> i32 {
        let mut lo: i64 = 0;
        let mut hi: i64 = self.pieces.len() as i64 - 1;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let cmp = predicate(&self.pieces[mid as usize]);
            match cmp {
                0 => return mid as i32,
                -1 => lo = mid + 1,
                1 => hi = mid - 1,
                _ => unreachable!("binary_search predicate must return -1, 0 or 1"),
            }
        }
        -1
    }

    /// Finds the list position of the piece containing `absolute_offset`, or
    /// `-1` if no piece in the list covers it.
    pub fn find_position_by_absolute_offset(&self, absolute_offset: i64) -> i32 {
        self.binary_search(|piece| {
            if absolute_offset > piece.data_last_offset() {
                -1
            } else if absolute_offset < piece.data_start_offset() {
                1
            } else {
                0
            }
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Piece>> {
        self.pieces.iter()
    }
}
