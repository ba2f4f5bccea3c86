//! Piece identity, state and the per-piece "finished" wait primitive (component C1).

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::Notify;

use crate::error::{Error, Result};

/// Engine-reported progress for a single piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PieceState {
    NotAvailable = 0,
    Ready = 1,
    Downloading = 2,
    Finished = 3,
    Failed = 4,
    Checking = 5,
}

impl PieceState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::NotAvailable,
            1 => Self::Ready,
            2 => Self::Downloading,
            3 => Self::Finished,
            4 => Self::Failed,
            5 => Self::Checking,
            _ => unreachable!("corrupt piece state byte {v}"),
        }
    }

    /// Whether `self -> next` is an allowed transition. States are monotone
    /// towards `Finished`, except that `Failed` may retry back to `Downloading`.
    fn can_transition_to(self, next: PieceState) -> bool {
        use PieceState::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Finished, _) => false,
            (Failed, Downloading) => true,
            (Failed, _) => false,
            _ => true,
        }
    }
}

/// A single piece: immutable identity plus mutable, atomically-observed state
/// and a broadcast latch that releases every waiter the moment the piece
/// first becomes [`PieceState::Finished`].
#[derive(Debug)]
pub struct Piece {
    piece_index: i32,
    data_start_offset: i64,
    size: i64,
    state: AtomicU8,
    finished: Notify,
}

impl Piece {
    pub fn new(piece_index: i32, data_start_offset: i64, size: i64) -> Result<Self> {
        if size <= 0 {
            return Err(Error::InvariantViolation(format!(
                "piece {piece_index} has non-positive size {size}"
            )));
        }
        Ok(Self {
            piece_index,
            data_start_offset,
            size,
            state: AtomicU8::new(PieceState::NotAvailable as u8),
            finished: Notify::new(),
        })
    }

    pub const fn piece_index(&self) -> i32 {
        self.piece_index
    }

    pub const fn data_start_offset(&self) -> i64 {
        self.data_start_offset
    }

    pub const fn size(&self) -> i64 {
        self.size
    }

    pub const fn data_last_offset(&self) -> i64 {
        self.data_start_offset + self.size - 1
    }

    pub fn state(&self) -> PieceState {
        PieceState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Transition to a new state. Transitioning to `Finished` wakes every
    /// current and future waiter of [`Piece::await_finished`].
    pub fn set_state(&self, next: PieceState) -> Result<()> {
        let current = self.state();
        if !current.can_transition_to(next) {
            return Err(Error::InvariantViolation(format!(
                "piece {} illegal transition {current:?} -> {next:?}",
                self.piece_index
            )));
        }
        self.state.store(next as u8, Ordering::Release);
        if next == PieceState::Finished {
            self.finished.notify_waiters();
        }
        Ok(())
    }

    /// Resolves immediately if already [`PieceState::Finished`]; otherwise
    /// suspends until the engine-callback side publishes that transition.
    /// Safe to call repeatedly and from multiple tasks.
    pub async fn await_finished(&self) {
        loop {
            if self.state() == PieceState::Finished {
                return;
            }
            let notified = self.finished.notified();
            if self.state() == PieceState::Finished {
                return;
            }
            notified.await;
        }
    }
}
