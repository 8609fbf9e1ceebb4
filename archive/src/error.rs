use std::io;

use meridian_primitives::{Epoch, LayoutError, RelativeSlot, Slot};
use thiserror::Error;

/// Why an iterator range was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeViolation {
    /// The lower bound lies after the upper bound.
    Inverted,
    /// No entry is stored at the lower bound.
    MissingFrom,
    /// No entry is stored at the upper bound.
    MissingTo,
}

/// Errors reported by the archive.
///
/// The first group are user errors: contract violations the caller can
/// recover from, surfaced synchronously and leaving the archive open. The
/// second group are unexpected errors (I/O failures, on-disk corruption);
/// any of them raised during a write closes the archive, and the caller has
/// to reopen with a validation policy to continue.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Blocks are only appended after the tip.
    #[error("cannot append at slot {slot}, the tip is already at slot {tip:?}")]
    AppendToSlotInThePast { slot: Slot, tip: Option<Slot> },

    /// Boundary blocks are only appended in the current epoch (while still
    /// empty) or a later one.
    #[error("cannot append the boundary block of epoch {epoch}, the archive is at epoch {current_epoch}")]
    AppendToEbbInThePast { epoch: Epoch, current_epoch: Epoch },

    /// Reads past the tip are refused.
    #[error("cannot read slot {slot}, the tip is at slot {tip:?}")]
    ReadFutureSlot { slot: Slot, tip: Option<Slot> },

    /// Boundary-block reads past the current epoch are refused.
    #[error("cannot read the boundary block of epoch {epoch}, the archive is at epoch {current_epoch}")]
    ReadFutureEbb { epoch: Epoch, current_epoch: Epoch },

    /// The bounds passed to `stream` do not describe a streamable range.
    #[error("invalid iterator range from slot {from} to slot {to}: {reason:?}")]
    InvalidIteratorRange {
        from: Slot,
        to: Slot,
        reason: RangeViolation,
    },

    /// Truncation requires all iterators to be closed first.
    #[error("{count} iterators are still open")]
    IteratorsOpen { count: usize },

    /// The archive is already open.
    #[error("the archive is already open")]
    AlreadyOpen,

    /// The archive has been closed (explicitly or by an earlier failure).
    #[error("the archive is closed")]
    Closed,

    #[error("file system error: {0}")]
    Io(#[from] io::Error),

    /// A stored block does not hash to the checksum recorded for it.
    #[error("checksum mismatch for relative slot {relative_slot} of epoch {epoch}: expected {expected:#010x}, got {got:#010x}")]
    ChecksumMismatch {
        epoch: Epoch,
        relative_slot: RelativeSlot,
        expected: u32,
        got: u32,
    },

    #[error("invalid primary index for epoch {epoch}: {reason}")]
    InvalidPrimaryIndex { epoch: Epoch, reason: String },

    /// An epoch file disappeared or lacks the bytes its indices point at.
    #[error("missing or truncated epoch file for epoch {epoch}")]
    MissingEpochFile { epoch: Epoch },

    /// A stored record could not be decoded.
    #[error("invalid binary data in epoch {epoch}: {reason}")]
    InvalidBinary { epoch: Epoch, reason: String },

    #[error("epoch layout error: {0}")]
    Layout(#[from] LayoutError),
}

impl ArchiveError {
    /// User errors leave the archive open; anything else closes it when it
    /// strikes during a write.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ArchiveError::AppendToSlotInThePast { .. }
                | ArchiveError::AppendToEbbInThePast { .. }
                | ArchiveError::ReadFutureSlot { .. }
                | ArchiveError::ReadFutureEbb { .. }
                | ArchiveError::InvalidIteratorRange { .. }
                | ArchiveError::IteratorsOpen { .. }
                | ArchiveError::AlreadyOpen
                | ArchiveError::Closed
        )
    }
}
