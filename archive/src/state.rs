use std::fs::File;

use meridian_primitives::{BlockHash, Epoch, Tip};

use crate::{error::ArchiveError, index::SharedIndexes};

/// The writer-side state of an open archive: the current epoch, open
/// handles to its three files, the write offsets, the in-memory indices of
/// the current epoch and the tip.
pub(crate) struct OpenState<H: BlockHash> {
    pub current_epoch: Epoch,
    pub epoch_file: File,
    pub primary_file: File,
    pub secondary_file: File,
    /// Size of the current epoch file; the next block lands here.
    pub epoch_offset: u64,
    /// Size of the current secondary index file.
    pub secondary_offset: u64,
    /// Indices of the current epoch. Shared with readers; the writer clones
    /// on write when a reader still holds a snapshot.
    pub current_index: SharedIndexes<H>,
    pub tip: Tip<H>,
}

impl<H: BlockHash> OpenState<H> {
    pub fn snapshot(&self) -> Snapshot<H> {
        Snapshot {
            current_epoch: self.current_epoch,
            epoch_offset: self.epoch_offset,
            current_index: SharedIndexes::clone(&self.current_index),
            tip: self.tip.clone(),
        }
    }
}

/// What a reader captures under the state lock: a consistent view of the
/// archive at one instant. Appends issued afterwards are invisible through
/// it, including their bytes in the current epoch file, because all reads
/// are bounded by `epoch_offset`.
#[derive(Clone)]
pub(crate) struct Snapshot<H: BlockHash> {
    pub current_epoch: Epoch,
    pub epoch_offset: u64,
    pub current_index: SharedIndexes<H>,
    pub tip: Tip<H>,
}

/// Lifecycle of the archive state behind the lock.
pub(crate) enum DbState<H: BlockHash> {
    Open(OpenState<H>),
    Closed,
}

impl<H: BlockHash> DbState<H> {
    pub fn open_ref(&self) -> Result<&OpenState<H>, ArchiveError> {
        match self {
            DbState::Open(state) => Ok(state),
            DbState::Closed => Err(ArchiveError::Closed),
        }
    }

    pub fn open_mut(&mut self) -> Result<&mut OpenState<H>, ArchiveError> {
        match self {
            DbState::Open(state) => Ok(state),
            DbState::Closed => Err(ArchiveError::Closed),
        }
    }
}
