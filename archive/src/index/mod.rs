pub(crate) mod primary;
pub(crate) mod secondary;

use std::sync::Arc;

pub(crate) use primary::PrimaryIndex;
pub(crate) use secondary::{entry_size, SecondaryEntry};

/// The parsed indices of one epoch, shared immutably between the writer,
/// readers and the cache.
#[derive(Clone, Debug)]
pub(crate) struct EpochIndexes<H> {
    pub primary: PrimaryIndex,
    pub entries: Vec<SecondaryEntry<H>>,
}

impl<H> EpochIndexes<H> {
    pub fn empty() -> EpochIndexes<H> {
        EpochIndexes {
            primary: PrimaryIndex::new(),
            entries: Vec::new(),
        }
    }
}

pub(crate) type SharedIndexes<H> = Arc<EpochIndexes<H>>;
