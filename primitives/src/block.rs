use std::fmt;

use crate::coordinates::{Epoch, Slot};

/// Chain location of a stored entry: a regular block in some slot, or an
/// epoch boundary block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockOrEbb {
    Block(Slot),
    Ebb(Epoch),
}

impl BlockOrEbb {
    #[inline]
    pub fn is_ebb(&self) -> bool {
        matches!(self, BlockOrEbb::Ebb(_))
    }
}

impl fmt::Display for BlockOrEbb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockOrEbb::Block(slot) => write!(f, "block at slot {slot}"),
            BlockOrEbb::Ebb(epoch) => write!(f, "boundary block of epoch {epoch}"),
        }
    }
}

/// Everything known about the most recently stored entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TipInfo<H> {
    pub hash: H,
    pub location: BlockOrEbb,
    pub block_number: u64,
}

/// The tip of the stored chain. `Origin` on an empty store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tip<H> {
    Origin,
    At(TipInfo<H>),
}

impl<H> Tip<H> {
    #[inline]
    pub fn is_origin(&self) -> bool {
        matches!(self, Tip::Origin)
    }

    #[inline]
    pub fn info(&self) -> Option<&TipInfo<H>> {
        match self {
            Tip::Origin => None,
            Tip::At(info) => Some(info),
        }
    }
}

impl<H: fmt::Display> fmt::Display for Tip<H> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Tip::Origin => f.write_str("origin"),
            Tip::At(info) => write!(f, "{} ({})", info.location, info.hash),
        }
    }
}

/// Descriptor of a serialized block: the raw bytes plus the position of the
/// header within them. The store never parses block bodies.
#[derive(Clone, Copy, Debug)]
pub struct BinaryInfo<'a> {
    pub bytes: &'a [u8],
    pub header_offset: u16,
    pub header_size: u16,
}

impl<'a> BinaryInfo<'a> {
    pub fn new(bytes: &'a [u8], header_offset: u16, header_size: u16) -> BinaryInfo<'a> {
        BinaryInfo {
            bytes,
            header_offset,
            header_size,
        }
    }
}
