use std::{
    fmt,
    ops::{Add, AddAssign},
};

use serde::{Deserialize, Serialize};

/// Absolute slot number, counted from the genesis of the chain.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Slot(u64);

impl Slot {
    pub const GENESIS: Slot = Slot(0);

    #[inline]
    pub const fn new(slot: u64) -> Slot {
        Slot(slot)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Number of slots between `earlier` and `self`, or `None` if `earlier`
    /// is actually later.
    #[inline]
    pub fn slots_since(self, earlier: Slot) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }
}

impl Add<u64> for Slot {
    type Output = Slot;

    fn add(self, rhs: u64) -> Slot {
        Slot(self.0 + rhs)
    }
}

impl AddAssign<u64> for Slot {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl From<u64> for Slot {
    fn from(slot: u64) -> Slot {
        Slot(slot)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Epoch number, counted from the genesis of the chain.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Epoch(u64);

impl Epoch {
    pub const GENESIS: Epoch = Epoch(0);

    #[inline]
    pub const fn new(epoch: u64) -> Epoch {
        Epoch(epoch)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn next(self) -> Epoch {
        Epoch(self.0 + 1)
    }

    /// The preceding epoch, or `None` for epoch 0.
    #[inline]
    pub fn prev(self) -> Option<Epoch> {
        self.0.checked_sub(1).map(Epoch)
    }

    /// Number of epochs between `earlier` and `self`, or `None` if `earlier`
    /// is actually later.
    #[inline]
    pub fn epochs_since(self, earlier: Epoch) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }
}

impl Add<u64> for Epoch {
    type Output = Epoch;

    fn add(self, rhs: u64) -> Epoch {
        Epoch(self.0 + rhs)
    }
}

impl From<u64> for Epoch {
    fn from(epoch: u64) -> Epoch {
        Epoch(epoch)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of a slot within its epoch, `0 <= r < epoch_size`.
///
/// Relative slot 0 of every epoch is reserved for the optional epoch boundary
/// block; the first regular block of an epoch sits at relative slot 1.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RelativeSlot(u64);

impl RelativeSlot {
    /// The relative slot reserved for the epoch boundary block.
    pub const BOUNDARY: RelativeSlot = RelativeSlot(0);

    #[inline]
    pub const fn new(relative: u64) -> RelativeSlot {
        RelativeSlot(relative)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn next(self) -> RelativeSlot {
        RelativeSlot(self.0 + 1)
    }
}

impl fmt::Display for RelativeSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An epoch number together with a position inside that epoch.
///
/// Ordered lexicographically, which coincides with chain order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpochSlot {
    pub epoch: Epoch,
    pub relative_slot: RelativeSlot,
}

impl EpochSlot {
    #[inline]
    pub const fn new(epoch: Epoch, relative_slot: RelativeSlot) -> EpochSlot {
        EpochSlot {
            epoch,
            relative_slot,
        }
    }

    /// The boundary position (relative slot 0) of the given epoch.
    #[inline]
    pub const fn boundary_of(epoch: Epoch) -> EpochSlot {
        EpochSlot {
            epoch,
            relative_slot: RelativeSlot::BOUNDARY,
        }
    }
}

impl fmt::Display for EpochSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.epoch, self.relative_slot)
    }
}
