use thiserror::Error;

use crate::coordinates::{Epoch, EpochSlot, RelativeSlot, Slot};

/// Errors reported by an [`EpochLayout`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The layout was configured with an epoch of zero slots.
    #[error("epoch {0} has zero slots")]
    ZeroEpochSize(Epoch),
    /// The layout cannot answer for coordinates this far in the future.
    #[error("coordinates past the layout horizon: {0}")]
    PastHorizon(String),
}

/// Partitioning of the slot space into epochs.
///
/// Implementations must be deterministic: asking twice for the same epoch
/// must give the same answer, and the three methods must agree with each
/// other. Epoch sizes are strictly positive.
///
/// A fixed-size chain uses [`FixedLayout`]; a chain whose epoch size changes
/// at hard forks derives its layout from an era summary.
pub trait EpochLayout: Send + Sync {
    /// Number of slots in the given epoch.
    fn epoch_size(&self, epoch: Epoch) -> Result<u64, LayoutError>;

    /// First absolute slot of the given epoch.
    fn first_slot_of(&self, epoch: Epoch) -> Result<Slot, LayoutError>;

    /// Epoch containing the given absolute slot, and the slot's position
    /// within it.
    fn epoch_slot_of(&self, slot: Slot) -> Result<EpochSlot, LayoutError>;
}

/// The trivial layout: every epoch has the same number of slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedLayout {
    epoch_size: u64,
}

impl FixedLayout {
    pub fn new(epoch_size: u64) -> FixedLayout {
        assert!(epoch_size > 0, "epoch size must be strictly positive");
        FixedLayout { epoch_size }
    }
}

impl EpochLayout for FixedLayout {
    fn epoch_size(&self, _epoch: Epoch) -> Result<u64, LayoutError> {
        Ok(self.epoch_size)
    }

    fn first_slot_of(&self, epoch: Epoch) -> Result<Slot, LayoutError> {
        Ok(Slot::new(epoch.as_u64() * self.epoch_size))
    }

    fn epoch_slot_of(&self, slot: Slot) -> Result<EpochSlot, LayoutError> {
        Ok(EpochSlot::new(
            Epoch::new(slot.as_u64() / self.epoch_size),
            RelativeSlot::new(slot.as_u64() % self.epoch_size),
        ))
    }
}

#[cfg(test)]
mod tests {
    use meridian_test_log::test;

    use super::*;

    #[test]
    fn fixed_layout_is_consistent() {
        let layout = FixedLayout::new(10);
        assert_eq!(layout.epoch_size(Epoch::new(3)).unwrap(), 10);
        assert_eq!(layout.first_slot_of(Epoch::new(3)).unwrap(), Slot::new(30));
        assert_eq!(
            layout.epoch_slot_of(Slot::new(35)).unwrap(),
            EpochSlot::new(Epoch::new(3), RelativeSlot::new(5))
        );
        assert_eq!(
            layout.epoch_slot_of(Slot::new(30)).unwrap(),
            EpochSlot::new(Epoch::new(3), RelativeSlot::BOUNDARY)
        );
    }

    #[test]
    #[should_panic(expected = "strictly positive")]
    fn zero_epoch_size_is_rejected() {
        let _ = FixedLayout::new(0);
    }
}
