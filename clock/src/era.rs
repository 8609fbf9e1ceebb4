use std::time::Duration;

use meridian_primitives::Epoch;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors building a [`Shape`] or its [`Transitions`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// A chain has at least one era.
    #[error("era shape must not be empty")]
    EmptyShape,
    /// Era epoch sizes are strictly positive.
    #[error("era {0} has a zero epoch size")]
    ZeroEpochSize(usize),
    /// Era slot lengths are strictly positive.
    #[error("era {0} has a zero slot length")]
    ZeroSlotLength(usize),
    /// At most one transition per era boundary.
    #[error("{got} transitions confirmed for a shape of {eras} eras")]
    TooManyTransitions { got: usize, eras: usize },
    /// Transition epochs are strictly increasing.
    #[error("transition epochs must be strictly increasing")]
    UnorderedTransitions,
}

/// The span past the ledger tip within which no era transition can occur.
///
/// Because a transition needs on-chain confirmation a fixed distance in
/// advance, predictions up to the safe zone are exact even though the next
/// transition is not yet known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeZone {
    /// Number of slots past the ledger tip free of transitions.
    pub from_tip: u64,
    /// Optional lower bound: no transition before this epoch.
    pub before_epoch: Option<Epoch>,
}

impl SafeZone {
    pub const fn from_tip(slots: u64) -> SafeZone {
        SafeZone {
            from_tip: slots,
            before_epoch: None,
        }
    }
}

/// Static parameters of a single era.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraParams {
    /// Number of slots per epoch in this era.
    pub epoch_size: u64,
    /// Wall-clock length of one slot in this era.
    pub slot_length: Duration,
    pub safe_zone: SafeZone,
}

/// The statically known sequence of eras of the chain, first era onwards.
///
/// The era list is fixed at compile time of the node; how far the chain has
/// actually progressed through it is the business of [`Transitions`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape {
    eras: Vec<EraParams>,
}

impl Shape {
    pub fn new(eras: Vec<EraParams>) -> Result<Shape, ShapeError> {
        if eras.is_empty() {
            return Err(ShapeError::EmptyShape);
        }
        for (index, era) in eras.iter().enumerate() {
            if era.epoch_size == 0 {
                return Err(ShapeError::ZeroEpochSize(index));
            }
            if era.slot_length.is_zero() {
                return Err(ShapeError::ZeroSlotLength(index));
            }
        }
        Ok(Shape { eras })
    }

    /// A single-era chain.
    pub fn single(params: EraParams) -> Shape {
        Shape { eras: vec![params] }
    }

    pub fn eras(&self) -> &[EraParams] {
        &self.eras
    }
}

/// The confirmed era transitions: for each era boundary already decided
/// on chain, the epoch at which the next era begins.
///
/// Always strictly increasing and at most one shorter than the shape.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transitions {
    epochs: Vec<Epoch>,
}

impl Transitions {
    pub fn new(shape: &Shape, epochs: Vec<Epoch>) -> Result<Transitions, ShapeError> {
        if epochs.len() >= shape.eras().len() {
            return Err(ShapeError::TooManyTransitions {
                got: epochs.len(),
                eras: shape.eras().len(),
            });
        }
        if epochs.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ShapeError::UnorderedTransitions);
        }
        Ok(Transitions { epochs })
    }

    /// No confirmed transitions yet; the chain is still in its first era.
    pub fn none() -> Transitions {
        Transitions::default()
    }

    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }
}
