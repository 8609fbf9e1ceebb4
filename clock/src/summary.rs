use std::{fmt, time::Duration};

use meridian_primitives::{Epoch, Slot};
use thiserror::Error;

use crate::{
    era::{EraParams, Shape, Transitions},
    wallclock::{RelativeTime, SystemStart},
};

/// A point on the chain with all three coordinate systems pinned down at
/// once. Era boundaries are exactly such points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bound {
    pub time: RelativeTime,
    pub slot: Slot,
    pub epoch: Epoch,
}

impl Bound {
    /// The genesis bound: everything starts at zero.
    pub const GENESIS: Bound = Bound {
        time: RelativeTime::START,
        slot: Slot::GENESIS,
        epoch: Epoch::GENESIS,
    };
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "(slot {}, epoch {}, {})",
            self.slot, self.epoch, self.time
        )
    }
}

/// One era of the summary: a half-open interval `[start, end)` of the chain
/// within which the era parameters are constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EraSummary {
    pub start: Bound,
    pub end: Bound,
    pub params: EraParams,
}

impl EraSummary {
    fn contains_time(&self, time: RelativeTime) -> bool {
        self.start.time <= time && time < self.end.time
    }

    fn contains_slot(&self, slot: Slot) -> bool {
        self.start.slot <= slot && slot < self.end.slot
    }

    fn contains_epoch(&self, epoch: Epoch) -> bool {
        self.start.epoch <= epoch && epoch < self.end.epoch
    }
}

/// The input a query could not answer: the coordinate lies at or past the
/// end of the final era of the summary used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Time(RelativeTime),
    Slot(Slot),
    Epoch(Epoch),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Condition::Time(time) => write!(f, "time {time}"),
            Condition::Slot(slot) => write!(f, "slot {slot}"),
            Condition::Epoch(epoch) => write!(f, "epoch {epoch}"),
        }
    }
}

/// A conversion was asked about a point the summary cannot predict.
///
/// Carries the summary that was consulted so the caller can decide whether a
/// fresher one (derived from a newer ledger tip) would do better.
#[derive(Clone, Debug, Error)]
#[error("{condition} is past the horizon {horizon} of the era summary", horizon = .summary.horizon())]
pub struct PastHorizon {
    pub condition: Condition,
    pub summary: Summary,
}

/// An ordered, non-empty list of era summaries covering the chain from
/// genesis up to the horizon of what the current ledger state can predict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    system_start: SystemStart,
    ledger_tip: Option<Slot>,
    eras: Vec<EraSummary>,
}

/// Advances `lo` by whole epochs of the era described by `params`, up to and
/// excluding `epoch`.
fn mk_upper_bound(params: &EraParams, lo: &Bound, epoch: Epoch) -> Bound {
    let epochs = epoch
        .epochs_since(lo.epoch)
        .expect("upper bound must not precede the era start");
    let slots = epochs * params.epoch_size;
    Bound {
        time: lo.time + scale(params.slot_length, slots),
        slot: lo.slot + slots,
        epoch,
    }
}

/// `duration * factor` with a u64 factor (std only scales by u32).
fn scale(duration: Duration, factor: u64) -> Duration {
    let nanos = duration.as_nanos() * u128::from(factor);
    Duration::new((nanos / 1_000_000_000) as u64, (nanos % 1_000_000_000) as u32)
}

/// Computes the era summary for the given ledger tip.
///
/// Confirmed eras end at their known transition epoch. The final era (the
/// one with no confirmed transition out of it yet) extends to the end of the
/// epoch containing `tip + safe_zone.from_tip`: past that, the not yet
/// known next transition could change the arithmetic, so prediction stops.
pub fn summarize(
    system_start: SystemStart,
    ledger_tip: Option<Slot>,
    shape: &Shape,
    transitions: &Transitions,
) -> Summary {
    let mut eras = Vec::with_capacity(shape.eras().len());
    let mut lo = Bound::GENESIS;

    for (index, params) in shape.eras().iter().enumerate() {
        match transitions.epochs().get(index) {
            // The transition out of this era is confirmed on chain.
            Some(&transition_epoch) => {
                let end = mk_upper_bound(params, &lo, transition_epoch);
                eras.push(EraSummary {
                    start: lo,
                    end,
                    params: *params,
                });
                lo = end;
            }
            // Final era: extend to the edge of the safe zone.
            None => {
                // If the tip is still in a past era, the safe zone is
                // measured from the start of this one.
                let tip_slot = match ledger_tip {
                    Some(tip) if tip > lo.slot => tip,
                    _ => lo.slot,
                };
                let horizon_slot = tip_slot + params.safe_zone.from_tip;
                let slots_into_era = horizon_slot
                    .slots_since(lo.slot)
                    .expect("horizon cannot precede the era start");
                let mut horizon_epoch =
                    lo.epoch + slots_into_era.div_ceil(params.epoch_size).max(1);
                if let Some(before_epoch) = params.safe_zone.before_epoch {
                    horizon_epoch = horizon_epoch.max(before_epoch);
                }
                let end = mk_upper_bound(params, &lo, horizon_epoch);
                eras.push(EraSummary {
                    start: lo,
                    end,
                    params: *params,
                });
                break;
            }
        }
    }

    let summary = Summary {
        system_start,
        ledger_tip,
        eras,
    };
    debug_assert_eq!(summary.check_invariant(), Ok(()));
    summary
}

impl Summary {
    pub fn system_start(&self) -> SystemStart {
        self.system_start
    }

    /// The ledger tip this summary was derived from.
    pub fn ledger_tip(&self) -> Option<Slot> {
        self.ledger_tip
    }

    pub fn eras(&self) -> &[EraSummary] {
        &self.eras
    }

    /// The end bound of the final era: the earliest point no query can
    /// answer.
    pub fn horizon(&self) -> Bound {
        self.eras
            .last()
            .expect("a summary has at least one era")
            .end
    }

    /// Converts a chain-relative wall-clock time to the slot containing it,
    /// together with how far into the slot the time points.
    pub fn wallclock_to_slot(
        &self,
        time: RelativeTime,
    ) -> Result<(Slot, Duration), PastHorizon> {
        let era = self.era_where(Condition::Time(time), |era| era.contains_time(time))?;
        let into_era = time - era.start.time;
        let slot_length = era.params.slot_length.as_nanos();
        let slots = (into_era.as_nanos() / slot_length) as u64;
        let time_into_slot = into_era - scale(era.params.slot_length, slots);
        Ok((era.start.slot + slots, time_into_slot))
    }

    /// Converts a slot to the chain-relative time of its start, together
    /// with the slot length at that point of the chain.
    pub fn slot_to_wallclock(
        &self,
        slot: Slot,
    ) -> Result<(RelativeTime, Duration), PastHorizon> {
        let era = self.era_where(Condition::Slot(slot), |era| era.contains_slot(slot))?;
        let into_era = slot
            .slots_since(era.start.slot)
            .expect("containment checked");
        Ok((
            era.start.time + scale(era.params.slot_length, into_era),
            era.params.slot_length,
        ))
    }

    /// Converts a slot to the epoch containing it, together with how many
    /// slots into the epoch it lies.
    pub fn slot_to_epoch(&self, slot: Slot) -> Result<(Epoch, u64), PastHorizon> {
        let era = self.era_where(Condition::Slot(slot), |era| era.contains_slot(slot))?;
        let into_era = slot
            .slots_since(era.start.slot)
            .expect("containment checked");
        Ok((
            era.start.epoch + into_era / era.params.epoch_size,
            into_era % era.params.epoch_size,
        ))
    }

    /// Converts an epoch to its first slot, together with the size of the
    /// epoch.
    pub fn epoch_to_slot(&self, epoch: Epoch) -> Result<(Slot, u64), PastHorizon> {
        let era = self.era_where(Condition::Epoch(epoch), |era| era.contains_epoch(epoch))?;
        let into_era = epoch
            .epochs_since(era.start.epoch)
            .expect("containment checked");
        Ok((
            era.start.slot + into_era * era.params.epoch_size,
            era.params.epoch_size,
        ))
    }

    fn era_where(
        &self,
        condition: Condition,
        contains: impl Fn(&EraSummary) -> bool,
    ) -> Result<&EraSummary, PastHorizon> {
        self.eras.iter().find(|era| contains(era)).ok_or_else(|| {
            trace!(%condition, horizon = %self.horizon(), "query past the summary horizon");
            PastHorizon {
                condition,
                summary: self.clone(),
            }
        })
    }

    /// Checks the summary invariants; used by tests and debug assertions.
    pub fn check_invariant(&self) -> Result<(), String> {
        if self.eras.is_empty() {
            return Err("summary must not be empty".to_owned());
        }
        let mut expected_start = Bound::GENESIS;
        for (index, era) in self.eras.iter().enumerate() {
            if era.start != expected_start {
                return Err(format!("era {index} does not start at the previous era's end"));
            }
            let epochs = match era.end.epoch.epochs_since(era.start.epoch) {
                Some(epochs) if epochs > 0 => epochs,
                _ => return Err(format!("era {index} is empty")),
            };
            let slots = era.end.slot.slots_since(era.start.slot);
            if slots != Some(epochs * era.params.epoch_size) {
                return Err(format!("era {index} has an inconsistent slot count"));
            }
            let elapsed = era.end.time.since(era.start.time);
            if elapsed != Some(scale(era.params.slot_length, epochs * era.params.epoch_size)) {
                return Err(format!("era {index} has an inconsistent duration"));
            }
            if let Some(before_epoch) = era.params.safe_zone.before_epoch {
                if index == self.eras.len() - 1 && era.end.epoch < before_epoch {
                    return Err(format!("era {index} ends inside its safe zone lower bound"));
                }
            }
            expected_start = era.end;
        }
        Ok(())
    }
}
