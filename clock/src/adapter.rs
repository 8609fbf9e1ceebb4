use std::sync::Arc;

use meridian_primitives::{Epoch, EpochLayout, EpochSlot, LayoutError, RelativeSlot, Slot};
use parking_lot::RwLock;

use crate::summary::{PastHorizon, Summary};

fn past_horizon(error: PastHorizon) -> LayoutError {
    LayoutError::PastHorizon(error.to_string())
}

/// [`EpochLayout`] over a fixed era summary snapshot.
///
/// Queries past the snapshot's horizon fail; callers that want automatic
/// recovery use [`RefreshingLayout`] instead.
#[derive(Clone)]
pub struct SummaryLayout {
    summary: Arc<Summary>,
}

impl SummaryLayout {
    pub fn new(summary: Arc<Summary>) -> SummaryLayout {
        SummaryLayout { summary }
    }
}

impl EpochLayout for SummaryLayout {
    fn epoch_size(&self, epoch: Epoch) -> Result<u64, LayoutError> {
        let (_, size) = self.summary.epoch_to_slot(epoch).map_err(past_horizon)?;
        Ok(size)
    }

    fn first_slot_of(&self, epoch: Epoch) -> Result<Slot, LayoutError> {
        let (slot, _) = self.summary.epoch_to_slot(epoch).map_err(past_horizon)?;
        Ok(slot)
    }

    fn epoch_slot_of(&self, slot: Slot) -> Result<EpochSlot, LayoutError> {
        let (epoch, into_epoch) = self.summary.slot_to_epoch(slot).map_err(past_horizon)?;
        Ok(EpochSlot::new(epoch, RelativeSlot::new(into_epoch)))
    }
}

type SummaryFetch = dyn Fn() -> Arc<Summary> + Send + Sync;

/// [`EpochLayout`] that re-derives its summary when a query runs past the
/// horizon.
///
/// The chain keeps growing while the node runs, so a miss usually just means
/// the cached summary is stale. On a miss the fetch closure is invoked for a
/// summary derived from the current ledger tip and the query retried once;
/// only a second miss surfaces.
pub struct RefreshingLayout {
    summary: RwLock<Arc<Summary>>,
    fetch: Box<SummaryFetch>,
}

impl RefreshingLayout {
    pub fn new(fetch: impl Fn() -> Arc<Summary> + Send + Sync + 'static) -> RefreshingLayout {
        let summary = fetch();
        RefreshingLayout {
            summary: RwLock::new(summary),
            fetch: Box::new(fetch),
        }
    }

    /// The summary currently used to answer queries.
    pub fn current_summary(&self) -> Arc<Summary> {
        Arc::clone(&self.summary.read())
    }

    fn with_retry<T>(
        &self,
        query: impl Fn(&Summary) -> Result<T, PastHorizon>,
    ) -> Result<T, LayoutError> {
        let current = self.current_summary();
        match query(&current) {
            Ok(value) => Ok(value),
            Err(miss) => {
                debug!(%miss, "layout query past the horizon, refreshing the era summary");
                let fresh = (self.fetch)();
                *self.summary.write() = Arc::clone(&fresh);
                query(&fresh).map_err(past_horizon)
            }
        }
    }
}

impl EpochLayout for RefreshingLayout {
    fn epoch_size(&self, epoch: Epoch) -> Result<u64, LayoutError> {
        self.with_retry(|summary| summary.epoch_to_slot(epoch).map(|(_, size)| size))
    }

    fn first_slot_of(&self, epoch: Epoch) -> Result<Slot, LayoutError> {
        self.with_retry(|summary| summary.epoch_to_slot(epoch).map(|(slot, _)| slot))
    }

    fn epoch_slot_of(&self, slot: Slot) -> Result<EpochSlot, LayoutError> {
        self.with_retry(|summary| {
            let (epoch, into_epoch) = summary.slot_to_epoch(slot)?;
            Ok(EpochSlot::new(epoch, RelativeSlot::new(into_epoch)))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU64, Ordering},
        time::Duration,
    };

    use meridian_test_log::test;
    use time::macros::datetime;

    use super::*;
    use crate::{
        era::{EraParams, SafeZone, Shape, Transitions},
        summary::summarize,
        wallclock::SystemStart,
    };

    fn summary_at_tip(tip: u64) -> Arc<Summary> {
        let shape = Shape::single(EraParams {
            epoch_size: 10,
            slot_length: Duration::from_secs(1),
            safe_zone: SafeZone::from_tip(5),
        });
        Arc::new(summarize(
            SystemStart::new(datetime!(2024-01-01 00:00:00 UTC)),
            Some(Slot::new(tip)),
            &shape,
            &Transitions::none(),
        ))
    }

    #[test]
    fn snapshot_layout_answers_within_the_horizon() {
        let layout = SummaryLayout::new(summary_at_tip(7));

        assert_eq!(layout.epoch_size(Epoch::new(1)).unwrap(), 10);
        assert_eq!(layout.first_slot_of(Epoch::new(1)).unwrap(), Slot::new(10));
        assert_eq!(
            layout.epoch_slot_of(Slot::new(15)).unwrap(),
            EpochSlot::new(Epoch::new(1), RelativeSlot::new(5))
        );
        // Horizon is epoch 2 / slot 20.
        assert!(matches!(
            layout.epoch_size(Epoch::new(2)),
            Err(LayoutError::PastHorizon(_))
        ));
    }

    #[test]
    fn refreshing_layout_retries_once_with_a_fresh_summary() {
        // Ledger tip advances between fetches, widening the horizon.
        let tip = AtomicU64::new(7);
        let layout = RefreshingLayout::new(move || {
            summary_at_tip(tip.fetch_add(100, Ordering::Relaxed))
        });

        // Past the first horizon (slot 20), inside the refreshed one.
        assert_eq!(
            layout.epoch_slot_of(Slot::new(55)).unwrap(),
            EpochSlot::new(Epoch::new(5), RelativeSlot::new(5))
        );
        // Far past even a refreshed horizon: surfaces after one retry.
        assert!(matches!(
            layout.epoch_slot_of(Slot::new(1_000_000)),
            Err(LayoutError::PastHorizon(_))
        ));
    }
}
