use meridian_primitives::{BlockHash, EpochSlot};

use crate::{
    archive::Archive,
    component::{BlockComponent, ComponentValue},
    error::ArchiveError,
    state::Snapshot,
};

/// Forward cursor over a slot range of the archive.
///
/// The iterator works from the snapshot taken when it was created: entries
/// appended afterwards are never enumerated. It has to be closed when done
/// (dropping closes it too, and closing twice is fine); `delete_after`
/// refuses to run while any iterator is open.
pub struct ArchiveIterator<'a, H: BlockHash> {
    archive: &'a Archive<H>,
    snapshot: Snapshot<H>,
    component: BlockComponent,
    cursor: EpochSlot,
    end: EpochSlot,
    closed: bool,
}

impl<'a, H: BlockHash> std::fmt::Debug for ArchiveIterator<'a, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveIterator")
            .field("component", &self.component)
            .field("cursor", &self.cursor)
            .field("end", &self.end)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<'a, H: BlockHash> ArchiveIterator<'a, H> {
    pub(crate) fn new(
        archive: &'a Archive<H>,
        snapshot: Snapshot<H>,
        from: EpochSlot,
        to: EpochSlot,
        component: BlockComponent,
    ) -> ArchiveIterator<'a, H> {
        ArchiveIterator {
            archive,
            snapshot,
            component,
            cursor: from,
            end: to,
            closed: false,
        }
    }

    /// Releases the cursor. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.archive.iterator_closed();
        }
    }
}

impl<H: BlockHash> Iterator for ArchiveIterator<'_, H> {
    type Item = Result<ComponentValue<H>, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.closed {
                return None;
            }
            if self.cursor > self.end || self.cursor.epoch > self.snapshot.current_epoch {
                self.close();
                return None;
            }

            let indexes = match self.archive.indexes_at(&self.snapshot, self.cursor.epoch) {
                Ok(indexes) => indexes,
                Err(error) => {
                    self.close();
                    return Some(Err(error));
                }
            };

            // Skim the primary index for the next filled slot; an exhausted
            // epoch advances the cursor to the next one.
            let Some(relative_slot) = indexes.primary.first_filled_from(self.cursor.relative_slot)
            else {
                self.cursor = EpochSlot::boundary_of(self.cursor.epoch.next());
                continue;
            };
            let position = EpochSlot::new(self.cursor.epoch, relative_slot);
            if position > self.end {
                self.close();
                return None;
            }
            self.cursor = EpochSlot::new(position.epoch, relative_slot.next());

            let located = match self.archive.locate_in(&self.snapshot, &indexes, position) {
                Ok(Some(located)) => located,
                Ok(None) => continue,
                Err(error) => {
                    self.close();
                    return Some(Err(error));
                }
            };
            return match self.archive.evaluate(&located, &self.component) {
                Ok(value) => Some(Ok(value)),
                Err(error) => {
                    self.close();
                    Some(Err(error))
                }
            };
        }
    }
}

impl<H: BlockHash> Drop for ArchiveIterator<'_, H> {
    fn drop(&mut self) {
        self.close();
    }
}
