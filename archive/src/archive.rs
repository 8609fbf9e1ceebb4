use std::{
    fs::{self, OpenOptions},
    io::Write as _,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use meridian_primitives::{
    BinaryInfo, BlockHash, BlockOrEbb, Epoch, EpochLayout, EpochSlot, Slot, Tip, TipInfo,
};
use meridian_utils::crc::Crc32Computer;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::{
    cache::IndexCache,
    component::{BlockComponent, ComponentValue, ResolvedEntry},
    config::{ArchiveConfig, ValidationPolicy},
    error::{ArchiveError, RangeViolation},
    events::{notify, ArchiveEvent},
    index::{entry_size, EpochIndexes, PrimaryIndex, SecondaryEntry, SharedIndexes},
    iterator::ArchiveIterator,
    layout::{self, epoch_files},
    parse::EpochFileParser,
    state::{DbState, OpenState, Snapshot},
    validation::{self, RecoveredState},
};

const BROADCAST_MAX_CAPACITY: usize = 256;

/// An entry pinned down on disk: its secondary record plus the size of its
/// block, which the record alone does not know.
pub(crate) struct Located<H> {
    pub entry: SecondaryEntry<H>,
    pub block_size: u64,
    pub position: EpochSlot,
}

/// The immutable block archive.
///
/// A self-contained handle over one on-disk directory, generic over the
/// hash type stored in its index entries. All writes serialise on an
/// exclusive state lock; readers grab a snapshot and never block the
/// writer while they do their file I/O.
pub struct Archive<H: BlockHash> {
    root: PathBuf,
    layout: Arc<dyn EpochLayout>,
    parser: Arc<dyn EpochFileParser<H>>,
    config: ArchiveConfig,
    state: RwLock<DbState<H>>,
    cache: IndexCache<H>,
    /// Event subscribers; see [`Archive::subscribe`].
    notifier: broadcast::Sender<ArchiveEvent>,
    open_iterators: AtomicUsize,
}

impl<H: BlockHash> Archive<H> {
    /// Opens the archive rooted at `root`, creating the directory if
    /// needed, and validates what it finds there according to the
    /// configured policy. Trailing corruption is truncated away; anything
    /// else fails the open.
    pub fn open(
        root: impl Into<PathBuf>,
        layout: Arc<dyn EpochLayout>,
        parser: Arc<dyn EpochFileParser<H>>,
        config: ArchiveConfig,
    ) -> Result<Archive<H>, ArchiveError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let archive = Archive {
            cache: IndexCache::new(config.cache),
            layout,
            parser,
            config,
            state: RwLock::new(DbState::Closed),
            notifier: broadcast::Sender::new(BROADCAST_MAX_CAPACITY),
            open_iterators: AtomicUsize::new(0),
            root,
        };
        archive.recover(config.validation)?;
        Ok(archive)
    }

    /// Validates and reopens a closed archive. Fails with
    /// [`ArchiveError::AlreadyOpen`] if it was never closed.
    pub fn reopen(&self, policy: ValidationPolicy) -> Result<(), ArchiveError> {
        self.recover(policy)
    }

    /// Closes the archive. Idempotent; every subsequent operation fails
    /// with [`ArchiveError::Closed`] until reopened.
    pub fn close(&self) {
        let mut guard = self.state.write();
        if matches!(&*guard, DbState::Open(_)) {
            *guard = DbState::Closed;
            info!("archive closed");
            notify(&self.notifier, ArchiveEvent::Closed);
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(&*self.state.read(), DbState::Open(_))
    }

    /// Subscribes to the structured event stream of this archive.
    pub fn subscribe(&self) -> broadcast::Receiver<ArchiveEvent> {
        self.notifier.subscribe()
    }

    /// The current tip: the most recently appended entry, or origin on an
    /// empty archive.
    pub fn tip(&self) -> Result<Tip<H>, ArchiveError> {
        Ok(self.state.read().open_ref()?.tip.clone())
    }

    fn recover(&self, policy: ValidationPolicy) -> Result<(), ArchiveError> {
        let mut guard = self.state.write();
        if matches!(&*guard, DbState::Open(_)) {
            return Err(ArchiveError::AlreadyOpen);
        }
        let recovered = validation::validate_and_recover(
            &self.root,
            &*self.layout,
            &*self.parser,
            policy,
            &self.notifier,
        )?;
        let state = self.adopt(recovered)?;
        info!(epoch = %state.current_epoch, tip = %state.tip, "archive opened");
        notify(
            &self.notifier,
            ArchiveEvent::Opened {
                tip: tip_location(&state.tip),
            },
        );
        *guard = DbState::Open(state);
        Ok(())
    }

    /// Turns a recovered (or truncated) on-disk state into an open one by
    /// acquiring the current epoch's file handles.
    fn adopt(&self, recovered: RecoveredState<H>) -> Result<OpenState<H>, ArchiveError> {
        let files = epoch_files(&self.root, recovered.current_epoch);
        let epoch_file = OpenOptions::new().append(true).create(true).open(&files.epoch)?;
        let mut primary_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&files.primary)?;
        let secondary_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&files.secondary)?;
        if layout::file_size(&files.primary)? == 0 {
            // Brand-new epoch: version byte plus the initial zero offset.
            primary_file.write_all(&recovered.indexes.primary.serialize())?;
        }
        Ok(OpenState {
            current_epoch: recovered.current_epoch,
            epoch_file,
            primary_file,
            secondary_file,
            epoch_offset: recovered.epoch_offset,
            secondary_offset: u64::from(recovered.indexes.primary.last_offset()),
            current_index: Arc::new(recovered.indexes),
            tip: recovered.tip,
        })
    }

    /// Appends a regular block. `slot` must lie strictly after the tip.
    pub fn append_block(
        &self,
        slot: Slot,
        block_number: u64,
        hash: H,
        binary: &BinaryInfo,
    ) -> Result<(), ArchiveError> {
        let mut guard = self.state.write();
        let position = {
            let state = guard.open_mut()?;
            let position = self.layout.epoch_slot_of(slot)?;
            if let Some(tip_position) = self.tip_position(&state.tip)? {
                if position <= tip_position {
                    return Err(rejected(ArchiveError::AppendToSlotInThePast {
                        slot,
                        tip: self.tip_slot(&state.tip)?,
                    }));
                }
            }
            position
        };
        self.commit_append(
            &mut *guard,
            position,
            BlockOrEbb::Block(slot),
            block_number,
            hash,
            binary,
        )
    }

    /// Appends the boundary block of `epoch`. Only allowed into the current
    /// epoch while it is still empty, or into a later epoch.
    pub fn append_ebb(
        &self,
        epoch: Epoch,
        block_number: u64,
        hash: H,
        binary: &BinaryInfo,
    ) -> Result<(), ArchiveError> {
        let mut guard = self.state.write();
        {
            let state = guard.open_mut()?;
            let current_untouched = state.current_index.entries.is_empty();
            if !(epoch > state.current_epoch || (epoch == state.current_epoch && current_untouched))
            {
                return Err(rejected(ArchiveError::AppendToEbbInThePast {
                    epoch,
                    current_epoch: state.current_epoch,
                }));
            }
        }
        self.commit_append(
            &mut *guard,
            EpochSlot::boundary_of(epoch),
            BlockOrEbb::Ebb(epoch),
            block_number,
            hash,
            binary,
        )
    }

    fn commit_append(
        &self,
        guard: &mut DbState<H>,
        position: EpochSlot,
        location: BlockOrEbb,
        block_number: u64,
        hash: H,
        binary: &BinaryInfo,
    ) -> Result<(), ArchiveError> {
        let result = self.try_append(guard.open_mut()?, position, location, block_number, hash, binary);
        if let Err(error) = &result {
            if !error.is_user_error() {
                error!(%error, "append failed, closing the archive");
                *guard = DbState::Closed;
                notify(&self.notifier, ArchiveEvent::Closed);
            }
        }
        result
    }

    fn try_append(
        &self,
        state: &mut OpenState<H>,
        position: EpochSlot,
        location: BlockOrEbb,
        block_number: u64,
        hash: H,
        binary: &BinaryInfo,
    ) -> Result<(), ArchiveError> {
        // Roll into the entry's epoch, materialising skipped epochs with
        // zero-byte epoch files and fully backfilled indices.
        while state.current_epoch < position.epoch {
            self.start_next_epoch(state)?;
        }
        debug_assert_eq!(state.current_epoch, position.epoch);

        // Stream the block into the epoch file, checksumming as it goes.
        let mut crc = Crc32Computer::default();
        crc.update(binary.bytes);
        state.epoch_file.write_all(binary.bytes)?;

        let entry = SecondaryEntry {
            block_offset: state.epoch_offset,
            header_offset: binary.header_offset,
            header_size: binary.header_size,
            checksum: crc.result(),
            location,
            hash: hash.clone(),
        };
        state.secondary_file.write_all(&entry.serialize())?;

        // Backfill the primary index over the skipped slots, then the new
        // entry's terminating offset.
        let current = SharedIndexes::make_mut(&mut state.current_index);
        let appended = current
            .primary
            .fill_to(position.relative_slot, entry_size::<H>() as u32);
        let mut offsets = Vec::with_capacity(appended.len() * 4);
        for offset in appended {
            offsets.extend_from_slice(&offset.to_le_bytes());
        }
        state.primary_file.write_all(&offsets)?;
        current.entries.push(entry);

        // All writes are in the files; commit the tip.
        state.epoch_offset += binary.bytes.len() as u64;
        state.secondary_offset += entry_size::<H>();
        state.tip = Tip::At(TipInfo {
            hash,
            location,
            block_number,
        });
        trace!(%location, block_number, "appended entry");
        notify(
            &self.notifier,
            ArchiveEvent::Appended {
                location,
                block_number,
            },
        );
        Ok(())
    }

    /// Completes the current epoch and opens the file triple of the next.
    fn start_next_epoch(&self, state: &mut OpenState<H>) -> Result<(), ArchiveError> {
        let epoch_size = self.layout.epoch_size(state.current_epoch)?;

        // Pad the finished primary index out to its bracketed size.
        let current = SharedIndexes::make_mut(&mut state.current_index);
        let appended = current.primary.complete(epoch_size);
        let mut offsets = Vec::with_capacity(appended.len() * 4);
        for offset in appended {
            offsets.extend_from_slice(&offset.to_le_bytes());
        }
        state.primary_file.write_all(&offsets)?;

        // The finished epoch is already materialised; seed the cache with it
        // rather than re-reading it from disk on the next lookup.
        for evicted in self
            .cache
            .insert(state.current_epoch, SharedIndexes::clone(&state.current_index))
        {
            notify(&self.notifier, ArchiveEvent::CacheEvict(evicted));
        }

        let next = state.current_epoch.next();
        let files = epoch_files(&self.root, next);
        let index = EpochIndexes::empty();
        let mut primary_file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&files.primary)?;
        primary_file.write_all(&index.primary.serialize())?;
        state.epoch_file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&files.epoch)?;
        state.secondary_file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&files.secondary)?;
        state.primary_file = primary_file;
        state.current_epoch = next;
        state.epoch_offset = 0;
        state.secondary_offset = 0;
        state.current_index = Arc::new(index);
        debug!(epoch = %next, "started new epoch");
        notify(&self.notifier, ArchiveEvent::EpochStarted(next));
        Ok(())
    }

    /// Projects a component out of the block stored at `slot`, or `None`
    /// for an empty slot. Reading past the tip is refused.
    pub fn block_component(
        &self,
        slot: Slot,
        component: &BlockComponent,
    ) -> Result<Option<ComponentValue<H>>, ArchiveError> {
        let snapshot = self.snapshot()?;
        let tip_slot = self.tip_slot(&snapshot.tip)?;
        if tip_slot.map_or(true, |tip| slot > tip) {
            return Err(rejected(ArchiveError::ReadFutureSlot {
                slot,
                tip: tip_slot,
            }));
        }
        let position = self.layout.epoch_slot_of(slot)?;
        let Some(located) = self.locate(&snapshot, position)? else {
            return Ok(None);
        };
        if located.entry.location != BlockOrEbb::Block(slot) {
            // The boundary position of the epoch may hold a boundary block.
            return Ok(None);
        }
        self.evaluate(&located, component).map(Some)
    }

    /// Projects a component out of the boundary block of `epoch`, or `None`
    /// if the epoch has none.
    pub fn ebb_component(
        &self,
        epoch: Epoch,
        component: &BlockComponent,
    ) -> Result<Option<ComponentValue<H>>, ArchiveError> {
        let snapshot = self.snapshot()?;
        if epoch > snapshot.current_epoch {
            return Err(rejected(ArchiveError::ReadFutureEbb {
                epoch,
                current_epoch: snapshot.current_epoch,
            }));
        }
        let Some(located) = self.locate(&snapshot, EpochSlot::boundary_of(epoch))? else {
            return Ok(None);
        };
        if !located.entry.location.is_ebb() {
            return Ok(None);
        }
        self.evaluate(&located, component).map(Some)
    }

    /// Looks up `slot` and only projects if the stored entry carries the
    /// given hash; a mismatch is `None`, not an error. Finds boundary
    /// blocks through the boundary position of their epoch.
    pub fn block_or_ebb_component(
        &self,
        slot: Slot,
        hash: &H,
        component: &BlockComponent,
    ) -> Result<Option<ComponentValue<H>>, ArchiveError> {
        let snapshot = self.snapshot()?;
        let tip_slot = self.tip_slot(&snapshot.tip)?;
        if tip_slot.map_or(true, |tip| slot > tip) {
            return Err(rejected(ArchiveError::ReadFutureSlot {
                slot,
                tip: tip_slot,
            }));
        }
        let position = self.layout.epoch_slot_of(slot)?;
        match self.locate(&snapshot, position)? {
            Some(located) if located.entry.hash == *hash => {
                self.evaluate(&located, component).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Opens a forward iterator over `[from, to]`. Both endpoints must hold
    /// an entry.
    pub fn stream(
        &self,
        from: Slot,
        to: Slot,
        component: BlockComponent,
    ) -> Result<ArchiveIterator<'_, H>, ArchiveError> {
        let snapshot = self.snapshot()?;
        if from > to {
            return Err(rejected(ArchiveError::InvalidIteratorRange {
                from,
                to,
                reason: RangeViolation::Inverted,
            }));
        }
        let tip_slot = self.tip_slot(&snapshot.tip)?;
        let from_position = self.layout.epoch_slot_of(from)?;
        let to_position = self.layout.epoch_slot_of(to)?;
        if tip_slot.map_or(true, |tip| from > tip)
            || self.locate(&snapshot, from_position)?.is_none()
        {
            return Err(rejected(ArchiveError::InvalidIteratorRange {
                from,
                to,
                reason: RangeViolation::MissingFrom,
            }));
        }
        if tip_slot.map_or(true, |tip| to > tip) || self.locate(&snapshot, to_position)?.is_none()
        {
            return Err(rejected(ArchiveError::InvalidIteratorRange {
                from,
                to,
                reason: RangeViolation::MissingTo,
            }));
        }
        self.open_iterators.fetch_add(1, Ordering::SeqCst);
        trace!(%from, %to, "streaming");
        Ok(ArchiveIterator::new(
            self,
            snapshot,
            from_position,
            to_position,
            component,
        ))
    }

    /// Rolls the archive back so `new_tip` becomes its tip. Privileged
    /// recovery: requires the archive to be open and every iterator closed.
    /// Rolling "back" to the current tip or past it is a no-op.
    pub fn delete_after(&self, new_tip: &Tip<H>) -> Result<(), ArchiveError> {
        let mut guard = self.state.write();
        guard.open_ref()?;
        let open_iterators = self.open_iterators.load(Ordering::SeqCst);
        if open_iterators > 0 {
            return Err(rejected(ArchiveError::IteratorsOpen {
                count: open_iterators,
            }));
        }
        let result = self.try_delete_after(&mut *guard, new_tip);
        if let Err(error) = &result {
            if !error.is_user_error() {
                error!(%error, "truncation failed, closing the archive");
                *guard = DbState::Closed;
                notify(&self.notifier, ArchiveEvent::Closed);
            }
        }
        result
    }

    fn try_delete_after(
        &self,
        guard: &mut DbState<H>,
        new_tip: &Tip<H>,
    ) -> Result<(), ArchiveError> {
        let current_position = self.tip_position(&guard.open_ref()?.tip)?;
        let new_position = self.tip_position(new_tip)?;
        if new_position >= current_position {
            debug!("new tip at or after the current one, nothing to delete");
            return Ok(());
        }
        info!(new_tip = %new_tip, "deleting after");
        notify(
            &self.notifier,
            ArchiveEvent::DeletingAfter {
                new_tip: tip_location(new_tip),
            },
        );

        // Release the current epoch's handles before unlinking anything.
        *guard = DbState::Closed;

        for epoch in layout::list_epochs(&self.root)? {
            let remove = match new_position {
                Some(position) => epoch > position.epoch,
                None => true,
            };
            if remove {
                epoch_files(&self.root, epoch).remove()?;
            }
        }

        let recovered = match (new_position, new_tip.info()) {
            (Some(position), Some(info)) => {
                self.truncate_epoch_to(position, info.clone())?
            }
            _ => RecoveredState {
                current_epoch: Epoch::GENESIS,
                epoch_offset: 0,
                indexes: EpochIndexes::empty(),
                tip: Tip::Origin,
            },
        };

        // Cached indices of deleted or truncated epochs are stale now.
        for epoch in self.cache.restart() {
            notify(&self.notifier, ArchiveEvent::CacheEvict(epoch));
        }

        let state = self.adopt(recovered)?;
        info!(epoch = %state.current_epoch, tip = %state.tip, "archive truncated");
        notify(
            &self.notifier,
            ArchiveEvent::Opened {
                tip: tip_location(&state.tip),
            },
        );
        *guard = DbState::Open(state);
        Ok(())
    }

    /// Cuts the files of `position.epoch` back so the entry at `position`
    /// is the last one.
    fn truncate_epoch_to(
        &self,
        position: EpochSlot,
        info: TipInfo<H>,
    ) -> Result<RecoveredState<H>, ArchiveError> {
        let epoch = position.epoch;
        let files = epoch_files(&self.root, epoch);
        let primary_bytes = fs::read(&files.primary)?;
        let mut primary = PrimaryIndex::parse(&primary_bytes)
            .map_err(|reason| ArchiveError::InvalidPrimaryIndex { epoch, reason })?;
        let span = primary.span(position.relative_slot);
        if span.is_empty() {
            return Err(ArchiveError::InvalidBinary {
                epoch,
                reason: format!("no entry stored at the requested tip {position}"),
            });
        }
        let secondary_bytes = fs::read(&files.secondary)?;
        let (entries, _) = SecondaryEntry::<H>::parse_file(&secondary_bytes);
        let index = (span.start / entry_size::<H>()) as usize;
        let survivors = entries
            .get(..=index)
            .ok_or_else(|| ArchiveError::InvalidBinary {
                epoch,
                reason: format!("secondary index lacks entry {index}"),
            })?
            .to_vec();
        // The first deleted entry marks where the surviving one ends.
        let epoch_file_size = match entries.get(index + 1) {
            Some(next) => next.block_offset,
            None => layout::file_size(&files.epoch)?,
        };
        primary.truncate_to(position.relative_slot);

        fs::OpenOptions::new()
            .write(true)
            .open(&files.epoch)?
            .set_len(epoch_file_size)?;
        fs::OpenOptions::new()
            .write(true)
            .open(&files.secondary)?
            .set_len(span.end)?;
        fs::write(&files.primary, primary.serialize())?;
        notify(&self.notifier, ArchiveEvent::TruncatedEpoch(epoch));

        Ok(RecoveredState {
            current_epoch: epoch,
            epoch_offset: epoch_file_size,
            indexes: EpochIndexes {
                primary,
                entries: survivors,
            },
            tip: Tip::At(info),
        })
    }

    /// Periodically expires index-cache entries that have gone unused for
    /// the configured age. Spawn this on the runtime next to the archive;
    /// it runs until aborted.
    pub async fn run_cache_expiry(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            for epoch in self.cache.expire(self.config.cache.expiry) {
                trace!(%epoch, "expired cached epoch indices");
                notify(&self.notifier, ArchiveEvent::CacheEvict(epoch));
            }
        }
    }

    fn snapshot(&self) -> Result<Snapshot<H>, ArchiveError> {
        Ok(self.state.read().open_ref()?.snapshot())
    }

    pub(crate) fn iterator_closed(&self) {
        self.open_iterators.fetch_sub(1, Ordering::SeqCst);
    }

    /// The indices of an epoch as seen through a snapshot: the snapshot's
    /// own copy for the current epoch, the cache (loading lazily) for past
    /// ones.
    pub(crate) fn indexes_at(
        &self,
        snapshot: &Snapshot<H>,
        epoch: Epoch,
    ) -> Result<SharedIndexes<H>, ArchiveError> {
        if epoch == snapshot.current_epoch {
            return Ok(SharedIndexes::clone(&snapshot.current_index));
        }
        let root = self.root.clone();
        let (indexes, evicted) = self
            .cache
            .get_or_load(epoch, || load_epoch_indexes(&root, epoch))?;
        for evicted_epoch in evicted {
            notify(&self.notifier, ArchiveEvent::CacheEvict(evicted_epoch));
        }
        Ok(indexes)
    }

    pub(crate) fn locate(
        &self,
        snapshot: &Snapshot<H>,
        position: EpochSlot,
    ) -> Result<Option<Located<H>>, ArchiveError> {
        if position.epoch > snapshot.current_epoch {
            return Ok(None);
        }
        let indexes = self.indexes_at(snapshot, position.epoch)?;
        self.locate_in(snapshot, &indexes, position)
    }

    pub(crate) fn locate_in(
        &self,
        snapshot: &Snapshot<H>,
        indexes: &EpochIndexes<H>,
        position: EpochSlot,
    ) -> Result<Option<Located<H>>, ArchiveError> {
        let span = indexes.primary.span(position.relative_slot);
        if span.is_empty() {
            return Ok(None);
        }
        let index = (span.start / entry_size::<H>()) as usize;
        let entry = indexes
            .entries
            .get(index)
            .cloned()
            .ok_or_else(|| ArchiveError::InvalidBinary {
                epoch: position.epoch,
                reason: format!("secondary index lacks entry {index}"),
            })?;
        // The next entry bounds this block; the last entry of the current
        // epoch is bounded by the snapshot's write offset so that an append
        // racing with this read stays invisible.
        let end = match indexes.entries.get(index + 1) {
            Some(next) => next.block_offset,
            None if position.epoch == snapshot.current_epoch => snapshot.epoch_offset,
            None => layout::file_size(&epoch_files(&self.root, position.epoch).epoch)?,
        };
        let block_size =
            end.checked_sub(entry.block_offset)
                .ok_or_else(|| ArchiveError::InvalidBinary {
                    epoch: position.epoch,
                    reason: "decreasing block offsets in the secondary index".to_owned(),
                })?;
        Ok(Some(Located {
            entry,
            block_size,
            position,
        }))
    }

    /// Evaluates a projection against a located entry, reading the epoch
    /// file at most once and checksumming iff the full block is read.
    pub(crate) fn evaluate(
        &self,
        located: &Located<H>,
        component: &BlockComponent,
    ) -> Result<ComponentValue<H>, ArchiveError> {
        let epoch = located.position.epoch;
        let entry = &located.entry;
        let slot = match entry.location {
            BlockOrEbb::Block(slot) => slot,
            BlockOrEbb::Ebb(ebb_epoch) => self.layout.first_slot_of(ebb_epoch)?,
        };
        if component.wants_header() {
            let header_end = u64::from(entry.header_offset) + u64::from(entry.header_size);
            if header_end > located.block_size {
                return Err(ArchiveError::InvalidBinary {
                    epoch,
                    reason: format!(
                        "header span of {header_end} bytes exceeds the {} byte block",
                        located.block_size
                    ),
                });
            }
        }

        let path = epoch_files(&self.root, epoch).epoch;
        let mut body = None;
        let mut header = None;
        if component.wants_block() {
            let bytes = layout::read_exact_at(&path, entry.block_offset, located.block_size as usize)?;
            let got = Crc32Computer::checksum(&bytes);
            if got != entry.checksum {
                return Err(ArchiveError::ChecksumMismatch {
                    epoch,
                    relative_slot: located.position.relative_slot,
                    expected: entry.checksum,
                    got,
                });
            }
            body = Some(bytes);
        } else if component.wants_header() {
            header = Some(layout::read_exact_at(
                &path,
                entry.block_offset + u64::from(entry.header_offset),
                usize::from(entry.header_size),
            )?);
        }

        let resolved = ResolvedEntry {
            hash: entry.hash.clone(),
            location: entry.location,
            slot,
            block_size: located.block_size,
            header_offset: entry.header_offset,
            header_size: entry.header_size,
        };
        Ok(resolved.project(component, body.as_deref(), header.as_deref()))
    }

    fn tip_position(&self, tip: &Tip<H>) -> Result<Option<EpochSlot>, ArchiveError> {
        match tip {
            Tip::Origin => Ok(None),
            Tip::At(info) => Ok(Some(match info.location {
                BlockOrEbb::Block(slot) => self.layout.epoch_slot_of(slot)?,
                BlockOrEbb::Ebb(epoch) => EpochSlot::boundary_of(epoch),
            })),
        }
    }

    /// The absolute slot of the tip; a boundary block sits at the first
    /// slot of its epoch.
    fn tip_slot(&self, tip: &Tip<H>) -> Result<Option<Slot>, ArchiveError> {
        match tip {
            Tip::Origin => Ok(None),
            Tip::At(info) => Ok(Some(match info.location {
                BlockOrEbb::Block(slot) => slot,
                BlockOrEbb::Ebb(epoch) => self.layout.first_slot_of(epoch)?,
            })),
        }
    }
}

fn tip_location<H>(tip: &Tip<H>) -> Option<BlockOrEbb> {
    tip.info().map(|info| info.location)
}

/// Traces a user error before handing it to the caller.
fn rejected(error: ArchiveError) -> ArchiveError {
    debug!(%error, "rejecting");
    error
}

fn load_epoch_indexes<H: BlockHash>(
    root: &Path,
    epoch: Epoch,
) -> Result<SharedIndexes<H>, ArchiveError> {
    let files = epoch_files(root, epoch);
    if !files.complete() {
        return Err(ArchiveError::MissingEpochFile { epoch });
    }
    let primary_bytes = fs::read(&files.primary)?;
    let primary = PrimaryIndex::parse(&primary_bytes)
        .map_err(|reason| ArchiveError::InvalidPrimaryIndex { epoch, reason })?;
    let secondary_bytes = fs::read(&files.secondary)?;
    let (entries, trailing) = SecondaryEntry::parse_file(&secondary_bytes);
    if trailing {
        return Err(ArchiveError::InvalidBinary {
            epoch,
            reason: "trailing bytes in the secondary index".to_owned(),
        });
    }
    Ok(Arc::new(EpochIndexes { primary, entries }))
}
