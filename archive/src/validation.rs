use std::{fs, path::Path};

use meridian_primitives::{BlockHash, BlockOrEbb, Epoch, EpochLayout, EpochSlot, Tip, TipInfo};
use meridian_utils::crc::Crc32Computer;
use tokio::sync::broadcast;

use crate::{
    config::ValidationPolicy,
    error::ArchiveError,
    events::{notify, ArchiveEvent},
    index::{entry_size, EpochIndexes, PrimaryIndex, SecondaryEntry},
    layout::{self, epoch_files},
    parse::EpochFileParser,
};

/// What the validation walk recovered: the epoch to keep appending to, its
/// in-memory indices (truncated to the tip) and the tip itself.
pub(crate) struct RecoveredState<H> {
    pub current_epoch: Epoch,
    /// Size of the (possibly truncated) current epoch file.
    pub epoch_offset: u64,
    pub indexes: EpochIndexes<H>,
    pub tip: Tip<H>,
}

impl<H> RecoveredState<H> {
    fn fresh() -> RecoveredState<H> {
        RecoveredState {
            current_epoch: Epoch::GENESIS,
            epoch_offset: 0,
            indexes: EpochIndexes::empty(),
            tip: Tip::Origin,
        }
    }
}

/// Everything an epoch holds after its trailing garbage has been cut off.
struct EpochContent<H> {
    entries: Vec<SecondaryEntry<H>>,
    primary: PrimaryIndex,
    epoch_file_size: u64,
    last: Option<TipInfo<H>>,
}

/// Walks the epochs on disk newest first, truncating any trailing
/// corruption, until a consistent prefix with a tip remains.
///
/// Epochs above the tip hold no entries and are removed. How much of the
/// epochs below the tip is re-checked depends on the policy: everything
/// under [`ValidationPolicy::ValidateAllEpochs`], only primary-index
/// coherence under [`ValidationPolicy::ValidateMostRecentEpoch`].
pub(crate) fn validate_and_recover<H: BlockHash>(
    root: &Path,
    layout: &dyn EpochLayout,
    parser: &dyn EpochFileParser<H>,
    policy: ValidationPolicy,
    notifier: &broadcast::Sender<ArchiveEvent>,
) -> Result<RecoveredState<H>, ArchiveError> {
    let epochs = layout::list_epochs(root)?;
    let mut recovered: Option<RecoveredState<H>> = None;

    for &epoch in epochs.iter().rev() {
        let files = epoch_files(root, epoch);
        if !files.complete() {
            // The triple is incomplete; whatever half-written files are
            // left cannot be interpreted.
            warn!(%epoch, "incomplete epoch file triple, removing");
            files.remove()?;
            continue;
        }

        if recovered.is_none() {
            // Still looking for the tip, newest first.
            notify(notifier, ArchiveEvent::ValidatingEpoch(epoch));
            debug!(%epoch, "validating epoch");
            let content = revalidate_epoch(root, epoch, layout, parser, true, notifier)?;
            match content.last {
                None => {
                    debug!(%epoch, "epoch holds no entries, removing");
                    files.remove()?;
                }
                Some(info) => {
                    recovered = Some(RecoveredState {
                        current_epoch: epoch,
                        epoch_offset: content.epoch_file_size,
                        indexes: EpochIndexes {
                            primary: content.primary,
                            entries: content.entries,
                        },
                        tip: Tip::At(info),
                    });
                }
            }
            continue;
        }

        // Below the tip epoch.
        match policy {
            ValidationPolicy::ValidateAllEpochs => {
                notify(notifier, ArchiveEvent::ValidatingEpoch(epoch));
                debug!(%epoch, "validating epoch");
                revalidate_epoch(root, epoch, layout, parser, false, notifier)?;
            }
            ValidationPolicy::ValidateMostRecentEpoch => {
                if !shallow_check(root, epoch, layout)? {
                    notify(notifier, ArchiveEvent::ValidatingEpoch(epoch));
                    warn!(%epoch, "incoherent primary index, revalidating epoch");
                    revalidate_epoch(root, epoch, layout, parser, false, notifier)?;
                }
            }
        }
    }

    Ok(recovered.unwrap_or_else(RecoveredState::fresh))
}

/// Cheap coherence check of a trusted epoch: version byte, completed size
/// and agreement between the primary's final offset and the secondary file.
fn shallow_check(
    root: &Path,
    epoch: Epoch,
    layout: &dyn EpochLayout,
) -> Result<bool, ArchiveError> {
    let files = epoch_files(root, epoch);
    let epoch_size = layout.epoch_size(epoch)?;
    let bytes = fs::read(&files.primary)?;
    Ok(match PrimaryIndex::parse(&bytes) {
        Ok(primary) => {
            primary.is_complete(epoch_size)
                && u64::from(primary.last_offset()) == layout::file_size(&files.secondary)?
        }
        Err(_) => false,
    })
}

/// Re-parses an epoch file, cuts off anything that does not decode or does
/// not checksum, and rewrites the indices if they disagree with the result.
///
/// The primary index of the tip epoch stays in its growing form; any other
/// epoch gets the completed, fully backfilled index.
fn revalidate_epoch<H: BlockHash>(
    root: &Path,
    epoch: Epoch,
    layout: &dyn EpochLayout,
    parser: &dyn EpochFileParser<H>,
    as_tip: bool,
    notifier: &broadcast::Sender<ArchiveEvent>,
) -> Result<EpochContent<H>, ArchiveError> {
    let files = epoch_files(root, epoch);
    let bytes = fs::read(&files.epoch)?;
    let outcome = parser.parse(epoch, &bytes);

    let stored_secondary = fs::read(&files.secondary)?;
    let (stored, _) = SecondaryEntry::<H>::parse_file(&stored_secondary);

    let mut entries = Vec::with_capacity(outcome.blocks.len());
    let mut primary = PrimaryIndex::new();
    let mut offset = 0u64;
    let mut last = None;
    let mut truncate_at = outcome.trailing;

    for (index, block) in outcome.blocks.iter().enumerate() {
        let position = match block.location {
            BlockOrEbb::Block(slot) => layout.epoch_slot_of(slot)?,
            BlockOrEbb::Ebb(ebb_epoch) => EpochSlot::boundary_of(ebb_epoch),
        };
        if position.epoch != epoch || position.relative_slot.as_u64() < primary.slots_covered() {
            // A block that does not belong here, or one out of order:
            // everything from it on is garbage.
            warn!(%epoch, %position, "block out of place, truncating");
            truncate_at = Some(offset);
            break;
        }
        if offset + block.size > bytes.len() as u64 {
            warn!(%epoch, %position, "block extends past the end of the epoch file, truncating");
            truncate_at = Some(offset);
            break;
        }
        let body = &bytes[offset as usize..(offset + block.size) as usize];
        let checksum = Crc32Computer::checksum(body);
        if let Some(previous) = stored.get(index) {
            if previous.checksum != checksum {
                // The bytes changed since they were indexed.
                warn!(
                    %epoch,
                    %position,
                    expected = previous.checksum,
                    got = checksum,
                    "checksum mismatch, truncating"
                );
                truncate_at = Some(offset);
                break;
            }
        }
        primary.fill_to(position.relative_slot, entry_size::<H>() as u32);
        entries.push(SecondaryEntry {
            block_offset: offset,
            header_offset: block.header_offset,
            header_size: block.header_size,
            checksum,
            location: block.location,
            hash: block.hash.clone(),
        });
        last = Some(TipInfo {
            hash: block.hash.clone(),
            location: block.location,
            block_number: block.block_number,
        });
        offset += block.size;
    }

    let epoch_file_size = truncate_at.unwrap_or(bytes.len() as u64);
    if epoch_file_size < bytes.len() as u64 {
        warn!(
            %epoch,
            from = bytes.len(),
            to = epoch_file_size,
            "truncating trailing garbage off the epoch file"
        );
        fs::OpenOptions::new()
            .write(true)
            .open(&files.epoch)?
            .set_len(epoch_file_size)?;
        notify(notifier, ArchiveEvent::TruncatedEpoch(epoch));
    }

    if !as_tip {
        primary.complete(layout.epoch_size(epoch)?);
    }

    let expected_secondary: Vec<u8> = entries
        .iter()
        .flat_map(SecondaryEntry::serialize)
        .collect();
    let expected_primary = primary.serialize();
    let stored_primary = fs::read(&files.primary)?;
    if stored_secondary != expected_secondary || stored_primary != expected_primary {
        debug!(%epoch, "rebuilding on-disk indices");
        fs::write(&files.secondary, &expected_secondary)?;
        fs::write(&files.primary, &expected_primary)?;
        notify(notifier, ArchiveEvent::RebuiltIndex(epoch));
    }

    Ok(EpochContent {
        entries,
        primary,
        epoch_file_size,
        last,
    })
}
