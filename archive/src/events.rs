use meridian_primitives::{BlockOrEbb, Epoch};
use tokio::sync::broadcast;

/// Publishes an event, ignoring the send error raised when nobody is
/// subscribed.
pub(crate) fn notify(notifier: &broadcast::Sender<ArchiveEvent>, event: ArchiveEvent) {
    let _ = notifier.send(event);
}

/// Structured notifications for every nontrivial archive transition.
///
/// Events carry chain coordinates only, so subscribers do not need to be
/// generic over the hash type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArchiveEvent {
    /// The archive finished opening (or reopening) with the given tip.
    Opened { tip: Option<BlockOrEbb> },
    /// The archive was closed, explicitly or by a failed write.
    Closed,
    /// An epoch is being validated during open.
    ValidatingEpoch(Epoch),
    /// Validation rebuilt the on-disk indices of an epoch.
    RebuiltIndex(Epoch),
    /// Validation or recovery cut trailing data off an epoch.
    TruncatedEpoch(Epoch),
    /// An append rolled the archive over into a new epoch.
    EpochStarted(Epoch),
    /// An entry was appended and became the new tip.
    Appended {
        location: BlockOrEbb,
        block_number: u64,
    },
    /// Everything after the given tip is being deleted.
    DeletingAfter { new_tip: Option<BlockOrEbb> },
    /// The index cache dropped its entry for an epoch.
    CacheEvict(Epoch),
}
