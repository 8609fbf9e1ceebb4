use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use meridian_primitives::RelativeSlot;

pub(crate) const PRIMARY_INDEX_VERSION: u8 = 1;

/// Span of the secondary index belonging to one relative slot: empty iff
/// both bounds coincide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SecondarySpan {
    pub start: u64,
    pub end: u64,
}

impl SecondarySpan {
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The primary index of one epoch: secondary-index offsets per relative
/// slot, with empty slots sharing their successor's offset.
///
/// On disk this is a version byte followed by little-endian `u32` offsets
/// `P[0..]`, where `P[0] = 0` and `P[i + 1]` is the offset of the entry for
/// relative slot `i` (or equal to `P[i]` iff slot `i` is empty). The index
/// of the current epoch grows by appending; once the epoch completes it is
/// padded to `epoch_size + 2` offsets, so the final pair brackets the
/// secondary file. Offsets past the written extent read as the last offset,
/// which makes unwritten slots empty by construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PrimaryIndex {
    offsets: Vec<u32>,
}

impl PrimaryIndex {
    /// A fresh index covering no slots yet.
    pub fn new() -> PrimaryIndex {
        PrimaryIndex { offsets: vec![0] }
    }

    /// Parses an on-disk primary index, checking the version byte, the
    /// record granularity and offset monotonicity.
    pub fn parse(bytes: &[u8]) -> Result<PrimaryIndex, String> {
        let (&version, offset_bytes) = bytes
            .split_first()
            .ok_or_else(|| "empty primary index file".to_owned())?;
        if version != PRIMARY_INDEX_VERSION {
            return Err(format!("unknown primary index version {version}"));
        }
        if offset_bytes.is_empty() || offset_bytes.len() % 4 != 0 {
            return Err(format!(
                "primary index payload of {} bytes is not a sequence of u32 offsets",
                offset_bytes.len()
            ));
        }
        let offsets: Vec<u32> = offset_bytes
            .chunks_exact(4)
            .map(LittleEndian::read_u32)
            .collect();
        if offsets[0] != 0 {
            return Err(format!("primary index starts at offset {}", offsets[0]));
        }
        if offsets.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err("primary index offsets decrease".to_owned());
        }
        Ok(PrimaryIndex { offsets })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + 4 * self.offsets.len());
        bytes.push(PRIMARY_INDEX_VERSION);
        for &offset in &self.offsets {
            bytes
                .write_u32::<LittleEndian>(offset)
                .expect("serializing to a Vec cannot fail");
        }
        bytes
    }

    /// Number of relative slots with a recorded boundary; the next free
    /// relative slot of a growing epoch.
    pub fn slots_covered(&self) -> u64 {
        (self.offsets.len() - 1) as u64
    }

    /// Size in bytes of the serialized index.
    pub fn byte_len(&self) -> u64 {
        1 + 4 * self.offsets.len() as u64
    }

    /// The end of the secondary index as recorded so far.
    pub fn last_offset(&self) -> u32 {
        *self.offsets.last().expect("a primary index is never empty")
    }

    /// `P[i]`, clamped to the last written offset past the extent.
    fn offset(&self, boundary: u64) -> u32 {
        match self.offsets.get(boundary as usize) {
            Some(&offset) => offset,
            None => self.last_offset(),
        }
    }

    /// The secondary span of a relative slot; empty for empty slots and for
    /// anything past the written extent.
    pub fn span(&self, slot: RelativeSlot) -> SecondarySpan {
        SecondarySpan {
            start: u64::from(self.offset(slot.as_u64())),
            end: u64::from(self.offset(slot.as_u64() + 1)),
        }
    }

    /// The first filled relative slot at or after `from`, if any.
    pub fn first_filled_from(&self, from: RelativeSlot) -> Option<RelativeSlot> {
        (from.as_u64()..self.slots_covered())
            .map(RelativeSlot::new)
            .find(|&slot| !self.span(slot).is_empty())
    }

    /// Records an entry of `entry_size` bytes at `slot`, backfilling the
    /// empty slots in between. Returns the offsets to append to the on-disk
    /// index, in file order.
    ///
    /// `slot` must be at or after the next free relative slot.
    pub fn fill_to(&mut self, slot: RelativeSlot, entry_size: u32) -> Vec<u32> {
        let next_free = self.slots_covered();
        assert!(
            slot.as_u64() >= next_free,
            "relative slot {slot} is already covered"
        );
        let last = self.last_offset();
        let backfill = (slot.as_u64() - next_free) as usize;
        let mut appended = vec![last; backfill];
        appended.push(last + entry_size);
        self.offsets.extend_from_slice(&appended);
        appended
    }

    /// Pads the index of a finished epoch out to `epoch_size + 2` offsets.
    /// Returns the offsets to append to the on-disk index.
    pub fn complete(&mut self, epoch_size: u64) -> Vec<u32> {
        let target = (epoch_size + 2) as usize;
        let missing = target.saturating_sub(self.offsets.len());
        let appended = vec![self.last_offset(); missing];
        self.offsets.extend_from_slice(&appended);
        appended
    }

    /// Whether the index has the size of a completed epoch.
    pub fn is_complete(&self, epoch_size: u64) -> bool {
        self.offsets.len() as u64 == epoch_size + 2
    }

    /// Drops every boundary after the one closing `slot`, making `slot` the
    /// last covered relative slot.
    pub fn truncate_to(&mut self, slot: RelativeSlot) {
        self.offsets.truncate(slot.as_u64() as usize + 2);
    }
}
