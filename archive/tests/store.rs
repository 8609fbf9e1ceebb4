//! End-to-end scenarios over a real on-disk archive: append and read back,
//! boundary blocks, crash recovery, truncation and iteration.

use std::{fs, sync::Arc};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use meridian_archive::{
    Archive, ArchiveConfig, ArchiveError, ArchiveEvent, BlockComponent, ComponentValue,
    EpochFileParser, ParseOutcome, ParsedBlock, RangeViolation, ValidationPolicy,
};
use meridian_primitives::{
    BinaryInfo, BlockOrEbb, Epoch, FixedLayout, Hash32, Slot, Tip, TipInfo,
};
use meridian_test_log::test;
use meridian_utils::crc::Crc32Computer;
use tempfile::TempDir;

const EPOCH_SIZE: u64 = 10;
/// Secondary entry width for `Hash32`: 25 fixed bytes plus the hash.
const ENTRY_SIZE: u32 = 25 + 32;
/// Test block framing: length, tag, slot-or-epoch, block number.
const FRAME_SIZE: usize = 4 + 1 + 8 + 8;

/// Test block codec: a length-prefixed frame of tag, chain coordinate and
/// block number, followed by an arbitrary payload. The "header" of a test
/// block is the frame behind the length prefix.
fn encode_block(location: BlockOrEbb, block_number: u64, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(FRAME_SIZE + payload.len());
    bytes.extend_from_slice(&((FRAME_SIZE + payload.len()) as u32).to_be_bytes());
    match location {
        BlockOrEbb::Block(slot) => {
            bytes.push(0);
            bytes.extend_from_slice(&slot.as_u64().to_be_bytes());
        }
        BlockOrEbb::Ebb(epoch) => {
            bytes.push(1);
            bytes.extend_from_slice(&epoch.as_u64().to_be_bytes());
        }
    }
    bytes.extend_from_slice(&block_number.to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// Deterministic stand-in for a block digest.
fn pseudo_hash(bytes: &[u8]) -> Hash32 {
    let checksum = Crc32Computer::checksum(bytes).to_be_bytes();
    let mut digest = [0u8; 32];
    for (index, byte) in digest.iter_mut().enumerate() {
        *byte = checksum[index % 4] ^ index as u8;
    }
    Hash32::new(digest)
}

struct TestParser;

impl EpochFileParser<Hash32> for TestParser {
    fn parse(&self, _epoch: Epoch, bytes: &[u8]) -> ParseOutcome<Hash32> {
        let mut blocks = Vec::new();
        let mut offset = 0usize;
        while offset < bytes.len() {
            let remaining = &bytes[offset..];
            if remaining.len() < FRAME_SIZE {
                return ParseOutcome {
                    blocks,
                    trailing: Some(offset as u64),
                };
            }
            let size = BigEndian::read_u32(&remaining[..4]) as usize;
            if size < FRAME_SIZE || size > remaining.len() {
                return ParseOutcome {
                    blocks,
                    trailing: Some(offset as u64),
                };
            }
            let frame = &remaining[..size];
            let mut reader = &frame[4..];
            let tag = reader.read_u8().expect("frame is long enough");
            let coordinate = reader.read_u64::<BigEndian>().expect("frame is long enough");
            let block_number = reader.read_u64::<BigEndian>().expect("frame is long enough");
            let location = match tag {
                0 => BlockOrEbb::Block(Slot::new(coordinate)),
                1 => BlockOrEbb::Ebb(Epoch::new(coordinate)),
                _ => {
                    return ParseOutcome {
                        blocks,
                        trailing: Some(offset as u64),
                    };
                }
            };
            blocks.push(ParsedBlock {
                size: size as u64,
                block_number,
                header_offset: 4,
                header_size: (FRAME_SIZE - 4) as u16,
                hash: pseudo_hash(frame),
                location,
            });
            offset += size;
        }
        ParseOutcome {
            blocks,
            trailing: None,
        }
    }
}

struct Fixture {
    dir: TempDir,
    archive: Archive<Hash32>,
}

impl Fixture {
    fn new() -> Fixture {
        Self::with_config(ArchiveConfig::default())
    }

    fn with_config(config: ArchiveConfig) -> Fixture {
        let dir = TempDir::new().expect("temp dir");
        let archive = Archive::open(
            dir.path(),
            Arc::new(FixedLayout::new(EPOCH_SIZE)),
            Arc::new(TestParser),
            config,
        )
        .expect("open empty archive");
        Fixture { dir, archive }
    }

    /// Appends a block and returns its bytes and hash.
    fn append_block(&self, slot: u64, block_number: u64, payload: &[u8]) -> (Vec<u8>, Hash32) {
        let bytes = encode_block(BlockOrEbb::Block(Slot::new(slot)), block_number, payload);
        let hash = pseudo_hash(&bytes);
        self.archive
            .append_block(
                Slot::new(slot),
                block_number,
                hash,
                &BinaryInfo::new(&bytes, 4, (FRAME_SIZE - 4) as u16),
            )
            .unwrap_or_else(|error| panic!("append at slot {slot}: {error}"));
        (bytes, hash)
    }

    fn append_ebb(&self, epoch: u64, block_number: u64, payload: &[u8]) -> (Vec<u8>, Hash32) {
        let bytes = encode_block(BlockOrEbb::Ebb(Epoch::new(epoch)), block_number, payload);
        let hash = pseudo_hash(&bytes);
        self.archive
            .append_ebb(
                Epoch::new(epoch),
                block_number,
                hash,
                &BinaryInfo::new(&bytes, 4, (FRAME_SIZE - 4) as u16),
            )
            .unwrap_or_else(|error| panic!("append boundary block of epoch {epoch}: {error}"));
        (bytes, hash)
    }

    fn tip_slot(&self) -> Option<u64> {
        match self.archive.tip().expect("archive open") {
            Tip::Origin => None,
            Tip::At(info) => match info.location {
                BlockOrEbb::Block(slot) => Some(slot.as_u64()),
                BlockOrEbb::Ebb(epoch) => Some(epoch.as_u64() * EPOCH_SIZE),
            },
        }
    }

    fn raw_block(&self, slot: u64) -> Option<Vec<u8>> {
        self.archive
            .block_component(Slot::new(slot), &BlockComponent::RawBlock)
            .expect("read")
            .map(|value| value.into_raw_block().expect("raw block value"))
    }

    fn primary_file(&self, epoch: u64) -> Vec<u8> {
        fs::read(
            self.dir
                .path()
                .join(format!("{:08}.primary", epoch)),
        )
        .expect("primary index file")
    }

    fn epoch_file_path(&self, epoch: u64) -> std::path::PathBuf {
        self.dir.path().join(format!("{:08}.epoch", epoch))
    }
}

fn primary_offsets(bytes: &[u8]) -> Vec<u32> {
    assert_eq!(bytes[0], 1, "primary index version");
    bytes[1..]
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes(chunk.try_into().expect("4-byte chunk")))
        .collect()
}

#[test]
fn it_appends_and_reads_back_linearly() {
    let fixture = Fixture::new();
    assert_eq!(fixture.archive.tip().expect("open"), Tip::Origin);

    fixture.append_block(1, 1, b"alpha");
    fixture.append_block(2, 2, b"beta");
    let (bytes5, hash5) = fixture.append_block(5, 3, b"gamma");

    assert_eq!(fixture.tip_slot(), Some(5));
    assert_eq!(fixture.raw_block(5).expect("slot 5 filled"), bytes5);
    assert_eq!(fixture.raw_block(3), None);
    assert_eq!(fixture.raw_block(0), None);

    // Reads past the tip are refused, not silently empty.
    assert!(matches!(
        fixture
            .archive
            .block_component(Slot::new(6), &BlockComponent::Hash),
        Err(ArchiveError::ReadFutureSlot { .. })
    ));

    // Metadata projections come from the index alone.
    let value = fixture
        .archive
        .block_component(
            Slot::new(5),
            &BlockComponent::pair(BlockComponent::Hash, BlockComponent::BlockSize),
        )
        .expect("read")
        .expect("filled");
    assert_eq!(
        value,
        ComponentValue::Pair(
            Box::new(ComponentValue::Hash(hash5)),
            Box::new(ComponentValue::BlockSize(bytes5.len() as u64)),
        )
    );

    // The header is the frame behind the length prefix.
    let header = fixture
        .archive
        .block_component(Slot::new(5), &BlockComponent::RawHeader)
        .expect("read")
        .expect("filled")
        .into_raw_header()
        .expect("raw header value");
    assert_eq!(header, bytes5[4..FRAME_SIZE].to_vec());

    // Rolling into epoch 1 completes the epoch 0 primary index: one offset
    // per relative slot boundary, empty slots sharing their successor's.
    fixture.append_block(11, 4, b"delta");
    let offsets = primary_offsets(&fixture.primary_file(0));
    let expected: Vec<u32> = [0, 0, 1, 2, 2, 2, 3, 3, 3, 3, 3, 3]
        .iter()
        .map(|&entries| entries * ENTRY_SIZE)
        .collect();
    assert_eq!(offsets, expected);
}

#[test]
fn it_stores_boundary_blocks_at_the_epoch_boundary() {
    let fixture = Fixture::new();
    let (_, ebb_hash) = fixture.append_ebb(0, 0, b"boundary");
    fixture.append_block(1, 1, b"alpha");
    fixture.append_block(2, 2, b"beta");

    let value = fixture
        .archive
        .ebb_component(Epoch::new(0), &BlockComponent::Hash)
        .expect("read")
        .expect("boundary block present");
    assert_eq!(value, ComponentValue::Hash(ebb_hash));

    // Slot 0 holds the boundary block, not a regular one.
    assert_eq!(fixture.raw_block(0), None);

    // The boundary block is reachable by slot + hash.
    let value = fixture
        .archive
        .block_or_ebb_component(Slot::new(0), &ebb_hash, &BlockComponent::IsEbb)
        .expect("read")
        .expect("hash matches");
    assert_eq!(value, ComponentValue::IsEbb(true));

    // A wrong hash is no error, just a miss.
    assert_eq!(
        fixture
            .archive
            .block_or_ebb_component(Slot::new(0), &Hash32::new([9; 32]), &BlockComponent::Hash)
            .expect("read"),
        None
    );

    // No boundary block may follow content in its own epoch.
    assert!(matches!(
        fixture.archive.append_ebb(
            Epoch::new(0),
            3,
            Hash32::new([1; 32]),
            &BinaryInfo::new(b"x", 0, 0)
        ),
        Err(ArchiveError::AppendToEbbInThePast { .. })
    ));
}

#[test]
fn it_rejects_appends_at_or_before_the_tip() {
    let fixture = Fixture::new();
    fixture.append_block(4, 1, b"alpha");

    for slot in [2, 4] {
        assert!(matches!(
            fixture.archive.append_block(
                Slot::new(slot),
                2,
                Hash32::new([2; 32]),
                &BinaryInfo::new(b"y", 0, 0)
            ),
            Err(ArchiveError::AppendToSlotInThePast { .. })
        ));
    }
    // The tip is unchanged and the archive still open.
    assert_eq!(fixture.tip_slot(), Some(4));
}

#[test]
fn it_recovers_from_a_torn_final_write() {
    let fixture = Fixture::new();
    fixture.append_block(1, 1, b"alpha");
    let (bytes2, hash2) = fixture.append_block(2, 2, b"beta");
    fixture.append_block(3, 3, b"gamma");

    // Crash: the final block loses its last 5 bytes.
    fixture.archive.close();
    let path = fixture.epoch_file_path(0);
    let len = fs::metadata(&path).expect("epoch file").len();
    fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .expect("open epoch file")
        .set_len(len - 5)
        .expect("truncate");

    fixture
        .archive
        .reopen(ValidationPolicy::ValidateAllEpochs)
        .expect("reopen");

    assert_eq!(
        fixture.archive.tip().expect("open"),
        Tip::At(TipInfo {
            hash: hash2,
            location: BlockOrEbb::Block(Slot::new(2)),
            block_number: 2,
        })
    );
    assert_eq!(fixture.raw_block(2).expect("slot 2 intact"), bytes2);
    // Slot 3 is past the tip again.
    assert!(matches!(
        fixture
            .archive
            .block_component(Slot::new(3), &BlockComponent::RawBlock),
        Err(ArchiveError::ReadFutureSlot { .. })
    ));

    // Appending continues after the recovered tip.
    fixture.append_block(3, 3, b"gamma again");
    assert_eq!(fixture.tip_slot(), Some(3));
}

#[test]
fn it_truncates_a_bit_flipped_block_on_reopen() {
    let fixture = Fixture::new();
    let (bytes1, _) = fixture.append_block(1, 1, b"alpha");
    fixture.append_block(2, 2, b"beta");
    fixture.append_block(3, 3, b"gamma");

    fixture.archive.close();
    // Flip one payload byte of the second block.
    let path = fixture.epoch_file_path(0);
    let mut bytes = fs::read(&path).expect("epoch file");
    let target = bytes1.len() + FRAME_SIZE + 1;
    bytes[target] ^= 0xff;
    fs::write(&path, &bytes).expect("rewrite epoch file");

    fixture
        .archive
        .reopen(ValidationPolicy::ValidateMostRecentEpoch)
        .expect("reopen");

    // Everything from the flipped block on is gone.
    assert_eq!(fixture.tip_slot(), Some(1));
    assert_eq!(fixture.raw_block(1).expect("slot 1 intact"), bytes1);
}

#[test]
fn it_materialises_skipped_epochs_with_backfilled_indices() {
    let fixture = Fixture::new();
    // First entry of the whole archive sits in epoch 5.
    fixture.append_block(51, 1, b"far ahead");

    assert_eq!(fixture.tip_slot(), Some(51));
    for epoch in 0..5u64 {
        assert_eq!(
            fs::metadata(fixture.epoch_file_path(epoch))
                .expect("epoch file exists")
                .len(),
            0,
            "epoch {epoch} file must be empty"
        );
        let offsets = primary_offsets(&fixture.primary_file(epoch));
        assert_eq!(offsets, vec![0u32; (EPOCH_SIZE + 2) as usize]);
    }
    // Empty slots below the tip read as misses.
    assert_eq!(fixture.raw_block(7), None);
    assert_eq!(fixture.raw_block(50), None);

    // Reopening keeps the tip.
    fixture.archive.close();
    fixture
        .archive
        .reopen(ValidationPolicy::ValidateAllEpochs)
        .expect("reopen");
    assert_eq!(fixture.tip_slot(), Some(51));
}

#[test]
fn it_deletes_after_a_tip_across_epochs() {
    let fixture = Fixture::new();
    fixture.append_block(1, 1, b"a");
    fixture.append_block(2, 2, b"b");
    let (_, hash13) = fixture.append_block(13, 3, b"c");
    fixture.append_block(17, 4, b"d");
    fixture.append_block(24, 5, b"e");
    assert_eq!(fixture.tip_slot(), Some(24));

    let new_tip = Tip::At(TipInfo {
        hash: hash13,
        location: BlockOrEbb::Block(Slot::new(13)),
        block_number: 3,
    });
    fixture.archive.delete_after(&new_tip).expect("delete after");

    assert_eq!(fixture.archive.tip().expect("open"), new_tip);
    assert!(!fixture.epoch_file_path(2).exists());
    assert!(fixture.epoch_file_path(1).exists());
    // Slot 17 was in epoch 1 after the new tip; it is gone too.
    assert!(matches!(
        fixture
            .archive
            .block_component(Slot::new(17), &BlockComponent::Hash),
        Err(ArchiveError::ReadFutureSlot { .. })
    ));

    // Deleting to the same tip is a no-op.
    fixture.archive.delete_after(&new_tip).expect("idempotent");
    assert_eq!(fixture.archive.tip().expect("open"), new_tip);

    // The archive keeps working: reopen agrees, appends continue.
    fixture.archive.close();
    fixture
        .archive
        .reopen(ValidationPolicy::ValidateAllEpochs)
        .expect("reopen");
    assert_eq!(fixture.archive.tip().expect("open"), new_tip);
    fixture.append_block(14, 4, b"regrown");
    assert_eq!(fixture.tip_slot(), Some(14));
}

#[test]
fn it_deletes_everything_back_to_origin() {
    let fixture = Fixture::new();
    fixture.append_block(1, 1, b"a");
    fixture.append_block(12, 2, b"b");

    fixture
        .archive
        .delete_after(&Tip::Origin)
        .expect("delete all");
    assert_eq!(fixture.archive.tip().expect("open"), Tip::Origin);
    assert!(!fixture.epoch_file_path(1).exists());

    fixture.append_ebb(0, 0, b"fresh start");
    assert_eq!(fixture.tip_slot(), Some(0));
}

#[test]
fn iterators_see_their_snapshot_and_block_truncation() {
    let fixture = Fixture::new();
    let (bytes1, _) = fixture.append_block(1, 1, b"a");
    let (bytes2, _) = fixture.append_block(2, 2, b"b");

    let mut stream = fixture
        .archive
        .stream(Slot::new(1), Slot::new(2), BlockComponent::RawBlock)
        .expect("stream");

    // While the iterator is open, truncation is refused.
    assert!(matches!(
        fixture.archive.delete_after(&Tip::Origin),
        Err(ArchiveError::IteratorsOpen { count: 1 })
    ));

    // An append during iteration is not enumerated.
    fixture.append_block(3, 3, b"c");

    let first = stream.next().expect("first entry").expect("no error");
    assert_eq!(first.into_raw_block().expect("raw block"), bytes1);
    let second = stream.next().expect("second entry").expect("no error");
    assert_eq!(second.into_raw_block().expect("raw block"), bytes2);
    assert!(stream.next().is_none());

    // Closing twice is fine, and frees the archive for truncation.
    stream.close();
    drop(stream);
    fixture.archive.delete_after(&Tip::Origin).expect("delete");
}

#[test]
fn it_streams_across_epoch_boundaries() {
    let fixture = Fixture::new();
    fixture.append_block(8, 1, b"a");
    fixture.append_ebb(1, 1, b"boundary");
    fixture.append_block(13, 2, b"b");
    fixture.append_block(25, 3, b"c");

    let stream = fixture
        .archive
        .stream(
            Slot::new(8),
            Slot::new(25),
            BlockComponent::pair(BlockComponent::Slot, BlockComponent::IsEbb),
        )
        .expect("stream");
    let values: Vec<(u64, bool)> = stream
        .map(|result| match result.expect("no error") {
            ComponentValue::Pair(slot, is_ebb) => match (*slot, *is_ebb) {
                (ComponentValue::Slot(slot), ComponentValue::IsEbb(is_ebb)) => {
                    (slot.as_u64(), is_ebb)
                }
                other => panic!("unexpected pair {other:?}"),
            },
            other => panic!("unexpected value {other:?}"),
        })
        .collect();
    // The boundary block of epoch 1 sits at slot 10, between the blocks.
    assert_eq!(values, vec![(8, false), (10, true), (13, false), (25, false)]);
}

#[test]
fn it_validates_iterator_ranges() {
    let fixture = Fixture::new();
    fixture.append_block(1, 1, b"a");
    fixture.append_block(5, 2, b"b");

    let inverted = fixture
        .archive
        .stream(Slot::new(5), Slot::new(1), BlockComponent::Hash)
        .expect_err("inverted range");
    assert!(matches!(
        inverted,
        ArchiveError::InvalidIteratorRange {
            reason: RangeViolation::Inverted,
            ..
        }
    ));

    let missing_from = fixture
        .archive
        .stream(Slot::new(2), Slot::new(5), BlockComponent::Hash)
        .expect_err("empty lower bound");
    assert!(matches!(
        missing_from,
        ArchiveError::InvalidIteratorRange {
            reason: RangeViolation::MissingFrom,
            ..
        }
    ));

    let missing_to = fixture
        .archive
        .stream(Slot::new(1), Slot::new(4), BlockComponent::Hash)
        .expect_err("empty upper bound");
    assert!(matches!(
        missing_to,
        ArchiveError::InvalidIteratorRange {
            reason: RangeViolation::MissingTo,
            ..
        }
    ));
}

#[test]
fn it_reports_transitions_as_events() {
    let fixture = Fixture::new();
    let mut events = fixture.archive.subscribe();

    fixture.append_block(1, 1, b"a");
    fixture.append_block(11, 2, b"b");

    assert_eq!(
        events.try_recv().expect("append event"),
        ArchiveEvent::Appended {
            location: BlockOrEbb::Block(Slot::new(1)),
            block_number: 1,
        }
    );
    assert_eq!(
        events.try_recv().expect("epoch roll event"),
        ArchiveEvent::EpochStarted(Epoch::new(1))
    );
    assert_eq!(
        events.try_recv().expect("append event"),
        ArchiveEvent::Appended {
            location: BlockOrEbb::Block(Slot::new(11)),
            block_number: 2,
        }
    );

    fixture.archive.close();
    assert_eq!(events.try_recv().expect("close event"), ArchiveEvent::Closed);
}

#[test]
fn operations_on_a_closed_archive_fail() {
    let fixture = Fixture::new();
    fixture.append_block(1, 1, b"a");
    fixture.archive.close();
    fixture.archive.close();

    assert!(matches!(
        fixture.archive.tip(),
        Err(ArchiveError::Closed)
    ));
    assert!(matches!(
        fixture.archive.append_block(
            Slot::new(2),
            2,
            Hash32::new([0; 32]),
            &BinaryInfo::new(b"x", 0, 0)
        ),
        Err(ArchiveError::Closed)
    ));

    fixture
        .archive
        .reopen(ValidationPolicy::ValidateMostRecentEpoch)
        .expect("reopen");
    assert!(matches!(
        fixture
            .archive
            .reopen(ValidationPolicy::ValidateMostRecentEpoch),
        Err(ArchiveError::AlreadyOpen)
    ));
    assert_eq!(fixture.tip_slot(), Some(1));
}

#[test]
fn a_block_may_occupy_the_boundary_slot_of_a_later_epoch() {
    let fixture = Fixture::new();
    fixture.append_block(5, 1, b"a");
    // Slot 10 is the boundary position of epoch 1; with no boundary block
    // there, a regular block owns it.
    let (bytes10, hash10) = fixture.append_block(10, 2, b"b");

    assert_eq!(fixture.raw_block(10).expect("slot 10 filled"), bytes10);
    assert_eq!(
        fixture
            .archive
            .ebb_component(Epoch::new(1), &BlockComponent::Hash)
            .expect("read"),
        None
    );
    let value = fixture
        .archive
        .block_or_ebb_component(Slot::new(10), &hash10, &BlockComponent::IsEbb)
        .expect("read")
        .expect("hash matches");
    assert_eq!(value, ComponentValue::IsEbb(false));
}

#[test]
fn it_runs_on_a_hard_fork_aware_layout() {
    use std::time::Duration;

    use meridian_clock::{
        summarize, EraParams, SafeZone, Shape, SummaryLayout, SystemStart, Transitions,
    };
    use time::macros::datetime;

    // Single era of 10-slot epochs, horizon at epoch 2 (slot 20).
    let shape = Shape::single(EraParams {
        epoch_size: EPOCH_SIZE,
        slot_length: Duration::from_secs(1),
        safe_zone: SafeZone::from_tip(5),
    });
    let summary = Arc::new(summarize(
        SystemStart::new(datetime!(2024-01-01 00:00:00 UTC)),
        Some(Slot::new(7)),
        &shape,
        &Transitions::none(),
    ));

    let dir = TempDir::new().expect("temp dir");
    let archive: Archive<Hash32> = Archive::open(
        dir.path(),
        Arc::new(SummaryLayout::new(summary)),
        Arc::new(TestParser),
        ArchiveConfig::default(),
    )
    .expect("open");

    let bytes = encode_block(BlockOrEbb::Block(Slot::new(11)), 1, b"forked");
    archive
        .append_block(
            Slot::new(11),
            1,
            pseudo_hash(&bytes),
            &BinaryInfo::new(&bytes, 4, (FRAME_SIZE - 4) as u16),
        )
        .expect("append within the horizon");

    // Past the summary horizon the layout refuses to place the block.
    let bytes = encode_block(BlockOrEbb::Block(Slot::new(25)), 2, b"too far");
    assert!(matches!(
        archive.append_block(
            Slot::new(25),
            2,
            pseudo_hash(&bytes),
            &BinaryInfo::new(&bytes, 4, (FRAME_SIZE - 4) as u16),
        ),
        Err(ArchiveError::Layout(_))
    ));
}

#[test(tokio::test)]
async fn the_expiry_task_drops_idle_cache_entries() {
    use std::time::Duration;

    let mut config = ArchiveConfig::default();
    config.cache.expiry = Duration::from_millis(20);
    let fixture = Fixture::with_config(config);
    fixture.append_block(1, 1, b"a");
    fixture.append_block(11, 2, b"b");

    // Fault in the epoch 0 indices, then let the expiry task age them out.
    // (The epoch roll seeded epoch 0 into the cache already; the read marks
    // it used.)
    assert!(fixture.raw_block(1).is_some());

    let archive = Arc::new(fixture.archive);
    let mut events = archive.subscribe();
    let expiry = tokio::spawn(
        Arc::clone(&archive).run_cache_expiry(Duration::from_millis(10)),
    );

    let evicted = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(ArchiveEvent::CacheEvict(epoch)) = events.recv().await {
                break epoch;
            }
        }
    })
    .await
    .expect("eviction within the timeout");
    assert_eq!(evicted, Epoch::new(0));
    expiry.abort();

    // A read after eviction reloads from disk.
    assert!(archive
        .block_component(Slot::new(1), &BlockComponent::Hash)
        .expect("read")
        .is_some());
}
