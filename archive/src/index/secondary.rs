use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use meridian_primitives::{BlockHash, BlockOrEbb, Epoch, Slot};

/// Width of the fixed fields of an entry, before the hash.
const ENTRY_OVERHEAD: usize = 25;

const TAG_BLOCK: u8 = 0;
const TAG_EBB: u8 = 1;

/// On-disk size of one secondary-index record for the given hash type.
pub(crate) fn entry_size<H: BlockHash>() -> u64 {
    (ENTRY_OVERHEAD + H::SIZE) as u64
}

/// One record of the secondary index: everything needed to read a stored
/// block without touching the epoch file first.
///
/// Serialized big-endian as `block_offset: u64`, `header_offset: u16`,
/// `header_size: u16`, `checksum: u32`, `tag: u8` (0 = block, 1 = boundary
/// block), `slot_or_epoch: u64`, then the hash bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SecondaryEntry<H> {
    /// Byte offset of the block within its epoch file.
    pub block_offset: u64,
    pub header_offset: u16,
    pub header_size: u16,
    /// CRC-32 of the full block bytes.
    pub checksum: u32,
    pub location: BlockOrEbb,
    pub hash: H,
}

impl<H: BlockHash> SecondaryEntry<H> {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u64::<BigEndian>(self.block_offset)?;
        writer.write_u16::<BigEndian>(self.header_offset)?;
        writer.write_u16::<BigEndian>(self.header_size)?;
        writer.write_u32::<BigEndian>(self.checksum)?;
        match self.location {
            BlockOrEbb::Block(slot) => {
                writer.write_u8(TAG_BLOCK)?;
                writer.write_u64::<BigEndian>(slot.as_u64())?;
            }
            BlockOrEbb::Ebb(epoch) => {
                writer.write_u8(TAG_EBB)?;
                writer.write_u64::<BigEndian>(epoch.as_u64())?;
            }
        }
        self.hash.write_to(writer)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<SecondaryEntry<H>> {
        let block_offset = reader.read_u64::<BigEndian>()?;
        let header_offset = reader.read_u16::<BigEndian>()?;
        let header_size = reader.read_u16::<BigEndian>()?;
        let checksum = reader.read_u32::<BigEndian>()?;
        let tag = reader.read_u8()?;
        let slot_or_epoch = reader.read_u64::<BigEndian>()?;
        let location = match tag {
            TAG_BLOCK => BlockOrEbb::Block(Slot::new(slot_or_epoch)),
            TAG_EBB => BlockOrEbb::Ebb(Epoch::new(slot_or_epoch)),
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown secondary entry tag {other}"),
                ));
            }
        };
        let hash = H::read_from(reader)?;
        Ok(SecondaryEntry {
            block_offset,
            header_offset,
            header_size,
            checksum,
            location,
            hash,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(entry_size::<H>() as usize);
        self.write_to(&mut bytes)
            .expect("serializing to a Vec cannot fail");
        bytes
    }

    /// Parses a whole secondary file. Returns the decoded prefix and whether
    /// trailing bytes (a partial record) were left over.
    pub fn parse_file(bytes: &[u8]) -> (Vec<SecondaryEntry<H>>, bool) {
        let size = entry_size::<H>() as usize;
        let mut entries = Vec::with_capacity(bytes.len() / size);
        let mut chunks = bytes.chunks_exact(size);
        for chunk in &mut chunks {
            match SecondaryEntry::read_from(&mut &chunk[..]) {
                Ok(entry) => entries.push(entry),
                Err(_) => return (entries, true),
            }
        }
        let clean = chunks.remainder().is_empty() && entries.len() * size == bytes.len();
        (entries, !clean)
    }
}
