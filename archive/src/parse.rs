use meridian_primitives::{BlockHash, BlockOrEbb, Epoch};

/// One block reconstructed from a raw epoch file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedBlock<H> {
    /// Size of the serialized block in bytes.
    pub size: u64,
    pub block_number: u64,
    pub header_offset: u16,
    pub header_size: u16,
    pub hash: H,
    pub location: BlockOrEbb,
}

/// Result of parsing an epoch file: the blocks decoded from its prefix, and
/// where decoding had to stop if the file carries trailing bytes that do not
/// form a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseOutcome<H> {
    pub blocks: Vec<ParsedBlock<H>>,
    /// Byte offset of the first undecodable byte, if any.
    pub trailing: Option<u64>,
}

/// Decoder for raw epoch files, supplied by the block codec of the node.
///
/// The archive itself treats blocks as opaque bytes; only validation needs
/// to reconstruct entries from an epoch file, and it does so through this
/// interface. Implementations decode greedily from the start and report the
/// offset of the first byte they cannot decode instead of failing, so a
/// crash-truncated file yields its intact prefix.
pub trait EpochFileParser<H: BlockHash>: Send + Sync {
    fn parse(&self, epoch: Epoch, bytes: &[u8]) -> ParseOutcome<H>;
}
