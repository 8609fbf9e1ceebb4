use std::{
    fmt,
    io::{self, Read, Write},
};

/// Narrow codec interface for the block hashes stored in the secondary index.
///
/// The archive never computes hashes itself; it only round-trips them through
/// fixed-width on-disk records, so all it needs is a size and a byte codec.
pub trait BlockHash:
    Clone + fmt::Debug + fmt::Display + PartialEq + Eq + std::hash::Hash + Send + Sync + 'static
{
    /// Serialized width in bytes. Every hash of the type occupies exactly
    /// this many bytes on disk.
    const SIZE: usize;

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self>;
}

/// A plain 32-byte hash, the width produced by the Blake2b-256 block digests
/// used across the node.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash32([u8; 32]);

impl Hash32 {
    pub const fn new(bytes: [u8; 32]) -> Hash32 {
        Hash32(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(bytes: [u8; 32]) -> Hash32 {
        Hash32(bytes)
    }
}

impl AsRef<[u8]> for Hash32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Hash32({})", self)
    }
}

impl BlockHash for Hash32 {
    const SIZE: usize = 32;

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Hash32> {
        let mut bytes = [0u8; 32];
        reader.read_exact(&mut bytes)?;
        Ok(Hash32(bytes))
    }
}

#[cfg(test)]
mod tests {
    use meridian_test_log::test;

    use super::*;

    #[test]
    fn it_round_trips_through_bytes() {
        let hash = Hash32::new([0xab; 32]);
        let mut buf = Vec::new();
        hash.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), Hash32::SIZE);
        assert_eq!(Hash32::read_from(&mut &buf[..]).unwrap(), hash);
    }

    #[test]
    fn it_displays_as_hex() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x0f;
        assert!(Hash32::new(bytes).to_string().starts_with("0f00"));
    }
}
