use std::io;

/// Streaming CRC-32 (IEEE 802.3) over an arbitrary sequence of byte chunks.
///
/// The archive writes block bodies through this while they stream to disk and
/// stores the result in the secondary index, so reads can verify a block
/// without re-parsing it.
pub struct Crc32Computer {
    value: u32,
}

impl Default for Crc32Computer {
    fn default() -> Crc32Computer {
        Crc32Computer { value: 0xffff_ffff }
    }
}

const fn crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut value = i as u32;
        let mut bit = 0;
        while bit < 8 {
            value = if value & 1 != 0 {
                (value >> 1) ^ 0xedb8_8320
            } else {
                value >> 1
            };
            bit += 1;
        }
        table[i] = value;
        i += 1;
    }
    table
}

impl Crc32Computer {
    const TABLE: [u32; 256] = crc32_table();

    /// Feeds another chunk into the running checksum.
    pub fn update(&mut self, buf: &[u8]) -> &mut Self {
        for &byte in buf {
            self.value =
                Crc32Computer::TABLE[((self.value ^ u32::from(byte)) & 0xff) as usize]
                    ^ (self.value >> 8);
        }
        self
    }

    /// Finalizes the checksum. The computer can keep accepting chunks afterwards.
    pub fn result(&self) -> u32 {
        self.value ^ 0xffff_ffff
    }

    /// One-shot checksum of a complete buffer.
    pub fn checksum(buf: &[u8]) -> u32 {
        let mut crc = Crc32Computer::default();
        crc.update(buf);
        crc.result()
    }
}

impl io::Write for Crc32Computer {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use meridian_test_log::test;

    use super::*;

    #[test]
    fn it_computes_known_vectors() {
        assert_eq!(Crc32Computer::checksum(b""), 0);
        assert_eq!(Crc32Computer::checksum(b"123456789"), 0xcbf4_3926);
        assert_eq!(Crc32Computer::checksum(b"The quick brown fox jumps over the lazy dog"), 0x414f_a339);
    }

    #[test]
    fn it_is_chunking_independent() {
        let mut crc = Crc32Computer::default();
        crc.update(b"1234").update(b"").update(b"56789");
        assert_eq!(crc.result(), Crc32Computer::checksum(b"123456789"));
    }

    #[test]
    fn it_streams_through_io_write() {
        use std::io::Write as _;

        let mut crc = Crc32Computer::default();
        crc.write_all(b"123456789").unwrap();
        assert_eq!(crc.result(), 0xcbf4_3926);
    }
}
