use crate::utils::{crc32, get_u32_le, get_u64_le, put_u32_le, put_u64_le};

pub const GPT_SIGNATURE: u64 = 0x5452_4150_2049_4645; // "EFI PART"
pub const GPT_HEADER_SIZE: usize = 92;
pub const GPT_ENTRY_SIZE: usize = 128;

/// Logical mirror of the 92-byte GPT header. This struct is never a memory
/// layout contract; the on-disk bytes live in the owning block blob and all
/// conversions go through `parse` and `store`.
#[derive(Debug, Clone, Default)]
pub struct GptHeader {
    pub signature: u64,
    pub revision: u32,
    pub header_size: u32, // bytes
    pub header_crc: u32,
    pub current_lba: u64,
    pub backup_lba: u64,
    pub first_lba: u64,
    pub last_lba: u64,
    pub disk_guid: [u8; 16],
    pub partition_lba: u64,
    pub partition_entries: u32,
    pub partition_entry_size: u32, // bytes
    pub partition_crc: u32,
}

impl GptHeader {
    /// Decodes the header fields from the start of a header block.
    pub fn parse(buf: &[u8]) -> Self {
        let mut disk_guid = [0u8; 16];
        disk_guid.copy_from_slice(&buf[56..72]);

        GptHeader {
            signature: get_u64_le(&buf[0..]),
            revision: get_u32_le(&buf[8..]),
            header_size: get_u32_le(&buf[12..]),
            header_crc: get_u32_le(&buf[16..]),
            current_lba: get_u64_le(&buf[24..]),
            backup_lba: get_u64_le(&buf[32..]),
            first_lba: get_u64_le(&buf[40..]),
            last_lba: get_u64_le(&buf[48..]),
            disk_guid,
            partition_lba: get_u64_le(&buf[72..]),
            partition_entries: get_u32_le(&buf[80..]),
            partition_entry_size: get_u32_le(&buf[84..]),
            partition_crc: get_u32_le(&buf[88..]),
        }
    }

    /// Checks the header CRC: CRC-32 over the 92 header bytes with the CRC
    /// field itself zeroed.
    pub fn crc_ok(&self, buf: &[u8]) -> bool {
        let mut tmp = [0u8; GPT_HEADER_SIZE];
        tmp.copy_from_slice(&buf[..GPT_HEADER_SIZE]);
        put_u32_le(&mut tmp[16..], 0);

        crc32(&tmp) == self.header_crc
    }

    /// Writes the position fields back into a header block and recomputes
    /// the header CRC. Reserved bytes and the rest of the block stay as they
    /// were, so unknown content round-trips bit-exactly.
    pub fn store(&mut self, buf: &mut [u8]) {
        put_u64_le(&mut buf[24..], self.current_lba);
        put_u64_le(&mut buf[32..], self.backup_lba);
        put_u64_le(&mut buf[40..], self.first_lba);
        put_u64_le(&mut buf[48..], self.last_lba);
        put_u64_le(&mut buf[72..], self.partition_lba);
        put_u32_le(&mut buf[80..], self.partition_entries);
        put_u32_le(&mut buf[88..], self.partition_crc);

        put_u32_le(&mut buf[16..], 0);
        let crc = crc32(&buf[..GPT_HEADER_SIZE]);
        put_u32_le(&mut buf[16..], crc);
        self.header_crc = crc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::put_u32_le;

    fn sample_header_block() -> Vec<u8> {
        let mut buf = vec![0u8; 512];
        put_u64_le(&mut buf[0..], GPT_SIGNATURE);
        put_u32_le(&mut buf[8..], 0x0001_0000);
        put_u32_le(&mut buf[12..], GPT_HEADER_SIZE as u32);
        put_u64_le(&mut buf[24..], 1);
        put_u64_le(&mut buf[32..], 204_799);
        put_u64_le(&mut buf[40..], 34);
        put_u64_le(&mut buf[48..], 204_766);
        buf[56..72].copy_from_slice(&[0x42; 16]);
        put_u64_le(&mut buf[72..], 2);
        put_u32_le(&mut buf[80..], 128);
        put_u32_le(&mut buf[84..], GPT_ENTRY_SIZE as u32);
        put_u32_le(&mut buf[88..], 0xdead_beef);
        let crc = crc32(&buf[..GPT_HEADER_SIZE]);
        put_u32_le(&mut buf[16..], crc);
        buf
    }

    #[test]
    fn test_parse() {
        let buf = sample_header_block();
        let h = GptHeader::parse(&buf);

        assert_eq!(h.signature, GPT_SIGNATURE);
        assert_eq!(h.revision, 0x0001_0000);
        assert_eq!(h.header_size, 92);
        assert_eq!(h.current_lba, 1);
        assert_eq!(h.backup_lba, 204_799);
        assert_eq!(h.first_lba, 34);
        assert_eq!(h.last_lba, 204_766);
        assert_eq!(h.disk_guid, [0x42; 16]);
        assert_eq!(h.partition_lba, 2);
        assert_eq!(h.partition_entries, 128);
        assert_eq!(h.partition_entry_size, 128);
        assert_eq!(h.partition_crc, 0xdead_beef);
        assert!(h.crc_ok(&buf));
    }

    #[test]
    fn test_crc_rejects_corruption() {
        let mut buf = sample_header_block();
        let h = GptHeader::parse(&buf);
        buf[40] ^= 1;
        assert!(!h.crc_ok(&buf));
    }

    #[test]
    fn test_store_round_trip() {
        let mut buf = sample_header_block();
        let mut h = GptHeader::parse(&buf);

        h.first_lba = 80;
        h.last_lba = 204_727;
        h.partition_lba = 16;
        h.store(&mut buf);

        let reread = GptHeader::parse(&buf);
        assert_eq!(reread.first_lba, 80);
        assert_eq!(reread.last_lba, 204_727);
        assert_eq!(reread.partition_lba, 16);
        assert_eq!(reread.disk_guid, [0x42; 16]);
        assert!(reread.crc_ok(&buf));
        assert_eq!(reread.header_crc, h.header_crc);
    }
}
