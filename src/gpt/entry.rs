use crate::utils::{get_u16_le, get_u64_le};

/// One 128-byte partition entry, decoded for inspection. Rescaling across
/// block sizes happens directly on the raw entry bytes; this mirror is for
/// classification and reporting.
#[derive(Debug, Clone)]
pub struct GptEntry {
    pub type_guid: [u8; 16],
    pub partition_guid: [u8; 16],
    pub first_lba: u64,
    pub last_lba: u64,
    pub attributes: u64,
    pub name: [u16; 36], // UTF-16LE
    zero: bool,
}

impl GptEntry {
    pub fn parse(buf: &[u8]) -> Self {
        let mut type_guid = [0u8; 16];
        type_guid.copy_from_slice(&buf[0..16]);
        let mut partition_guid = [0u8; 16];
        partition_guid.copy_from_slice(&buf[16..32]);

        let mut name = [0u16; 36];
        for (i, c) in name.iter_mut().enumerate() {
            *c = get_u16_le(&buf[56 + 2 * i..]);
        }

        GptEntry {
            type_guid,
            partition_guid,
            first_lba: get_u64_le(&buf[32..]),
            last_lba: get_u64_le(&buf[40..]),
            attributes: get_u64_le(&buf[48..]),
            name,
            zero: buf[..128].iter().all(|&b| b == 0),
        }
    }

    /// All 128 bytes zero: an unused slot.
    pub fn is_zero(&self) -> bool {
        self.zero
    }

    /// A real partition. Anything non-zero that fails this still counts
    /// toward the used-slot high-water mark.
    pub fn is_valid(&self) -> bool {
        self.first_lba < self.last_lba
    }

    pub fn name_string(&self) -> String {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(36);
        String::from_utf16_lossy(&self.name[..len])
    }
}
