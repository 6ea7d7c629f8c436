// unify-gpt/src/utils.rs

use crc32fast::Hasher;

pub fn get_u16_le(buf: &[u8]) -> u16 {
    let mut b = [0u8; 2];
    b.copy_from_slice(&buf[..2]);
    u16::from_le_bytes(b)
}

pub fn get_u32_le(buf: &[u8]) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[..4]);
    u32::from_le_bytes(b)
}

pub fn get_u64_le(buf: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[..8]);
    u64::from_le_bytes(b)
}

pub fn put_u16_le(buf: &mut [u8], val: u16) {
    buf[..2].copy_from_slice(&val.to_le_bytes());
}

pub fn put_u32_le(buf: &mut [u8], val: u32) {
    buf[..4].copy_from_slice(&val.to_le_bytes());
}

pub fn put_u64_le(buf: &mut [u8], val: u64) {
    buf[..8].copy_from_slice(&val.to_le_bytes());
}

/// CRC-32 (IEEE 802.3, reflected, poly 0xedb88320) as used by both GPT CRCs.
pub fn crc32(buf: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(buf);
    hasher.finalize()
}

pub fn align_down(val: u64, bits: u32) -> u64 {
    val & !((1u64 << bits) - 1)
}

pub fn align_up(val: u64, bits: u32) -> u64 {
    let mask = (1u64 << bits) - 1;
    (val + mask) & !mask
}
