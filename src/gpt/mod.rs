// unify-gpt/src/gpt/mod.rs

pub mod entry;
pub mod header;
pub mod list;

use crate::disk::Disk;
use crate::error::{GptError, Result};
use crate::utils::{align_up, crc32, get_u64_le, put_u64_le};

pub use self::entry::GptEntry;
pub use self::header::{GPT_ENTRY_SIZE, GPT_HEADER_SIZE, GPT_SIGNATURE, GptHeader};

/// One GPT instance: the header block and entry blob exactly as they will be
/// written back, the parsed header, and facts derived from walking the
/// entries.
#[derive(Debug, Clone)]
pub struct Gpt {
    pub header_block: Vec<u8>,
    pub entry_blocks: Vec<u8>,
    pub header: GptHeader,
    /// Highest in-use slot index + 1 (0 if every slot is zero).
    pub used_entries: u32,
    /// Entry blob size in bytes after layout.
    pub table_size: u64,
    /// Smallest first LBA over valid entries; u64::MAX if there are none.
    pub min_used_lba: u64,
    /// Largest last LBA over valid entries; 0 if there are none.
    pub max_used_lba: u64,
    pub block_shift: u32,
    /// Block shift of the next larger active GPT; entry tables are padded to
    /// this so the following table starts on one of its block boundaries.
    pub next_block_shift: u32,
}

impl Gpt {
    /// Probes for a (header, entry table) pair at `start_block`. Any
    /// validation failure means "no GPT here" (`Ok(None)`); only I/O errors
    /// are fatal.
    pub fn read(disk: &Disk, block_shift: u32, start_block: u64) -> Result<Option<Gpt>> {
        let header_block = disk.read(start_block << block_shift, 1 << block_shift)?;

        let header = GptHeader::parse(&header_block);

        if header.signature != GPT_SIGNATURE {
            return Ok(None);
        }

        // accept only the standard header size and validate the header crc
        if header.header_size != GPT_HEADER_SIZE as u32 || !header.crc_ok(&header_block) {
            return Ok(None);
        }

        if header.current_lba != start_block
            || header.partition_entry_size != GPT_ENTRY_SIZE as u32
            || header.partition_entries < 4
            || header.partition_entries > 1024
        {
            return Ok(None);
        }

        let entry_blocks = disk.read(
            header.partition_lba << block_shift,
            (header.partition_entries * header.partition_entry_size) as usize,
        )?;

        if crc32(&entry_blocks) != header.partition_crc {
            return Ok(None);
        }

        let mut gpt = Gpt {
            header_block,
            entry_blocks,
            header,
            used_entries: 0,
            table_size: 0,
            min_used_lba: u64::MAX,
            max_used_lba: 0,
            block_shift,
            next_block_shift: block_shift,
        };

        for idx in 0..gpt.header.partition_entries {
            if let Some(entry) = gpt.entry(idx) {
                if entry.is_valid() {
                    gpt.min_used_lba = gpt.min_used_lba.min(entry.first_lba);
                    gpt.max_used_lba = gpt.max_used_lba.max(entry.last_lba);
                }
                if !entry.is_zero() {
                    gpt.used_entries = idx + 1;
                }
            }
        }

        Ok(Some(gpt))
    }

    pub fn block_size(&self) -> u32 {
        1 << self.block_shift
    }

    /// True if at least one entry describes a real partition.
    pub fn has_valid_entries(&self) -> bool {
        self.min_used_lba != u64::MAX
    }

    /// Decodes entry `idx` from the blob, if it is in range.
    pub fn entry(&self, idx: u32) -> Option<GptEntry> {
        let entry_size = self.header.partition_entry_size as usize;
        let ofs = entry_size * idx as usize;

        if idx >= self.header.partition_entries || ofs + entry_size > self.entry_blocks.len() {
            return None;
        }

        Some(GptEntry::parse(&self.entry_blocks[ofs..ofs + entry_size]))
    }

    /// Produces a GPT for a new block size by rescaling every used entry's
    /// boundaries. Boundaries that are not representable in the target block
    /// size fail unless `force` rounds them up. The clone's position fields
    /// and CRCs are stale until the layout calculator reassigns them.
    pub fn clone_for_block_size(&self, block_shift: u32, force: bool) -> Result<Gpt> {
        let mut new_gpt = self.clone();

        new_gpt.block_shift = block_shift;
        new_gpt.next_block_shift = block_shift;

        let block_mask = (1u64 << block_shift) - 1;
        let entry_size = self.header.partition_entry_size as usize;

        for idx in 0..new_gpt.used_entries as usize {
            let entry = &mut new_gpt.entry_blocks[idx * entry_size..(idx + 1) * entry_size];

            // start
            let lba = get_u64_le(&entry[32..]);
            if lba != 0 {
                let mut start_bytes = lba << self.block_shift;
                if start_bytes & block_mask != 0 {
                    if !force {
                        return Err(GptError::MisalignedStart {
                            block_size: 1 << block_shift,
                            index: idx as u32 + 1,
                        });
                    }
                    start_bytes = align_up(start_bytes, block_shift);
                }
                put_u64_le(&mut entry[32..], start_bytes >> block_shift);
            }

            // end
            let lba = get_u64_le(&entry[40..]);
            if lba != 0 {
                let mut end_bytes = (lba + 1) << self.block_shift;
                if end_bytes & block_mask != 0 {
                    if !force {
                        return Err(GptError::MisalignedEnd {
                            block_size: 1 << block_shift,
                            index: idx as u32 + 1,
                        });
                    }
                    end_bytes = align_up(end_bytes, block_shift);
                }
                put_u64_le(&mut entry[40..], (end_bytes >> block_shift) - 1);
            }
        }

        Ok(new_gpt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::put_u32_le;

    fn gpt_with_entries(block_shift: u32, ranges: &[(u64, u64)]) -> Gpt {
        let mut entry_blocks = vec![0u8; 128 * 128];
        for (idx, &(first, last)) in ranges.iter().enumerate() {
            let buf = &mut entry_blocks[idx * 128..];
            buf[0..16].copy_from_slice(&[0xab; 16]);
            put_u64_le(&mut buf[32..], first);
            put_u64_le(&mut buf[40..], last);
        }

        let mut header_block = vec![0u8; 1 << block_shift];
        put_u64_le(&mut header_block[0..], GPT_SIGNATURE);
        put_u32_le(&mut header_block[12..], 92);
        let mut header = GptHeader::parse(&header_block);
        header.partition_entries = 128;
        header.partition_entry_size = 128;

        Gpt {
            header_block,
            entry_blocks,
            header,
            used_entries: ranges.len() as u32,
            table_size: 0,
            min_used_lba: ranges.iter().map(|r| r.0).min().unwrap_or(u64::MAX),
            max_used_lba: ranges.iter().map(|r| r.1).max().unwrap_or(0),
            block_shift,
            next_block_shift: block_shift,
        }
    }

    #[test]
    fn test_clone_aligned() {
        // 512-byte LBA 2048..4095 is byte range 1 MiB .. 2 MiB
        let gpt = gpt_with_entries(9, &[(2048, 4095)]);
        let clone = gpt.clone_for_block_size(12, false).unwrap();

        let entry = clone.entry(0).unwrap();
        assert_eq!(entry.first_lba, 256);
        assert_eq!(entry.last_lba, 511);
        assert_eq!(clone.block_shift, 12);
    }

    #[test]
    fn test_clone_misaligned_end() {
        // ends at byte 2 MiB + 512
        let gpt = gpt_with_entries(9, &[(2048, 4096)]);

        match gpt.clone_for_block_size(12, false) {
            Err(GptError::MisalignedEnd { block_size: 4096, index: 1 }) => (),
            other => panic!("expected MisalignedEnd, got {other:?}"),
        }

        let clone = gpt.clone_for_block_size(12, true).unwrap();
        let entry = clone.entry(0).unwrap();
        assert_eq!(entry.first_lba, 256);
        // end byte 2098176 rounds up to 2101248 = 513 * 4096
        assert_eq!(entry.last_lba, 512);
    }

    #[test]
    fn test_clone_misaligned_start() {
        let gpt = gpt_with_entries(9, &[(2049, 4095)]);

        match gpt.clone_for_block_size(12, false) {
            Err(GptError::MisalignedStart { block_size: 4096, index: 1 }) => (),
            other => panic!("expected MisalignedStart, got {other:?}"),
        }

        let clone = gpt.clone_for_block_size(12, true).unwrap();
        let entry = clone.entry(0).unwrap();
        // start byte 1049088 rounds up to 1052672 = 257 * 4096
        assert_eq!(entry.first_lba, 257);
        assert_eq!(entry.last_lba, 511);
    }

    #[test]
    fn test_clone_same_size_is_identity() {
        let gpt = gpt_with_entries(9, &[(2048, 4095), (8192, 10239)]);
        let clone = gpt.clone_for_block_size(9, false).unwrap();
        assert_eq!(clone.entry_blocks, gpt.entry_blocks);
    }

    #[test]
    fn test_clone_to_smaller_block_size() {
        let gpt = gpt_with_entries(12, &[(256, 511)]);
        let clone = gpt.clone_for_block_size(9, false).unwrap();

        let entry = clone.entry(0).unwrap();
        assert_eq!(entry.first_lba, 2048);
        assert_eq!(entry.last_lba, 4095);
    }
}
