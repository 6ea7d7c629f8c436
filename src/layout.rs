// unify-gpt/src/layout.rs
//
// Places every active GPT - primary and backup - on the disk at once:
// primary entry arrays interleave forward from the start, backup arrays and
// headers mirror backward from the end, and all block sizes end up
// bracketing the same usable byte range.

use log::info;

use crate::disk::Disk;
use crate::error::{GptError, Result};
use crate::gpt::list::{GptList, MAX_BLOCK_SHIFT, MIN_BLOCK_SHIFT, shift_index};
use crate::options::Options;
use crate::utils::{align_down, align_up, crc32, put_u32_le};

/// Recomputes every position field, entry-table size, and CRC of every
/// active GPT, plus the protective MBR record. Fails without touching
/// anything on disk if the existing partitions do not fit around the new
/// tables.
pub fn calculate(disk: &Disk, list: &mut GptList, opts: &Options) -> Result<()> {
    let mut entries = opts.entries.unwrap_or(128).max(list.used_entries);

    // chain each active GPT to the next larger active block shift
    let mut max_shift = MIN_BLOCK_SHIFT;
    let mut last_shift = None;

    for u in MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT {
        if list.primary[shift_index(u)].is_none() {
            continue;
        }

        if let Some(last) = last_shift {
            if let Some(prev) = &mut list.primary[shift_index(last)] {
                prev.next_block_shift = u;
            }
        }
        if let Some(gpt) = &mut list.primary[shift_index(u)] {
            gpt.next_block_shift = u;
        }

        last_shift = Some(u);
        max_shift = u;
    }

    // round the slot count up so every entry-array boundary aligns with
    // every active block size
    entries = (align_up((entries as u64) << 7, max_shift) >> 7) as u32;

    // 1st: backup gpt header locations, down from the disk end
    let mut table_end = disk.size();

    for u in MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT {
        let Some(gpt) = &mut list.primary[shift_index(u)] else {
            continue;
        };

        table_end = align_down(if opts.overlap { disk.size() } else { table_end }, u);
        table_end = table_end
            .checked_sub(1 << u)
            .ok_or(GptError::NotEnoughSpace { need: 1 << u })?;

        gpt.header.backup_lba = table_end >> u;
    }

    // 2nd: entry arrays, up from the start for the primaries and down from
    // the end for the backups
    let mut table_ofs = 2u64 << max_shift;

    for u in MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT {
        let Some(gpt) = &mut list.primary[shift_index(u)] else {
            continue;
        };

        table_ofs = align_up(table_ofs, u);

        let table_size = align_up((entries as u64) << 7, gpt.next_block_shift);
        let real_entries = (table_size >> 7) as u32;

        // primary
        gpt.header.partition_entries = real_entries;
        gpt.table_size = table_size;
        gpt.header.current_lba = 1;
        gpt.header.partition_lba = table_ofs >> u;

        gpt.header_block.resize(1 << u, 0);
        gpt.entry_blocks.resize(table_size as usize, 0);
        gpt.header.partition_crc = crc32(&gpt.entry_blocks);

        let backup_lba = gpt.header.backup_lba;

        // backup
        if let Some(gpt) = &mut list.backup[shift_index(u)] {
            gpt.header.partition_entries = real_entries;
            gpt.table_size = table_size;
            gpt.header.current_lba = backup_lba;
            gpt.header.backup_lba = 1;

            table_end = align_down(table_end, u);
            gpt.header.partition_lba = table_end
                .checked_sub(table_size)
                .ok_or(GptError::NotEnoughSpace { need: table_size })?
                >> u;

            gpt.header_block.resize(1 << u, 0);
            gpt.entry_blocks.resize(table_size as usize, 0);
            gpt.header.partition_crc = crc32(&gpt.entry_blocks);
        }

        table_ofs += table_size;
        table_end -= table_size;

        list.primary_end = table_ofs;
        list.backup_start = table_end;
    }

    // 3rd: the common usable range
    let mut first_free = align_up(table_ofs, max_shift);
    let end_free = align_down(table_end, max_shift);

    if opts.align_1m {
        let first_free_1m = align_up(first_free, 20);
        if list.start_used >= first_free_1m {
            first_free = first_free_1m;
        }
    }

    if first_free > list.start_used || end_free < list.end_used {
        let mut need = first_free.saturating_sub(list.start_used);
        need = need.max(list.end_used.saturating_sub(end_free));
        info!("{need} bytes needed");
        return Err(GptError::NotEnoughSpace { need });
    }

    for u in MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT {
        if let Some(gpt) = &mut list.primary[shift_index(u)] {
            gpt.header.first_lba = first_free >> u;
            gpt.header.last_lba = (end_free >> u) - 1;
        }
        if let Some(gpt) = &mut list.backup[shift_index(u)] {
            gpt.header.first_lba = first_free >> u;
            gpt.header.last_lba = (end_free >> u) - 1;
        }
    }

    // 4th: push the new fields into the raw blocks and refresh the CRCs
    for u in MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT {
        if let Some(gpt) = &mut list.primary[shift_index(u)] {
            let header = &mut gpt.header;
            header.store(&mut gpt.header_block);
        }
        if let Some(gpt) = &mut list.backup[shift_index(u)] {
            let header = &mut gpt.header;
            header.store(&mut gpt.header_block);
        }
    }

    update_pmbr(disk, list);

    Ok(())
}

/// Refreshes the protective MBR record at offset 446: CHS sentinel bytes and
/// the 32-bit span in blocks of the smallest active block size, saturated
/// when the count does not fit or more than one GPT is active.
fn update_pmbr(disk: &Disk, list: &mut GptList) {
    let gpts = list.active_gpts();
    let min_shift = list.min_active_shift().unwrap_or(MAX_BLOCK_SHIFT);

    let record = &mut list.pmbr_block[446..462];

    if record[4] == 0xee {
        // CHS + type
        put_u32_le(&mut record[4..], 0xffff_ffee);

        let mut size = (disk.size() >> min_shift) - 1;
        if gpts != 1 || size > 0xffff_ffff {
            size = 0xffff_ffff;
        }

        put_u32_le(&mut record[12..], size as u32);
    }
}
