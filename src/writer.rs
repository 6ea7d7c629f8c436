// unify-gpt/src/writer.rs

use crate::disk::Disk;
use crate::error::Result;
use crate::gpt::Gpt;
use crate::gpt::list::{GptList, MAX_BLOCK_SHIFT, MIN_BLOCK_SHIFT, shift_index};
use crate::options::Options;

/// Stages one GPT's header block and entry table.
fn write_gpt(disk: &mut Disk, gpt: &Gpt) -> Result<()> {
    disk.write_cache(gpt.header.current_lba << gpt.block_shift, &gpt.header_block)?;
    disk.write_cache(gpt.header.partition_lba << gpt.block_shift, &gpt.entry_blocks)?;

    Ok(())
}

/// Stages the pMBR and every active GPT into the two cache regions and
/// flushes them to disk. Nothing is written until the whole list has been
/// staged; with `--try` the disk is never touched at all.
///
/// Backups go in descending block-size order: under `--overlap` a smaller
/// block size's backup header lies inside a larger header block's zero
/// padding and must land after it.
pub fn write_list(disk: &mut Disk, list: &GptList, opts: &Options) -> Result<()> {
    disk.prepare_cache(list.primary_end, list.backup_start);

    disk.write_cache(0, &list.pmbr_block)?;

    for u in MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT {
        if let Some(gpt) = &list.primary[shift_index(u)] {
            write_gpt(disk, gpt)?;
        }
    }

    for u in (MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT).rev() {
        if let Some(gpt) = &list.backup[shift_index(u)] {
            write_gpt(disk, gpt)?;
        }
    }

    if opts.try_run {
        return Ok(());
    }

    disk.flush_cache()
}
