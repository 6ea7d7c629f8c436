use crate::disk::Disk;
use crate::error::{GptError, Result};
use crate::gpt::Gpt;
use crate::options::Options;

pub const MIN_BLOCK_SHIFT: u32 = 9;
pub const MAX_BLOCK_SHIFT: u32 = 12;
pub const BLOCK_SIZES: usize = (MAX_BLOCK_SHIFT - MIN_BLOCK_SHIFT + 1) as usize;

/// The whole disk's partition table state: the protective MBR block, an
/// optional (primary, backup) GPT pair per supported block size, and the
/// union of all valid partition byte ranges.
pub struct GptList {
    pub pmbr_block: Vec<u8>,
    pub primary: [Option<Gpt>; BLOCK_SIZES],
    pub backup: [Option<Gpt>; BLOCK_SIZES],
    /// Union of valid partition byte ranges over all active GPTs.
    pub start_used: u64, // bytes
    pub end_used: u64, // bytes
    /// End of the primary region / start of the backup region, set by the
    /// layout calculator.
    pub primary_end: u64, // bytes
    pub backup_start: u64, // bytes
    pub used_entries: u32,
}

pub fn shift_index(block_shift: u32) -> usize {
    (block_shift - MIN_BLOCK_SHIFT) as usize
}

impl GptList {
    /// Probes every supported block size and accepts the disk only if at
    /// least one (primary, backup) pair validates and no primary lacks a
    /// good backup.
    pub fn discover(disk: &Disk) -> Result<GptList> {
        let mut list = GptList {
            pmbr_block: disk.read(0, 1 << MIN_BLOCK_SHIFT)?,
            primary: [const { None }; BLOCK_SIZES],
            backup: [const { None }; BLOCK_SIZES],
            start_used: u64::MAX,
            end_used: 0,
            primary_end: 0,
            backup_start: 0,
            used_entries: 0,
        };

        let mut gpts_ok = 0;
        let mut gpts_bad = 0;

        for u in MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT {
            let Some(gpt) = Gpt::read(disk, u, 1)? else {
                continue;
            };

            if gpt.has_valid_entries() {
                list.start_used = list.start_used.min(gpt.min_used_lba << u);
                list.end_used = list.end_used.max((gpt.max_used_lba + 1) << u);
            }
            list.used_entries = list.used_entries.max(gpt.used_entries);

            let backup = Gpt::read(disk, u, gpt.header.backup_lba)?;

            print!("found gpt_{}: {} partitions", gpt.block_size(), gpt.used_entries);
            if backup.is_some() {
                gpts_ok += 1;
            } else {
                gpts_bad += 1;
                print!(" - but no backup gpt");
            }
            println!();

            list.primary[shift_index(u)] = Some(gpt);
            list.backup[shift_index(u)] = backup;
        }

        if gpts_ok >= 1 && gpts_bad == 0 {
            Ok(list)
        } else {
            Err(GptError::UnsupportedLayout)
        }
    }

    /// Number of active (primary) GPTs.
    pub fn active_gpts(&self) -> u32 {
        self.primary.iter().flatten().count() as u32
    }

    /// Smallest block shift with an active GPT.
    pub fn min_active_shift(&self) -> Option<u32> {
        (MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT).find(|&u| self.primary[shift_index(u)].is_some())
    }

    /// Adds a GPT pair for `block_shift`, cloned from the smallest-shift
    /// existing GPT. Entry rescaling may fail on misaligned boundaries.
    pub fn add(&mut self, block_shift: u32, opts: &Options) -> Result<()> {
        if self.primary[shift_index(block_shift)].is_some() {
            return Err(GptError::AlreadyExists {
                block_size: 1 << block_shift,
            });
        }

        let source_shift = self.min_active_shift().ok_or(GptError::UnsupportedLayout)?;
        let source = self.primary[shift_index(source_shift)]
            .as_ref()
            .ok_or(GptError::UnsupportedLayout)?;

        let primary = source.clone_for_block_size(block_shift, opts.force)?;
        let backup = source.clone_for_block_size(block_shift, opts.force)?;

        self.primary[shift_index(block_shift)] = Some(primary);
        self.backup[shift_index(block_shift)] = Some(backup);

        println!("adding gpt_{}", 1u32 << block_shift);

        Ok(())
    }

    /// Keeps only the GPT for the chosen block size. The target defaults to
    /// the device's native block size, else the smallest block size with a
    /// GPT. Dropped GPTs are erased from the disk on write-out.
    pub fn normalize(&mut self, disk: &Disk, block_shift: Option<u32>, opts: &Options) -> Result<()> {
        let mut block_shift = block_shift.or(disk.block_shift());

        let gpts = self.active_gpts();
        let first_shift = self.min_active_shift();

        if block_shift.is_none() {
            block_shift = first_shift;
        }

        if gpts == 1 && !opts.force && opts.entries.is_none() {
            return Err(GptError::NothingToDo {
                block_size: 1 << first_shift.unwrap_or(MIN_BLOCK_SHIFT),
            });
        }

        let Some(block_shift) = block_shift else {
            return Err(GptError::UnsupportedLayout);
        };

        if gpts == 0 || self.primary[shift_index(block_shift)].is_none() {
            return Err(GptError::NoSuchGpt {
                block_size: 1 << block_shift,
            });
        }

        for u in MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT {
            if u == block_shift {
                continue;
            }
            if self.primary[shift_index(u)].take().is_some() {
                println!("deleting gpt_{}", 1u32 << u);
            }
            self.backup[shift_index(u)] = None;
        }

        println!("keeping gpt_{}", 1u32 << block_shift);

        Ok(())
    }
}
