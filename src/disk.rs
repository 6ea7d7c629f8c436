// unify-gpt/src/disk.rs

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileExt, FileTypeExt};
use std::path::Path;

use log::{debug, trace};

use crate::error::Result;
use crate::gpt::list::{MAX_BLOCK_SHIFT, MIN_BLOCK_SHIFT};

/// One staging region. Writes accumulate here and hit the disk only on
/// `flush_cache`, keeping the window for partial commits as small as two
/// sequential device writes.
struct CacheRegion {
    start: u64, // bytes
    data: Vec<u8>,
}

/// An open disk image file or block device.
pub struct Disk {
    file: File,
    size: u64, // bytes
    block_shift: Option<u32>,
    cache: Vec<CacheRegion>,
}

impl Disk {
    /// Opens a regular file or block device read-write and discovers its
    /// byte size and, for block devices, the native logical block size.
    pub fn open(path: &Path) -> Result<Disk> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", path.display())))?;

        let meta = file.metadata()?;
        let file_type = meta.file_type();

        let mut size = meta.len();
        let mut block_shift = None;

        if file_type.is_block_device() {
            let (dev_size, dev_block_size) = blockdev_properties(&file, path)?;
            size = dev_size;
            block_shift = (MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT).find(|u| dev_block_size == 1 << u);
        } else if !file_type.is_file() {
            return Err(io::Error::other(format!(
                "{}: not a regular file or block device",
                path.display()
            ))
            .into());
        }

        Ok(Disk {
            file,
            size,
            block_shift,
            cache: Vec::new(),
        })
    }

    /// Disk size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Native logical block shift; only known for block devices.
    pub fn block_shift(&self) -> Option<u32> {
        self.block_shift
    }

    /// Reads `len` bytes at byte offset `start`. A short read is an error.
    pub fn read(&self, start: u64, len: usize) -> Result<Vec<u8>> {
        trace!("reading from disk: {len} bytes at {start}");

        let mut buf = vec![0u8; len];
        self.file.read_exact_at(&mut buf, start)?;

        Ok(buf)
    }

    fn write(&self, start: u64, data: &[u8]) -> Result<()> {
        debug!("writing to disk: {} bytes at {start}", data.len());

        self.file.write_all_at(data, start)?;

        Ok(())
    }

    /// Allocates the two zero-filled staging regions: `[0, primary_end)` for
    /// the pMBR and all primary GPTs, `[backup_start, size)` for all backup
    /// GPTs. Zero fill matters: flushing erases stale structures of block
    /// sizes that are no longer active.
    pub fn prepare_cache(&mut self, primary_end: u64, backup_start: u64) {
        self.cache = vec![
            CacheRegion {
                start: 0,
                data: vec![0u8; primary_end as usize],
            },
            CacheRegion {
                start: backup_start,
                data: vec![0u8; (self.size - backup_start) as usize],
            },
        ];
    }

    /// Stages bytes into the unique region that fully contains them. A write
    /// crossing a region boundary or outside both regions is rejected.
    pub fn write_cache(&mut self, start: u64, data: &[u8]) -> Result<()> {
        trace!("writing to cache: {} bytes at {start}", data.len());

        for region in &mut self.cache {
            if start >= region.start {
                let ofs = (start - region.start) as usize;
                if ofs + data.len() <= region.data.len() {
                    region.data[ofs..ofs + data.len()].copy_from_slice(data);
                    return Ok(());
                }
            }
        }

        Err(io::Error::other("invalid write attempt prevented").into())
    }

    /// Writes both staged regions to the disk and makes them durable.
    pub fn flush_cache(&mut self) -> Result<()> {
        for region in &self.cache {
            self.write(region.start, &region.data)?;
        }

        self.file.sync_all()?;

        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn blockdev_properties(file: &File, path: &Path) -> Result<(u64, u32)> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();

    const BLKGETSIZE64: libc::c_ulong = 0x80081272;

    let mut size: u64 = 0;
    if unsafe { libc::ioctl(fd, BLKGETSIZE64 as _, &mut size) } != 0 {
        let e = io::Error::last_os_error();
        return Err(io::Error::new(e.kind(), format!("{}: {e}", path.display())).into());
    }

    let mut block_size: libc::c_int = 0;
    if unsafe { libc::ioctl(fd, libc::BLKSSZGET as _, &mut block_size) } != 0 {
        let e = io::Error::last_os_error();
        return Err(io::Error::new(e.kind(), format!("{}: {e}", path.display())).into());
    }

    Ok((size, block_size as u32))
}

#[cfg(not(target_os = "linux"))]
fn blockdev_properties(_file: &File, path: &Path) -> Result<(u64, u32)> {
    Err(io::Error::other(format!(
        "{}: block devices are only supported on Linux",
        path.display()
    ))
    .into())
}
