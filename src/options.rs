// unify-gpt/src/options.rs

/// Settings that steer cloning, layout, and write-out. Passed explicitly;
/// there is no process-wide state.
#[derive(Debug, Clone)]
pub struct Options {
    /// Requested partition slot count (4..=1024). `None` means the default
    /// of 128; the layout calculator never goes below the number of slots
    /// already in use.
    pub entries: Option<u32>,
    /// Place every backup GPT header in the last block of its own block
    /// size, letting the header blocks overlap physically.
    pub overlap: bool,
    /// Align the first usable LBA to a 1 MiB boundary when possible.
    pub align_1m: bool,
    /// Round up partition boundaries that are not representable in the
    /// target block size instead of failing.
    pub force: bool,
    /// Compute and stage everything but never touch the disk.
    pub try_run: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            entries: None,
            overlap: true,
            align_1m: false,
            force: false,
            try_run: false,
        }
    }
}
