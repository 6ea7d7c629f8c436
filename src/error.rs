// unify-gpt/src/error.rs

use thiserror::Error;

/// Everything that can abort an operation on a disk. All variants are fatal;
/// writes only happen after the whole layout has been computed and validated.
#[derive(Debug, Error)]
pub enum GptError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unsupported partition table setup")]
    UnsupportedLayout,

    #[error("gpt_{block_size}: partition {index} has misaligned start - use option '--force' to fix")]
    MisalignedStart { block_size: u32, index: u32 },

    #[error("gpt_{block_size}: partition {index} has misaligned end - use option '--force' to fix")]
    MisalignedEnd { block_size: u32, index: u32 },

    #[error("not enough free space for gpt ({need} bytes needed) - try option '--entries' to reduce GPT size")]
    NotEnoughSpace { need: u64 },

    #[error("gpt for block size {block_size} already exists")]
    AlreadyExists { block_size: u32 },

    #[error("nothing to do: single gpt for block size {block_size}")]
    NothingToDo { block_size: u32 },

    #[error("gpt for block size {block_size} does not exist")]
    NoSuchGpt { block_size: u32 },
}

pub type Result<T> = std::result::Result<T, GptError>;
