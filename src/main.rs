// unify-gpt/src/main.rs

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{ArgAction, ArgGroup, Parser};
use log::LevelFilter;
use uuid::Uuid;

use unify_gpt::gpt::list::{MAX_BLOCK_SHIFT, MIN_BLOCK_SHIFT, shift_index};
use unify_gpt::{Disk, GptList, Options, layout, writer};

/// Create a unified GPT for multiple block sizes.
///
/// Takes a disk device or disk image file with a valid GPT and adds a valid
/// GPT for the specified block size, so that one image carries valid GPTs
/// for several block sizes at once. Existing partitions are kept. Use
/// '--normalize' to go back to a single GPT before running partitioning
/// tools.
#[derive(Debug, Parser)]
#[command(name = "unify-gpt", version, about)]
#[command(group = ArgGroup::new("action").args(["list", "add", "normalize"]).multiple(true).required(true))]
struct Cli {
    /// Disk device or disk image file.
    disk: PathBuf,

    /// Show the current GPT setup.
    #[arg(short, long)]
    list: bool,

    /// Add a GPT for the specified block size (default: 4096).
    #[arg(short, long)]
    add: bool,

    /// Normalize the GPT: remove additional GPTs and keep only a single one.
    /// The default block size is the device block size for block devices,
    /// else the smallest block size for which there is a GPT.
    #[arg(short, long)]
    normalize: bool,

    /// Block size to use. Possible values are 512, 1024, 2048, and 4096.
    #[arg(short, long, value_name = "N", value_parser = parse_block_size)]
    block_size: Option<u32>,

    /// Create a GPT with N partition slots (default: 128). Decrease the
    /// value if there is not enough free space on disk.
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u32).range(4..=1024))]
    entries: Option<u32>,

    /// Increase log level.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Lay out the backup GPTs so that their header blocks overlap, keeping
    /// every backup header in the last disk block of its block size
    /// (default).
    #[arg(long, overrides_with = "no_overlap")]
    overlap: bool,

    /// Lay out the backup GPTs with a separate header block per block size.
    #[arg(long, overrides_with = "overlap")]
    no_overlap: bool,

    /// Align the start of the usable space to a 1 MiB boundary.
    #[arg(long, overrides_with = "no_align_1m")]
    align_1m: bool,

    /// Maximize the usable space (default).
    #[arg(long, overrides_with = "align_1m")]
    no_align_1m: bool,

    /// If partition ends are not aligned for a new block size, round up.
    /// The size is only adjusted in the GPT for the new block size.
    #[arg(long)]
    force: bool,

    /// Compute the new layout but do not write anything.
    #[arg(long = "try")]
    try_run: bool,
}

fn parse_block_size(s: &str) -> Result<u32, String> {
    let block_size: u32 = s
        .parse()
        .map_err(|_| format!("unsupported block size: {s}"))?;

    for u in MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT {
        if block_size == 1 << u {
            return Ok(block_size);
        }
    }

    Err(format!("unsupported block size: {block_size}"))
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
            let _ = e.print();
            return code;
        }
    };

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .format_timestamp(None)
        .format_target(false)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> unify_gpt::Result<()> {
    let opts = Options {
        entries: cli.entries,
        overlap: !cli.no_overlap,
        align_1m: cli.align_1m,
        force: cli.force,
        try_run: cli.try_run,
    };

    let block_shift = cli.block_size.map(|b| b.trailing_zeros());

    let mut disk = Disk::open(&cli.disk)?;
    let mut list = GptList::discover(&disk)?;

    if cli.list {
        if cli.verbose >= 1 {
            print_details(&list);
        }
        return Ok(());
    }

    if cli.add {
        list.add(block_shift.unwrap_or(MAX_BLOCK_SHIFT), &opts)?;
    }

    if cli.normalize {
        list.normalize(&disk, block_shift, &opts)?;
    }

    layout::calculate(&disk, &mut list, &opts)?;
    writer::write_list(&mut disk, &list, &opts)?;

    Ok(())
}

fn print_details(list: &GptList) {
    for u in MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT {
        let Some(gpt) = &list.primary[shift_index(u)] else {
            continue;
        };

        println!(
            "gpt_{}: disk guid {}, {} - {} usable",
            gpt.block_size(),
            Uuid::from_bytes_le(gpt.header.disk_guid),
            gpt.header.first_lba,
            gpt.header.last_lba,
        );

        for idx in 0..gpt.used_entries {
            let Some(entry) = gpt.entry(idx) else {
                continue;
            };
            if !entry.is_valid() {
                continue;
            }
            println!(
                "  {:3}  {:>12} - {:<12}  {}  \"{}\"",
                idx + 1,
                entry.first_lba,
                entry.last_lba,
                Uuid::from_bytes_le(entry.type_guid),
                entry.name_string(),
            );
        }
    }
}
