use clap::Parser;
use sfs::{DATA_START, MAX_BLOCKS};
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Disk image backing the filesystem
    pub image: PathBuf,

    /// Where to mount it
    pub mountpoint: PathBuf,

    /// Image size in 512-byte blocks
    #[arg(
        long,
        short,
        default_value_t = sfs_fuse::default_blocks(),
        value_parser = clap::value_parser!(u32).range(DATA_START as i64 + 1..=MAX_BLOCKS as i64),
    )]
    pub blocks: u32,

    /// Format the image first if it has never been formatted
    #[arg(long)]
    pub format: bool,

    /// Let users other than the mounter access the filesystem
    #[arg(long)]
    pub allow_other: bool,

    /// Unmount when the process exits
    #[arg(long)]
    pub auto_unmount: bool,
}
