use clap::Parser;
use sfs::{DATA_START, MAX_BLOCKS};
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Output image, truncated if it exists
    pub image: PathBuf,

    /// Image size in 512-byte blocks
    #[arg(
        long,
        short,
        default_value_t = sfs_fuse::default_blocks(),
        value_parser = clap::value_parser!(u32).range(DATA_START as i64 + 1..=MAX_BLOCKS as i64),
    )]
    pub blocks: u32,

    /// Directory whose regular files are copied into the root
    #[arg(long, short)]
    pub source: Option<PathBuf>,
}
