mod cli;

use std::fs::{self, OpenOptions};
use std::io;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use cli::Cli;
use sfs::{Caller, Path, SimpleFileSystem, BLOCK_SIZE};
use sfs_fuse::{unix_now, BlockFile};

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    println!("image={:?}\nsource={:?}", cli.image, cli.source);

    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cli.image)?;
    fd.set_len(cli.blocks as u64 * BLOCK_SIZE as u64)?;

    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd));
    let now = unix_now();
    let fs = SimpleFileSystem::format(block_dev, cli.blocks, now)
        .map_err(|err| io::Error::other(format!("cannot format {:?}: {err}", cli.image)))?;

    if let Some(source) = &cli.source {
        let caller = Caller { now, ..Caller::default() };
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                log::warn!("skipping {:?}: not UTF-8", entry.file_name());
                continue;
            };

            let data = fs::read(entry.path())?;
            let path = "/".join(&name);
            let written = fs
                .create(&path, 0o644, &caller)
                .and_then(|_| fs.write(&path, 0, &data, now))
                .map_err(|err| io::Error::other(format!("{path}: {err}")))?;
            if written < data.len() {
                log::warn!("{path}: only {written} of {} bytes fit", data.len());
            }
            println!("file: {name:?}");
        }
    }

    fs.sync();
    let usage = fs.usage();
    println!(
        "inodes {}/{}, data blocks {}/{}",
        usage.inodes_used, usage.inodes_total, usage.blocks_used, usage.blocks_total
    );
    Ok(())
}
