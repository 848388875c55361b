mod cli;

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use cli::Cli;
use fuser::MountOption;
use sfs::{SimpleFileSystem, BLOCK_SIZE};
use sfs_fuse::{unix_now, BlockFile, SfsFuse};

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    log::info!("image={:?} mountpoint={:?}", cli.image, cli.mountpoint);

    let disk_size = cli.blocks as u64 * BLOCK_SIZE as u64;
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(cli.format)
        .truncate(false)
        .open(&cli.image)?;
    if fd.metadata()?.len() < disk_size {
        if !cli.format {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("image is smaller than {} blocks", cli.blocks),
            ));
        }
        fd.set_len(disk_size)?;
    }

    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd));
    let fs = if cli.format {
        SimpleFileSystem::mount_or_format(block_dev, cli.blocks, unix_now())
    } else {
        SimpleFileSystem::mount(block_dev, cli.blocks)
    }
    .map_err(|err| io::Error::other(format!("cannot mount {:?}: {err}", cli.image)))?;

    let mut options = vec![
        MountOption::FSName("sfs".into()),
        MountOption::DefaultPermissions,
    ];
    if cli.allow_other {
        options.push(MountOption::AllowOther);
    }
    if cli.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }

    fuser::mount2(SfsFuse::new(fs), &cli.mountpoint, &options)
}
