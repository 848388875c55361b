use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use block_dev::BlockDevice;
use sfs::{Caller, SimpleFileSystem, BLOCK_SIZE};
use sfs_fuse::{default_blocks, BlockFile};
use vfs::Error;

const NOW: u64 = 1_700_000_000;

fn image(name: &str, blocks: u32) -> (PathBuf, Arc<dyn BlockDevice>) {
    let path = std::env::temp_dir().join(format!("sfs-{}-{name}.img", std::process::id()));
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .unwrap();
    fd.set_len(blocks as u64 * BLOCK_SIZE as u64).unwrap();
    (path, Arc::new(BlockFile::new(fd)))
}

fn reopen(path: &PathBuf) -> Arc<dyn BlockDevice> {
    let fd = OpenOptions::new().read(true).write(true).open(path).unwrap();
    Arc::new(BlockFile::new(fd))
}

#[test]
fn default_image_is_16_mib() {
    assert_eq!(default_blocks(), sfs::MAX_BLOCKS);
}

#[test]
fn blocks_land_at_their_offset() {
    let (path, dev) = image("offsets", 4);
    dev.write_block(2, &[0xab; BLOCK_SIZE]);
    dev.flush();

    let raw = fs::read(&path).unwrap();
    assert!(raw[..2 * BLOCK_SIZE].iter().all(|&b| b == 0));
    assert!(raw[2 * BLOCK_SIZE..3 * BLOCK_SIZE].iter().all(|&b| b == 0xab));

    let mut block = [0; BLOCK_SIZE];
    dev.read_block(2, &mut block);
    assert_eq!(block, [0xab; BLOCK_SIZE]);
    fs::remove_file(path).unwrap();
}

#[test]
fn image_survives_reopen() {
    let blocks = default_blocks();
    let (path, dev) = image("reopen", blocks);
    let caller = Caller {
        uid: 1000,
        gid: 1000,
        now: NOW,
    };

    let fs = SimpleFileSystem::mount_or_format(dev, blocks, NOW).unwrap();
    fs.mkdir("/docs", 0o755, &caller).unwrap();
    fs.create("/docs/readme", 0o644, &caller).unwrap();
    assert_eq!(fs.write("/docs/readme", 0, b"hello sfs\n", NOW), Ok(10));
    fs.sync();
    drop(fs);

    let fs = SimpleFileSystem::mount(reopen(&path), blocks).unwrap();
    let stat = fs.getattr("/docs/readme").unwrap();
    assert_eq!((stat.size, stat.uid), (10, 1000));

    let mut buf = [0; 64];
    let len = fs.read("/docs/readme", 0, &mut buf).unwrap();
    assert_eq!(&buf[..len], b"hello sfs\n");

    fs.rmdir("/docs").unwrap();
    assert_eq!(fs.getattr("/docs/readme"), Err(Error::NotFound));
    drop(fs);
    fs::remove_file(path).unwrap();
}
