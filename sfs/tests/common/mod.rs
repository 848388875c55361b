//! Common utilities for tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use block_dev::BlockDevice;
use sfs::{Caller, SimpleFileSystem, BLOCK_SIZE, DATA_START, MAX_BLOCKS};

/// 内存中的块设备，从未写过的块读出来全是 0
pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
}

impl RamDisk {
    pub fn new(num_blocks: u32) -> Self {
        Self {
            inner: Mutex::new(vec![0; num_blocks as usize * BLOCK_SIZE]),
        }
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let start = block_id * BLOCK_SIZE;
        let data = self.inner.lock().unwrap();
        buf.copy_from_slice(&data[start..start + BLOCK_SIZE]);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let start = block_id * BLOCK_SIZE;
        let mut data = self.inner.lock().unwrap();
        data[start..start + BLOCK_SIZE].copy_from_slice(buf);
    }
}

pub const NOW: u64 = 1_700_000_000;

pub const CALLER: Caller = Caller {
    uid: 1000,
    gid: 100,
    now: NOW,
};

/// 16 MiB 的标准磁盘
pub fn fresh() -> (Arc<RamDisk>, SimpleFileSystem) {
    with_blocks(MAX_BLOCKS)
}

/// 数据区只有 `data_blocks` 块的小磁盘
pub fn tiny(data_blocks: u32) -> (Arc<RamDisk>, SimpleFileSystem) {
    with_blocks(DATA_START + data_blocks)
}

fn with_blocks(total_blocks: u32) -> (Arc<RamDisk>, SimpleFileSystem) {
    let disk = Arc::new(RamDisk::new(total_blocks));
    let fs = SimpleFileSystem::format(disk.clone(), total_blocks, NOW).unwrap();
    (disk, fs)
}

/// 按目录日志的格式还原出的长度
pub fn log_len(fs: &SimpleFileSystem, path: &str) -> u64 {
    let mut len = 0;
    fs.readdir(path, |entry| {
        len += format!("{}\t{}\n", entry.inode, entry.name).len() as u64;
        false
    })
    .unwrap();
    len
}

pub fn names(fs: &SimpleFileSystem, path: &str) -> Vec<String> {
    let mut names = Vec::new();
    fs.readdir(path, |entry| {
        names.push(entry.name.clone());
        false
    })
    .unwrap();
    names
}
