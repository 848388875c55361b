//! # 磁盘管理层
//!
//! 构建出磁盘的布局并使用：位图分配、索引节点读写、按直接索引跨块读写内容。
//!
//! 超级块只在内存里保留一份镜像，每次分配或释放后整体写回 8 块。

use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use log::{debug, error};
use vfs::{Error, Result};

use crate::layout::{self, Inode, InodeKind, SuperBlock, DIRECT_COUNT, SUPER_BLOCK_SIZE};
use crate::{DataBlock, BLOCK_SIZE, DATA_START, INODE_COUNT, INODE_START, ROOT_INODE};

/// 跨块写入中途停止：已写入的字节数与停止的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortWrite {
    pub written: usize,
    pub cause: Error,
}

/// 位图的使用情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub inodes_used: usize,
    pub inodes_total: usize,
    pub blocks_used: usize,
    pub blocks_total: usize,
}

pub struct Disk {
    block_device: Arc<dyn BlockDevice>,
    super_block: SuperBlock,
    total_blocks: u32,
}

impl Disk {
    /// 在块设备上建立全新的文件系统：
    /// 根目录占用第一个索引节点与第一个数据块，内容为它自己的 `.` 项
    pub fn format(block_device: Arc<dyn BlockDevice>, total_blocks: u32, now: u64) -> Result<Self> {
        let mut disk = Self {
            block_device,
            super_block: SuperBlock::new(total_blocks)?,
            total_blocks,
        };

        let zero: DataBlock = [0; BLOCK_SIZE];
        for block_id in 0..=DATA_START {
            disk.block_device.write_block(block_id as usize, &zero);
        }

        // 空白位图上的首次适配必然得到 8 号索引节点与 520 号数据块
        let root_id = disk.alloc_inode()?;
        let root_block = disk.alloc_data()?;

        let mut root = Inode::new(root_id, InodeKind::DIR, 0o755, 0, 0, now);
        root.direct[0] = root_block;
        root.blocks = 1;
        let self_entry = layout::line(root_id, ".");
        let mut block = zero;
        block[..self_entry.len()].copy_from_slice(self_entry.as_bytes());
        disk.block_device.write_block(root_block as usize, &block);
        root.size = self_entry.len() as u32;
        disk.write_inode(&root);

        debug!("formatted {total_blocks} blocks");
        Ok(disk)
    }

    /// 挂载已有的文件系统；超级块中不记录磁盘大小，由调用者给出
    pub fn open(block_device: Arc<dyn BlockDevice>, total_blocks: u32) -> Result<Self> {
        let raw = Self::read_super_block(&block_device);
        let super_block = SuperBlock::from_bytes(&raw, total_blocks)?;
        if !super_block.inodes.is_allocated(ROOT_INODE) {
            error!("root inode is not allocated, image is not formatted");
            return Err(Error::Corruption);
        }

        let disk = Self {
            block_device,
            super_block,
            total_blocks,
        };
        disk.read_inode(ROOT_INODE)?;

        Ok(disk)
    }

    /// 超级块区域全为 0 说明从未格式化过
    pub fn is_blank(block_device: &Arc<dyn BlockDevice>) -> bool {
        Self::read_super_block(block_device).iter().all(|&b| b == 0)
    }

    /// 在磁盘上分配新的索引节点并返回其编号
    pub fn alloc_inode(&mut self) -> Result<u32> {
        let id = self.super_block.inodes.alloc().ok_or(Error::NoSpace)?;
        self.sync_super_block();
        Ok(id)
    }

    /// 在磁盘上分配新的数据块并返回其块号
    pub fn alloc_data(&mut self) -> Result<u32> {
        let block_id = self.super_block.data.alloc().ok_or(Error::NoSpace)?;
        self.sync_super_block();
        Ok(block_id)
    }

    pub fn dealloc_inode(&mut self, id: u32) -> Result<()> {
        if !self.super_block.inodes.dealloc(id) {
            error!("freeing inode {id} which is not allocated");
            return Err(Error::Corruption);
        }
        self.sync_super_block();
        Ok(())
    }

    /// 清零并释放数据块
    pub fn dealloc_data(&mut self, block_id: u32) -> Result<()> {
        if !self.super_block.data.dealloc(block_id) {
            error!("freeing data block {block_id} which is not allocated");
            return Err(Error::Corruption);
        }
        self.block_device
            .write_block(block_id as usize, &[0; BLOCK_SIZE]);
        self.sync_super_block();
        Ok(())
    }

    pub fn read_inode(&self, id: u32) -> Result<Inode> {
        if !(INODE_START..INODE_START + INODE_COUNT).contains(&id) {
            error!("inode number {id} is outside the inode region");
            return Err(Error::Corruption);
        }

        let mut block: DataBlock = [0; BLOCK_SIZE];
        self.block_device.read_block(id as usize, &mut block);
        Inode::decode(&block).inspect_err(|_| error!("inode {id} cannot be decoded"))
    }

    #[inline]
    pub fn write_inode(&self, inode: &Inode) {
        self.block_device
            .write_block(inode.id as usize, &inode.encode());
    }

    /// 读出索引节点的全部内容：依次拼接直接索引块，截断到 `size`
    pub fn read_content(&self, inode: &Inode) -> Result<Vec<u8>> {
        let size = inode.size as usize;
        let data_blocks = Inode::count_data_block(size);
        if data_blocks > DIRECT_COUNT {
            error!("inode {} claims {size} bytes", inode.id);
            return Err(Error::Corruption);
        }

        let mut content = Vec::with_capacity(data_blocks * BLOCK_SIZE);
        let mut block: DataBlock = [0; BLOCK_SIZE];
        for &block_id in &inode.direct[..data_blocks] {
            if block_id < DATA_START || block_id >= self.total_blocks {
                error!("inode {} points at block {block_id}", inode.id);
                return Err(Error::Corruption);
            }
            self.block_device.read_block(block_id as usize, &mut block);
            content.extend_from_slice(&block);
        }
        content.truncate(size);

        Ok(content)
    }

    /// 把 `buf` 从头写进索引节点的直接索引块，缺块时现场分配。
    ///
    /// 不改动 `size`；已分配的块号留在 `inode.direct` 中，
    /// 无论成功与否调用者都应写回索引节点。
    pub fn write_spanning(&mut self, buf: &[u8], inode: &mut Inode) -> Result<usize, ShortWrite> {
        let outcome = self.fill_direct(buf, inode);
        inode.blocks = inode.direct_blocks();
        outcome
    }

    /// 释放索引节点拥有的全部数据块与它自己的编号，并写回链接数为 0 的记录
    pub fn release(&mut self, inode: &mut Inode) -> Result<()> {
        self.release_blocks_from(inode, 0)?;
        inode.size = 0;
        inode.links = 0;
        self.write_inode(inode);
        self.dealloc_inode(inode.id)
    }

    /// 释放下标不小于 `keep` 的直接索引块
    pub fn release_blocks_from(&mut self, inode: &mut Inode, keep: usize) -> Result<()> {
        for index in keep..DIRECT_COUNT {
            let block_id = inode.direct[index];
            if block_id != 0 {
                self.dealloc_data(block_id)?;
                inode.direct[index] = 0;
            }
        }
        inode.blocks = inode.direct_blocks();
        Ok(())
    }

    pub fn usage(&self) -> Usage {
        let inodes = &self.super_block.inodes;
        let data = &self.super_block.data;
        Usage {
            inodes_used: inodes.allocated(),
            inodes_total: inodes.capacity(),
            blocks_used: data.allocated(),
            blocks_total: data.capacity(),
        }
    }

    #[inline]
    pub fn flush(&self) {
        self.block_device.flush();
    }
}

impl Disk {
    fn fill_direct(&mut self, buf: &[u8], inode: &mut Inode) -> Result<usize, ShortWrite> {
        let mut written = 0;

        for (index, chunk) in buf.chunks(BLOCK_SIZE).enumerate() {
            // 间接索引未实现，直接索引用完即到上限
            if index == DIRECT_COUNT {
                return Err(ShortWrite {
                    written,
                    cause: Error::CapacityExceeded,
                });
            }

            if inode.direct[index] == 0 {
                inode.direct[index] = self
                    .alloc_data()
                    .map_err(|cause| ShortWrite { written, cause })?;
            }

            let mut block: DataBlock = [0; BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            self.block_device
                .write_block(inode.direct[index] as usize, &block);
            written += chunk.len();
        }

        Ok(written)
    }

    fn read_super_block(block_device: &Arc<dyn BlockDevice>) -> [u8; SUPER_BLOCK_SIZE] {
        let mut raw = [0; SUPER_BLOCK_SIZE];
        for (block_id, block) in raw.chunks_mut(BLOCK_SIZE).enumerate() {
            block_device.read_block(block_id, block);
        }
        raw
    }

    /// 超级块没有增量更新，总是整体写回
    fn sync_super_block(&self) {
        let raw = self.super_block.to_bytes();
        for (block_id, block) in raw.chunks(BLOCK_SIZE).enumerate() {
            self.block_device.write_block(block_id, block);
        }
    }
}

impl From<ShortWrite> for Error {
    #[inline]
    fn from(short: ShortWrite) -> Self {
        short.cause
    }
}
