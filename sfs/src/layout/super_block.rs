use log::error;
use vfs::{Error, Result};

use crate::{BLOCK_SIZE, DATA_START, INODE_START, MAX_BLOCKS, SUPER_BLOCKS};

pub const INODE_BITMAP_BYTES: usize = 64;
pub const DATA_BITMAP_BYTES: usize = 4031;
/// 超级块整体大小，末尾补齐到 8 块
pub const SUPER_BLOCK_SIZE: usize = SUPER_BLOCKS as usize * BLOCK_SIZE;

/// 超级块：
/// - 索引节点位图，每位对应一个索引节点槽；
/// - 数据块位图，每位对应一个数据块。
///
/// 位为 1 表示已分配。
#[derive(Debug, Clone)]
pub struct SuperBlock {
    pub inodes: Bitmap<INODE_BITMAP_BYTES>,
    pub data: Bitmap<DATA_BITMAP_BYTES>,
}

/// 位图，记录其指示区域的分配情况
#[derive(Debug, Clone)]
pub struct Bitmap<const N: usize> {
    /// 所指示区域的起始编号
    region_start: u32,
    /// 实际可用的位数，之后的位恒为已分配
    capacity: usize,
    bytes: [u8; N],
}

/// 位在位图内的坐标：`(字节索引, 字节内位索引)`，位索引从最低位数起
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BitPos(usize, usize);

impl SuperBlock {
    /// 空白的超级块，超出设备末尾的数据块预先标为已分配
    pub fn new(total_blocks: u32) -> Result<Self> {
        check_total(total_blocks)?;

        Ok(Self {
            inodes: Bitmap::new(INODE_START, INODE_BITMAP_BYTES * 8),
            data: Bitmap::new(DATA_START, (total_blocks - DATA_START) as usize),
        })
    }

    /// 磁盘上不记录设备大小，需由调用者给出。
    ///
    /// 超出设备末尾的位必须全部已置位，否则镜像是按更大的设备格式化的。
    pub fn from_bytes(raw: &[u8; SUPER_BLOCK_SIZE], total_blocks: u32) -> Result<Self> {
        check_total(total_blocks)?;

        let mut inodes = [0; INODE_BITMAP_BYTES];
        inodes.copy_from_slice(&raw[..INODE_BITMAP_BYTES]);
        let mut data = [0; DATA_BITMAP_BYTES];
        data.copy_from_slice(&raw[INODE_BITMAP_BYTES..INODE_BITMAP_BYTES + DATA_BITMAP_BYTES]);

        Ok(Self {
            inodes: Bitmap::from_raw(INODE_START, INODE_BITMAP_BYTES * 8, inodes)?,
            data: Bitmap::from_raw(DATA_START, (total_blocks - DATA_START) as usize, data)?,
        })
    }

    pub fn to_bytes(&self) -> [u8; SUPER_BLOCK_SIZE] {
        let mut raw = [0; SUPER_BLOCK_SIZE];
        raw[..INODE_BITMAP_BYTES].copy_from_slice(&self.inodes.bytes);
        raw[INODE_BITMAP_BYTES..INODE_BITMAP_BYTES + DATA_BITMAP_BYTES]
            .copy_from_slice(&self.data.bytes);
        raw
    }
}

impl<const N: usize> Bitmap<N> {
    fn new(region_start: u32, capacity: usize) -> Self {
        let mut bitmap = Self {
            region_start,
            capacity,
            bytes: [0; N],
        };
        for index in capacity..N * 8 {
            let BitPos(byte, bit) = BitPos::from_index(index);
            bitmap.bytes[byte] |= 1 << bit;
        }
        bitmap
    }

    fn from_raw(region_start: u32, capacity: usize, bytes: [u8; N]) -> Result<Self> {
        let bitmap = Self {
            region_start,
            capacity,
            bytes,
        };
        let tail_reserved = (capacity..N * 8).all(|index| {
            let BitPos(byte, bit) = BitPos::from_index(index);
            bitmap.bytes[byte] & (1 << bit) != 0
        });
        if !tail_reserved {
            error!("bitmap at {region_start} has free bits past {capacity} slots");
            return Err(Error::Corruption);
        }
        Ok(bitmap)
    }

    /// 首次适配：分配编号最小的空闲位，返回其编号。
    /// 若位图的空间用尽，则返回空。
    pub fn alloc(&mut self) -> Option<u32> {
        let (byte, bits) = self
            .bytes
            .iter_mut()
            .enumerate()
            .find(|(_, bits)| **bits != u8::MAX)?;

        let bit = bits.trailing_ones() as usize;
        *bits |= 1 << bit;

        Some(BitPos(byte, bit).encode(self.region_start))
    }

    /// 释放编号；编号本就空闲时返回 `false`
    pub fn dealloc(&mut self, id: u32) -> bool {
        let Some(BitPos(byte, bit)) = self.locate(id) else {
            return false;
        };
        if self.bytes[byte] & (1 << bit) == 0 {
            return false;
        }

        self.bytes[byte] &= !(1 << bit);
        true
    }

    pub fn is_allocated(&self, id: u32) -> bool {
        self.locate(id)
            .is_some_and(|BitPos(byte, bit)| self.bytes[byte] & (1 << bit) != 0)
    }

    /// 已分配位数，不含超出设备末尾的位
    pub fn allocated(&self) -> usize {
        let set: usize = self.bytes.iter().map(|bits| bits.count_ones() as usize).sum();
        set.saturating_sub(N * 8 - self.capacity)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn locate(&self, id: u32) -> Option<BitPos> {
        let index = id.checked_sub(self.region_start)? as usize;
        (index < N * 8).then(|| BitPos::from_index(index))
    }
}

/// 至少要有一个数据块，最多到数据位图能描述的上限
fn check_total(total_blocks: u32) -> Result<()> {
    if !(DATA_START + 1..=MAX_BLOCKS).contains(&total_blocks) {
        error!("total blocks out of range: {total_blocks}");
        return Err(Error::BadBuffer);
    }
    Ok(())
}

impl BitPos {
    /// 线性映射：区域起始编号 + 字节索引 * 8 + 位索引
    #[inline]
    fn encode(self, region_start: u32) -> u32 {
        region_start + (self.0 * 8 + self.1) as u32
    }

    #[inline]
    fn from_index(index: usize) -> Self {
        Self(index / 8, index % 8)
    }
}
