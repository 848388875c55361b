//! 索引节点以文本形式占据一整块：
//! 以制表符分隔的十进制字段，按固定顺序排列，以换行结尾，其后补 0。
//!
//! 第一个字段是格式版本标记，字段数目或顺序一旦改变就必须换新标记。

use alloc::string::String;
use core::fmt::Write;
use core::str::{FromStr, Split};

use enumflags2::bitflags;
use vfs::{DirEntryType, Error, Result, Stat};

use crate::{DataBlock, BLOCK_SIZE, MAX_BLOCKS};

/// 直接索引块个数，容量为 `DIRECT_COUNT * BLOCK_SIZE` 字节
pub const DIRECT_COUNT: usize = 32;
/// 间接索引块个数，仅保留字段，恒为 0
const INDIRECT_COUNT: usize = 2;

const VERSION: &str = "sfs1";
/// 版本标记 + 8 个元数据 + 索引 + 5 个时间与块信息
const FIELD_COUNT: usize = 1 + 8 + DIRECT_COUNT + INDIRECT_COUNT + 5;

/// 文件类型位的掩码
const TYPE_MASK: u32 = 0o170000;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Inode {
    /// 恒为 0
    pub dev: u32,
    /// 索引节点号，同时是它所在的块号
    pub id: u32,
    /// 类型位 + 权限位
    pub mode: u32,
    /// 硬链接个数
    pub links: u32,
    pub uid: u32,
    pub gid: u32,
    /// 恒为 0
    pub rdev: u32,
    // 不用usize是为了严控格式
    pub size: u32,
    /// 为 0 表示未分配
    pub direct: [u32; DIRECT_COUNT],
    indirect: [u32; INDIRECT_COUNT],
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    pub block_size: u32,
    /// 已分配的数据块数
    pub blocks: u32,
}

#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    DIR = 0o040000,
    FILE = 0o100000,
}

impl Inode {
    pub fn new(id: u32, kind: InodeKind, perm: u32, uid: u32, gid: u32, now: u64) -> Self {
        Self {
            id,
            mode: kind as u32 | (perm & 0o7777),
            links: 1,
            uid,
            gid,
            atime: now,
            mtime: now,
            ctime: now,
            block_size: BLOCK_SIZE as u32,
            ..Default::default()
        }
    }

    pub fn kind(&self) -> Option<InodeKind> {
        match self.mode & TYPE_MASK {
            m if m == InodeKind::DIR as u32 => Some(InodeKind::DIR),
            m if m == InodeKind::FILE as u32 => Some(InodeKind::FILE),
            _ => None,
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind() == Some(InodeKind::DIR)
    }

    /// 只改权限位，类型位保持不变
    #[inline]
    pub fn set_perm(&mut self, perm: u32) {
        self.mode = (self.mode & TYPE_MASK) | (perm & 0o7777);
    }

    /// 已分配的直接索引块个数
    pub fn direct_blocks(&self) -> u32 {
        self.direct.iter().filter(|&&block| block != 0).count() as u32
    }

    /// 计算容纳指定数据量需要多少个数据块
    #[inline]
    pub fn count_data_block(size: usize) -> usize {
        size.div_ceil(BLOCK_SIZE)
    }

    pub fn encode(&self) -> DataBlock {
        let mut text = String::with_capacity(BLOCK_SIZE);
        // 写入 String 不会失败
        let _ = write!(
            text,
            "{VERSION}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.dev, self.id, self.mode, self.links, self.uid, self.gid, self.rdev, self.size
        );
        for block in self.direct.iter().chain(&self.indirect) {
            let _ = write!(text, "\t{block}");
        }
        let _ = writeln!(
            text,
            "\t{}\t{}\t{}\t{}\t{}",
            self.atime, self.mtime, self.ctime, self.block_size, self.blocks
        );

        // 块号都小于 MAX_BLOCKS，最长的记录也不到 400 字节
        assert!(text.len() <= BLOCK_SIZE);
        let mut block = [0; BLOCK_SIZE];
        block[..text.len()].copy_from_slice(text.as_bytes());
        block
    }

    pub fn decode(block: &DataBlock) -> Result<Self> {
        let end = block
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(Error::Corruption)?;
        let text = core::str::from_utf8(&block[..end]).map_err(|_| Error::Corruption)?;

        if text.split('\t').count() != FIELD_COUNT {
            return Err(Error::Corruption);
        }
        let mut fields = Fields(text.split('\t'));
        if fields.0.next() != Some(VERSION) {
            return Err(Error::Corruption);
        }

        let mut inode = Self {
            dev: fields.next()?,
            id: fields.next()?,
            mode: fields.next()?,
            links: fields.next()?,
            uid: fields.next()?,
            gid: fields.next()?,
            rdev: fields.next()?,
            size: fields.next()?,
            ..Default::default()
        };
        for block in inode.direct.iter_mut().chain(&mut inode.indirect) {
            *block = fields.next()?;
        }
        inode.atime = fields.next()?;
        inode.mtime = fields.next()?;
        inode.ctime = fields.next()?;
        inode.block_size = fields.next()?;
        inode.blocks = fields.next()?;

        if inode.direct.iter().chain(&inode.indirect).any(|&block| block >= MAX_BLOCKS) {
            return Err(Error::Corruption);
        }
        Ok(inode)
    }
}

/// 按顺序取出并解析字段，任何失败都视为损坏
struct Fields<'a>(Split<'a, char>);

impl Fields<'_> {
    fn next<T: FromStr>(&mut self) -> Result<T> {
        self.0
            .next()
            .and_then(|field| field.parse().ok())
            .ok_or(Error::Corruption)
    }
}

impl From<&Inode> for Stat {
    fn from(inode: &Inode) -> Self {
        Self {
            inode: inode.id,
            kind: if inode.is_dir() {
                DirEntryType::Directory
            } else {
                DirEntryType::Regular
            },
            perm: (inode.mode & 0o7777) as u16,
            links: inode.links,
            uid: inode.uid,
            gid: inode.gid,
            size: inode.size as u64,
            block_size: inode.block_size,
            blocks: inode.blocks as u64,
            atime: inode.atime,
            mtime: inode.mtime,
            ctime: inode.ctime,
        }
    }
}
