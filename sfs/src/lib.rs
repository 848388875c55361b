#![no_std]

extern crate alloc;

/* sfs 的整体架构，自上而下 */

// 操作层：以路径为参数的文件系统操作，加锁后组合下面各层
mod vfs;

// 路径解析层：从根目录出发逐项查找目录项
mod path;

// 目录项日志层：目录内容是一行一项的文本
mod dir;

// 磁盘管理层：位图分配、索引节点读写、跨块写入
mod disk;

// 磁盘数据结构层：超级块位图、索引节点编码、目录项格式
mod layout;

pub use self::{
    disk::{ShortWrite, Usage},
    path::Path,
    vfs::{Caller, SimpleFileSystem},
};

pub const BLOCK_SIZE: usize = 512;
/// 超级块区域：[0, 8)
pub const SUPER_BLOCKS: u32 = 8;
/// 索引节点区域：[8, 520)，索引节点号即其所在块号
pub const INODE_START: u32 = SUPER_BLOCKS;
pub const INODE_COUNT: u32 = 512;
/// 数据区域：[520, total_blocks)
pub const DATA_START: u32 = INODE_START + INODE_COUNT;
/// 数据位图最多能描述到的块数，即 16 MiB 的磁盘
pub const MAX_BLOCKS: u32 = 32768;
pub const ROOT_INODE: u32 = INODE_START;

type DataBlock = [u8; BLOCK_SIZE];
