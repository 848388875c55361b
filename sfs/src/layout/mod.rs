//! # 磁盘数据结构层
//!
//! sfs 的磁盘布局：
//! 超级块(索引节点位图 + 数据块位图) | 索引节点区域(一块一个) | 数据块区域

mod super_block;
pub use super_block::{SuperBlock, SUPER_BLOCK_SIZE};

mod inode;
pub use inode::{Inode, InodeKind, DIRECT_COUNT};

/// 目录项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::{entries, line};
