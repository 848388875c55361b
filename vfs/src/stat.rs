use crate::DirEntryType;

/// 索引节点的元数据快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Inode number
    pub inode: u32,
    pub kind: DirEntryType,
    /// 仅含权限位
    pub perm: u16,
    pub links: u32,
    pub uid: u32,
    pub gid: u32,
    /// File size
    pub size: u64,
    /// Optimal I/O block size
    pub block_size: u32,
    /// Occupying blocks
    pub blocks: u64,
    /// 秒级时间戳
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
}
