use derive_more::Display;

/// 文件系统操作返回给调用者的错误
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 路径中的某一项不存在
    #[display(fmt = "no such file or directory")]
    NotFound,
    /// 访问模式与属主权限位不符
    #[display(fmt = "permission denied")]
    PermissionDenied,
    /// 索引节点位图或数据块位图已耗尽
    #[display(fmt = "no space left on device")]
    NoSpace,
    /// 调用者的缓冲区或偏移量非法
    #[display(fmt = "bad buffer")]
    BadBuffer,
    /// 磁盘上的记录无法解析，不可原地恢复
    #[display(fmt = "corrupted on-disk record")]
    Corruption,
    /// 内容超出了直接索引所能容纳的大小
    #[display(fmt = "content exceeds direct block capacity")]
    CapacityExceeded,
    #[display(fmt = "already exists")]
    AlreadyExists,
    #[display(fmt = "is a directory")]
    IsADirectory,
    #[display(fmt = "not a directory")]
    NotADirectory,
    /// 目录项接收方已满
    #[display(fmt = "directory listing buffer is full")]
    BufferFull,
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
