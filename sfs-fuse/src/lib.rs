mod block_file;
mod fuse;

use std::time::{SystemTime, UNIX_EPOCH};

use typed_bytesize::ByteSizeIec;

pub use self::{
    block_file::BlockFile,
    fuse::{errno, SfsFuse},
};

/// 默认镜像为 16 MiB，恰好是数据位图能描述的上限
pub fn default_blocks() -> u32 {
    (ByteSizeIec::mib(16).0 / sfs::BLOCK_SIZE as u64) as u32
}

/// 当前的 Unix 时间戳（秒）
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
