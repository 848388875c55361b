//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 块号从 0 开始，覆盖整个后备存储；从未写过的块读出来全是 0。

#![no_std]

use core::any::Any;

/// 块设备驱动特质
///
/// 块设备被视为可靠的：读写总是完整的一块，失败即无法继续。
pub trait BlockDevice: Send + Sync + Any {
    fn read_block(&self, block_id: usize, buf: &mut [u8]);
    fn write_block(&self, block_id: usize, buf: &[u8]);

    /// 将已写入的数据落盘
    fn flush(&self) {}
}
