//! 目录的内容是一份目录项日志，每项一行：`"<索引节点号>\t<名字>\n"`。
//!
//! 名字中不能含有制表符与换行符。

use alloc::format;
use alloc::string::String;

use vfs::{Error, Result};

/// 一个目录项对应的完整行
#[inline]
pub fn line(inode_id: u32, name: &str) -> String {
    format!("{inode_id}\t{name}\n")
}

/// 逐行解析目录项日志，返回 `(行起始偏移, 索引节点号, 名字)`
pub fn entries(log: &str) -> impl Iterator<Item = Result<(usize, u32, &str)>> {
    log.split_inclusive('\n').scan(0, |offset, line| {
        let start = *offset;
        *offset += line.len();

        let entry = line
            .strip_suffix('\n')
            .and_then(|line| line.split_once('\t'))
            .and_then(|(id, name)| Some((start, id.parse::<u32>().ok()?, name)))
            .ok_or(Error::Corruption);
        Some(entry)
    })
}
