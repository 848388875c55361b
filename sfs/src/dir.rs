//! # 目录项日志层
//!
//! 目录的内容就是一份只增不改的文本日志，查找是线性扫描，删除是文本拼接。
//! 每次修改后都要让目录索引节点的 `size` 恰好等于日志长度。
//!
//! 所有操作都显式地作用在调用者给出的目录索引节点上。

use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, error};
use vfs::{DirEntry, Error, Result};

use crate::disk::Disk;
use crate::layout::{self, Inode};

impl Disk {
    /// 目录日志的全部文本
    pub fn dir_log(&self, dir: &Inode) -> Result<String> {
        let content = self.read_content(dir)?;
        String::from_utf8(content).map_err(|_| {
            error!("directory {} holds a non UTF-8 log", dir.id);
            Error::Corruption
        })
    }

    pub fn dir_entries(&self, dir: &Inode) -> Result<Vec<DirEntry>> {
        let log = self.dir_log(dir)?;
        layout::entries(&log)
            .map(|entry| {
                entry.map(|(_, inode, name)| DirEntry {
                    inode,
                    name: name.into(),
                })
            })
            .collect()
    }

    /// 在目录下通过名字获取目录项的索引节点号
    pub fn dir_lookup(&self, dir: &Inode, name: &str) -> Result<Option<u32>> {
        let log = self.dir_log(dir)?;
        for entry in layout::entries(&log) {
            let (_, inode, entry_name) = entry?;
            if entry_name == name {
                return Ok(Some(inode));
            }
        }
        Ok(None)
    }

    /// 在日志末尾追加一项。
    ///
    /// 空间不足时 `size` 保持原样，新写的半行落在 `size` 之外，等同于没写。
    pub fn dir_append(&mut self, dir: &mut Inode, inode_id: u32, name: &str) -> Result<()> {
        let mut log = self.read_content(dir)?;
        log.extend_from_slice(layout::line(inode_id, name).as_bytes());

        let outcome = self.write_spanning(&log, dir);
        if outcome.is_ok() {
            dir.size = log.len() as u32;
        }
        self.write_inode(dir);
        outcome?;

        debug!("dir {}: +{inode_id} {name:?}", dir.id);
        Ok(())
    }

    /// 删除恰好为 `"<inode_id>\t<name>\n"` 的第一行，并释放缩短后不再需要的块
    pub fn dir_delete(&mut self, dir: &mut Inode, inode_id: u32, name: &str) -> Result<()> {
        let mut log = self.dir_log(dir)?;
        let target = layout::line(inode_id, name);

        let mut start = None;
        for entry in layout::entries(&log) {
            let (offset, id, entry_name) = entry?;
            if id == inode_id && entry_name == name {
                start = Some(offset);
                break;
            }
        }
        let start = start.ok_or(Error::NotFound)?;
        log.replace_range(start..start + target.len(), "");

        // 内容只会变短，不会再分配新块
        self.write_spanning(log.as_bytes(), dir)?;
        self.release_blocks_from(dir, Inode::count_data_block(log.len()))?;
        dir.size = log.len() as u32;
        self.write_inode(dir);

        debug!("dir {}: -{inode_id} {name:?}", dir.id);
        Ok(())
    }
}
