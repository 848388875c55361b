//! # 路径解析层
//!
//! 从根目录出发，逐项扫描目录项日志找到目标。
//! 解析结果显式带回目标所在的目录，修改类操作据此更新父目录的日志。

use alloc::format;
use alloc::string::String;

use vfs::{Error, Result};

use crate::disk::Disk;
use crate::layout::Inode;
use crate::ROOT_INODE;

pub trait Path {
    /// 去掉开头与结尾各一个 `/`，得到相对根目录的路径；根目录得到空串
    fn root_relative(&self) -> &Self;

    /// 拆出第一项与剩余部分
    fn split_head(&self) -> (&Self, Option<&Self>);

    /// 路径的最后一项；根目录没有最后一项
    fn file_name(&self) -> Option<&Self>;

    /// 所在目录的路径；根目录的上级是它自己
    fn parent(&self) -> &Self;

    /// 在目录路径后拼接一项
    fn join(&self, name: &str) -> String;
}

impl Path for str {
    fn root_relative(&self) -> &Self {
        let path = self.strip_prefix('/').unwrap_or(self);
        path.strip_suffix('/').unwrap_or(path)
    }

    fn split_head(&self) -> (&Self, Option<&Self>) {
        match self.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (self, None),
        }
    }

    fn file_name(&self) -> Option<&Self> {
        let path = self.root_relative();
        if path.is_empty() {
            return None;
        }
        Some(path.rsplit_once('/').map_or(path, |(_, name)| name))
    }

    fn parent(&self) -> &Self {
        match self.root_relative().rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        }
    }

    fn join(&self, name: &str) -> String {
        let dir = self.root_relative();
        if dir.is_empty() {
            format!("/{name}")
        } else {
            format!("/{dir}/{name}")
        }
    }
}

/// 路径解析的结果
#[derive(Debug)]
pub enum Resolved<'p> {
    /// 目标存在；根目录的父目录就是它自己
    Found { inode: Inode, parent: Inode },
    /// 只缺最后一项：`parent` 是它本该所在的目录
    Missing { parent: Inode, name: &'p str },
    /// 中途某一项不存在，或者穿过了普通文件；`parent` 是最后解析到的目录
    NotFound { parent: Inode },
}

impl Resolved<'_> {
    /// 要求目标存在，返回 `(目标, 父目录)`
    pub fn found(self) -> Result<(Inode, Inode)> {
        match self {
            Self::Found { inode, parent } => Ok((inode, parent)),
            _ => Err(Error::NotFound),
        }
    }
}

impl Disk {
    /// 解析绝对路径。
    ///
    /// 根目录每次都从磁盘重新读取，不依赖任何缓存。
    /// 循环次数等于路径的项数。
    pub fn resolve<'p>(&self, path: &'p str) -> Result<Resolved<'p>> {
        let root = self.read_inode(ROOT_INODE)?;
        let path = path.root_relative();
        if path.is_empty() {
            return Ok(Resolved::Found {
                inode: root.clone(),
                parent: root,
            });
        }

        let mut dir = root;
        let mut rest = path;
        loop {
            let (head, tail) = rest.split_head();
            let Some(inode_id) = self.dir_lookup(&dir, head)? else {
                return Ok(match tail {
                    None => Resolved::Missing {
                        parent: dir,
                        name: head,
                    },
                    Some(_) => Resolved::NotFound { parent: dir },
                });
            };

            let inode = self.read_inode(inode_id)?;
            match tail {
                None => return Ok(Resolved::Found { inode, parent: dir }),
                Some(_) if !inode.is_dir() => return Ok(Resolved::NotFound { parent: dir }),
                Some(tail) => {
                    dir = inode;
                    rest = tail;
                }
            }
        }
    }
}
