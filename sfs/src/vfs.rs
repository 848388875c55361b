//! # 操作层
//!
//! 以路径为参数的文件系统操作，是交给 FUSE 分发器调用的全部入口。
//!
//! 索引节点号直接就是块号，中间没有任何间接层，
//! 修改操作交错执行会让位图与目录日志互相矛盾。
//! 因此所有修改操作（含全部分配与释放）都持有写锁，覆盖
//! 读超级块→修改→写回超级块的整个过程；只读操作共享读锁。

use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use enumflags2::BitFlags;
use log::{debug, warn};
use spin::RwLock;
use vfs::{Access, DirEntry, Error, Result, Stat};

use crate::disk::{Disk, ShortWrite, Usage};
use crate::layout::{self, Inode, InodeKind, DIRECT_COUNT};
use crate::path::{Path, Resolved};
use crate::{BLOCK_SIZE, ROOT_INODE};

pub struct SimpleFileSystem {
    disk: RwLock<Disk>,
}

/// 发起操作的用户与当前时间（秒）
#[derive(Debug, Clone, Copy, Default)]
pub struct Caller {
    pub uid: u32,
    pub gid: u32,
    pub now: u64,
}

impl SimpleFileSystem {
    /// 在块设备上建立全新的文件系统
    pub fn format(block_device: Arc<dyn BlockDevice>, total_blocks: u32, now: u64) -> Result<Self> {
        Ok(Self {
            disk: RwLock::new(Disk::format(block_device, total_blocks, now)?),
        })
    }

    pub fn mount(block_device: Arc<dyn BlockDevice>, total_blocks: u32) -> Result<Self> {
        Ok(Self {
            disk: RwLock::new(Disk::open(block_device, total_blocks)?),
        })
    }

    /// 超级块区域空白时先格式化再挂载
    pub fn mount_or_format(
        block_device: Arc<dyn BlockDevice>,
        total_blocks: u32,
        now: u64,
    ) -> Result<Self> {
        if Disk::is_blank(&block_device) {
            debug!("blank image, formatting");
            Self::format(block_device, total_blocks, now)
        } else {
            Self::mount(block_device, total_blocks)
        }
    }

    pub fn getattr(&self, path: &str) -> Result<Stat> {
        let disk = self.disk.read();
        let (inode, _) = disk.resolve(path)?.found()?;
        Ok(Stat::from(&inode))
    }

    /// 创建文件；文件已存在时只更新权限位
    pub fn create(&self, path: &str, perm: u32, caller: &Caller) -> Result<Stat> {
        debug!("create(path={path:?}, perm={perm:#o})");
        let mut disk = self.disk.write();

        let (mut parent, name) = match disk.resolve(path)? {
            Resolved::Found { mut inode, .. } => {
                inode.set_perm(perm);
                inode.ctime = caller.now;
                disk.write_inode(&inode);
                return Ok(Stat::from(&inode));
            }
            Resolved::Missing { parent, name } => (parent, name),
            Resolved::NotFound { .. } => return Err(Error::NotFound),
        };
        check_name(name)?;

        let inode = disk.new_inode(InodeKind::FILE, perm, caller, |_| Vec::new())?;
        disk.link_into(&mut parent, inode, name)
    }

    pub fn unlink(&self, path: &str) -> Result<()> {
        debug!("unlink(path={path:?})");
        let mut disk = self.disk.write();

        let (mut inode, mut parent) = disk.resolve(path)?.found()?;
        if inode.is_dir() {
            return Err(Error::IsADirectory);
        }
        let name = path.file_name().ok_or(Error::IsADirectory)?;

        disk.release(&mut inode)?;
        disk.dir_delete(&mut parent, inode.id, name)
    }

    /// 检查请求的访问方式是否为属主权限位所允许，并更新访问时间
    pub fn open(&self, path: &str, access: BitFlags<Access>, now: u64) -> Result<Stat> {
        debug!("open(path={path:?}, access={access:?})");
        let mut disk = self.disk.write();

        let (mut inode, _) = disk.resolve(path)?.found()?;
        check_file(&inode, access)?;

        inode.atime = now;
        disk.write_inode(&inode);
        Ok(Stat::from(&inode))
    }

    #[inline]
    pub fn release(&self, path: &str) -> Result<()> {
        debug!("release(path={path:?})");
        Ok(())
    }

    /// 从 `offset` 起读取，最多读满 `buf`；位于文件末尾及之后时读到 0 字节
    pub fn read(&self, path: &str, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let disk = self.disk.read();

        let (inode, _) = disk.resolve(path)?.found()?;
        check_file(&inode, Access::READ.into())?;

        let size = inode.size as usize;
        if offset >= size {
            return Ok(0);
        }
        let content = disk.read_content(&inode)?;
        let len = buf.len().min(size - offset);
        buf[..len].copy_from_slice(&content[offset..offset + len]);

        Ok(len)
    }

    /// 在 `offset` 处写入 `data`，返回实际落盘的字节数。
    ///
    /// 中途空间不足或超出直接索引容量时，只要写进了一部分就返回较小的字节数；
    /// 一个字节都没写进时返回原因。文件大小只反映真正落盘的部分。
    pub fn write(&self, path: &str, offset: usize, data: &[u8], now: u64) -> Result<usize> {
        debug!("write(path={path:?}, offset={offset}, len={})", data.len());
        let mut disk = self.disk.write();

        let (mut inode, _) = disk.resolve(path)?.found()?;
        check_file(&inode, Access::WRITE.into())?;

        if data.is_empty() {
            return Ok(0);
        }
        // 间接索引未实现，超出直接索引容量的部分直接截掉
        let capacity = DIRECT_COUNT * BLOCK_SIZE;
        if offset >= capacity {
            return Err(Error::CapacityExceeded);
        }
        let end = offset.checked_add(data.len()).ok_or(Error::BadBuffer)?;
        let fit = end.min(capacity);

        let kept_blocks = inode.direct_blocks() as usize;
        let mut content = disk.read_content(&inode)?;
        if content.len() < fit {
            content.resize(fit, 0);
        }
        content[offset..fit].copy_from_slice(&data[..fit - offset]);

        let (persisted, mut short) = match disk.write_spanning(&content, &mut inode) {
            Ok(written) => (written, None),
            Err(ShortWrite { written, cause }) => (written, Some(cause)),
        };
        if fit < end {
            short.get_or_insert(Error::CapacityExceeded);
        }

        // 只落盘了 `offset` 之前补的 0 不算写入
        let persisted_end = fit.min(persisted);
        let written = persisted_end.saturating_sub(offset);
        if written == 0 {
            disk.release_blocks_from(&mut inode, kept_blocks)?;
        } else {
            if persisted_end > inode.size as usize {
                inode.size = persisted_end as u32;
            }
            inode.mtime = now;
            inode.ctime = now;
        }
        disk.write_inode(&inode);

        match short {
            Some(cause) if written == 0 => Err(cause),
            Some(cause) => {
                warn!("short write on {path:?}: {written} of {} bytes, {cause}", data.len());
                Ok(written)
            }
            None => Ok(written),
        }
    }

    pub fn mkdir(&self, path: &str, perm: u32, caller: &Caller) -> Result<Stat> {
        debug!("mkdir(path={path:?}, perm={perm:#o})");
        let mut disk = self.disk.write();

        let (mut parent, name) = match disk.resolve(path)? {
            Resolved::Found { .. } => return Err(Error::AlreadyExists),
            Resolved::Missing { parent, name } => (parent, name),
            Resolved::NotFound { .. } => return Err(Error::NotFound),
        };
        check_name(name)?;

        let inode = disk.new_inode(InodeKind::DIR, perm, caller, |id| {
            layout::line(id, ".").into_bytes()
        })?;
        disk.link_into(&mut parent, inode, name)
    }

    /// 递归删除目录及其下的一切
    pub fn rmdir(&self, path: &str) -> Result<()> {
        debug!("rmdir(path={path:?})");
        let mut disk = self.disk.write();

        let (mut inode, mut parent) = disk.resolve(path)?.found()?;
        if !inode.is_dir() {
            return Err(Error::NotADirectory);
        }
        // 根目录，或者以 `.` 结尾指回了自己
        if inode.id == ROOT_INODE || inode.id == parent.id {
            return Err(Error::PermissionDenied);
        }
        let name = path.file_name().ok_or(Error::PermissionDenied)?;

        disk.empty_directory(&mut inode)?;
        disk.release(&mut inode)?;
        disk.dir_delete(&mut parent, inode.id, name)
    }

    pub fn opendir(&self, path: &str) -> Result<Stat> {
        let disk = self.disk.read();
        let (inode, _) = disk.resolve(path)?.found()?;
        if !inode.is_dir() {
            return Err(Error::NotADirectory);
        }
        Ok(Stat::from(&inode))
    }

    /// 把目录日志中的每一项交给 `filler`；`filler` 返回 `true` 表示已满
    pub fn readdir(&self, path: &str, mut filler: impl FnMut(&DirEntry) -> bool) -> Result<()> {
        let disk = self.disk.read();
        let (inode, _) = disk.resolve(path)?.found()?;
        if !inode.is_dir() {
            return Err(Error::NotADirectory);
        }

        for entry in disk.dir_entries(&inode)? {
            if filler(&entry) {
                return Err(Error::BufferFull);
            }
        }
        Ok(())
    }

    #[inline]
    pub fn releasedir(&self, path: &str) -> Result<()> {
        debug!("releasedir(path={path:?})");
        Ok(())
    }

    #[inline]
    pub fn usage(&self) -> Usage {
        self.disk.read().usage()
    }

    #[inline]
    pub fn sync(&self) {
        self.disk.read().flush();
    }
}

impl Disk {
    /// 分配索引节点与第一个数据块，写入初始内容；任一步失败都撤销已分配的部分
    fn new_inode(
        &mut self,
        kind: InodeKind,
        perm: u32,
        caller: &Caller,
        content: impl FnOnce(u32) -> Vec<u8>,
    ) -> Result<Inode> {
        let id = self.alloc_inode()?;
        let block_id = match self.alloc_data() {
            Ok(block_id) => block_id,
            Err(err) => {
                self.dealloc_inode(id)?;
                return Err(err);
            }
        };

        let mut inode = Inode::new(id, kind, perm, caller.uid, caller.gid, caller.now);
        inode.direct[0] = block_id;
        let content = content(id);
        // 初始内容只有一行，落在已分配的块里
        self.write_spanning(&content, &mut inode)?;
        inode.size = content.len() as u32;
        self.write_inode(&inode);

        Ok(inode)
    }

    /// 把新建的索引节点挂到父目录下；父目录写不下时释放它
    fn link_into(&mut self, parent: &mut Inode, mut inode: Inode, name: &str) -> Result<Stat> {
        if let Err(err) = self.dir_append(parent, inode.id, name) {
            self.release(&mut inode)?;
            return Err(err);
        }
        Ok(Stat::from(&inode))
    }

    /// 清空目录：子目录先递归清空再释放，文件直接释放，并逐项删去日志中的行。
    ///
    /// 跳过自身的 `.` 项，每层递归都严格进入子树，因此一定终止。
    fn empty_directory(&mut self, dir: &mut Inode) -> Result<()> {
        for entry in self.dir_entries(dir)? {
            if entry.inode == dir.id {
                continue;
            }

            let mut child = self.read_inode(entry.inode)?;
            if child.is_dir() {
                self.empty_directory(&mut child)?;
            }
            self.release(&mut child)?;
            self.dir_delete(dir, entry.inode, &entry.name)?;
        }
        Ok(())
    }
}

/// 普通文件且属主权限位允许请求的访问方式
fn check_file(inode: &Inode, access: BitFlags<Access>) -> Result<()> {
    if inode.is_dir() {
        return Err(Error::IsADirectory);
    }
    if inode.mode & access.bits() != access.bits() {
        return Err(Error::PermissionDenied);
    }
    Ok(())
}

/// 目录日志以制表符与换行分隔，名字里不能出现它们
fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['\t', '\n']) {
        return Err(Error::BadBuffer);
    }
    Ok(())
}
