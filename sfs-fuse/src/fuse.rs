//! 把以索引节点号为参数的 FUSE 请求翻译成以路径为参数的 sfs 操作

use std::collections::HashMap;
use std::ffi::OsStr;
use std::time::{Duration, UNIX_EPOCH};

use enumflags2::BitFlags;
use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    FUSE_ROOT_ID,
};
use libc::c_int;
use log::{debug, error, info};
use sfs::{Caller, Path, SimpleFileSystem, BLOCK_SIZE, ROOT_INODE};
use vfs::{Access, DirEntryType, Error, Result, Stat};

use crate::unix_now;

const TTL: Duration = Duration::from_secs(1);

/// 报告给 statfs 的文件名长度上限
const NAME_MAX: u32 = 255;

pub struct SfsFuse {
    fs: SimpleFileSystem,
    /// FUSE 索引节点号 → 路径
    paths: HashMap<u64, String>,
}

impl SfsFuse {
    pub fn new(fs: SimpleFileSystem) -> Self {
        Self {
            fs,
            paths: HashMap::from([(FUSE_ROOT_ID, String::from("/"))]),
        }
    }

    fn path_of(&self, ino: u64) -> Result<&str> {
        self.paths.get(&ino).map(String::as_str).ok_or(Error::NotFound)
    }

    fn child_of(&self, parent: u64, name: &OsStr) -> Result<String> {
        let name = name.to_str().ok_or(Error::BadBuffer)?;
        Ok(self.path_of(parent)?.join(name))
    }

    /// 记下路径，返回交给内核的属性
    fn remember(&mut self, path: String, stat: &Stat) -> FileAttr {
        let attr = file_attr(stat);
        self.paths.insert(attr.ino, path);
        attr
    }

    /// 忘掉 `path` 及其下的一切
    fn forget_tree(&mut self, path: &str) {
        let prefix = path.join("");
        self.paths
            .retain(|_, known| known != path && !known.starts_with(&prefix));
    }

    fn lookup_path(&mut self, path: String) -> Result<FileAttr> {
        let stat = self.fs.getattr(&path)?;
        Ok(self.remember(path, &stat))
    }

    /// 目录的全部项，`..` 排在最前
    fn listing(&mut self, ino: u64) -> Result<Vec<(u64, FileType, String)>> {
        let path = self.path_of(ino)?.to_owned();

        let mut entries = Vec::new();
        self.fs.readdir(&path, |entry| {
            entries.push(entry.clone());
            false
        })?;

        let parent = self.fs.getattr(path.parent())?;
        let mut listing = vec![(fuse_ino(parent.inode), FileType::Directory, "..".into())];
        for entry in entries {
            if entry.name == "." {
                listing.push((ino, FileType::Directory, entry.name));
                continue;
            }
            let attr = self.lookup_path(path.join(&entry.name))?;
            listing.push((attr.ino, attr.kind, entry.name));
        }
        Ok(listing)
    }
}

impl Filesystem for SfsFuse {
    fn init(&mut self, _req: &Request, _config: &mut KernelConfig) -> Result<(), c_int> {
        let usage = self.fs.usage();
        info!(
            "mounted: {}/{} inodes, {}/{} data blocks in use",
            usage.inodes_used, usage.inodes_total, usage.blocks_used, usage.blocks_total
        );
        Ok(())
    }

    fn destroy(&mut self) {
        self.fs.sync();
        info!("unmounted");
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self
            .child_of(parent, name)
            .and_then(|path| self.lookup_path(path))
        {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(err) => reply.error(errno(err)),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.path_of(ino).and_then(|path| self.fs.getattr(path)) {
            Ok(stat) => reply.attr(&TTL, &file_attr(&stat)),
            Err(err) => reply.error(errno(err)),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        reply: ReplyEntry,
    ) {
        let caller = caller(req);
        let made = self.child_of(parent, name).and_then(|path| {
            let stat = self.fs.mkdir(&path, mode & !umask, &caller)?;
            Ok(self.remember(path, &stat))
        });
        match made {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(err) => reply.error(errno(err)),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let removed = self.child_of(parent, name).and_then(|path| {
            self.fs.unlink(&path)?;
            self.forget_tree(&path);
            Ok(())
        });
        match removed {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(err)),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let removed = self.child_of(parent, name).and_then(|path| {
            self.fs.rmdir(&path)?;
            self.forget_tree(&path);
            Ok(())
        });
        match removed {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(err)),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        match self
            .path_of(ino)
            .and_then(|path| self.fs.open(path, access(flags), unix_now()))
        {
            Ok(_) => reply.opened(0, 0),
            Err(err) => reply.error(errno(err)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let mut buf = vec![0; size as usize];
        let read = self.path_of(ino).and_then(|path| {
            let offset = usize::try_from(offset).map_err(|_| Error::BadBuffer)?;
            self.fs.read(path, offset, &mut buf)
        });
        match read {
            Ok(len) => reply.data(&buf[..len]),
            Err(err) => reply.error(errno(err)),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let written = self.path_of(ino).and_then(|path| {
            let offset = usize::try_from(offset).map_err(|_| Error::BadBuffer)?;
            self.fs.write(path, offset, data, unix_now())
        });
        match written {
            Ok(len) => reply.written(len as u32),
            Err(err) => reply.error(errno(err)),
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.path_of(ino).and_then(|path| self.fs.release(path)) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(err)),
        }
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.path_of(ino).and_then(|path| self.fs.opendir(path)) {
            Ok(_) => reply.opened(0, 0),
            Err(err) => reply.error(errno(err)),
        }
    }

    /// `offset` 是内核上一次收到的最后一项的下一个位置；回复缓冲区满了就结束本批
    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let listing = match self.listing(ino) {
            Ok(listing) => listing,
            Err(err) => return reply.error(errno(err)),
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (index, (ino, kind, name)) in listing.into_iter().enumerate().skip(skip) {
            if reply.add(ino, index as i64 + 1, kind, name) {
                debug!("readdir: reply buffer full after {index} entries");
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request, ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        match self.path_of(ino).and_then(|path| self.fs.releasedir(path)) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(err)),
        }
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        let usage = self.fs.usage();
        let free_blocks = (usage.blocks_total - usage.blocks_used) as u64;
        reply.statfs(
            usage.blocks_total as u64,
            free_blocks,
            free_blocks,
            usage.inodes_total as u64,
            (usage.inodes_total - usage.inodes_used) as u64,
            BLOCK_SIZE as u32,
            NAME_MAX,
            BLOCK_SIZE as u32,
        );
    }

    fn create(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let caller = caller(req);
        let created = self.child_of(parent, name).and_then(|path| {
            let stat = self.fs.create(&path, mode & !umask, &caller)?;
            Ok(self.remember(path, &stat))
        });
        match created {
            Ok(attr) => reply.created(&TTL, &attr, 0, 0, 0),
            Err(err) => reply.error(errno(err)),
        }
    }
}

pub fn errno(err: Error) -> c_int {
    match err {
        Error::NotFound => libc::ENOENT,
        Error::PermissionDenied => libc::EACCES,
        Error::NoSpace => libc::ENOSPC,
        Error::BadBuffer => libc::EFAULT,
        Error::Corruption => {
            error!("filesystem image is corrupted");
            libc::EIO
        }
        Error::CapacityExceeded => libc::EFBIG,
        Error::AlreadyExists => libc::EEXIST,
        Error::IsADirectory => libc::EISDIR,
        Error::NotADirectory => libc::ENOTDIR,
        Error::BufferFull => libc::ENOMEM,
    }
}

/// sfs 的根目录是 8 号索引节点，FUSE 的根目录固定为 1；其余编号原样使用
fn fuse_ino(inode: u32) -> u64 {
    if inode == ROOT_INODE {
        FUSE_ROOT_ID
    } else {
        inode as u64
    }
}

fn file_attr(stat: &Stat) -> FileAttr {
    let time = |secs: u64| UNIX_EPOCH + Duration::from_secs(secs);
    FileAttr {
        ino: fuse_ino(stat.inode),
        size: stat.size,
        blocks: stat.blocks,
        atime: time(stat.atime),
        mtime: time(stat.mtime),
        ctime: time(stat.ctime),
        crtime: time(stat.ctime),
        kind: match stat.kind {
            DirEntryType::Directory => FileType::Directory,
            DirEntryType::Regular => FileType::RegularFile,
        },
        perm: stat.perm,
        nlink: stat.links,
        uid: stat.uid,
        gid: stat.gid,
        rdev: 0,
        blksize: stat.block_size,
        flags: 0,
    }
}

fn access(flags: i32) -> BitFlags<Access> {
    match flags & libc::O_ACCMODE {
        libc::O_RDONLY => Access::READ.into(),
        libc::O_WRONLY => Access::WRITE.into(),
        _ => Access::READ | Access::WRITE,
    }
}

fn caller(req: &Request) -> Caller {
    Caller {
        uid: req.uid(),
        gid: req.gid(),
        now: unix_now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_renumbered() {
        assert_eq!(fuse_ino(ROOT_INODE), FUSE_ROOT_ID);
        assert_eq!(fuse_ino(ROOT_INODE + 1), ROOT_INODE as u64 + 1);
    }

    #[test]
    fn open_flags_to_access() {
        assert_eq!(access(libc::O_RDONLY), BitFlags::from(Access::READ));
        assert_eq!(access(libc::O_WRONLY | libc::O_APPEND), BitFlags::from(Access::WRITE));
        assert_eq!(access(libc::O_RDWR), Access::READ | Access::WRITE);
    }

    #[test]
    fn errors_to_errno() {
        assert_eq!(errno(Error::NotFound), libc::ENOENT);
        assert_eq!(errno(Error::CapacityExceeded), libc::EFBIG);
        assert_eq!(errno(Error::NotADirectory), libc::ENOTDIR);
    }

    #[test]
    fn attr_times_are_seconds() {
        let stat = Stat {
            inode: ROOT_INODE,
            kind: DirEntryType::Directory,
            perm: 0o755,
            links: 1,
            uid: 0,
            gid: 0,
            size: 4,
            block_size: BLOCK_SIZE as u32,
            blocks: 1,
            atime: 10,
            mtime: 20,
            ctime: 30,
        };
        let attr = file_attr(&stat);
        assert_eq!(attr.ino, FUSE_ROOT_ID);
        assert_eq!(attr.kind, FileType::Directory);
        assert_eq!(attr.mtime, UNIX_EPOCH + Duration::from_secs(20));
    }
}
