mod common;

use common::{fresh, tiny, CALLER, NOW};
use sfs::BLOCK_SIZE;
use vfs::{Access, DirEntryType, Error};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn create_then_getattr() {
    let (_, fs) = fresh();
    fs.create("/a", 0o644, &CALLER).unwrap();

    let stat = fs.getattr("/a").unwrap();
    assert_eq!(stat.size, 0);
    assert_eq!(stat.kind, DirEntryType::Regular);
    assert_eq!(stat.perm, 0o644);
    assert_eq!(stat.uid, CALLER.uid);
    assert_eq!(stat.gid, CALLER.gid);
    assert_eq!(stat.mtime, NOW);
}

#[test]
fn write_then_read_back() {
    let (_, fs) = fresh();
    fs.create("/a", 0o644, &CALLER).unwrap();

    let data = pattern(1000);
    assert_eq!(fs.write("/a", 0, &data, NOW + 5), Ok(1000));

    let mut buf = vec![0; 1000];
    assert_eq!(fs.read("/a", 0, &mut buf), Ok(1000));
    assert_eq!(buf, data);

    let stat = fs.getattr("/a").unwrap();
    assert_eq!(stat.size, 1000);
    assert_eq!(stat.blocks, 2);
    assert_eq!(stat.mtime, NOW + 5);
}

#[test]
fn getattr_is_idempotent() {
    let (_, fs) = fresh();
    fs.create("/a", 0o600, &CALLER).unwrap();
    fs.write("/a", 0, b"hello", NOW).unwrap();

    assert_eq!(fs.getattr("/a"), fs.getattr("/a"));
    assert_eq!(fs.getattr("/"), fs.getattr("/"));
}

#[test]
fn read_stops_at_end_of_file() {
    let (_, fs) = fresh();
    fs.create("/a", 0o644, &CALLER).unwrap();
    fs.write("/a", 0, b"0123456789", NOW).unwrap();

    let mut buf = [0; 8];
    assert_eq!(fs.read("/a", 6, &mut buf), Ok(4));
    assert_eq!(&buf[..4], b"6789");
    assert_eq!(fs.read("/a", 10, &mut buf), Ok(0));
    assert_eq!(fs.read("/a", 4096, &mut buf), Ok(0));
}

#[test]
fn write_inside_and_past_end() {
    let (_, fs) = fresh();
    fs.create("/a", 0o644, &CALLER).unwrap();
    fs.write("/a", 0, &pattern(700), NOW).unwrap();

    // 覆盖中间一段，大小不变
    assert_eq!(fs.write("/a", 500, b"xyz", NOW), Ok(3));
    assert_eq!(fs.getattr("/a").unwrap().size, 700);

    // 跨过末尾留下空洞，空洞读出来是 0
    assert_eq!(fs.write("/a", 1500, b"end", NOW), Ok(3));
    assert_eq!(fs.getattr("/a").unwrap().size, 1503);

    let mut buf = vec![0; 1503];
    assert_eq!(fs.read("/a", 0, &mut buf), Ok(1503));
    assert_eq!(&buf[500..503], b"xyz");
    assert_eq!(&buf[..500], &pattern(700)[..500]);
    assert!(buf[700..1500].iter().all(|&b| b == 0));
    assert_eq!(&buf[1500..], b"end");
}

#[test]
fn direct_capacity_boundary() {
    let (_, fs) = fresh();
    fs.create("/big", 0o644, &CALLER).unwrap();

    let full = 32 * BLOCK_SIZE;
    assert_eq!(fs.write("/big", 0, &pattern(full), NOW), Ok(full));
    assert_eq!(fs.getattr("/big").unwrap().size, full as u64);

    // 多一个字节：要么整体失败，要么短写，不会悄悄丢掉
    assert_eq!(fs.write("/big", 0, &pattern(full + 1), NOW), Ok(full));
    assert_eq!(fs.write("/big", full, b"!", NOW), Err(Error::CapacityExceeded));
    assert_eq!(fs.getattr("/big").unwrap().size, full as u64);
    assert_eq!(fs.getattr("/big").unwrap().blocks, 32);
}

#[test]
fn short_write_when_data_runs_out() {
    // 根目录占 1 块，新文件占 1 块，剩下 8 块可用
    let (_, fs) = tiny(10);
    fs.create("/a", 0o644, &CALLER).unwrap();

    let data = pattern(20 * BLOCK_SIZE);
    assert_eq!(fs.write("/a", 0, &data, NOW), Ok(9 * BLOCK_SIZE));
    assert_eq!(fs.getattr("/a").unwrap().size, 9 * BLOCK_SIZE as u64);
    assert_eq!(fs.usage().blocks_used, 10);

    assert_eq!(
        fs.write("/a", 9 * BLOCK_SIZE, b"more", NOW),
        Err(Error::NoSpace)
    );
    assert_eq!(fs.getattr("/a").unwrap().size, 9 * BLOCK_SIZE as u64);

    let mut buf = vec![0; 9 * BLOCK_SIZE];
    assert_eq!(fs.read("/a", 0, &mut buf), Ok(9 * BLOCK_SIZE));
    assert_eq!(buf, data[..9 * BLOCK_SIZE]);
}

#[test]
fn create_existing_only_changes_mode() {
    let (_, fs) = fresh();
    fs.create("/a", 0o644, &CALLER).unwrap();
    fs.write("/a", 0, b"keep", NOW).unwrap();
    let before = fs.getattr("/a").unwrap();

    let stat = fs.create("/a", 0o600, &CALLER).unwrap();
    assert_eq!(stat.inode, before.inode);
    assert_eq!(stat.perm, 0o600);
    assert_eq!(stat.size, 4);
    assert_eq!(fs.usage().inodes_used, 2);
}

#[test]
fn open_checks_owner_bits() {
    let (_, fs) = fresh();
    fs.create("/ro", 0o444, &CALLER).unwrap();

    assert!(fs.open("/ro", Access::READ.into(), NOW + 1).is_ok());
    assert_eq!(fs.getattr("/ro").unwrap().atime, NOW + 1);
    assert_eq!(
        fs.open("/ro", Access::READ | Access::WRITE, NOW),
        Err(Error::PermissionDenied)
    );
    assert_eq!(fs.write("/ro", 0, b"x", NOW), Err(Error::PermissionDenied));

    fs.create("/wo", 0o200, &CALLER).unwrap();
    let mut buf = [0; 1];
    assert_eq!(fs.read("/wo", 0, &mut buf), Err(Error::PermissionDenied));
}

#[test]
fn open_rejects_directories_and_missing() {
    let (_, fs) = fresh();
    fs.mkdir("/d", 0o755, &CALLER).unwrap();

    assert_eq!(fs.open("/d", Access::READ.into(), NOW), Err(Error::IsADirectory));
    assert_eq!(fs.open("/nope", Access::READ.into(), NOW), Err(Error::NotFound));
    assert_eq!(fs.write("/d", 0, b"x", NOW), Err(Error::IsADirectory));
}

#[test]
fn unlink_frees_everything() {
    let (_, fs) = fresh();
    let baseline = fs.usage();

    fs.create("/a", 0o644, &CALLER).unwrap();
    fs.write("/a", 0, &pattern(3 * BLOCK_SIZE), NOW).unwrap();
    assert_eq!(fs.usage().blocks_used, baseline.blocks_used + 3);

    fs.unlink("/a").unwrap();
    assert_eq!(fs.getattr("/a"), Err(Error::NotFound));
    assert_eq!(fs.usage(), baseline);
    assert_eq!(fs.unlink("/a"), Err(Error::NotFound));
}

#[test]
fn unlink_refuses_directories() {
    let (_, fs) = fresh();
    fs.mkdir("/d", 0o755, &CALLER).unwrap();
    assert_eq!(fs.unlink("/d"), Err(Error::IsADirectory));
}

#[test]
fn paths_below_a_file_do_not_resolve() {
    let (_, fs) = fresh();
    fs.create("/a", 0o644, &CALLER).unwrap();

    assert_eq!(fs.getattr("/a/b"), Err(Error::NotFound));
    assert_eq!(fs.create("/a/b", 0o644, &CALLER), Err(Error::NotFound));
    assert_eq!(fs.create("/x/y", 0o644, &CALLER), Err(Error::NotFound));
}

#[test]
fn failed_write_past_end_leaves_file_untouched() {
    // 补 0 的空洞就能耗尽剩下的 8 块，调用者的字节一个也落不了盘
    let (_, fs) = tiny(10);
    fs.create("/a", 0o644, &CALLER).unwrap();
    let before = fs.usage();

    assert_eq!(
        fs.write("/a", 9 * BLOCK_SIZE + 100, b"x", NOW + 1),
        Err(Error::NoSpace)
    );
    let stat = fs.getattr("/a").unwrap();
    assert_eq!((stat.size, stat.blocks, stat.mtime), (0, 1, NOW));
    assert_eq!(fs.usage(), before);

    assert_eq!(fs.write("/a", 0, b"still works", NOW), Ok(11));
}
