use enumflags2::bitflags;

/// 打开文件时请求的访问方式，对应属主权限位
#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    READ = 0o400,
    WRITE = 0o200,
}
