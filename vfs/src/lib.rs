#![no_std]

extern crate alloc;

mod access;
mod dirent;
mod error;
mod stat;

pub use self::{
    access::Access,
    dirent::{DirEntry, DirEntryType},
    error::{Error, Result},
    stat::Stat,
};
