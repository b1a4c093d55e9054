//! Shared fixtures for copyfs integration tests.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use copyfs::CopyDriver;
use copyfs_common::DriverConfig;
use tempfile::TempDir;

/// Whether the tests run with the privileges needed to chown.
pub fn is_root() -> bool {
    rustix::process::geteuid().is_root()
}

/// A driver rooted in a fresh temporary directory.
pub fn create_driver() -> (TempDir, CopyDriver) {
    let temp = TempDir::new().unwrap();
    let driver = CopyDriver::new(DriverConfig::new().with_base_dir(temp.path()));
    (temp, driver)
}

/// An entry of a fixture archive.
pub enum Entry<'a> {
    Dir(&'a str, u32),
    File(&'a str, &'a str, u32),
    Symlink(&'a str, &'a str),
}

/// Build an in-memory tar archive. Entries are owned by `owner`.
pub fn archive_owned(entries: &[Entry<'_>], owner: u32) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_uid(u64::from(owner));
        header.set_gid(u64::from(owner));
        header.set_mtime(1_600_000_000);

        match entry {
            Entry::Dir(path, mode) => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(*mode);
                header.set_size(0);
                builder
                    .append_data(&mut header, path, std::io::empty())
                    .unwrap();
            }
            Entry::File(path, content, mode) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(*mode);
                header.set_size(content.len() as u64);
                builder
                    .append_data(&mut header, path, content.as_bytes())
                    .unwrap();
            }
            Entry::Symlink(path, target) => {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_mode(0o777);
                header.set_size(0);
                header.set_link_name(target).unwrap();
                builder
                    .append_data(&mut header, path, std::io::empty())
                    .unwrap();
            }
        }
    }

    builder.into_inner().unwrap()
}

/// Build an in-memory tar archive owned by the current user.
pub fn archive(entries: &[Entry<'_>]) -> Vec<u8> {
    archive_owned(entries, rustix::process::geteuid().as_raw())
}

/// Layer containing `foo/bar` and a symlink to it.
pub fn my_layer() -> Vec<u8> {
    archive(&[
        Entry::Dir("foo", 0o755),
        Entry::File("foo/bar", "bar", 0o644),
        Entry::Symlink("bar-link", "foo/bar"),
    ])
}

/// Parent layer containing `i/am/parent`.
pub fn my_parent_layer() -> Vec<u8> {
    archive(&[
        Entry::Dir("i", 0o755),
        Entry::Dir("i/am", 0o755),
        Entry::File("i/am/parent", "parent", 0o600),
    ])
}

/// `(uid, gid)` of `path`, without following symlinks.
pub fn owner(path: &Path) -> (u32, u32) {
    let meta = fs::symlink_metadata(path).unwrap();
    (meta.uid(), meta.gid())
}

/// Relative paths of every entry under `root`, sorted.
pub fn tree(root: &Path) -> Vec<String> {
    let mut entries: Vec<String> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.unwrap();
            entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    entries.sort();
    entries
}
