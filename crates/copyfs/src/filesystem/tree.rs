//! Attribute-preserving recursive copy.
//!
//! Copies a directory tree the way `cp -a` does for the attributes a layer
//! cares about: permission bits, access and modification times, symbolic
//! links (copied as links, never followed) and file contents. Ownership is
//! copied too when running as root; otherwise the copying user owns the
//! result.

use std::fs::{self, DirBuilder, Metadata};
use std::io;
use std::os::unix::fs::{DirBuilderExt, FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use copyfs_common::{CopyFsError, CopyFsResult};
use rustix::fs::{AtFlags, CWD, FileType, Mode, Timespec, Timestamps};
use walkdir::WalkDir;

/// Copy the contents of `source_dir` into `dest_dir`.
///
/// `dest_dir` is created if missing. Entries already present in `dest_dir`
/// are replaced by their counterpart from `source_dir`; entries with no
/// counterpart are left alone. Hard links are copied as independent files.
///
/// Directory permissions and times are applied after the directory has been
/// filled, so read-only directories copy correctly and their mtimes are not
/// disturbed by the copy itself.
///
/// # Errors
///
/// Returns [`CopyFsError::Copy`] naming the entry that could not be copied.
pub fn copy_tree(source_dir: &Path, dest_dir: &Path) -> CopyFsResult<()> {
    tracing::debug!(
        source = %source_dir.display(),
        dest = %dest_dir.display(),
        "Copying tree"
    );

    let copy_error = |diagnostic: String, source: io::Error| CopyFsError::Copy {
        source_dir: source_dir.to_path_buf(),
        dest_dir: dest_dir.to_path_buf(),
        diagnostic,
        source,
    };

    // Directories whose final mode and times are applied once their
    // contents are in place, in walk order (parents before children).
    let mut directories: Vec<(PathBuf, Metadata)> = Vec::new();
    let mut files = 0u64;
    let preserve_owner = rustix::process::geteuid().is_root();

    for entry in WalkDir::new(source_dir).follow_links(false) {
        let entry = entry.map_err(|e| {
            let diagnostic = match e.path() {
                Some(path) => format!("reading {}", path.display()),
                None => "walking source tree".to_string(),
            };
            copy_error(diagnostic, e.into())
        })?;

        let relative = entry.path().strip_prefix(source_dir).map_err(|_| {
            copy_error(
                format!("{} escaped the source tree", entry.path().display()),
                io::Error::from(io::ErrorKind::InvalidInput),
            )
        })?;
        let target = dest_dir.join(relative);

        let metadata = entry
            .metadata()
            .map_err(|e| copy_error(format!("stat {}", entry.path().display()), e.into()))?;

        copy_entry(entry.path(), &target, &metadata, preserve_owner)
            .map_err(|e| copy_error(format!("copying {}", relative.display()), e))?;

        if metadata.is_dir() {
            directories.push((target, metadata));
        } else {
            files += 1;
        }
    }

    for (target, metadata) in directories.iter().rev() {
        finish_directory(target, metadata, preserve_owner)
            .map_err(|e| copy_error(format!("restoring attributes of {}", target.display()), e))?;
    }

    tracing::debug!(
        dest = %dest_dir.display(),
        directories = directories.len(),
        files,
        "Tree copied"
    );
    Ok(())
}

/// Recreate one source entry at `target`.
fn copy_entry(
    source: &Path,
    target: &Path,
    metadata: &Metadata,
    preserve_owner: bool,
) -> io::Result<()> {
    let file_type = metadata.file_type();

    if file_type.is_dir() {
        match fs::symlink_metadata(target) {
            Ok(existing) if existing.is_dir() => {}
            Ok(_) => {
                fs::remove_file(target)?;
                create_owner_writable_dir(target, metadata)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                create_owner_writable_dir(target, metadata)?;
            }
            Err(e) => return Err(e),
        }
        // Keep the directory writable until `finish_directory`.
        let mode = metadata.mode() & 0o7777;
        if mode & 0o700 != 0o700 {
            fs::set_permissions(target, fs::Permissions::from_mode(mode | 0o700))?;
        }
        return Ok(());
    }

    remove_existing(target)?;

    if file_type.is_symlink() {
        let link_target = fs::read_link(source)?;
        std::os::unix::fs::symlink(&link_target, target)?;
        if preserve_owner {
            set_owner(target, metadata)?;
        }
        // Symlinks carry no permission bits of their own.
        return set_times(target, metadata);
    }

    if file_type.is_file() {
        fs::copy(source, target)?;
    } else if file_type.is_fifo() || file_type.is_char_device() || file_type.is_block_device() {
        rustix::fs::mknodat(
            CWD,
            target,
            FileType::from_raw_mode(metadata.mode()),
            Mode::from_raw_mode(metadata.mode() & 0o7777),
            metadata.rdev(),
        )?;
    } else {
        tracing::debug!(path = %source.display(), "Skipping socket");
        return Ok(());
    }

    // Ownership first: chown clears set-id bits.
    if preserve_owner {
        set_owner(target, metadata)?;
    }
    fs::set_permissions(
        target,
        fs::Permissions::from_mode(metadata.mode() & 0o7777),
    )?;
    set_times(target, metadata)
}

fn create_owner_writable_dir(target: &Path, metadata: &Metadata) -> io::Result<()> {
    DirBuilder::new()
        .mode((metadata.mode() & 0o7777) | 0o700)
        .create(target)
}

/// Remove a non-directory or directory at `target` so it can be replaced.
fn remove_existing(target: &Path) -> io::Result<()> {
    match fs::symlink_metadata(target) {
        Ok(existing) if existing.is_dir() => fs::remove_dir_all(target),
        Ok(_) => fs::remove_file(target),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn finish_directory(target: &Path, metadata: &Metadata, preserve_owner: bool) -> io::Result<()> {
    if preserve_owner {
        set_owner(target, metadata)?;
    }
    fs::set_permissions(
        target,
        fs::Permissions::from_mode(metadata.mode() & 0o7777),
    )?;
    set_times(target, metadata)
}

fn set_owner(target: &Path, metadata: &Metadata) -> io::Result<()> {
    std::os::unix::fs::lchown(target, Some(metadata.uid()), Some(metadata.gid()))
}

/// Apply the source's access and modification times without following links.
fn set_times(target: &Path, metadata: &Metadata) -> io::Result<()> {
    let times = Timestamps {
        last_access: Timespec {
            tv_sec: metadata.atime(),
            tv_nsec: metadata.atime_nsec() as _,
        },
        last_modification: Timespec {
            tv_sec: metadata.mtime(),
            tv_nsec: metadata.mtime_nsec() as _,
        },
    };
    rustix::fs::utimensat(CWD, target, &times, AtFlags::SYMLINK_NOFOLLOW)?;
    Ok(())
}
