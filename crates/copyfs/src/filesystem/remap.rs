//! Recursive ownership remapping.

use std::path::Path;

use copyfs_common::{CopyFsError, CopyFsResult, Ownership};
use walkdir::WalkDir;

/// Give every entry under `path`, including `path` itself, the owner
/// `ownership`.
///
/// Symbolic links are skipped: neither the link nor its target is changed
/// through it. A target inside the tree is remapped when the walk reaches it
/// directly. Nothing outside `path` is touched.
///
/// The walk stops at the first failure.
///
/// # Errors
///
/// Returns [`CopyFsError::Remap`] naming the entry that could not be
/// visited or changed.
pub fn remap(path: &Path, ownership: Ownership) -> CopyFsResult<()> {
    tracing::debug!(
        path = %path.display(),
        uid = ownership.uid,
        gid = ownership.gid,
        "Remapping ownership"
    );

    let mut changed = 0u64;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(|e| CopyFsError::Remap {
            path: e.path().unwrap_or(path).to_path_buf(),
            source: e.into(),
        })?;

        if entry.path_is_symlink() {
            continue;
        }

        std::os::unix::fs::lchown(entry.path(), Some(ownership.uid), Some(ownership.gid))
            .map_err(|source| CopyFsError::Remap {
                path: entry.path().to_path_buf(),
                source,
            })?;
        changed += 1;
    }

    tracing::debug!(path = %path.display(), entries = changed, "Ownership remapped");
    Ok(())
}
