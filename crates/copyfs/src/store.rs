//! Volume store: one directory per layer, one per bundle.

use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

use copyfs_common::{CopyFsError, CopyFsPaths, CopyFsResult, Identifier};
use walkdir::WalkDir;

/// Mode of newly created layer and bundle directories.
const DIR_MODE: u32 = 0o755;

/// Store of layer and bundle directories under a base directory.
#[derive(Debug, Clone)]
pub struct VolumeStore {
    paths: CopyFsPaths,
}

impl VolumeStore {
    /// Create a store over `paths`. Nothing is created on disk until a
    /// layer or bundle is.
    #[must_use]
    pub const fn new(paths: CopyFsPaths) -> Self {
        Self { paths }
    }

    /// Store layout.
    #[must_use]
    pub const fn paths(&self) -> &CopyFsPaths {
        &self.paths
    }

    /// Directory of layer `id`.
    #[must_use]
    pub fn path(&self, id: &str) -> PathBuf {
        self.paths.volume(id)
    }

    /// Root filesystem directory of bundle `handle`.
    #[must_use]
    pub fn diff_path(&self, handle: &str) -> PathBuf {
        self.paths.diff(handle)
    }

    /// Whether layer `id` has a directory.
    #[must_use]
    pub fn exists(&self, id: &str) -> bool {
        self.path(id).is_dir()
    }

    /// Whether bundle `handle` has a directory.
    #[must_use]
    pub fn bundle_exists(&self, handle: &str) -> bool {
        self.diff_path(handle).is_dir()
    }

    /// Create the directory of a new layer.
    ///
    /// # Errors
    ///
    /// Returns [`CopyFsError::Creation`] if the layer already exists or the
    /// directory cannot be created.
    pub fn create_layer_dir(&self, id: &Identifier) -> CopyFsResult<PathBuf> {
        let path = self.path(id.as_str());
        create_exclusive(&self.paths.volumes(), &path)?;

        tracing::debug!(layer_id = %id, path = %path.display(), "Layer directory created");
        Ok(path)
    }

    /// Create the root filesystem directory of a new bundle.
    ///
    /// # Errors
    ///
    /// Returns [`CopyFsError::Creation`] if the bundle already exists or the
    /// directory cannot be created.
    pub fn create_diff_dir(&self, handle: &Identifier) -> CopyFsResult<PathBuf> {
        let path = self.diff_path(handle.as_str());
        create_exclusive(&self.paths.diffs(), &path)?;

        tracing::debug!(handle = %handle, path = %path.display(), "Bundle directory created");
        Ok(path)
    }

    /// Delete a layer directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns [`CopyFsError::LayerNotFound`] if there is no such layer.
    pub fn delete(&self, id: &Identifier) -> CopyFsResult<()> {
        let path = self.path(id.as_str());
        if !path.is_dir() {
            return Err(CopyFsError::LayerNotFound { id: id.to_string() });
        }

        fs::remove_dir_all(&path)?;
        tracing::debug!(layer_id = %id, "Layer deleted");
        Ok(())
    }

    /// Delete a bundle directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns [`CopyFsError::BundleNotFound`] if there is no such bundle.
    pub fn remove_bundle(&self, handle: &Identifier) -> CopyFsResult<()> {
        let path = self.diff_path(handle.as_str());
        if !path.is_dir() {
            return Err(CopyFsError::BundleNotFound {
                handle: handle.to_string(),
            });
        }

        fs::remove_dir_all(&path)?;
        tracing::debug!(handle = %handle, "Bundle deleted");
        Ok(())
    }

    /// Ids of all stored layers, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer directory cannot be read.
    pub fn list(&self) -> CopyFsResult<Vec<String>> {
        let volumes = self.paths.volumes();
        let mut layers = Vec::new();

        if !volumes.exists() {
            return Ok(layers);
        }

        for entry in fs::read_dir(&volumes)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    layers.push(name.to_string());
                }
            }
        }

        layers.sort();
        Ok(layers)
    }
}

/// Whether `path` has no entries. A directory that cannot be opened,
/// including a missing one, counts as empty.
#[must_use]
pub fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).map_or(true, |mut entries| entries.next().is_none())
}

/// Remove a directory left behind by a failed operation.
///
/// A copy can fail after read-only directory modes were already restored, so
/// a failed removal is retried once owner write access has been granted.
pub(crate) fn discard(path: &Path) {
    let removed = fs::remove_dir_all(path).or_else(|e| {
        tracing::debug!(path = %path.display(), error = %e, "Retrying removal with write access");
        grant_owner_access(path);
        fs::remove_dir_all(path)
    });

    match removed {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial directory"),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove partial directory"
        ),
    }
}

/// Give the owner full access to every directory under `path`.
fn grant_owner_access(path: &Path) {
    for entry in WalkDir::new(path).follow_links(false).into_iter().flatten() {
        if !entry.file_type().is_dir() {
            continue;
        }
        let granted = entry.metadata().map_err(io::Error::from).and_then(|meta| {
            let mode = meta.permissions().mode();
            fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode | 0o700))
        });
        if let Err(e) = granted {
            tracing::debug!(path = %entry.path().display(), error = %e, "Cannot grant write access");
        }
    }
}

/// Create `parent` as needed, then `leaf` itself, failing if `leaf` exists.
fn create_exclusive(parent: &Path, leaf: &Path) -> CopyFsResult<()> {
    let creation_error = |path: &Path, source| CopyFsError::Creation {
        path: path.to_path_buf(),
        source,
    };

    DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(parent)
        .map_err(|e| creation_error(parent, e))?;
    DirBuilder::new()
        .mode(DIR_MODE)
        .create(leaf)
        .map_err(|e| creation_error(leaf, e))
}
