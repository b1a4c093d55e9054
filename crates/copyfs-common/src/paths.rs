//! On-disk layout of the layer store.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Default subdirectory holding one directory per layer.
pub const VOLUMES_DIR: &str = "volumes";

/// Default subdirectory holding one directory per bundle.
pub const DIFFS_DIR: &str = "diffs";

/// Default base directory for copyfs data.
pub static COPYFS_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("COPYFS_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/lib/copyfs"))
});

/// Paths of the layer store.
///
/// ```text
/// <root>/
/// ├── volumes/<layer-id>/   fully materialized layer trees
/// └── diffs/<handle>/       per-container bundle roots
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyFsPaths {
    /// Base directory (default: /var/lib/copyfs).
    pub root: PathBuf,
    /// Name of the layer subdirectory.
    pub volumes_dir: String,
    /// Name of the bundle subdirectory.
    pub diffs_dir: String,
}

impl CopyFsPaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom base directory.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Directory holding all layers.
    #[must_use]
    pub fn volumes(&self) -> PathBuf {
        self.root.join(&self.volumes_dir)
    }

    /// Directory of a single layer.
    #[must_use]
    pub fn volume(&self, id: &str) -> PathBuf {
        self.volumes().join(id)
    }

    /// Directory holding all bundles.
    #[must_use]
    pub fn diffs(&self) -> PathBuf {
        self.root.join(&self.diffs_dir)
    }

    /// Root filesystem directory of a single bundle.
    #[must_use]
    pub fn diff(&self, handle: &str) -> PathBuf {
        self.diffs().join(handle)
    }
}

impl Default for CopyFsPaths {
    fn default() -> Self {
        Self {
            root: COPYFS_ROOT.clone(),
            volumes_dir: VOLUMES_DIR.to_string(),
            diffs_dir: DIFFS_DIR.to_string(),
        }
    }
}
