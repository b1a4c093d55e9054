//! Driver configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CopyFsError, CopyFsResult};
use crate::paths::CopyFsPaths;

/// The "nobody on the host" uid/gid: `u32::MAX - 1`.
pub const SENTINEL_ID: u32 = u32::MAX - 1;

/// Owner assigned to every non-symlink entry of an unprivileged bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ownership {
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
}

impl Ownership {
    /// Create an ownership pair.
    #[must_use]
    pub const fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// The sentinel identity for both uid and gid.
    #[must_use]
    pub const fn sentinel() -> Self {
        Self::new(SENTINEL_ID, SENTINEL_ID)
    }
}

impl Default for Ownership {
    fn default() -> Self {
        Self::sentinel()
    }
}

/// Configuration of a copy driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Store layout.
    pub paths: CopyFsPaths,
    /// Owner applied to unprivileged bundles.
    pub ownership: Ownership,
}

impl DriverConfig {
    /// Create a configuration with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a TOML file.
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CopyFsError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> CopyFsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CopyFsError::Config {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        let config: Self = toml::from_str(&content)?;

        tracing::debug!(path = %path.display(), root = %config.paths.root.display(), "Configuration loaded");
        Ok(config)
    }

    /// Set the base directory.
    #[must_use]
    pub fn with_base_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.paths.root = root.into();
        self
    }

    /// Set the owner applied to unprivileged bundles.
    #[must_use]
    pub const fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    /// Rename the layer and bundle subdirectories.
    #[must_use]
    pub fn with_subdirs(
        mut self,
        volumes_dir: impl Into<String>,
        diffs_dir: impl Into<String>,
    ) -> Self {
        self.paths.volumes_dir = volumes_dir.into();
        self.paths.diffs_dir = diffs_dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_value() {
        assert_eq!(SENTINEL_ID, 4_294_967_294);
        assert_eq!(Ownership::default(), Ownership::new(SENTINEL_ID, SENTINEL_ID));
    }

    #[test]
    fn builder() {
        let config = DriverConfig::new()
            .with_base_dir("/tmp/store")
            .with_ownership(Ownership::new(100_000, 100_001))
            .with_subdirs("layers", "bundles");

        assert_eq!(config.paths.volume("x"), PathBuf::from("/tmp/store/layers/x"));
        assert_eq!(config.paths.diff("y"), PathBuf::from("/tmp/store/bundles/y"));
        assert_eq!(config.ownership.uid, 100_000);
        assert_eq!(config.ownership.gid, 100_001);
    }

    #[test]
    fn load_partial_toml() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("copyfs.toml");
        std::fs::write(
            &path,
            r#"
[paths]
root = "/data/copyfs"

[ownership]
uid = 65534
gid = 65534
"#,
        )
        .unwrap();

        let config = DriverConfig::load(&path).unwrap();
        assert_eq!(config.paths.root, PathBuf::from("/data/copyfs"));
        assert_eq!(config.paths.volumes_dir, "volumes");
        assert_eq!(config.paths.diffs_dir, "diffs");
        assert_eq!(config.ownership, Ownership::new(65534, 65534));
    }

    #[test]
    fn load_rejects_garbage() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "paths = 3").unwrap();

        let err = DriverConfig::load(&path).unwrap_err();
        assert!(matches!(err, CopyFsError::Config { .. }));
    }

    #[test]
    fn load_missing_file() {
        let err = DriverConfig::load(Path::new("/nonexistent/copyfs.toml")).unwrap_err();
        assert!(matches!(err, CopyFsError::Config { .. }));
    }
}
