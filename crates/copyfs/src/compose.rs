//! Layer composition.
//!
//! A layer directory always holds the complete filesystem of the layer: the
//! parent's (already complete) tree with the layer's own archive extracted
//! on top. A child never needs to look further up the chain than its parent.

use std::io::Read;
use std::path::Path;

use copyfs_common::{CopyFsResult, Identifier};

use crate::filesystem;
use crate::store::{self, VolumeStore};

/// Materialize layer `id` from `parent` and `archive`.
///
/// The parent's tree is copied first when the parent directory has content;
/// an empty or missing parent contributes nothing. Archive entries then
/// overwrite parent entries at the same path.
///
/// If the copy or the extraction fails, the new layer directory is removed
/// again so the layer never appears to exist half-built.
///
/// # Errors
///
/// - [`Creation`](copyfs_common::CopyFsError::Creation) if the layer already
///   exists or its directory cannot be created.
/// - [`Copy`](copyfs_common::CopyFsError::Copy) if the parent tree cannot be
///   copied.
/// - [`Extract`](copyfs_common::CopyFsError::Extract) if the archive cannot be
///   extracted.
pub fn unpack(
    store: &VolumeStore,
    id: &Identifier,
    parent: Option<&Identifier>,
    archive: impl Read,
) -> CopyFsResult<()> {
    let dest = store.create_layer_dir(id)?;

    if let Err(e) = populate(store, id, parent, archive, &dest) {
        store::discard(&dest);
        return Err(e);
    }

    Ok(())
}

fn populate(
    store: &VolumeStore,
    id: &Identifier,
    parent: Option<&Identifier>,
    archive: impl Read,
    dest: &Path,
) -> CopyFsResult<()> {
    if let Some(parent) = parent {
        let parent_dir = store.path(parent.as_str());

        if !parent_dir.is_dir() {
            tracing::warn!(
                layer_id = %id,
                parent_id = %parent,
                "Parent layer not found, unpacking without it"
            );
        } else if store::is_empty_dir(&parent_dir) {
            tracing::debug!(layer_id = %id, parent_id = %parent, "Parent layer is empty");
        } else {
            tracing::debug!(layer_id = %id, parent_id = %parent, "Copying parent layer");
            filesystem::copy_tree(&parent_dir, dest)?;
        }
    }

    filesystem::extract(archive, dest)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use copyfs_common::{CopyFsError, CopyFsPaths};
    use tempfile::tempdir;

    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    fn tar_of(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in files {
            let owner = u64::from(rustix::process::geteuid().as_raw());
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_uid(owner);
            header.set_gid(owner);
            header.set_mtime(1_600_000_000);
            builder
                .append_data(&mut header, path, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn unpack_without_parent() {
        let temp = tempdir().unwrap();
        let store = VolumeStore::new(CopyFsPaths::with_root(temp.path()));

        unpack(&store, &id("base"), None, tar_of(&[("foo/bar", "bar")]).as_slice()).unwrap();

        let layer = store.path("base");
        assert_eq!(fs::read_to_string(layer.join("foo/bar")).unwrap(), "bar");
    }

    #[test]
    fn child_folds_in_parent() {
        let temp = tempdir().unwrap();
        let store = VolumeStore::new(CopyFsPaths::with_root(temp.path()));

        let parent_tar = tar_of(&[("i/am/parent", "parent"), ("shared", "old")]);
        unpack(&store, &id("parent"), None, parent_tar.as_slice()).unwrap();
        fs::set_permissions(
            store.path("parent").join("i/am/parent"),
            fs::Permissions::from_mode(0o600),
        )
        .unwrap();

        let child_tar = tar_of(&[("foo/bar", "bar"), ("shared", "new")]);
        unpack(&store, &id("child"), Some(&id("parent")), child_tar.as_slice()).unwrap();

        let child = store.path("child");
        assert_eq!(fs::read_to_string(child.join("i/am/parent")).unwrap(), "parent");
        assert_eq!(
            fs::metadata(child.join("i/am/parent")).unwrap().permissions().mode() & 0o777,
            0o600
        );
        assert_eq!(fs::read_to_string(child.join("foo/bar")).unwrap(), "bar");
        assert_eq!(fs::read_to_string(child.join("shared")).unwrap(), "new");

        // The parent is left as it was.
        let parent = store.path("parent");
        assert_eq!(fs::read_to_string(parent.join("shared")).unwrap(), "old");
        assert!(!parent.join("foo").exists());
    }

    #[test]
    fn empty_parent_is_skipped() {
        let temp = tempdir().unwrap();
        let store = VolumeStore::new(CopyFsPaths::with_root(temp.path()));

        unpack(&store, &id("empty"), None, tar_of(&[]).as_slice()).unwrap();
        assert!(store::is_empty_dir(&store.path("empty")));

        unpack(&store, &id("child"), Some(&id("empty")), tar_of(&[("a", "a")]).as_slice())
            .unwrap();
        assert_eq!(fs::read_dir(store.path("child")).unwrap().count(), 1);
    }

    #[test]
    fn missing_parent_is_skipped() {
        let temp = tempdir().unwrap();
        let store = VolumeStore::new(CopyFsPaths::with_root(temp.path()));

        unpack(&store, &id("orphan"), Some(&id("ghost")), tar_of(&[("a", "a")]).as_slice())
            .unwrap();
        assert!(store.exists("orphan"));
    }

    #[test]
    fn failed_extraction_removes_layer() {
        let temp = tempdir().unwrap();
        let store = VolumeStore::new(CopyFsPaths::with_root(temp.path()));

        let garbage = vec![0x5au8; 2048];
        let err = unpack(&store, &id("broken"), None, garbage.as_slice()).unwrap_err();

        assert!(matches!(err, CopyFsError::Extract { .. }));
        assert!(!store.exists("broken"));
    }

    #[test]
    fn failed_parent_copy_removes_layer() {
        if rustix::process::geteuid().is_root() {
            eprintln!("skipping: root can read unreadable files");
            return;
        }

        let temp = tempdir().unwrap();
        let store = VolumeStore::new(CopyFsPaths::with_root(temp.path()));
        let parent = store.create_layer_dir(&id("parent")).unwrap();
        fs::write(parent.join("secret"), "x").unwrap();
        fs::set_permissions(parent.join("secret"), fs::Permissions::from_mode(0o000)).unwrap();

        let err = unpack(&store, &id("child"), Some(&id("parent")), tar_of(&[]).as_slice())
            .unwrap_err();

        match err {
            CopyFsError::Copy { diagnostic, .. } => {
                assert!(diagnostic.contains("secret"), "diagnostic: {diagnostic}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!store.exists("child"));
        assert!(store.exists("parent"));
    }

    #[test]
    fn duplicate_unpack_leaves_first_layer_intact() {
        let temp = tempdir().unwrap();
        let store = VolumeStore::new(CopyFsPaths::with_root(temp.path()));

        unpack(&store, &id("layer"), None, tar_of(&[("first", "1")]).as_slice()).unwrap();
        let err = unpack(&store, &id("layer"), None, tar_of(&[("second", "2")]).as_slice())
            .unwrap_err();

        assert!(matches!(err, CopyFsError::Creation { .. }));
        let layer = store.path("layer");
        assert!(layer.join("first").exists());
        assert!(!layer.join("second").exists());
    }
}
