//! Bundle assembly.
//!
//! A bundle is a private, writable copy of the leaf layer of a chain. Since
//! every layer already contains its ancestors, only the leaf is copied.

use std::path::{Path, PathBuf};

use copyfs_common::{CopyFsError, CopyFsResult, Identifier, Ownership};
use copyfs_oci::{Root, Spec};
use serde::{Deserialize, Serialize};

use crate::filesystem;
use crate::store::{self, VolumeStore};

/// Root filesystem of an assembled bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootFsDescriptor {
    /// Bundle handle.
    pub handle: String,
    /// Root filesystem directory.
    pub path: PathBuf,
    /// Whether the root filesystem should be mounted read-only.
    pub readonly: bool,
}

impl RootFsDescriptor {
    /// OCI `root` section for this bundle.
    #[must_use]
    pub fn to_root(&self) -> Root {
        Root {
            path: self.path.clone(),
            readonly: self.readonly,
        }
    }

    /// Minimal OCI runtime spec pointing at this bundle.
    #[must_use]
    pub fn to_spec(&self) -> Spec {
        Spec::with_root(self.to_root())
    }
}

impl From<RootFsDescriptor> for Root {
    fn from(descriptor: RootFsDescriptor) -> Self {
        Self {
            path: descriptor.path,
            readonly: descriptor.readonly,
        }
    }
}

/// Assemble bundle `handle` from `layer_ids` (root first, leaf last).
///
/// Unless `privileged`, every non-symlink entry of the bundle is given
/// `ownership`. A missing or empty leaf layer gives an empty bundle.
///
/// If the copy or the remap fails, the bundle directory is removed again.
///
/// # Errors
///
/// - [`EmptyLayerChain`](CopyFsError::EmptyLayerChain) if `layer_ids` is empty.
/// - [`Creation`](CopyFsError::Creation) if the bundle already exists or its
///   directory cannot be created.
/// - [`Copy`](CopyFsError::Copy) if the leaf layer cannot be copied.
/// - [`Remap`](CopyFsError::Remap) if ownership cannot be changed.
pub fn assemble(
    store: &VolumeStore,
    handle: &Identifier,
    layer_ids: &[Identifier],
    privileged: bool,
    ownership: Ownership,
) -> CopyFsResult<RootFsDescriptor> {
    let leaf = layer_ids
        .last()
        .ok_or_else(|| CopyFsError::EmptyLayerChain {
            handle: handle.to_string(),
        })?;

    let dest = store.create_diff_dir(handle)?;

    if let Err(e) = populate(store, handle, leaf, &dest, privileged, ownership) {
        store::discard(&dest);
        return Err(e);
    }

    Ok(RootFsDescriptor {
        handle: handle.to_string(),
        path: dest,
        readonly: false,
    })
}

fn populate(
    store: &VolumeStore,
    handle: &Identifier,
    leaf: &Identifier,
    dest: &Path,
    privileged: bool,
    ownership: Ownership,
) -> CopyFsResult<()> {
    let volume = store.path(leaf.as_str());

    if !volume.is_dir() {
        tracing::warn!(handle = %handle, layer_id = %leaf, "Leaf layer not found, bundle is empty");
    } else if store::is_empty_dir(&volume) {
        tracing::debug!(handle = %handle, layer_id = %leaf, "Leaf layer is empty");
    } else {
        tracing::debug!(handle = %handle, layer_id = %leaf, "Copying leaf layer");
        filesystem::copy_tree(&volume, dest)?;
    }

    if privileged {
        tracing::debug!(handle = %handle, "Privileged bundle, keeping ownership");
        return Ok(());
    }

    filesystem::remap(dest, ownership)
}
