//! The copy driver.

use std::io::Read;

use copyfs_common::{CopyFsResult, DriverConfig, Identifier};

use crate::bundle::{self, RootFsDescriptor};
use crate::compose;
use crate::store::VolumeStore;

/// Operations a container runtime needs from a layer driver.
///
/// Callers serialize operations on the same layer id or bundle handle;
/// operations on distinct ones may run concurrently.
pub trait Driver {
    /// Materialize layer `id` from its parent and its own archive.
    ///
    /// An empty `parent_id` means the layer has no parent.
    ///
    /// # Errors
    ///
    /// Fails if the layer already exists, the parent cannot be copied or the
    /// archive cannot be extracted.
    fn unpack(&self, id: &str, parent_id: Option<&str>, archive: impl Read) -> CopyFsResult<()>;

    /// Assemble the root filesystem of container `handle` from `layer_ids`,
    /// ordered root to leaf.
    ///
    /// # Errors
    ///
    /// Fails if the chain is empty, the bundle already exists, or the leaf
    /// layer cannot be copied or remapped.
    fn bundle<S: AsRef<str>>(
        &self,
        handle: &str,
        layer_ids: &[S],
        privileged: bool,
    ) -> CopyFsResult<RootFsDescriptor>;

    /// Whether layer `id` exists.
    fn exists(&self, id: &str) -> bool;
}

/// Driver that stores every layer and bundle as a full physical copy.
#[derive(Debug, Clone)]
pub struct CopyDriver {
    config: DriverConfig,
    store: VolumeStore,
}

impl CopyDriver {
    /// Create a driver from `config`.
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        let store = VolumeStore::new(config.paths.clone());
        Self { config, store }
    }

    /// Driver configuration.
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Underlying volume store.
    #[must_use]
    pub const fn store(&self) -> &VolumeStore {
        &self.store
    }

    /// Delete layer `id`.
    ///
    /// # Errors
    ///
    /// Fails if the id is invalid, the layer does not exist or cannot be
    /// removed.
    pub fn delete(&self, id: &str) -> CopyFsResult<()> {
        let id = Identifier::new(id)?;
        tracing::info!(layer_id = %id, "Deleting layer");
        self.store.delete(&id)
    }

    /// Delete the root filesystem of container `handle`.
    ///
    /// # Errors
    ///
    /// Fails if the handle is invalid, the bundle does not exist or cannot be
    /// removed.
    pub fn remove_bundle(&self, handle: &str) -> CopyFsResult<()> {
        let handle = Identifier::new(handle)?;
        tracing::info!(handle = %handle, "Removing bundle");
        self.store.remove_bundle(&handle)
    }

    /// Ids of all stored layers.
    ///
    /// # Errors
    ///
    /// Fails if the layer directory cannot be read.
    pub fn layers(&self) -> CopyFsResult<Vec<String>> {
        self.store.list()
    }
}

impl Driver for CopyDriver {
    fn unpack(&self, id: &str, parent_id: Option<&str>, archive: impl Read) -> CopyFsResult<()> {
        let id = Identifier::new(id)?;
        let parent = parent_id
            .filter(|parent| !parent.is_empty())
            .map(Identifier::new)
            .transpose()?;

        tracing::info!(
            layer_id = %id,
            parent_id = parent.as_ref().map(Identifier::as_str),
            "Unpacking layer"
        );

        compose::unpack(&self.store, &id, parent.as_ref(), archive)?;

        tracing::info!(layer_id = %id, path = %self.store.path(id.as_str()).display(), "Layer unpacked");
        Ok(())
    }

    fn bundle<S: AsRef<str>>(
        &self,
        handle: &str,
        layer_ids: &[S],
        privileged: bool,
    ) -> CopyFsResult<RootFsDescriptor> {
        let handle = Identifier::new(handle)?;
        let layer_ids = layer_ids
            .iter()
            .map(|id| Identifier::new(id.as_ref()))
            .collect::<CopyFsResult<Vec<_>>>()?;

        tracing::info!(
            handle = %handle,
            layers = layer_ids.len(),
            privileged,
            "Creating bundle"
        );

        let rootfs = bundle::assemble(
            &self.store,
            &handle,
            &layer_ids,
            privileged,
            self.config.ownership,
        )?;

        tracing::info!(handle = %handle, path = %rootfs.path.display(), "Bundle created");
        Ok(rootfs)
    }

    fn exists(&self, id: &str) -> bool {
        Identifier::new(id).is_ok_and(|id| self.store.exists(id.as_str()))
    }
}
