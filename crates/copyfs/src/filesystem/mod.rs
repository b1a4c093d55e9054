//! Filesystem primitives used to build layers and bundles.
//!
//! This module handles:
//! - Layer archive extraction
//! - Attribute-preserving tree copies
//! - Recursive ownership remapping

mod archive;
mod remap;
mod tree;

pub use archive::extract;
pub use remap::remap;
pub use tree::copy_tree;
