//! # copyfs-oci
//!
//! OCI runtime specification types produced by copyfs.
//!
//! Only the parts of `config.json` that a layer driver fills in are modelled:
//! the root filesystem and a handful of top-level fields. Everything else is
//! the container runtime's business.

#![warn(missing_docs)]

pub mod runtime;

pub use runtime::{Root, Spec};
