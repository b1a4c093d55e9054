//! # copyfs-common
//!
//! Shared types for the copyfs layer driver.
//!
//! This crate provides:
//! - Layer id and bundle handle validation
//! - The on-disk store layout
//! - Driver configuration and the ownership sentinel
//! - Common error types

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod id;
pub mod paths;

pub use config::{DriverConfig, Ownership, SENTINEL_ID};
pub use error::{CopyFsError, CopyFsResult};
pub use id::Identifier;
pub use paths::CopyFsPaths;
