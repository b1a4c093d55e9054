//! Common error types for copyfs.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`CopyFsError`].
pub type CopyFsResult<T> = Result<T, CopyFsError>;

/// Errors produced by the layer driver.
#[derive(Error, Diagnostic, Debug)]
pub enum CopyFsError {
    /// A layer or bundle directory could not be created.
    #[error("Failed to create directory {}: {source}", path.display())]
    #[diagnostic(
        code(copyfs::creation),
        help("The layer id or bundle handle may already be in use")
    )]
    Creation {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Recursive copy of a layer tree failed.
    #[error(
        "Failed to copy {} to {}: {diagnostic}: {source}",
        source_dir.display(),
        dest_dir.display()
    )]
    #[diagnostic(code(copyfs::copy))]
    Copy {
        /// Tree being copied.
        source_dir: PathBuf,
        /// Destination of the copy.
        dest_dir: PathBuf,
        /// What the copy was doing when it failed.
        diagnostic: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Archive extraction failed.
    #[error("Failed to extract archive into {}: {source}", path.display())]
    #[diagnostic(
        code(copyfs::extract),
        help("The archive must be a tar stream, optionally gzip or zstd compressed")
    )]
    Extract {
        /// Extraction destination.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Changing ownership of an entry failed.
    #[error("Failed to change ownership of {}: {source}", path.display())]
    #[diagnostic(
        code(copyfs::remap),
        help("Remapping ownership requires CAP_CHOWN; run as root or bundle as privileged")
    )]
    Remap {
        /// Entry whose ownership could not be changed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Layer id or bundle handle cannot be used as a directory name.
    #[error("Invalid identifier {id:?}: {reason}")]
    #[diagnostic(
        code(copyfs::invalid_identifier),
        help("Identifiers must be a single path component: non-empty, no '/', not '.' or '..'")
    )]
    InvalidIdentifier {
        /// The rejected identifier.
        id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A bundle was requested without any layers.
    #[error("Bundle {handle} requires at least one layer")]
    #[diagnostic(code(copyfs::empty_layer_chain))]
    EmptyLayerChain {
        /// The bundle handle.
        handle: String,
    },

    /// Layer not found.
    #[error("Layer not found: {id}")]
    #[diagnostic(code(copyfs::layer::not_found))]
    LayerNotFound {
        /// The layer id that was not found.
        id: String,
    },

    /// Bundle not found.
    #[error("Bundle not found: {handle}")]
    #[diagnostic(code(copyfs::bundle::not_found))]
    BundleNotFound {
        /// The bundle handle that was not found.
        handle: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(copyfs::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(copyfs::io))]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for CopyFsError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}
