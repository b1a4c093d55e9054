//! Layer id and bundle handle validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CopyFsError, CopyFsResult};

/// A validated layer id or bundle handle.
///
/// Identifiers name a single directory under the store, so they must:
/// - Be 1-255 bytes long
/// - Not be `.` or `..`
/// - Contain no `/` and no NUL byte
///
/// Anything else is opaque: digests such as `sha256:abc` are accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Maximum length of an identifier in bytes.
    pub const MAX_LENGTH: usize = 255;

    /// Create a new identifier, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`CopyFsError::InvalidIdentifier`] if the id cannot be used
    /// as a directory name.
    pub fn new(id: impl Into<String>) -> CopyFsResult<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> CopyFsResult<()> {
        let reason = if id.is_empty() {
            "must not be empty"
        } else if id.len() > Self::MAX_LENGTH {
            "must be at most 255 bytes"
        } else if id == "." || id == ".." {
            "must not be a relative directory reference"
        } else if id.contains('/') {
            "must not contain '/'"
        } else if id.contains('\0') {
            "must not contain NUL"
        } else {
            return Ok(());
        };

        Err(CopyFsError::InvalidIdentifier {
            id: id.to_string(),
            reason,
        })
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = CopyFsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = CopyFsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
