/*!
Error types for the Persist core engine.

Errors fall into two classes. Usage errors (a blank path, a state without a
codec, an invalid configuration) are returned to the caller immediately.
Operational errors (I/O, malformed content, type mismatches) never escape
`save`/`load`; the engine logs them and reports `false` or `None` instead.
*/

use thiserror::Error;

use crate::value::ValueError;

/// Result type used throughout the Persist core.
pub type Result<T> = std::result::Result<T, PersistError>;

/// Errors that can occur during persistence operations.
#[derive(Error, Debug)]
pub enum PersistError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bincode serialization/deserialization errors
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// Compression/decompression errors
    #[error("Compression error: {0}")]
    Compression(String),

    /// Storage errors (reading, writing or deleting a state file)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid argument passed by the caller (blank path and the like)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Persistable state used for save/load without any codec configured
    #[error("Persistable state of type {type_name} has no codec; construct it with a text or binary codec")]
    MissingCodec { type_name: String },

    /// A stored property could not be converted to the declared property type
    #[error("Type mismatch for property '{property}': {source}")]
    TypeMismatch {
        property: String,
        #[source]
        source: ValueError,
    },

    /// Content that decoded but is not a property record
    #[error("Invalid state file format: {0}")]
    InvalidFormat(String),
}

impl PersistError {
    /// Create a new compression error
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Self::Compression(msg.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a new invalid format error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Create a type mismatch error for the named property
    pub fn type_mismatch<S: Into<String>>(property: S, source: ValueError) -> Self {
        Self::TypeMismatch {
            property: property.into(),
            source,
        }
    }

    /// Whether this error reports programmer misuse rather than a runtime failure.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::MissingCodec { .. } | Self::Validation(_)
        )
    }
}
