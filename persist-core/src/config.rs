//! Configuration for building engines
//!
//! An [`EngineConfig`] names the codec, the output style and an optional base
//! directory. It can be built in code or read from a TOML document.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::codec::{BincodeBinaryCodec, Codec, CompressedCodec, JsonTextCodec, TomlTextCodec};
use crate::storage::LocalFileStorage;
use crate::{FileEngine, PersistError, Result};

/// Enumeration of bundled codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodecKind {
    Json,
    Toml,
    Bincode,
    GzipBincode,
}

impl CodecKind {
    pub fn build(self) -> Codec {
        match self {
            CodecKind::Json => JsonTextCodec.into(),
            CodecKind::Toml => TomlTextCodec.into(),
            CodecKind::Bincode => BincodeBinaryCodec.into(),
            CodecKind::GzipBincode => CompressedCodec::gzip_bincode().into(),
        }
    }

    /// Guess the codec from a file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<CodecKind> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(CodecKind::Json),
            "toml" | "txt" => Some(CodecKind::Toml),
            "bin" => Some(CodecKind::Bincode),
            "dat" | "gz" => Some(CodecKind::GzipBincode),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CodecKind::Json => "json",
            CodecKind::Toml => "toml",
            CodecKind::Bincode => "bincode",
            CodecKind::GzipBincode => "gzip-bincode",
        }
    }
}

/// Configuration structure for engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Codec used for every save and load (required)
    pub codec: Option<CodecKind>,
    /// Indent text output
    pub indented: bool,
    /// Base directory for relative state file paths (defaults to the working directory)
    pub base_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            codec: None,
            indented: true,
            base_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn with_codec(codec: CodecKind) -> Self {
        Self {
            codec: Some(codec),
            ..Self::default()
        }
    }

    pub fn json() -> Self {
        Self::with_codec(CodecKind::Json)
    }

    pub fn bincode() -> Self {
        Self::with_codec(CodecKind::Bincode)
    }

    pub fn base_dir<P: Into<PathBuf>>(mut self, base_dir: P) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Parse a configuration from TOML, e.g. `codec = "json"`.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.codec.is_none() {
            return Err(PersistError::validation(
                "engine configuration requires a codec",
            ));
        }
        if let Some(base_dir) = &self.base_dir {
            if base_dir.as_os_str().is_empty() {
                return Err(PersistError::validation(
                    "base directory must not be empty when set",
                ));
            }
        }
        Ok(())
    }
}

/// Build an engine from configuration.
///
/// # Example
/// ```rust
/// use persist_core::{create_engine_from_config, EngineConfig};
///
/// let engine = create_engine_from_config(&EngineConfig::json())?;
/// assert!(engine.codec().is_text());
///
/// assert!(create_engine_from_config(&EngineConfig::default()).is_err());
/// # Ok::<(), persist_core::PersistError>(())
/// ```
pub fn create_engine_from_config(config: &EngineConfig) -> Result<FileEngine> {
    config.validate()?;

    let codec = config
        .codec
        .ok_or_else(|| PersistError::validation("engine configuration requires a codec"))?;

    let storage = match &config.base_dir {
        Some(base_dir) => LocalFileStorage::with_base_dir(base_dir),
        None => LocalFileStorage::new(),
    };

    Ok(FileEngine::new(codec.build())
        .indented(config.indented)
        .with_storage(storage))
}
