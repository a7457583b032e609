/*!
Local filesystem storage for state files.

Every call is a fresh whole-file operation: a write replaces the file's
complete content, a read returns it in full. No contents are cached.
*/

use std::fs;
use std::path::{Path, PathBuf};
use crate::{PersistError, Result};

/// Local filesystem storage
///
/// Paths are used as given, or joined onto an optional base directory.
/// Missing parent directories are created before writing.
///
/// # Example
/// ```rust
/// use persist_core::storage::LocalFileStorage;
///
/// let dir = tempfile::tempdir()?;
/// let storage = LocalFileStorage::with_base_dir(dir.path());
/// storage.write_text("settings/app.json", "{}")?;
/// assert_eq!(storage.read_text("settings/app.json")?, "{}");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocalFileStorage {
    /// Optional base directory for all state files
    base_dir: Option<PathBuf>,
}

impl LocalFileStorage {
    /// Storage that resolves paths relative to the working directory.
    pub fn new() -> Self {
        Self { base_dir: None }
    }

    /// Storage that resolves relative paths against `base_dir`.
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: Some(base_dir.as_ref().to_path_buf()),
        }
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Resolve the full path for a given storage path
    pub fn resolve_path<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(path),
            None => path.as_ref().to_path_buf(),
        }
    }

    /// Ensure the parent directory exists, creating it if necessary
    fn ensure_parent_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    PersistError::storage(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(())
    }

    pub fn write_bytes<P: AsRef<Path>>(&self, path: P, data: &[u8]) -> Result<()> {
        let full_path = self.resolve_path(path);
        self.ensure_parent_dir(&full_path)?;

        fs::write(&full_path, data).map_err(|e| {
            PersistError::storage(format!(
                "Failed to write state file {}: {}",
                full_path.display(),
                e
            ))
        })
    }

    pub fn write_text<P: AsRef<Path>>(&self, path: P, text: &str) -> Result<()> {
        self.write_bytes(path, text.as_bytes())
    }

    pub fn read_bytes<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>> {
        let full_path = self.resolve_path(path);

        fs::read(&full_path).map_err(|e| {
            PersistError::storage(format!(
                "Failed to read state file {}: {}",
                full_path.display(),
                e
            ))
        })
    }

    pub fn read_text<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let full_path = self.resolve_path(&path);
        let bytes = self.read_bytes(path)?;

        String::from_utf8(bytes).map_err(|e| {
            PersistError::invalid_format(format!(
                "State file {} is not valid UTF-8: {}",
                full_path.display(),
                e
            ))
        })
    }

    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.resolve_path(path).is_file()
    }

    /// Delete a state file. Returns whether a file was removed.
    pub fn delete<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        let full_path = self.resolve_path(path);

        if !full_path.exists() {
            return Ok(false);
        }

        fs::remove_file(&full_path).map_err(|e| {
            PersistError::storage(format!(
                "Failed to delete state file {}: {}",
                full_path.display(),
                e
            ))
        })?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_file_storage_basic_operations() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path());
        let path = "state.bin";

        storage.write_bytes(path, b"state bytes").unwrap();
        assert!(storage.exists(path));
        assert_eq!(storage.read_bytes(path).unwrap(), b"state bytes");

        assert!(storage.delete(path).unwrap());
        assert!(!storage.exists(path));
        assert!(!storage.delete(path).unwrap());
    }

    #[test]
    fn test_write_overwrites_whole_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path());

        storage.write_text("state.json", "a much longer first version").unwrap();
        storage.write_text("state.json", "short").unwrap();
        assert_eq!(storage.read_text("state.json").unwrap(), "short");
    }

    #[test]
    fn test_nested_directories_are_created() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path());
        let path = "Temp/nested/SomeClassFile.json";

        storage.write_text(path, "{}").unwrap();
        assert!(temp_dir.path().join(path).is_file());
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path());

        let result = storage.read_bytes("missing.json");
        assert!(matches!(result, Err(PersistError::Storage(_))));
    }

    #[test]
    fn test_read_text_rejects_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path());

        storage.write_bytes("state.json", &[0xff, 0xfe, 0x00]).unwrap();
        let result = storage.read_text("state.json");
        assert!(matches!(result, Err(PersistError::InvalidFormat(_))));
    }

    #[test]
    fn test_resolve_without_base_dir() {
        let storage = LocalFileStorage::new();
        assert_eq!(storage.resolve_path("a/b.json"), PathBuf::from("a/b.json"));
        assert!(storage.base_dir().is_none());
    }
}
