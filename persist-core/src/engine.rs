/*!
File persistence engine.

[`FileEngine`] saves and loads whole state files through exactly one
configured [`Codec`]. All of its file operations, across every engine in the
process, run inside the single [`PersistLock`] critical section.

Usage errors (a blank path) are returned as `Err`. Operational failures (I/O,
malformed content, type mismatches) are reported to the [`PersistLogger`] and
turned into `Ok(false)` for saves and `Ok(None)` for loads.
*/

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::codec::Codec;
use crate::lock::{PersistGuard, PersistLock};
use crate::logger::{NoopLogger, PersistLogger};
use crate::storage::LocalFileStorage;
use crate::{PersistError, Persisted, Result, Snapshot};

/// Saves and loads state files with a single codec.
///
/// # Example
/// ```rust
/// use persist_core::{persisted, FileEngine, JsonTextCodec};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct SomeClass { name: String, age: u32 }
///
/// persisted!(SomeClass { "Name" => name, "Age" => age });
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("Temp/SomeClassFile.json");
/// let engine = FileEngine::new(JsonTextCodec);
///
/// let john = SomeClass { name: "John".into(), age: 100 };
/// assert!(engine.save(&path, &john)?);
/// assert_eq!(engine.load::<SomeClass, _>(&path)?, Some(john));
/// assert_eq!(engine.load::<SomeClass, _>(dir.path().join("nonCorrectFile"))?, None);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct FileEngine {
    codec: Codec,
    logger: Arc<dyn PersistLogger>,
    storage: LocalFileStorage,
    indented: bool,
}

impl FileEngine {
    /// Create an engine that reports to the no-op logger.
    pub fn new(codec: impl Into<Codec>) -> Self {
        Self::with_logger(codec, Arc::new(NoopLogger))
    }

    pub fn with_logger(codec: impl Into<Codec>, logger: Arc<dyn PersistLogger>) -> Self {
        Self {
            codec: codec.into(),
            logger,
            storage: LocalFileStorage::new(),
            indented: true,
        }
    }

    /// Whether text codecs produce indented output. Defaults to `true`.
    pub fn indented(mut self, indented: bool) -> Self {
        self.indented = indented;
        self
    }

    /// Resolve paths through `storage` instead of the working directory.
    pub fn with_storage(mut self, storage: LocalFileStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn storage(&self) -> &LocalFileStorage {
        &self.storage
    }

    pub fn is_indented(&self) -> bool {
        self.indented
    }

    /// Save the declared properties of `value` to `path`, replacing the file.
    ///
    /// Returns `Ok(true)` when the file was fully written, `Ok(false)` when
    /// encoding or writing failed (the failure is logged).
    ///
    /// # Errors
    /// * `PersistError::InvalidArgument` - If `path` is blank
    pub fn save<T, P>(&self, path: P, value: &T) -> Result<bool>
    where
        T: Persisted,
        P: AsRef<Path>,
    {
        let path = checked_path(path.as_ref())?;
        let _guard = self.enter("save", path);
        let snapshot = Snapshot::capture(value);
        Ok(self.store(path, &snapshot, &T::type_name()))
    }

    /// Save an already captured record to `path`.
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P, snapshot: &Snapshot) -> Result<bool> {
        let path = checked_path(path.as_ref())?;
        let _guard = self.enter("save", path);
        Ok(self.store(path, snapshot, "record"))
    }

    /// Load the raw record stored at `path`.
    ///
    /// Returns `Ok(None)` when the file is missing, unreadable or malformed.
    pub fn load_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<Option<Snapshot>> {
        let path = checked_path(path.as_ref())?;
        let _guard = self.enter("load", path);
        Ok(self.fetch(path, "record"))
    }

    /// Load `path` as a `T`, together with the record it was decoded from.
    pub fn load_with_snapshot<T, P>(&self, path: P) -> Result<Option<(T, Snapshot)>>
    where
        T: Persisted,
        P: AsRef<Path>,
    {
        let path = checked_path(path.as_ref())?;
        let type_name = T::type_name();
        let _guard = self.enter("load", path);

        let Some(snapshot) = self.fetch(path, &type_name) else {
            return Ok(None);
        };

        match snapshot.to_value::<T>() {
            Ok(value) => Ok(Some((value, snapshot))),
            Err(e) => {
                self.report_load_failure(&e, path, &type_name);
                Ok(None)
            }
        }
    }

    /// Load `path` as a `T`.
    ///
    /// Returns `Ok(None)` on any operational failure, including a stored
    /// property whose value does not fit the declared property type.
    ///
    /// # Errors
    /// * `PersistError::InvalidArgument` - If `path` is blank
    pub fn load<T, P>(&self, path: P) -> Result<Option<T>>
    where
        T: Persisted,
        P: AsRef<Path>,
    {
        Ok(self.load_with_snapshot(path)?.map(|(value, _)| value))
    }

    /// Load `path` as a `T`, or `T::default()` when nothing could be loaded.
    pub fn load_or_default<T, P>(&self, path: P) -> Result<T>
    where
        T: Persisted,
        P: AsRef<Path>,
    {
        Ok(self.load(path)?.unwrap_or_default())
    }

    /// Whether a state file exists at `path`.
    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();
        let _guard = self.enter("exists", path);
        self.storage.exists(path)
    }

    /// Delete the state file at `path`. Returns whether a file was removed.
    pub fn delete<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        let path = checked_path(path.as_ref())?;
        let _guard = self.enter("delete", path);

        match self.storage.delete(path) {
            Ok(removed) => {
                if removed {
                    self.logger
                        .info(&format!("Deleted state file {}", path.display()));
                }
                Ok(removed)
            }
            Err(e) => {
                self.logger.error(
                    &e,
                    &format!("Failed to delete state file {}", path.display()),
                );
                Ok(false)
            }
        }
    }

    fn enter(&self, operation: &'static str, path: &Path) -> PersistGuard {
        let guard = PersistLock::acquire();
        debug!(
            operation,
            path = %path.display(),
            codec = %self.codec.codec_name(),
            waited_us = guard.waited().as_micros() as u64,
            "entered persistence critical section"
        );
        #[cfg(feature = "metrics")]
        crate::observability::PersistMetrics::global().record_lock_wait(guard.waited());
        guard
    }

    fn store(&self, path: &Path, snapshot: &Snapshot, type_name: &str) -> bool {
        match self.encode_and_write(path, snapshot) {
            Ok(size) => {
                debug!(path = %path.display(), size, "state saved");
                #[cfg(feature = "metrics")]
                crate::observability::PersistMetrics::global().record_save(size);
                self.logger
                    .info(&format!("Saved {type_name} to {}", path.display()));
                true
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "state save failed");
                #[cfg(feature = "metrics")]
                crate::observability::PersistMetrics::global().record_save_failure();
                self.logger.error(
                    &e,
                    &format!("Failed to save {type_name} to {}", path.display()),
                );
                false
            }
        }
    }

    fn fetch(&self, path: &Path, type_name: &str) -> Option<Snapshot> {
        match self.read_and_decode(path) {
            Ok(snapshot) => {
                debug!(path = %path.display(), properties = snapshot.len(), "state loaded");
                #[cfg(feature = "metrics")]
                crate::observability::PersistMetrics::global().record_load();
                self.logger
                    .info(&format!("Loaded {type_name} from {}", path.display()));
                Some(snapshot)
            }
            Err(e) => {
                self.report_load_failure(&e, path, type_name);
                None
            }
        }
    }

    fn report_load_failure(&self, error: &PersistError, path: &Path, type_name: &str) {
        debug!(path = %path.display(), error = %error, "state load failed");
        #[cfg(feature = "metrics")]
        crate::observability::PersistMetrics::global().record_load_failure();
        self.logger.error(
            error,
            &format!("Failed to load {type_name} from {}", path.display()),
        );
    }

    fn encode_and_write(&self, path: &Path, snapshot: &Snapshot) -> Result<usize> {
        match &self.codec {
            Codec::Text(codec) => {
                let text = codec.serialize(snapshot, self.indented)?;
                self.storage.write_text(path, &text)?;
                Ok(text.len())
            }
            Codec::Binary(codec) => {
                let bytes = codec.serialize(snapshot)?;
                self.storage.write_bytes(path, &bytes)?;
                Ok(bytes.len())
            }
        }
    }

    fn read_and_decode(&self, path: &Path) -> Result<Snapshot> {
        match &self.codec {
            Codec::Text(codec) => {
                let text = self.storage.read_text(path)?;
                codec.deserialize(&text)
            }
            Codec::Binary(codec) => {
                let bytes = self.storage.read_bytes(path)?;
                codec.deserialize(&bytes)
            }
        }
    }
}

impl std::fmt::Debug for FileEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEngine")
            .field("codec", &self.codec)
            .field("storage", &self.storage)
            .field("indented", &self.indented)
            .finish_non_exhaustive()
    }
}

fn checked_path(path: &Path) -> Result<&Path> {
    if path.as_os_str().to_string_lossy().trim().is_empty() {
        return Err(PersistError::invalid_argument("file path must not be blank"));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BincodeBinaryCodec, JsonTextCodec};
    use crate::logger::MockPersistLogger;
    use crate::{persisted, PropertyValue};
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq)]
    struct SomeClass {
        name: String,
        age: u32,
    }

    persisted!(SomeClass { "Name" => name, "Age" => age });

    fn john() -> SomeClass {
        SomeClass {
            name: "John".to_string(),
            age: 100,
        }
    }

    #[test]
    fn test_blank_path_is_rejected() {
        let engine = FileEngine::new(JsonTextCodec);
        for path in ["", "   "] {
            assert!(matches!(
                engine.save(path, &john()),
                Err(PersistError::InvalidArgument(_))
            ));
            assert!(matches!(
                engine.load::<SomeClass, _>(path),
                Err(PersistError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_json_file_contains_declared_properties() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("SomeClassFile.json");
        let engine = FileEngine::new(JsonTextCodec).indented(false);

        assert!(engine.save(&path, &john()).unwrap());
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, r#"{"Name":"John","Age":100}"#);
    }

    #[test]
    fn test_binary_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("SomeClass.bin");
        let engine = FileEngine::new(BincodeBinaryCodec);

        assert!(engine.save(&path, &john()).unwrap());
        assert_eq!(engine.load::<SomeClass, _>(&path).unwrap(), Some(john()));
    }

    #[test]
    fn test_missing_file_loads_as_none_or_default() {
        let temp_dir = TempDir::new().unwrap();
        let engine = FileEngine::new(JsonTextCodec);
        let path = temp_dir.path().join("nonCorrectFile");

        assert_eq!(engine.load::<SomeClass, _>(&path).unwrap(), None);
        assert_eq!(engine.load_snapshot(&path).unwrap(), None);
        assert_eq!(
            engine.load_or_default::<SomeClass, _>(&path).unwrap(),
            SomeClass::default()
        );
    }

    #[test]
    fn test_type_mismatch_loads_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("SomeClass.json");
        std::fs::write(&path, r#"{"Name": "John", "Age": "very old"}"#).unwrap();

        let engine = FileEngine::new(JsonTextCodec);
        assert_eq!(engine.load::<SomeClass, _>(&path).unwrap(), None);

        let raw = engine.load_snapshot(&path).unwrap().unwrap();
        assert_eq!(
            raw.get("Age"),
            Some(&PropertyValue::Text("very old".to_string()))
        );
    }

    #[test]
    fn test_wrong_codec_loads_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("SomeClass.bin");
        FileEngine::new(BincodeBinaryCodec).save(&path, &john()).unwrap();

        let engine = FileEngine::new(JsonTextCodec);
        assert_eq!(engine.load::<SomeClass, _>(&path).unwrap(), None);
    }

    #[test]
    fn test_outcomes_are_reported_to_logger() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("SomeClass.json");

        let mut logger = MockPersistLogger::new();
        logger
            .expect_info()
            .withf(|message| message.starts_with("Saved SomeClass"))
            .times(1)
            .return_const(());
        logger
            .expect_error()
            .withf(|error, message| {
                matches!(error, PersistError::Storage(_))
                    && message.starts_with("Failed to load SomeClass")
            })
            .times(1)
            .return_const(());

        let engine = FileEngine::with_logger(JsonTextCodec, Arc::new(logger));
        assert!(engine.save(&path, &john()).unwrap());
        assert_eq!(
            engine
                .load::<SomeClass, _>(temp_dir.path().join("missing.json"))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_save_failure_returns_false() {
        let temp_dir = TempDir::new().unwrap();
        // A directory cannot be overwritten with file content.
        let engine = FileEngine::new(JsonTextCodec);
        assert!(!engine.save(temp_dir.path(), &john()).unwrap());
    }

    #[test]
    fn test_delete_and_exists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("SomeClass.json");
        let engine = FileEngine::new(JsonTextCodec);

        assert!(!engine.exists(&path));
        engine.save(&path, &john()).unwrap();
        assert!(engine.exists(&path));
        assert!(engine.delete(&path).unwrap());
        assert!(!engine.exists(&path));
        assert!(!engine.delete(&path).unwrap());
    }

    #[test]
    fn test_base_dir_storage() {
        let temp_dir = TempDir::new().unwrap();
        let engine = FileEngine::new(JsonTextCodec)
            .with_storage(LocalFileStorage::with_base_dir(temp_dir.path()));

        assert!(engine.save("state/SomeClass.json", &john()).unwrap());
        assert!(temp_dir.path().join("state/SomeClass.json").is_file());
    }
}
