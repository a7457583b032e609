/*!
Persistable state: a value that owns its engine and file path.

[`PersistableState`] wraps a [`Persisted`] value together with the
[`FileEngine`] that stores it and the path it is stored at. Loading merges
the stored properties into the live value by name; properties missing from
the file keep their in-memory values.
*/

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use crate::codec::Codec;
use crate::engine::FileEngine;
use crate::{naming, PersistError, Persisted, Result, Snapshot};

/// Where a state is in its load lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Uninitialized,
    Loaded,
    LoadFailed,
}

/// Handle returned by [`PersistableState::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&str) + Send>;

/// A [`Persisted`] value bound to an engine and a file path.
///
/// # Example
/// ```rust
/// use persist_core::{persisted, JsonTextCodec, LoadStatus, PersistableState};
///
/// #[derive(Default)]
/// struct SomeStoredData { greeting: String }
///
/// persisted!(SomeStoredData { "Greeting" => greeting });
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("SomeStoredData.json");
///
/// let mut first = PersistableState::with_path(SomeStoredData::default(), JsonTextCodec, &path);
/// assert!(!first.load_state()?);
/// assert_eq!(first.status(), LoadStatus::LoadFailed);
///
/// first.greeting = "hello".to_string();
/// assert!(first.save_state()?);
///
/// let mut second = PersistableState::with_path(SomeStoredData::default(), JsonTextCodec, &path);
/// assert!(second.load_state()?);
/// assert_eq!(second.greeting, "hello");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct PersistableState<T: Persisted> {
    data: T,
    engine: Option<FileEngine>,
    path: Option<PathBuf>,
    status: LoadStatus,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl<T: Persisted> PersistableState<T> {
    /// Bind `data` to `codec`, stored at the default file name for `T`.
    pub fn new(data: T, codec: impl Into<Codec>) -> Self {
        Self::with_engine(data, FileEngine::new(codec), None::<PathBuf>)
    }

    /// Bind `data` to `codec`, stored at `path`.
    pub fn with_path(data: T, codec: impl Into<Codec>, path: impl Into<PathBuf>) -> Self {
        Self::with_engine(data, FileEngine::new(codec), Some(path))
    }

    /// Bind `data` to a configured engine. Without a path the default file
    /// name for `T` and the engine's codec is used.
    pub fn with_engine<P: Into<PathBuf>>(data: T, engine: FileEngine, path: Option<P>) -> Self {
        let path = path
            .map(Into::into)
            .unwrap_or_else(|| PathBuf::from(naming::default_file_name(&T::type_name(), engine.codec())));
        Self {
            data,
            engine: Some(engine),
            path: Some(path),
            status: LoadStatus::Uninitialized,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn get(&self) -> &T {
        &self.data
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn into_inner(self) -> T {
        self.data
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    /// Path the state is saved to, `None` for a state built without a codec.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn engine(&self) -> Option<&FileEngine> {
        self.engine.as_ref()
    }

    fn bound(&self) -> Result<(&FileEngine, &Path)> {
        match (&self.engine, &self.path) {
            (Some(engine), Some(path)) => Ok((engine, path.as_path())),
            _ => Err(PersistError::MissingCodec {
                type_name: T::type_name(),
            }),
        }
    }

    /// Write the current value to the state file.
    ///
    /// Always attempts the write, regardless of earlier load results.
    ///
    /// # Errors
    /// * `PersistError::MissingCodec` - If the state was built without a codec
    pub fn save_state(&self) -> Result<bool> {
        let (engine, path) = self.bound()?;
        engine.save(path, &self.data)
    }

    /// Merge the stored state into the current value.
    ///
    /// On success every declared property present in the file is overwritten,
    /// [`Persisted::on_load_complete`] runs and `Ok(true)` is returned. On
    /// failure the value is untouched, [`Persisted::on_load_fail`] runs and
    /// `Ok(false)` is returned. Change subscribers are not notified.
    ///
    /// # Errors
    /// * `PersistError::MissingCodec` - If the state was built without a codec
    pub fn load_state(&mut self) -> Result<bool> {
        let (engine, path) = self.bound()?;
        let loaded = engine.load_with_snapshot::<T, _>(path)?;

        let merged = match loaded {
            Some((loaded, snapshot)) => merge_properties(&loaded, &mut self.data, &snapshot).is_ok(),
            None => false,
        };

        if merged {
            self.status = LoadStatus::Loaded;
            self.data.on_load_complete();
        } else {
            self.status = LoadStatus::LoadFailed;
            self.data.on_load_fail();
        }
        Ok(merged)
    }

    /// Delete the state file. Returns whether a file was removed.
    pub fn delete_state(&self) -> Result<bool> {
        let (engine, path) = self.bound()?;
        engine.delete(path)
    }

    /// Register a callback invoked with the property name on every change
    /// notification.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&str) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    /// Invoke every subscriber, in subscription order, with `property`.
    pub fn notify_property_changed(&mut self, property: &str) {
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(property);
        }
    }

    /// Mutate the value, then notify subscribers that `property` changed.
    pub fn update<R>(&mut self, property: &str, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut self.data);
        self.notify_property_changed(property);
        result
    }
}

/// Parameterless construction: no codec and no path.
///
/// Such a state can hold and hand out its value, but `save_state` and
/// `load_state` fail with [`PersistError::MissingCodec`].
impl<T: Persisted> Default for PersistableState<T> {
    fn default() -> Self {
        Self {
            data: T::default(),
            engine: None,
            path: None,
            status: LoadStatus::Uninitialized,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }
}

impl<T: Persisted> Deref for PersistableState<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T: Persisted> DerefMut for PersistableState<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

impl<T: Persisted + std::fmt::Debug> std::fmt::Debug for PersistableState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistableState")
            .field("data", &self.data)
            .field("path", &self.path)
            .field("status", &self.status)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Copy from `source` into `target` every declared property whose name is in
/// `present`. Names are matched case-sensitively; for duplicate declarations
/// only the first is used.
pub fn merge_properties<T: Persisted>(source: &T, target: &mut T, present: &Snapshot) -> Result<usize> {
    let mut merged = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for property in T::properties() {
        if seen.insert(property.name()) && present.contains(property.name()) {
            merged.push((property.get(source), property));
        }
    }
    let count = merged.len();
    for (value, property) in merged {
        property.set(target, value)?;
    }
    Ok(count)
}
