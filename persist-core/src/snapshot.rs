/*!
Persisted property surface of a type and the record captured from it.

Rust has no runtime reflection, so a persisted type declares its surface
explicitly through [`Persisted::properties`]: an ordered list of named
getter/setter pairs. Both the snapshot taken before serialization and the
by-name merge performed after loading are driven off that list.
*/

use std::collections::HashSet;
use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::value::{FromValue, PropertyValue, ToValue, ValueError};
use crate::{naming, PersistError, Result};

type Getter<T> = Box<dyn Fn(&T) -> PropertyValue + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, PropertyValue) -> std::result::Result<(), ValueError> + Send + Sync>;

/// A named, readable and writable property of `T`.
pub struct Property<T> {
    name: &'static str,
    getter: Getter<T>,
    setter: Setter<T>,
}

impl<T: 'static> Property<T> {
    /// Declare a property from explicit conversion closures.
    pub fn new<G, S>(name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&T) -> PropertyValue + Send + Sync + 'static,
        S: Fn(&mut T, PropertyValue) -> std::result::Result<(), ValueError> + Send + Sync + 'static,
    {
        Self {
            name,
            getter: Box::new(get),
            setter: Box::new(set),
        }
    }

    /// Declare a property backed by a field, given its shared and mutable accessors.
    ///
    /// # Example
    /// ```rust
    /// use persist_core::Property;
    ///
    /// #[derive(Default)]
    /// struct Window { width: u32 }
    ///
    /// let width = Property::field("Width", |w: &Window| &w.width, |w: &mut Window| &mut w.width);
    /// assert_eq!(width.name(), "Width");
    /// ```
    pub fn field<V, G, M>(name: &'static str, get: G, get_mut: M) -> Self
    where
        V: ToValue + FromValue + 'static,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        Self::new(
            name,
            move |target| get(target).to_value(),
            move |target, value| {
                *get_mut(target) = V::from_value(value)?;
                Ok(())
            },
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, target: &T) -> PropertyValue {
        (self.getter)(target)
    }

    pub fn set(&self, target: &mut T, value: PropertyValue) -> Result<()> {
        (self.setter)(target, value).map_err(|e| PersistError::type_mismatch(self.name, e))
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property").field("name", &self.name).finish()
    }
}

/// A type whose state can be saved to and restored from a file.
///
/// `Default` provides the blank instance that decoded records are applied to;
/// it must not carry side effects such as registering subscribers or touching
/// the file system.
pub trait Persisted: Default + 'static {
    /// The persisted surface, in declaration order. When two entries share a
    /// name, only the first one is used.
    fn properties() -> Vec<Property<Self>>;

    /// Name used when deriving a default file name.
    fn type_name() -> String {
        naming::short_type_name::<Self>()
    }

    /// Called after a successful load has been merged into this instance.
    fn on_load_complete(&mut self) {}

    /// Called after a load attempt failed; the instance is left unchanged.
    fn on_load_fail(&mut self) {}
}

/// Implement [`Persisted`] for a struct from a list of `"Name" => field` pairs.
///
/// ```rust
/// use persist_core::{persisted, Persisted};
///
/// #[derive(Default)]
/// struct Settings { theme: String, font_size: u32 }
///
/// persisted!(Settings { "Theme" => theme, "FontSize" => font_size });
///
/// assert_eq!(Settings::properties().len(), 2);
/// assert_eq!(Settings::type_name(), "Settings");
/// ```
#[macro_export]
macro_rules! persisted {
    ($ty:ty { $($name:literal => $field:ident),* $(,)? }) => {
        impl $crate::Persisted for $ty {
            fn properties() -> ::std::vec::Vec<$crate::Property<Self>> {
                ::std::vec![
                    $($crate::Property::field(
                        $name,
                        |target: &Self| &target.$field,
                        |target: &mut Self| &mut target.$field,
                    ),)*
                ]
            }
        }
    };
}

/// Plain record of a value's declared properties.
///
/// This is what codecs serialize. Entry order follows declaration order and
/// names are unique.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Vec<(String, PropertyValue)>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every declared property of `value` into a fresh record.
    pub fn capture<T: Persisted>(value: &T) -> Self {
        let mut snapshot = Self::new();
        for property in T::properties() {
            if !snapshot.contains(property.name()) {
                snapshot
                    .entries
                    .push((property.name().to_string(), property.get(value)));
            }
        }
        snapshot
    }

    /// Set a property, replacing any existing entry with the same name.
    pub fn insert<S: Into<String>>(&mut self, name: S, value: PropertyValue) -> Option<PropertyValue> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set every declared property of `target` whose name is present in this
    /// record. Properties without a matching entry keep their current value.
    /// Returns the number of properties that were set.
    ///
    /// On a type mismatch `target` may already have been partly updated; use
    /// [`Snapshot::to_value`] to decode into a fresh instance instead.
    pub fn apply_to<T: Persisted>(&self, target: &mut T) -> Result<usize> {
        let mut seen = HashSet::new();
        let mut applied = 0;
        for property in T::properties() {
            if !seen.insert(property.name()) {
                continue;
            }
            if let Some(value) = self.get(property.name()) {
                property.set(target, value.clone())?;
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Decode this record into a blank `T`.
    pub fn to_value<T: Persisted>(&self) -> Result<T> {
        let mut value = T::default();
        self.apply_to(&mut value)?;
        Ok(value)
    }
}

// Records are compared as sets of named values; entry order carries no meaning.
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl FromIterator<(String, PropertyValue)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for (name, value) in iter {
            if !snapshot.contains(&name) {
                snapshot.entries.push((name, value));
            }
        }
        snapshot
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(n, v)| (n, v)))
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(SnapshotVisitor)
    }
}

struct SnapshotVisitor;

impl<'de> Visitor<'de> for SnapshotVisitor {
    type Value = Snapshot;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a record of named properties")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Snapshot, A::Error> {
        let mut snapshot = Snapshot::new();
        while let Some((name, value)) = access.next_entry::<String, PropertyValue>()? {
            if !snapshot.contains(&name) {
                snapshot.entries.push((name, value));
            }
        }
        Ok(snapshot)
    }
}
