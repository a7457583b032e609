/*!
Dynamic property values.

A [`PropertyValue`] is what one persisted property looks like once it leaves
its owning type. Human-readable formats (JSON, TOML) see the natural shape of
the value; compact binary formats that are not self-describing see an
explicitly tagged shape so the value can be decoded without a schema.
*/

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value of a single persisted property.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropertyValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    /// Only used for unsigned values that do not fit in an `i64`
    UInt(u64),
    Float(f64),
    Text(String),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

/// Conversion failure between a [`PropertyValue`] and a concrete Rust type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected {expected}, found {found}")]
pub struct ValueError {
    pub expected: &'static str,
    pub found: &'static str,
}

impl ValueError {
    pub fn new(expected: &'static str, found: &PropertyValue) -> Self {
        Self {
            expected,
            found: found.kind(),
        }
    }
}

impl PropertyValue {
    /// Short name of the variant, used in error messages and tooling.
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "integer",
            PropertyValue::UInt(_) => "unsigned integer",
            PropertyValue::Float(_) => "float",
            PropertyValue::Text(_) => "text",
            PropertyValue::List(_) => "list",
            PropertyValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value holds an infinite or NaN float at any depth.
    pub fn has_non_finite_float(&self) -> bool {
        match self {
            PropertyValue::Float(x) => !x.is_finite(),
            PropertyValue::List(items) => items.iter().any(PropertyValue::has_non_finite_float),
            PropertyValue::Map(map) => map.values().any(PropertyValue::has_non_finite_float),
            _ => false,
        }
    }

    /// Copy of this value with infinite and NaN floats written as the text
    /// `"inf"`, `"-inf"` and `"NaN"`, which `f64::from_value` reads back.
    pub fn with_non_finite_as_text(&self) -> PropertyValue {
        match self {
            PropertyValue::Float(x) if !x.is_finite() => PropertyValue::Text(x.to_string()),
            PropertyValue::List(items) => {
                PropertyValue::List(items.iter().map(PropertyValue::with_non_finite_as_text).collect())
            }
            PropertyValue::Map(map) => PropertyValue::Map(
                map.iter()
                    .map(|(key, item)| (key.clone(), item.with_non_finite_as_text()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn from_u64(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => PropertyValue::Int(i),
            Err(_) => PropertyValue::UInt(v),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => f.write_str("null"),
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Int(i) => write!(f, "{i}"),
            PropertyValue::UInt(u) => write!(f, "{u}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::Text(s) => write!(f, "{s:?}"),
            PropertyValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            PropertyValue::Map(map) => {
                f.write_str("{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

// Tagged shape used for formats that cannot describe their own contents.
// Variant order is part of the binary layout and matches `Tag` below.
#[derive(Serialize)]
#[serde(rename = "PropertyValue")]
enum TaggedRef<'a> {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(&'a str),
    List(&'a [PropertyValue]),
    Map(&'a BTreeMap<String, PropertyValue>),
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if !serializer.is_human_readable() {
            let tagged = match self {
                PropertyValue::Null => TaggedRef::Null,
                PropertyValue::Bool(b) => TaggedRef::Bool(*b),
                PropertyValue::Int(i) => TaggedRef::Int(*i),
                PropertyValue::UInt(u) => TaggedRef::UInt(*u),
                PropertyValue::Float(x) => TaggedRef::Float(*x),
                PropertyValue::Text(s) => TaggedRef::Text(s),
                PropertyValue::List(items) => TaggedRef::List(items),
                PropertyValue::Map(map) => TaggedRef::Map(map),
            };
            return tagged.serialize(serializer);
        }

        match self {
            PropertyValue::Null => serializer.serialize_unit(),
            PropertyValue::Bool(b) => serializer.serialize_bool(*b),
            PropertyValue::Int(i) => serializer.serialize_i64(*i),
            PropertyValue::UInt(u) => serializer.serialize_u64(*u),
            PropertyValue::Float(x) => serializer.serialize_f64(*x),
            PropertyValue::Text(s) => serializer.serialize_str(s),
            PropertyValue::List(items) => serializer.collect_seq(items),
            PropertyValue::Map(map) => serializer.collect_map(map),
        }
    }
}

impl<'de> Deserialize<'de> for PropertyValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ValueSeed { depth: 0 }.deserialize(deserializer)
    }
}

/// Deepest list or map nesting accepted when decoding.
pub const MAX_NESTING_DEPTH: usize = 128;

const VARIANTS: &[&str] = &["Null", "Bool", "Int", "UInt", "Float", "Text", "List", "Map"];

// Every nested list element or map value is decoded one level deeper, so a
// malformed file fails with an error instead of exhausting the stack.
#[derive(Clone, Copy)]
struct ValueSeed {
    depth: usize,
}

impl ValueSeed {
    fn nested<E: de::Error>(self) -> Result<Self, E> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(E::custom(format_args!(
                "property value nested deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }
        Ok(Self {
            depth: self.depth + 1,
        })
    }
}

impl<'de> DeserializeSeed<'de> for ValueSeed {
    type Value = PropertyValue;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(PropertyValueVisitor::new(self))
        } else {
            deserializer.deserialize_enum("PropertyValue", VARIANTS, TaggedVisitor { seed: self })
        }
    }
}

#[derive(Deserialize)]
#[serde(variant_identifier)]
enum Tag {
    Null,
    Bool,
    Int,
    UInt,
    Float,
    Text,
    List,
    Map,
}

struct TaggedVisitor {
    seed: ValueSeed,
}

impl<'de> Visitor<'de> for TaggedVisitor {
    type Value = PropertyValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a tagged property value")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Self::Value, A::Error> {
        let (tag, variant) = data.variant::<Tag>()?;
        match tag {
            Tag::Null => variant.unit_variant().map(|()| PropertyValue::Null),
            Tag::Bool => variant.newtype_variant().map(PropertyValue::Bool),
            Tag::Int => variant.newtype_variant().map(PropertyValue::Int),
            Tag::UInt => variant.newtype_variant().map(PropertyValue::UInt),
            Tag::Float => variant.newtype_variant().map(PropertyValue::Float),
            Tag::Text => variant.newtype_variant().map(PropertyValue::Text),
            Tag::List => variant.newtype_variant_seed(ListSeed(self.seed.nested()?)),
            Tag::Map => variant.newtype_variant_seed(MapSeed(self.seed.nested()?)),
        }
    }
}

struct ListSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for ListSeed {
    type Value = PropertyValue;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(PropertyValueVisitor::counted(self.0))
    }
}

struct MapSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for MapSeed {
    type Value = PropertyValue;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(PropertyValueVisitor::counted(self.0))
    }
}

struct PropertyValueVisitor {
    seed: ValueSeed,
    // Set when the tagged visitor already stepped down for this list or map.
    counted: bool,
}

impl PropertyValueVisitor {
    fn new(seed: ValueSeed) -> Self {
        Self { seed, counted: false }
    }

    fn counted(seed: ValueSeed) -> Self {
        Self { seed, counted: true }
    }

    fn children<E: de::Error>(&self) -> Result<ValueSeed, E> {
        if self.counted {
            Ok(self.seed)
        } else {
            self.seed.nested()
        }
    }
}

impl<'de> Visitor<'de> for PropertyValueVisitor {
    type Value = PropertyValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a property value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(PropertyValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(PropertyValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        self.seed.deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(PropertyValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(PropertyValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(PropertyValue::from_u64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(PropertyValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(PropertyValue::Text(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(PropertyValue::Text(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let element = self.children()?;
        // Cap the preallocation; the length prefix of a binary file is untrusted.
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element_seed(element)? {
            items.push(item);
        }
        Ok(PropertyValue::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let value = self.children()?;
        let mut map = BTreeMap::new();
        while let Some(key) = access.next_key::<String>()? {
            let item = access.next_value_seed(value)?;
            map.entry(key).or_insert(item);
        }
        Ok(PropertyValue::Map(map))
    }
}

/// Conversion of a property's Rust value into a [`PropertyValue`].
pub trait ToValue {
    fn to_value(&self) -> PropertyValue;
}

/// Conversion of a [`PropertyValue`] back into a property's Rust value.
pub trait FromValue: Sized {
    fn from_value(value: PropertyValue) -> Result<Self, ValueError>;
}

impl ToValue for PropertyValue {
    fn to_value(&self) -> PropertyValue {
        self.clone()
    }
}

impl FromValue for PropertyValue {
    fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> PropertyValue {
        PropertyValue::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
        match value {
            PropertyValue::Bool(b) => Ok(b),
            other => Err(ValueError::new("bool", &other)),
        }
    }
}

macro_rules! signed_value {
    ($($ty:ty),*) => {$(
        impl ToValue for $ty {
            fn to_value(&self) -> PropertyValue {
                PropertyValue::Int(i64::from(*self))
            }
        }

        impl FromValue for $ty {
            fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
                let out_of_range = ValueError::new(stringify!($ty), &value);
                match value {
                    PropertyValue::Int(i) => <$ty>::try_from(i).map_err(|_| out_of_range),
                    PropertyValue::UInt(u) => <$ty>::try_from(u).map_err(|_| out_of_range),
                    _ => Err(out_of_range),
                }
            }
        }
    )*};
}

macro_rules! unsigned_value {
    ($($ty:ty),*) => {$(
        impl ToValue for $ty {
            fn to_value(&self) -> PropertyValue {
                PropertyValue::from_u64(*self as u64)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
                let out_of_range = ValueError::new(stringify!($ty), &value);
                match value {
                    PropertyValue::Int(i) => <$ty>::try_from(i).map_err(|_| out_of_range),
                    PropertyValue::UInt(u) => <$ty>::try_from(u).map_err(|_| out_of_range),
                    _ => Err(out_of_range),
                }
            }
        }
    )*};
}

signed_value!(i8, i16, i32, i64);
unsigned_value!(u8, u16, u32, u64, usize);

impl ToValue for isize {
    fn to_value(&self) -> PropertyValue {
        PropertyValue::Int(*self as i64)
    }
}

impl FromValue for isize {
    fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
        i64::from_value(value.clone())
            .and_then(|i| isize::try_from(i).map_err(|_| ValueError::new("isize", &value)))
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> PropertyValue {
        PropertyValue::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
        match &value {
            PropertyValue::Float(x) => Ok(*x),
            // Whole numbers written by a text codec come back as integers.
            PropertyValue::Int(i) => Ok(*i as f64),
            PropertyValue::UInt(u) => Ok(*u as f64),
            // Non-finite values from formats without a literal for them.
            PropertyValue::Text(s) => match s.parse::<f64>() {
                Ok(x) if !x.is_finite() => Ok(x),
                _ => Err(ValueError::new("f64", &value)),
            },
            _ => Err(ValueError::new("f64", &value)),
        }
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> PropertyValue {
        PropertyValue::Float(f64::from(*self))
    }
}

impl FromValue for f32 {
    fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
        f64::from_value(value).map(|x| x as f32)
    }
}

impl ToValue for String {
    fn to_value(&self) -> PropertyValue {
        PropertyValue::Text(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
        match value {
            PropertyValue::Text(s) => Ok(s),
            other => Err(ValueError::new("text", &other)),
        }
    }
}

impl ToValue for char {
    fn to_value(&self) -> PropertyValue {
        PropertyValue::Text(self.to_string())
    }
}

impl FromValue for char {
    fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
        if let PropertyValue::Text(s) = &value {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Ok(c);
            }
        }
        Err(ValueError::new("single character", &value))
    }
}

impl<V: ToValue> ToValue for Option<V> {
    fn to_value(&self) -> PropertyValue {
        match self {
            Some(v) => v.to_value(),
            None => PropertyValue::Null,
        }
    }
}

impl<V: FromValue> FromValue for Option<V> {
    fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
        match value {
            PropertyValue::Null => Ok(None),
            other => V::from_value(other).map(Some),
        }
    }
}

impl<V: ToValue> ToValue for Vec<V> {
    fn to_value(&self) -> PropertyValue {
        PropertyValue::List(self.iter().map(ToValue::to_value).collect())
    }
}

impl<V: FromValue> FromValue for Vec<V> {
    fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
        match value {
            PropertyValue::List(items) => items.into_iter().map(V::from_value).collect(),
            other => Err(ValueError::new("list", &other)),
        }
    }
}

impl<V: ToValue> ToValue for BTreeMap<String, V> {
    fn to_value(&self) -> PropertyValue {
        PropertyValue::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }
}

impl<V: FromValue> FromValue for BTreeMap<String, V> {
    fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
        match value {
            PropertyValue::Map(map) => map
                .into_iter()
                .map(|(k, v)| V::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(ValueError::new("map", &other)),
        }
    }
}

impl<V: ToValue> ToValue for HashMap<String, V> {
    fn to_value(&self) -> PropertyValue {
        PropertyValue::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }
}

impl<V: FromValue> FromValue for HashMap<String, V> {
    fn from_value(value: PropertyValue) -> Result<Self, ValueError> {
        BTreeMap::<String, V>::from_value(value).map(|map| map.into_iter().collect())
    }
}
