/*!
Codec capability.

A codec turns a [`Snapshot`] into a textual or binary representation and
back. The engine never looks inside that representation; it only moves it
between the codec and the file. An engine is configured with exactly one
[`Codec`], which is either textual or binary.
*/

use std::fmt;

use crate::compression::{CompressionAdapter, GzipCompressor};
use crate::{naming, Result, Snapshot};

/// Codec producing a textual representation.
pub trait TextCodec: Send + Sync {
    fn serialize(&self, snapshot: &Snapshot, indented: bool) -> Result<String>;

    /// Decode `text`. Malformed content is an error, never a panic.
    fn deserialize(&self, text: &str) -> Result<Snapshot>;

    /// Identifier used for file extension matching.
    fn codec_name(&self) -> String {
        naming::short_type_name::<Self>()
    }
}

/// Codec producing an opaque byte representation.
pub trait BinaryCodec: Send + Sync {
    fn serialize(&self, snapshot: &Snapshot) -> Result<Vec<u8>>;

    /// Decode `bytes`. Malformed content is an error, never a panic.
    fn deserialize(&self, bytes: &[u8]) -> Result<Snapshot>;

    /// Identifier used for file extension matching.
    fn codec_name(&self) -> String {
        naming::short_type_name::<Self>()
    }
}

/// The single codec an engine works with.
pub enum Codec {
    Text(Box<dyn TextCodec>),
    Binary(Box<dyn BinaryCodec>),
}

impl Codec {
    pub fn text<C: TextCodec + 'static>(codec: C) -> Self {
        Codec::Text(Box::new(codec))
    }

    pub fn binary<C: BinaryCodec + 'static>(codec: C) -> Self {
        Codec::Binary(Box::new(codec))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Codec::Text(_))
    }

    pub fn codec_name(&self) -> String {
        match self {
            Codec::Text(codec) => codec.codec_name(),
            Codec::Binary(codec) => codec.codec_name(),
        }
    }

    /// Extension derived from the codec name, including the leading dot.
    pub fn default_extension(&self) -> &'static str {
        match self {
            Codec::Text(codec) => naming::text_extension(&codec.codec_name()),
            Codec::Binary(codec) => naming::binary_extension(&codec.codec_name()),
        }
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Text(_) => write!(f, "Codec::Text({})", self.codec_name()),
            Codec::Binary(_) => write!(f, "Codec::Binary({})", self.codec_name()),
        }
    }
}

/// JSON text codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTextCodec;

impl TextCodec for JsonTextCodec {
    fn serialize(&self, snapshot: &Snapshot, indented: bool) -> Result<String> {
        // JSON has no literal for infinity or NaN; serde_json would write null.
        if snapshot.iter().any(|(_, value)| value.has_non_finite_float()) {
            let mut portable = Snapshot::new();
            for (name, value) in snapshot.iter() {
                portable.insert(name, value.with_non_finite_as_text());
            }
            return self.serialize(&portable, indented);
        }

        let text = if indented {
            serde_json::to_string_pretty(snapshot)?
        } else {
            serde_json::to_string(snapshot)?
        };
        Ok(text)
    }

    fn deserialize(&self, text: &str) -> Result<Snapshot> {
        Ok(serde_json::from_str(text)?)
    }
}

/// TOML text codec.
///
/// TOML has no null, so records holding `PropertyValue::Null` fail to encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlTextCodec;

impl TextCodec for TomlTextCodec {
    fn serialize(&self, snapshot: &Snapshot, indented: bool) -> Result<String> {
        let text = if indented {
            toml::to_string_pretty(snapshot)?
        } else {
            toml::to_string(snapshot)?
        };
        Ok(text)
    }

    fn deserialize(&self, text: &str) -> Result<Snapshot> {
        Ok(toml::from_str(text)?)
    }
}

/// Compact binary codec backed by `bincode`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeBinaryCodec;

impl BinaryCodec for BincodeBinaryCodec {
    fn serialize(&self, snapshot: &Snapshot) -> Result<Vec<u8>> {
        Ok(bincode::serialize(snapshot)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Snapshot> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Binary codec whose output is run through a compression adapter.
#[derive(Debug, Clone)]
pub struct CompressedCodec<B = BincodeBinaryCodec, C = GzipCompressor> {
    inner: B,
    compressor: C,
}

impl<B, C> CompressedCodec<B, C> {
    pub fn new(inner: B, compressor: C) -> Self {
        Self { inner, compressor }
    }
}

impl CompressedCodec {
    /// Bincode output compressed with gzip.
    pub fn gzip_bincode() -> Self {
        Self::new(BincodeBinaryCodec, GzipCompressor::new())
    }
}

impl<B: BinaryCodec, C: CompressionAdapter> BinaryCodec for CompressedCodec<B, C> {
    fn serialize(&self, snapshot: &Snapshot) -> Result<Vec<u8>> {
        let encoded = self.inner.serialize(snapshot)?;
        self.compressor.compress(&encoded)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Snapshot> {
        let encoded = self.compressor.decompress(bytes)?;
        self.inner.deserialize(&encoded)
    }
}

impl From<JsonTextCodec> for Codec {
    fn from(codec: JsonTextCodec) -> Self {
        Codec::text(codec)
    }
}

impl From<TomlTextCodec> for Codec {
    fn from(codec: TomlTextCodec) -> Self {
        Codec::text(codec)
    }
}

impl From<BincodeBinaryCodec> for Codec {
    fn from(codec: BincodeBinaryCodec) -> Self {
        Codec::binary(codec)
    }
}

impl<B, C> From<CompressedCodec<B, C>> for Codec
where
    B: BinaryCodec + 'static,
    C: CompressionAdapter + 'static,
{
    fn from(codec: CompressedCodec<B, C>) -> Self {
        Codec::binary(codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PropertyValue;
    use crate::PersistError;

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert("Name", PropertyValue::Text("John".into()));
        snapshot.insert("Age", PropertyValue::Int(100));
        snapshot.insert(
            "Tags",
            PropertyValue::List(vec![PropertyValue::Text("admin".into())]),
        );
        snapshot
    }

    #[test]
    fn test_json_indentation_flag() {
        let codec = JsonTextCodec;
        let compact = codec.serialize(&sample(), false).unwrap();
        let pretty = codec.serialize(&sample(), true).unwrap();
        assert!(!compact.contains('\n'));
        assert!(pretty.contains('\n'));
        assert_eq!(codec.deserialize(&pretty).unwrap(), sample());
    }

    #[test]
    fn test_json_keeps_non_finite_floats() {
        let mut snapshot = sample();
        snapshot.insert("Reading", PropertyValue::Float(f64::INFINITY));

        let text = JsonTextCodec.serialize(&snapshot, false).unwrap();
        assert!(text.contains(r#""Reading":"inf""#));
        assert!(!text.contains("null"));

        let decoded = JsonTextCodec.deserialize(&text).unwrap();
        assert_eq!(decoded.get("Reading"), Some(&PropertyValue::Text("inf".into())));
        assert_eq!(decoded.get("Age"), Some(&PropertyValue::Int(100)));
    }

    #[test]
    fn test_json_malformed_is_error() {
        let result = JsonTextCodec.deserialize("{\"Name\": ");
        assert!(matches!(result, Err(PersistError::Json(_))));
    }

    #[test]
    fn test_toml_roundtrip_and_null() {
        let codec = TomlTextCodec;
        let text = codec.serialize(&sample(), true).unwrap();
        assert!(text.contains("Name = \"John\""));
        assert_eq!(codec.deserialize(&text).unwrap(), sample());

        let mut with_null = sample();
        with_null.insert("Nickname", PropertyValue::Null);
        assert!(codec.serialize(&with_null, false).is_err());
    }

    #[test]
    fn test_bincode_truncated_is_error() {
        let bytes = BincodeBinaryCodec.serialize(&sample()).unwrap();
        let result = BincodeBinaryCodec.deserialize(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(PersistError::Bincode(_))));
    }

    #[test]
    fn test_compressed_codec() {
        let codec = CompressedCodec::gzip_bincode();
        let bytes = codec.serialize(&sample()).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        assert_eq!(codec.deserialize(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_codec_names_and_extensions() {
        let json = Codec::from(JsonTextCodec);
        assert!(json.is_text());
        assert_eq!(json.codec_name(), "JsonTextCodec");
        assert_eq!(json.default_extension(), ".json");

        assert_eq!(Codec::from(TomlTextCodec).default_extension(), ".txt");
        assert_eq!(Codec::from(BincodeBinaryCodec).default_extension(), ".bin");

        let compressed = Codec::from(CompressedCodec::gzip_bincode());
        assert!(!compressed.is_text());
        assert_eq!(compressed.codec_name(), "CompressedCodec");
        assert_eq!(compressed.default_extension(), ".dat");
    }
}
