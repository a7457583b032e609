//! Default file name derivation.
//!
//! A state without an explicit path is stored at `<TypeName><Extension>`,
//! relative to the working directory. The extension is picked by matching
//! the codec's name, case-insensitively, against a fixed keyword table.

use crate::codec::Codec;

const TEXT_EXTENSIONS: &[(&str, &str)] = &[
    ("json", ".json"),
    ("xml", ".xml"),
    ("soap", ".soap"),
    ("yaml", ".yml"),
];
const TEXT_FALLBACK: &str = ".txt";

const BINARY_EXTENSIONS: &[(&str, &str)] = &[
    ("binary", ".bin"),
    ("protobuf", ".ptb"),
    ("messagepack", ".msp"),
];
const BINARY_FALLBACK: &str = ".dat";

/// Type name without module path or generic arguments.
///
/// `my_app::settings::Store<u32>` becomes `Store`.
pub fn short_type_name<T: ?Sized>() -> String {
    strip_type_name(std::any::type_name::<T>()).to_string()
}

/// Strip module path, generic arguments and any `` `N `` arity suffix from a type name.
pub fn strip_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    let base = base.rsplit("::").next().unwrap_or(base);
    base.split('`').next().unwrap_or(base).trim()
}

fn match_keyword(codec_name: &str, table: &[(&str, &'static str)], fallback: &'static str) -> &'static str {
    let lowered = codec_name.to_ascii_lowercase();
    table
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, extension)| *extension)
        .unwrap_or(fallback)
}

/// Extension for a text codec with the given name.
pub fn text_extension(codec_name: &str) -> &'static str {
    match_keyword(codec_name, TEXT_EXTENSIONS, TEXT_FALLBACK)
}

/// Extension for a binary codec with the given name.
pub fn binary_extension(codec_name: &str) -> &'static str {
    match_keyword(codec_name, BINARY_EXTENSIONS, BINARY_FALLBACK)
}

/// Default file name for a type stored with `codec`.
pub fn default_file_name(type_name: &str, codec: &Codec) -> String {
    format!("{}{}", strip_type_name(type_name), codec.default_extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SomeStoredData;
    struct Wrapper<T>(T);

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<SomeStoredData>(), "SomeStoredData");
        assert_eq!(short_type_name::<Wrapper<SomeStoredData>>(), "Wrapper");
        assert_eq!(short_type_name::<u32>(), "u32");
    }

    #[test]
    fn test_strip_type_name() {
        assert_eq!(strip_type_name("app::state::Store<alloc::string::String>"), "Store");
        assert_eq!(strip_type_name("Store`1"), "Store");
        assert_eq!(strip_type_name("Plain"), "Plain");
    }

    #[test]
    fn test_text_extensions() {
        assert_eq!(text_extension("JsonTextCodec"), ".json");
        assert_eq!(text_extension("NewtonsoftJSONSerializer"), ".json");
        assert_eq!(text_extension("XmlSerializer"), ".xml");
        assert_eq!(text_extension("SoapFormatter"), ".soap");
        assert_eq!(text_extension("YamlCodec"), ".yml");
        assert_eq!(text_extension("TomlTextCodec"), ".txt");
    }

    #[test]
    fn test_binary_extensions() {
        assert_eq!(binary_extension("BincodeBinaryCodec"), ".bin");
        assert_eq!(binary_extension("ProtobufCodec"), ".ptb");
        assert_eq!(binary_extension("MessagePackCodec"), ".msp");
        assert_eq!(binary_extension("CompressedCodec"), ".dat");
    }
}
