/*!
# Persist Core Engine

Save the public property state of an in-memory value to a single file and
restore it later, through a pluggable text or binary codec.

- [`Persisted`] types declare their property surface as named getter/setter pairs
- [`FileEngine`] performs whole-file saves and loads with exactly one [`Codec`],
  inside one process-wide critical section
- [`PersistableState`] binds a value to an engine and a file path, merges loaded
  properties by name and exposes load lifecycle hooks and change notification

## Usage

```rust
use persist_core::{persisted, JsonTextCodec, PersistableState};

#[derive(Default)]
struct Settings { theme: String, font_size: u32 }

persisted!(Settings { "Theme" => theme, "FontSize" => font_size });

let dir = tempfile::tempdir()?;
let path = dir.path().join("Settings.json");

let mut settings = PersistableState::with_path(Settings::default(), JsonTextCodec, &path);
settings.theme = "dark".to_string();
settings.save_state()?;

let mut restored = PersistableState::with_path(Settings::default(), JsonTextCodec, &path);
restored.load_state()?;
assert_eq!(restored.theme, "dark");
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

pub mod codec;
pub mod compression;
pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod logger;
pub mod naming;
pub mod observability;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod value;


pub use codec::{BinaryCodec, BincodeBinaryCodec, Codec, CompressedCodec, JsonTextCodec, TextCodec, TomlTextCodec};
pub use compression::{CompressionAdapter, GzipCompressor};
pub use config::{create_engine_from_config, CodecKind, EngineConfig};
pub use engine::FileEngine;
pub use error::{PersistError, Result};
pub use lock::PersistLock;
pub use logger::{NoopLogger, PersistLogger, TracingLogger};
pub use snapshot::{Persisted, Property, Snapshot};
pub use state::{LoadStatus, PersistableState, SubscriptionId};
pub use storage::LocalFileStorage;
pub use value::{FromValue, PropertyValue, ToValue, ValueError};
