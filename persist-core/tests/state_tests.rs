/*!
Integration tests for persistable state: naming, lifecycle and merge-on-load.
*/

use persist_core::{
    BincodeBinaryCodec, FileEngine, JsonTextCodec, LoadStatus, LocalFileStorage, Persisted,
    PersistableState, Property,
};
use std::path::Path;
use tempfile::TempDir;

#[derive(Debug, Default, Clone, PartialEq)]
struct SomeStoredData {
    title: String,
    count: u32,
    tags: Vec<String>,
    // Runtime-only state, never persisted.
    dirty: bool,
    load_completed: bool,
    load_failed: bool,
}

impl Persisted for SomeStoredData {
    fn properties() -> Vec<Property<Self>> {
        vec![
            Property::field("Title", |d: &SomeStoredData| &d.title, |d: &mut SomeStoredData| &mut d.title),
            Property::field("Count", |d: &SomeStoredData| &d.count, |d: &mut SomeStoredData| &mut d.count),
            Property::field("Tags", |d: &SomeStoredData| &d.tags, |d: &mut SomeStoredData| &mut d.tags),
        ]
    }

    fn on_load_complete(&mut self) {
        self.load_completed = true;
    }

    fn on_load_fail(&mut self) {
        self.load_failed = true;
    }
}

fn engine_in(dir: &TempDir) -> FileEngine {
    FileEngine::new(JsonTextCodec).with_storage(LocalFileStorage::with_base_dir(dir.path()))
}

#[test]
fn test_default_file_name_is_type_and_extension() {
    let temp_dir = TempDir::new().unwrap();
    let mut state = PersistableState::with_engine(SomeStoredData::default(), engine_in(&temp_dir), None::<&Path>);
    assert_eq!(state.path(), Some(Path::new("SomeStoredData.json")));

    state.title = "named".to_string();
    assert!(state.save_state().unwrap());
    assert!(temp_dir.path().join("SomeStoredData.json").is_file());
}

#[test]
fn test_first_run_load_fails() {
    let temp_dir = TempDir::new().unwrap();
    let mut state = PersistableState::with_engine(SomeStoredData::default(), engine_in(&temp_dir), None::<&Path>);

    assert_eq!(state.status(), LoadStatus::Uninitialized);
    assert!(!state.load_state().unwrap());
    assert_eq!(state.status(), LoadStatus::LoadFailed);
    assert!(state.load_failed);
    assert!(!state.load_completed);
    assert_eq!(state.title, "");
}

#[test]
fn test_second_instance_sees_saved_state() {
    let temp_dir = TempDir::new().unwrap();

    let mut first = PersistableState::with_engine(SomeStoredData::default(), engine_in(&temp_dir), None::<&Path>);
    first.title = "inventory".to_string();
    first.count = 42;
    first.tags = vec!["a".to_string(), "b".to_string()];
    first.dirty = true;
    assert!(first.save_state().unwrap());

    let mut second = PersistableState::with_engine(SomeStoredData::default(), engine_in(&temp_dir), None::<&Path>);
    assert!(second.load_state().unwrap());
    assert_eq!(second.status(), LoadStatus::Loaded);
    assert!(second.load_completed);
    assert_eq!(second.title, first.title);
    assert_eq!(second.count, first.count);
    assert_eq!(second.tags, first.tags);
    // Not part of the persisted surface.
    assert!(!second.dirty);
}

#[test]
fn test_load_merges_only_stored_properties() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("SomeStoredData.json"),
        r#"{ "Count": 7, "Obsolete": "ignored" }"#,
    )
    .unwrap();

    let live = SomeStoredData {
        title: "kept".to_string(),
        count: 1,
        tags: vec!["kept".to_string()],
        ..SomeStoredData::default()
    };
    let mut state = PersistableState::with_engine(live, engine_in(&temp_dir), None::<&Path>);

    assert!(state.load_state().unwrap());
    assert_eq!(state.count, 7);
    assert_eq!(state.title, "kept");
    assert_eq!(state.tags, vec!["kept".to_string()]);
}

#[test]
fn test_merge_matches_names_case_sensitively() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("SomeStoredData.json"),
        r#"{ "title": "lower", "COUNT": 99, "Tags": ["stored"] }"#,
    )
    .unwrap();

    let live = SomeStoredData {
        title: "kept".to_string(),
        count: 5,
        ..SomeStoredData::default()
    };
    let mut state = PersistableState::with_engine(live, engine_in(&temp_dir), None::<&Path>);

    assert!(state.load_state().unwrap());
    assert_eq!(state.title, "kept");
    assert_eq!(state.count, 5);
    assert_eq!(state.tags, vec!["stored".to_string()]);
}

#[test]
fn test_failed_load_keeps_values() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("SomeStoredData.json"),
        r#"{ "Title": "new", "Count": "not a number" }"#,
    )
    .unwrap();

    let live = SomeStoredData {
        title: "old".to_string(),
        count: 3,
        ..SomeStoredData::default()
    };
    let mut state = PersistableState::with_engine(live, engine_in(&temp_dir), None::<&Path>);

    assert!(!state.load_state().unwrap());
    assert_eq!(state.status(), LoadStatus::LoadFailed);
    assert_eq!(state.title, "old");
    assert_eq!(state.count, 3);
}

#[test]
fn test_save_after_failed_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.bin");

    let mut state = PersistableState::with_path(SomeStoredData::default(), BincodeBinaryCodec, &path);
    assert!(!state.load_state().unwrap());

    state.count = 9;
    assert!(state.save_state().unwrap());
    assert!(state.load_state().unwrap());
    assert_eq!(state.status(), LoadStatus::Loaded);
    assert_eq!(state.count, 9);
}

#[test]
fn test_delete_state() {
    let temp_dir = TempDir::new().unwrap();
    let state = PersistableState::with_engine(SomeStoredData::default(), engine_in(&temp_dir), None::<&Path>);

    assert!(!state.delete_state().unwrap());
    state.save_state().unwrap();
    assert!(state.delete_state().unwrap());
    assert!(!temp_dir.path().join("SomeStoredData.json").exists());
}
