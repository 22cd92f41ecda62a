use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Key namespace shared by the command core and the tools that inspect the prefs file.
pub mod keys {
    pub const AUTO_REFRESH: &str = "DebugCommandAutoRefresh";
    pub const PROPERTY_PREFIX: &str = "DebugCommandProperty";
    pub const GROUP_FILTER: &str = "DebugCommandGroupFilter";
    pub const LAST_CATEGORY: &str = "LastDebugCommandCategoryName";
    pub const DELIMITER: &str = "_";

    /// Key under which a saved command property lives.
    pub fn property_key(category_name: &str, property_name: &str) -> String {
        format!("{PROPERTY_PREFIX}{DELIMITER}{category_name}{DELIMITER}{property_name}")
    }

    /// Prefix matching every saved property of one category, delimiter included.
    pub fn category_prefix(category_name: &str) -> String {
        format!("{PROPERTY_PREFIX}{DELIMITER}{category_name}{DELIMITER}")
    }
}

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("failed to read prefs file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write prefs file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse prefs file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// A value that can live in the string-typed prefs store.
pub trait PrefValue: Sized {
    fn to_pref(&self) -> String;
    fn from_pref(raw: &str) -> Option<Self>;
}

macro_rules! impl_pref_value_via_parse {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PrefValue for $ty {
                fn to_pref(&self) -> String {
                    self.to_string()
                }

                fn from_pref(raw: &str) -> Option<Self> {
                    raw.trim().parse::<$ty>().ok()
                }
            }
        )*
    };
}

impl_pref_value_via_parse!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64, Decimal);

impl PrefValue for bool {
    fn to_pref(&self) -> String {
        self.to_string()
    }

    fn from_pref(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }
}

impl PrefValue for char {
    fn to_pref(&self) -> String {
        self.to_string()
    }

    fn from_pref(raw: &str) -> Option<Self> {
        let mut chars = raw.chars();
        let first = chars.next()?;
        chars.next().is_none().then_some(first)
    }
}

impl PrefValue for String {
    fn to_pref(&self) -> String {
        self.clone()
    }

    fn from_pref(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct PrefsFile {
    keys: Vec<String>,
    values: Vec<String>,
}

#[derive(Debug, Default)]
pub struct PrefsStore {
    entries: IndexMap<String, String>,
    path: Option<PathBuf>,
}

impl PrefsStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a file-backed store. A missing or empty file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                entries: IndexMap::new(),
                path: Some(path),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| PrefsError::ReadFile {
            path: path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            warn!(path = %path.display(), "prefs file is empty; starting from defaults");
            return Ok(Self {
                entries: IndexMap::new(),
                path: Some(path),
            });
        }

        let file = serde_json::from_str::<PrefsFile>(&raw).map_err(|error| PrefsError::Parse {
            path: path.clone(),
            message: error.to_string(),
        })?;
        if file.keys.len() != file.values.len() {
            return Err(PrefsError::Parse {
                path,
                message: format!(
                    "expected matching key/value counts, got {} keys and {} values",
                    file.keys.len(),
                    file.values.len()
                ),
            });
        }

        let entries = file.keys.into_iter().zip(file.values).collect();
        Ok(Self {
            entries,
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the store back to its file. In-memory stores have nothing to do.
    pub fn save(&self) -> Result<(), PrefsError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let file = PrefsFile {
            keys: self.entries.keys().cloned().collect(),
            values: self.entries.values().cloned().collect(),
        };
        let text = serde_json::to_string(&file).map_err(|error| PrefsError::Parse {
            path: path.to_path_buf(),
            message: format!("failed to encode prefs json: {error}"),
        })?;
        replace_file_contents(path, &text).map_err(|source| PrefsError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), value.into());
    }

    /// Typed read. An unparsable stored value falls back to `default`.
    pub fn get<T: PrefValue>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.entries.get(key) else {
            return default;
        };
        match T::from_pref(raw) {
            Some(value) => value,
            None => {
                debug!(key, raw = %raw, "stored pref value does not parse; using default");
                default
            }
        }
    }

    pub fn set<T: PrefValue>(&mut self, key: &str, value: &T) {
        self.entries.insert(key.to_string(), value.to_pref());
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key, default)
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, &value);
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    pub fn delete_all(&mut self) {
        self.entries.clear();
    }
}

/// Stages `text` beside `path` and renames it into place.
fn replace_file_contents(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut staging = path.as_os_str().to_owned();
    staging.push(".saving");
    let staging = PathBuf::from(staging);

    fs::write(&staging, text)?;
    if let Err(error) = fs::rename(&staging, path) {
        if let Err(cleanup) = fs::remove_file(&staging) {
            warn!(
                path = %staging.display(),
                error = %cleanup,
                "failed to remove staged prefs file"
            );
        }
        return Err(error);
    }
    Ok(())
}

/// Cloneable handle to the store shared by the model and every persisting command.
#[derive(Clone, Debug, Default)]
pub struct PrefsHandle {
    store: Rc<RefCell<PrefsStore>>,
}

impl PrefsHandle {
    pub fn new(store: PrefsStore) -> Self {
        Self {
            store: Rc::new(RefCell::new(store)),
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.store.borrow().has_key(key)
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.store.borrow().keys_with_prefix(prefix)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.store.borrow().get_string(key, default)
    }

    pub fn set_string(&self, key: &str, value: impl Into<String>) {
        self.store.borrow_mut().set_string(key, value);
    }

    pub fn get<T: PrefValue>(&self, key: &str, default: T) -> T {
        self.store.borrow().get(key, default)
    }

    pub fn set<T: PrefValue>(&self, key: &str, value: &T) {
        self.store.borrow_mut().set(key, value);
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.store.borrow().get_bool(key, default)
    }

    pub fn set_bool(&self, key: &str, value: bool) {
        self.store.borrow_mut().set_bool(key, value);
    }

    pub fn delete(&self, key: &str) -> bool {
        self.store.borrow_mut().delete(key)
    }

    pub fn save(&self) -> Result<(), PrefsError> {
        self.store.borrow().save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_keys_use_prefix_and_delimiter() {
        assert_eq!(
            keys::property_key("Player", "Speed"),
            "DebugCommandProperty_Player_Speed"
        );
        assert!(keys::property_key("Player", "Speed").starts_with(&keys::category_prefix("Player")));
    }

    #[test]
    fn typed_accessors_round_trip_and_fall_back_on_garbage() {
        let mut store = PrefsStore::in_memory();
        store.set("int", &-42_i32);
        store.set("float", &0.25_f32);
        store.set("char", &'x');
        store.set_bool("flag", true);
        store.set_string("garbage", "not-a-number");

        assert_eq!(store.get("int", 0_i32), -42);
        assert_eq!(store.get("float", 0.0_f32), 0.25);
        assert_eq!(store.get("char", ' '), 'x');
        assert!(store.get_bool("flag", false));
        assert_eq!(store.get("garbage", 7_u8), 7);
        assert_eq!(store.get("missing", 9_u64), 9);
    }

    #[test]
    fn keys_with_prefix_keeps_insertion_order() {
        let mut store = PrefsStore::in_memory();
        store.set_string("b_second", "2");
        store.set_string("a_other", "x");
        store.set_string("b_first", "1");

        assert_eq!(store.keys_with_prefix("b_"), vec!["b_second", "b_first"]);
        assert!(store.delete("b_second"));
        assert!(!store.delete("b_second"));
        assert_eq!(store.keys_with_prefix("b_"), vec!["b_first"]);
    }

    #[test]
    fn file_store_saves_and_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");

        let mut store = PrefsStore::load(&path).expect("missing file is empty store");
        store.set("answer", &42_u32);
        store.set_bool(keys::AUTO_REFRESH, true);
        store.save().expect("save");

        let reloaded = PrefsStore::load(&path).expect("reload");
        assert_eq!(reloaded.get("answer", 0_u32), 42);
        assert!(reloaded.get_bool(keys::AUTO_REFRESH, false));
        assert_eq!(reloaded.keys().collect::<Vec<_>>(), vec!["answer", keys::AUTO_REFRESH]);
    }

    #[test]
    fn repeated_saves_replace_the_file_in_a_new_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("prefs.json");

        let mut store = PrefsStore::load(&path).expect("open");
        store.set_string("k", "first");
        store.save().expect("first save");
        store.set_string("k", "second");
        store.save().expect("second save");

        assert_eq!(PrefsStore::load(&path).expect("reload").get_string("k", ""), "second");
        assert!(!dir.path().join("nested").join("prefs.json.saving").exists());
    }

    #[test]
    fn failed_replace_removes_the_staged_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        let mut store = PrefsStore::load(&path).expect("open");
        fs::create_dir_all(path.join("occupied")).expect("block the target");

        store.set_string("k", "v");
        let error = store.save().expect_err("target is a directory");
        assert!(matches!(error, PrefsError::WriteFile { .. }), "{error}");
        assert!(!dir.path().join("prefs.json.saving").exists());
    }

    #[test]
    fn empty_file_loads_as_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        fs::write(&path, "  \n").expect("write");

        let store = PrefsStore::load(&path).expect("empty file");
        assert_eq!(store.keys().count(), 0);
    }

    #[test]
    fn mismatched_key_value_counts_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        fs::write(&path, r#"{"keys":["a","b"],"values":["1"]}"#).expect("write");

        let error = PrefsStore::load(&path).expect_err("count mismatch");
        assert!(matches!(error, PrefsError::Parse { .. }));
    }

    #[test]
    fn handle_clones_share_one_store() {
        let handle = PrefsHandle::in_memory();
        let other = handle.clone();
        other.set("shared", &5_i16);

        assert_eq!(handle.get("shared", 0_i16), 5);
        assert!(handle.delete("shared"));
        assert!(!other.has_key("shared"));
    }
}
