use std::{env, io, sync::Mutex};

use serde_json::{Map, Value};

use crate::{config::APP_NAME, *};

/// The key under which [`Preferences`] are saved.
pub const PREFERENCES_KEY: &str = "preferences";

const PREFERENCES_FILE: &str = "config.json";

/// A small key-value store that persists values between runs.
pub trait PreferenceStore: Send + Sync {
	fn get(&self, key: &str) -> AppResult<Option<Value>>;

	fn set(&self, key: &str, value: Value) -> AppResult;

	/// Removes every stored value.
	fn clear(&self) -> AppResult;
}

/// Reads the saved preferences. Missing preferences result in an empty set.
pub fn load_preferences(store: &dyn PreferenceStore) -> AppResult<Preferences> {
	match store.get(PREFERENCES_KEY)? {
		Some(value) => serde_json::from_value(value).map_err(|e| AppError::DeserializationError {
			file: PathBuf::from(PREFERENCES_KEY),
			error: e.to_string(),
		}),
		None => Ok(Preferences::default()),
	}
}

pub fn save_preferences(store: &dyn PreferenceStore, preferences: &Preferences) -> AppResult {
	let value = serde_json::to_value(preferences).map_err(|e| AppError::SerializationError {
		file: PathBuf::from(PREFERENCES_KEY),
		error: e.to_string(),
	})?;

	store.set(PREFERENCES_KEY, value)
}

/// Returns the directory that holds the preferences file, looking for `XDG_CONFIG_HOME` first and `~/.config` after.
pub fn default_preferences_dir() -> Option<PathBuf> {
	let xdg_config = if let Ok(env_val) = env::var("XDG_CONFIG_HOME") {
		Some(PathBuf::from(env_val))
	} else {
		env::home_dir().map(|home| home.join(".config"))
	};

	xdg_config.map(|dir| dir.join(APP_NAME))
}

/// A store backed by a single JSON file holding an object.
#[derive(Debug, Clone)]
pub struct JsonFilePreferenceStore {
	path: PathBuf,
}

impl JsonFilePreferenceStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Uses the default preferences file, if a config directory can be found.
	pub fn from_default_location() -> Option<Self> {
		default_preferences_dir().map(|dir| Self::new(dir.join(PREFERENCES_FILE)))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read(&self) -> AppResult<Map<String, Value>> {
		let content = match std::fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
			Err(e) => {
				return Err(AppError::ReadError {
					path: self.path.clone(),
					source: e,
				});
			}
		};

		serde_json::from_str(&content).map_err(|e| AppError::DeserializationError {
			file: self.path.clone(),
			error: e.to_string(),
		})
	}

	fn write(&self, values: &Map<String, Value>) -> AppResult {
		let parent = get_parent_dir(&self.path)?;

		std::fs::create_dir_all(parent).map_err(|e| AppError::DirCreation {
			path: parent.to_path_buf(),
			source: e,
		})?;

		let mut content =
			serde_json::to_string_pretty(values).map_err(|e| AppError::SerializationError {
				file: self.path.clone(),
				error: e.to_string(),
			})?;

		content.push_str(LINE_ENDING);

		std::fs::write(&self.path, content).map_err(|e| AppError::WriteError {
			path: self.path.clone(),
			source: e,
		})
	}
}

impl PreferenceStore for JsonFilePreferenceStore {
	fn get(&self, key: &str) -> AppResult<Option<Value>> {
		Ok(self.read()?.remove(key))
	}

	fn set(&self, key: &str, value: Value) -> AppResult {
		let mut values = self.read()?;

		values.insert(key.to_string(), value);

		self.write(&values)
	}

	fn clear(&self) -> AppResult {
		match std::fs::remove_file(&self.path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(AppError::WriteError {
				path: self.path.clone(),
				source: e,
			}),
		}
	}
}

/// A store that only lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
	values: Mutex<Map<String, Value>>,
}

impl MemoryPreferenceStore {
	fn values(&self) -> AppResult<std::sync::MutexGuard<'_, Map<String, Value>>> {
		self.values
			.lock()
			.map_err(|_| anyhow!("The preference store lock was poisoned").into())
	}
}

impl PreferenceStore for MemoryPreferenceStore {
	fn get(&self, key: &str) -> AppResult<Option<Value>> {
		Ok(self.values()?.get(key).cloned())
	}

	fn set(&self, key: &str, value: Value) -> AppResult {
		self.values()?.insert(key.to_string(), value);

		Ok(())
	}

	fn clear(&self) -> AppResult {
		self.values()?.clear();

		Ok(())
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	fn saved() -> Preferences {
		Preferences {
			typescript: Some(false),
			src_dir: Some(true),
			import_alias: Some(ImportAlias::new("~/*").unwrap()),
			..Default::default()
		}
	}

	#[test]
	fn memory_store() -> Result<(), AppError> {
		let store = MemoryPreferenceStore::default();

		assert_eq!(load_preferences(&store)?, Preferences::default());

		save_preferences(&store, &saved())?;
		assert_eq!(load_preferences(&store)?, saved());

		store.clear()?;
		assert_eq!(store.get(PREFERENCES_KEY)?, None);

		Ok(())
	}

	#[test]
	fn json_file_store() -> Result<(), Box<dyn std::error::Error>> {
		let tmp = tempfile::tempdir()?;
		let store = JsonFilePreferenceStore::new(tmp.path().join("nested/config.json"));

		assert_eq!(load_preferences(&store)?, Preferences::default());

		store.set("other", json!(1))?;
		save_preferences(&store, &saved())?;

		let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(store.path())?)?;

		assert_eq!(
			on_disk,
			json!({
				"other": 1,
				"preferences": {
					"typescript": false,
					"srcDir": true,
					"importAlias": "~/*"
				}
			})
		);

		assert_eq!(load_preferences(&store)?, saved());

		store.clear()?;
		assert!(!store.path().exists());
		store.clear()?;

		Ok(())
	}

	#[test]
	fn corrupted_file_is_reported() -> Result<(), Box<dyn std::error::Error>> {
		let tmp = tempfile::tempdir()?;
		let path = tmp.path().join("config.json");

		std::fs::write(&path, "{ not json")?;

		let store = JsonFilePreferenceStore::new(&path);

		assert!(matches!(
			load_preferences(&store),
			Err(AppError::DeserializationError { .. })
		));

		Ok(())
	}
}
