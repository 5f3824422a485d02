use crate::errors::GymError;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::BTreeMap;
use std::{env, path::Path, path::PathBuf};
use tokio::fs;
use tracing::{error, warn};

pub const USERS_KEY: &str = "users";
pub const ATTENDANCE_KEY: &str = "attendance";
pub const INCOME_KEY: &str = "income";
pub const LAST_BACKUP_KEY: &str = "lastBackup";
pub const AUTO_BACKUP_KEY: &str = "autoBackupEnabled";
pub const BACKUP_KEY: &str = "gymSystemBackup";

/// Named JSON values, flushed to disk as a single document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    entries: BTreeMap<String, Value>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a key, falling back to `default` when it is absent or does not
    /// deserialize.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(value) = self.entries.get(key) else {
            return default;
        };
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!("failed to load {key} from store: {err}");
                default
            }
        }
    }

    /// Reads a list key one record at a time. Records that do not
    /// deserialize are logged and dropped; the rest are kept.
    pub fn get_records<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        records_from(key, self.entries.get(key))
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, data: &T) -> Result<(), GymError> {
        let value = serde_json::to_value(data).map_err(|err| {
            error!("failed to save {key} to store: {err}");
            GymError::from(err)
        })?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

pub fn records_from<T: DeserializeOwned>(key: &str, value: Option<&Value>) -> Vec<T> {
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            error!("{key} in store is not a list: {other}");
            return Vec::new();
        }
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item.clone()) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(%key, index, "skipping unreadable record: {err}");
                None
            }
        })
        .collect()
}

pub fn resolve_data_path() -> Result<PathBuf, std::io::Error> {
    if let Ok(path) = env::var("APP_DATA_PATH") {
        return Ok(PathBuf::from(path));
    }

    Ok(PathBuf::from("data/state.json"))
}

pub async fn load_store(path: &Path) -> RecordStore {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, Value>>(&bytes) {
            Ok(entries) => RecordStore { entries },
            Err(err) => {
                error!("failed to parse data file: {err}");
                RecordStore::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => RecordStore::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            RecordStore::default()
        }
    }
}

pub async fn persist_store(path: &Path, store: &RecordStore) -> Result<(), GymError> {
    let payload = serde_json::to_vec_pretty(&store.entries)?;
    fs::write(path, payload).await?;
    Ok(())
}
