//! Registry persistence under the `module-storage` key

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sdk::errors::ModuleError;
use sdk::types::Module;

/// Key the registry is persisted under
pub const STORAGE_KEY: &str = "module-storage";

/// Where the registry contents live between sessions
pub trait ModuleStore: Send + Sync {
    /// Read the persisted modules; `None` when nothing was ever saved
    fn load(&self) -> Result<Option<Vec<Module>>, ModuleError>;

    /// Replace the persisted modules
    fn save(&self, modules: &[Module]) -> Result<(), ModuleError>;
}

impl<S: ModuleStore + ?Sized> ModuleStore for Arc<S> {
    fn load(&self) -> Result<Option<Vec<Module>>, ModuleError> {
        (**self).load()
    }

    fn save(&self, modules: &[Module]) -> Result<(), ModuleError> {
        (**self).save(modules)
    }
}

/// Persisted blob, shaped like the dashboard's store snapshot
#[derive(Debug, Deserialize)]
struct PersistedState {
    state: PersistedModules,
}

#[derive(Debug, Deserialize)]
struct PersistedModules {
    #[serde(default)]
    modules: Vec<Module>,
}

fn encode(modules: &[Module]) -> Result<String, ModuleError> {
    #[derive(Serialize)]
    struct Snapshot<'a> {
        state: SnapshotModules<'a>,
        version: u32,
    }
    #[derive(Serialize)]
    struct SnapshotModules<'a> {
        modules: &'a [Module],
    }

    let snapshot = Snapshot {
        state: SnapshotModules { modules },
        version: 0,
    };
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

fn decode(blob: &str) -> Result<Vec<Module>, ModuleError> {
    let persisted: PersistedState = serde_json::from_str(blob)
        .map_err(|e| ModuleError::Storage(format!("Corrupt {} blob: {}", STORAGE_KEY, e)))?;
    Ok(persisted.state.modules)
}

/// JSON file store at `<data_dir>/module-storage.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store inside `data_dir`, named after the storage key
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(format!("{}.json", STORAGE_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModuleStore for FileStore {
    fn load(&self) -> Result<Option<Vec<Module>>, ModuleError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let blob = std::fs::read_to_string(&self.path)
            .map_err(|e| ModuleError::Storage(format!("Failed to read {}: {}", STORAGE_KEY, e)))?;
        decode(&blob).map(Some)
    }

    fn save(&self, modules: &[Module]) -> Result<(), ModuleError> {
        let blob = encode(modules)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ModuleError::Storage(format!("Failed to create storage directory: {}", e))
            })?;
        }

        // Write then rename so a crash never leaves half a blob behind
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, blob)
            .map_err(|e| ModuleError::Storage(format!("Failed to write {}: {}", STORAGE_KEY, e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| ModuleError::Storage(format!("Failed to write {}: {}", STORAGE_KEY, e)))?;

        Ok(())
    }
}

/// In-process store; contents are lost when it is dropped
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing blob
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
        }
    }

    /// Current persisted blob, if any
    pub fn blob(&self) -> Result<Option<String>, ModuleError> {
        self.blob
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| ModuleError::Storage("memory store poisoned".to_string()))
    }
}

impl ModuleStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<Module>>, ModuleError> {
        match self.blob()? {
            Some(blob) => decode(&blob).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, modules: &[Module]) -> Result<(), ModuleError> {
        let blob = encode(modules)?;
        let mut guard = self
            .blob
            .lock()
            .map_err(|_| ModuleError::Storage("memory store poisoned".to_string()))?;
        *guard = Some(blob);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::default_permissions;
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_module(id: &str) -> Module {
        Module {
            id: id.to_string(),
            name: "Inventario".to_string(),
            version: "1.0".to_string(),
            description: "Stock".to_string(),
            author: "SysGestion".to_string(),
            is_active: true,
            installed_at: Utc::now(),
            size: 512,
            dependencies: Some(vec!["contracts".to_string()]),
            permissions: default_permissions(),
            checksum: "abc".to_string(),
        }
    }

    #[test]
    fn test_file_store_absent_on_first_run() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(temp_dir.path());

        assert!(store.load().unwrap().is_none());
        assert!(store.path().ends_with("module-storage.json"));
    }

    #[test]
    fn test_file_store_persists() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(&temp_dir.path().join("nested"));

        store.save(&[sample_module("a"), sample_module("b")]).unwrap();

        let reopened = FileStore::in_dir(&temp_dir.path().join("nested"));
        let modules = reopened.load().unwrap().unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[1].id, "b");
        assert_eq!(modules[0].dependencies, Some(vec!["contracts".to_string()]));
    }

    #[test]
    fn test_blob_shape() {
        let store = MemoryStore::new();
        store.save(&[sample_module("a")]).unwrap();

        let raw = store.blob().unwrap().unwrap();
        let blob: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(blob["version"], 0);
        assert_eq!(blob["state"]["modules"][0]["id"], "a");
        assert_eq!(blob["state"]["modules"][0]["isActive"], true);
    }

    #[test]
    fn test_corrupt_blob_is_an_error() {
        let store = MemoryStore::with_blob("{not json");

        assert!(matches!(store.load(), Err(ModuleError::Storage(_))));
    }

    #[test]
    fn test_poisoned_memory_store_is_an_error() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.save(&[sample_module("a")]).unwrap();

        let poisoner = std::sync::Arc::clone(&store);
        let result = std::thread::spawn(move || {
            let _guard = poisoner.blob.lock().unwrap();
            panic!("poison the store");
        })
        .join();
        assert!(result.is_err());

        assert!(matches!(store.blob(), Err(ModuleError::Storage(_))));
        assert!(matches!(store.load(), Err(ModuleError::Storage(_))));
    }

    #[test]
    fn test_blob_without_modules_key() {
        let store = MemoryStore::with_blob(r#"{"state":{}}"#);

        assert_eq!(store.load().unwrap().unwrap().len(), 0);
    }
}
