use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use anyhow::{anyhow, Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "shelfdesk";

/// Credentials file name in the storage directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Keys held by a credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    AccessToken,
    RefreshToken,
    User,
}

impl StoreKey {
    pub const ALL: [StoreKey; 3] = [StoreKey::AccessToken, StoreKey::RefreshToken, StoreKey::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::AccessToken => "access_token",
            StoreKey::RefreshToken => "refresh_token",
            StoreKey::User => "user",
        }
    }
}

/// Key-value storage for the session credentials.
///
/// Each call must be atomic: once `set` or `remove` returns, every later `get`
/// observes the change.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: StoreKey) -> Result<Option<String>>;
    fn set(&self, key: StoreKey, value: &str) -> Result<()>;
    /// Removing an absent key is not an error.
    fn remove(&self, key: StoreKey) -> Result<()>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<StoreKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow!("Credential store lock poisoned"))?;
        Ok(entries.get(&key).cloned())
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow!("Credential store lock poisoned"))?;
        entries.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow!("Credential store lock poisoned"))?;
        entries.remove(&key);
        Ok(())
    }
}

/// JSON file store, persisted across restarts.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CREDENTIALS_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Store in the platform data directory (e.g. `~/.local/share/shelfdesk`).
    pub fn in_data_dir() -> Result<Self> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow!("Could not find data directory"))?;
        Ok(Self::new(data_dir.join(SERVICE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read credentials file")?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).context("Failed to parse credentials file")
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create credentials directory")?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        // Write-then-rename so a reader never sees a half-written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write credentials file")?;
        std::fs::rename(&tmp, &self.path).context("Failed to replace credentials file")?;
        Ok(())
    }

    /// Read-modify-write under the file lock. The file is only rewritten
    /// when `f` reports a change.
    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("Credential file lock poisoned"))?;
        let mut entries = self.read_entries()?;
        if !f(&mut entries) {
            return Ok(());
        }
        self.write_entries(&entries)
    }
}

impl TokenStore for FileStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("Credential file lock poisoned"))?;
        Ok(self.read_entries()?.remove(key.as_str()))
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        self.modify(|entries| {
            entries.insert(key.as_str().to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        self.modify(|entries| entries.remove(key.as_str()).is_some())
    }
}

/// OS keychain store, one keyring entry per key.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: StoreKey) -> Result<Entry> {
        Entry::new(&self.service, key.as_str()).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store credential in keychain")
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "shelfdesk-test-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_store_key_names() {
        assert_eq!(StoreKey::AccessToken.as_str(), "access_token");
        assert_eq!(StoreKey::RefreshToken.as_str(), "refresh_token");
        assert_eq!(StoreKey::User.as_str(), "user");
    }

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get(StoreKey::AccessToken).unwrap(), None);

        store.set(StoreKey::AccessToken, "A1").unwrap();
        assert_eq!(store.get(StoreKey::AccessToken).unwrap().as_deref(), Some("A1"));

        store.set(StoreKey::AccessToken, "A2").unwrap();
        assert_eq!(store.get(StoreKey::AccessToken).unwrap().as_deref(), Some("A2"));

        store.remove(StoreKey::AccessToken).unwrap();
        store.remove(StoreKey::AccessToken).unwrap();
        assert_eq!(store.get(StoreKey::AccessToken).unwrap(), None);
    }

    #[test]
    fn test_file_store_persists_between_instances() {
        let dir = temp_dir("persist");
        {
            let store = FileStore::new(&dir);
            store.set(StoreKey::AccessToken, "A1").unwrap();
            store.set(StoreKey::RefreshToken, "R1").unwrap();
        }

        let reopened = FileStore::new(&dir);
        assert_eq!(reopened.get(StoreKey::AccessToken).unwrap().as_deref(), Some("A1"));
        assert_eq!(reopened.get(StoreKey::RefreshToken).unwrap().as_deref(), Some("R1"));
        assert_eq!(reopened.get(StoreKey::User).unwrap(), None);

        reopened.remove(StoreKey::AccessToken).unwrap();
        assert_eq!(FileStore::new(&dir).get(StoreKey::AccessToken).unwrap(), None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_missing_file_reads_empty() {
        let dir = temp_dir("missing");
        let store = FileStore::new(&dir);
        assert_eq!(store.get(StoreKey::User).unwrap(), None);
        store.remove(StoreKey::User).unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_concurrent_set_and_remove() {
        let dir = temp_dir("concurrent");
        let store = Arc::new(FileStore::new(&dir));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        if i % 2 == 0 {
                            store.set(StoreKey::AccessToken, "A1").unwrap();
                        } else {
                            store.remove(StoreKey::User).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get(StoreKey::AccessToken).unwrap().as_deref(), Some("A1"));
        assert_eq!(store.get(StoreKey::User).unwrap(), None);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_corrupt_file_is_error() {
        let dir = temp_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CREDENTIALS_FILE), "{not json").unwrap();
        let store = FileStore::new(&dir);
        assert!(store.get(StoreKey::AccessToken).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
