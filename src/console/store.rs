//! Durable session storage. The store keeps exactly three keys (`token`,
//! `role`, `username`) and only ever reads, writes or clears them together, so
//! a reader sees either a full session or nothing. Persistence is best effort:
//! storage failures are logged and reading falls back to "no session".

use crate::console::types::{Role, Session};
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, warn};

pub const TOKEN_KEY: &str = "token";
pub const ROLE_KEY: &str = "role";
pub const USERNAME_KEY: &str = "username";

const SESSION_KEYS: [&str; 3] = [TOKEN_KEY, ROLE_KEY, USERNAME_KEY];

/// Key/value persistence in the shape of browser local storage, with batch
/// writes so a backend can apply several keys in one step.
pub trait SessionStorage: Send {
    fn get_item(&self, key: &str) -> Option<String>;

    /// Reads every key from one snapshot of the backend, in the order given.
    fn get_items(&self, keys: &[&str]) -> Vec<Option<String>> {
        keys.iter().map(|key| self.get_item(key)).collect()
    }

    /// Sets every pair in one step.
    ///
    /// # Errors
    /// Returns an error when the backend cannot persist the batch.
    fn set_items(&mut self, items: &[(&str, &str)]) -> io::Result<()>;

    /// Removes every key in one step.
    ///
    /// # Errors
    /// Returns an error when the backend cannot persist the removal.
    fn remove_items(&mut self, keys: &[&str]) -> io::Result<()>;
}

/// In-process storage; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_items(&mut self, items: &[(&str, &str)]) -> io::Result<()> {
        for (key, value) in items {
            self.items.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_items(&mut self, keys: &[&str]) -> io::Result<()> {
        for key in keys {
            self.items.remove(*key);
        }
        Ok(())
    }
}

/// JSON object file replaced as a whole on every write (temp file + rename).
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> BTreeMap<String, String> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                warn!("failed to read session file {}: {err}", self.path.display());
                return BTreeMap::new();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!(
                "ignoring unreadable session file {}: {err}",
                self.path.display()
            );
            BTreeMap::new()
        })
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let payload = serde_json::to_vec_pretty(items).map_err(io::Error::other)?;
        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let mut file = open_private(&temp_path)?;
        file.write_all(&payload)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.load().remove(key)
    }

    fn get_items(&self, keys: &[&str]) -> Vec<Option<String>> {
        let mut current = self.load();
        keys.iter().map(|key| current.remove(*key)).collect()
    }

    fn set_items(&mut self, items: &[(&str, &str)]) -> io::Result<()> {
        let mut current = self.load();
        for (key, value) in items {
            current.insert((*key).to_string(), (*value).to_string());
        }
        self.persist(&current)
    }

    fn remove_items(&mut self, keys: &[&str]) -> io::Result<()> {
        let mut current = self.load();
        for key in keys {
            current.remove(*key);
        }
        self.persist(&current)
    }
}

/// Outcome of [`SessionStore::revoke`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Revocation {
    Cleared,
    AlreadyEmpty,
    /// A different session is stored now; it was left in place.
    Superseded,
}

fn session_from(items: &[Option<String>]) -> Option<Session> {
    let [Some(token), Some(role), Some(username)] = items else {
        return None;
    };
    let role = role.parse::<Role>().ok()?;
    Session::new(token.as_str(), username.as_str(), role)
}

fn remove_session(storage: &mut dyn SessionStorage) {
    if let Err(err) = storage.remove_items(&SESSION_KEYS) {
        warn!("failed to clear session: {err}");
    }
    debug!("session cleared");
}

/// The single durable copy of the session.
pub struct SessionStore {
    storage: Mutex<Box<dyn SessionStorage>>,
}

impl SessionStore {
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        Self {
            storage: Mutex::new(Box::new(storage)),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    fn storage(&self) -> MutexGuard<'_, Box<dyn SessionStorage>> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persists all three fields in one batch.
    pub fn write(&self, session: &Session) {
        let role = session.role();
        let items = [
            (TOKEN_KEY, session.token().expose_secret()),
            (ROLE_KEY, role.as_str()),
            (USERNAME_KEY, session.username()),
        ];

        if let Err(err) = self.storage().set_items(&items) {
            warn!("failed to persist session: {err}");
        } else {
            debug!(username = session.username(), %role, "session persisted");
        }
    }

    /// Returns the stored session, or `None` if any field is missing or invalid.
    #[must_use]
    pub fn read(&self) -> Option<Session> {
        session_from(&self.storage().get_items(&SESSION_KEYS))
    }

    /// Removes all three fields. Returns `false` when there was nothing to remove.
    pub fn clear(&self) -> bool {
        let mut storage = self.storage();
        if storage.get_items(&SESSION_KEYS).iter().all(Option::is_none) {
            return false;
        }

        remove_session(&mut **storage);
        true
    }

    /// Clears the session a rejected request was sent with. A session whose
    /// token differs from `rejected` was written after the request left and
    /// is kept.
    pub fn revoke(&self, rejected: Option<&SecretString>) -> Revocation {
        let mut storage = self.storage();
        let items = storage.get_items(&SESSION_KEYS);
        if items.iter().all(Option::is_none) {
            return Revocation::AlreadyEmpty;
        }

        let superseded = session_from(&items).is_some_and(|stored| {
            rejected.map_or(true, |token| {
                token.expose_secret() != stored.token().expose_secret()
            })
        });
        if superseded {
            return Revocation::Superseded;
        }

        remove_session(&mut **storage);
        Revocation::Cleared
    }

    /// The stored token, only when a full session is present.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.read().map(|session| session.token().clone())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("SessionStore").finish_non_exhaustive()
    }
}
