//! Durable storage for the current credential pair.
//!
//! The store owns the only copy of the tokens. Everything else re-reads them
//! on demand, so a login in another process (sharing the same file) is picked
//! up without any cache invalidation.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access/refresh token pair as issued by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

/// The two named slots of the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TokenSlot {
    Access,
    Refresh,
}

impl TokenSlot {
    pub fn key(&self) -> &'static str {
        match self {
            TokenSlot::Access => "accessToken",
            TokenSlot::Refresh => "refreshToken",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(String),

    #[error("storage contents are corrupt: {0}")]
    Corrupt(String),

    #[error("storage lock poisoned")]
    LockPoisoned,
}

/// Key-value medium behind a [`TokenStore`].
pub trait StorageBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process backend. Intended for tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::LockPoisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::LockPoisoned)?;
        items.remove(key);
        Ok(())
    }
}

/// JSON-object file on disk, shared by every process pointed at it.
///
/// Each call re-reads the file; a missing file is an empty store.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(StorageError::Io(err.to_string())),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(HashMap::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    /// Like [`load`](Self::load), but a corrupt file is treated as empty so
    /// the next write replaces it.
    fn load_for_write(&self) -> Result<HashMap<String, String>, StorageError> {
        match self.load() {
            Err(StorageError::Corrupt(reason)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    %reason,
                    "overwriting corrupt token file"
                );
                Ok(HashMap::new())
            }
            other => other,
        }
    }

    /// Write to a sibling temp file (owner-only on unix) and rename it over
    /// the target, so concurrent readers never see a partial file.
    fn save(&self, items: &HashMap<String, String>) -> Result<(), StorageError> {
        let io = |e: std::io::Error| StorageError::Io(e.to_string());

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io)?;

        let bytes =
            serde_json::to_vec_pretty(items).map_err(|e| StorageError::Corrupt(e.to_string()))?;

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session.json".to_string());
        let tmp = dir.join(format!(".{file_name}.{}.tmp", std::process::id()));

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let written = options.open(&tmp).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(err) = written.and_then(|()| std::fs::rename(&tmp, &self.path)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io(err));
        }
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.load_for_write()?;
        items.insert(key.to_string(), value.to_string());
        self.save(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let (mut items, corrupt) = match self.load() {
            Err(StorageError::Corrupt(_)) => (self.load_for_write()?, true),
            loaded => (loaded?, false),
        };
        if items.remove(key).is_some() || corrupt {
            self.save(&items)?;
        }
        Ok(())
    }
}

/// Handle to the persisted credential pair.
///
/// A store without a backend is *headless*: it models running outside an
/// interactive client, where no session exists. Reads are absent and writes
/// are dropped. Storage failures are logged and absorbed; nothing here
/// returns an error to the caller.
#[derive(Clone)]
pub struct TokenStore {
    backend: Option<Arc<dyn StorageBackend>>,
}

impl core::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenStore")
            .field("interactive", &self.is_interactive())
            .finish()
    }
}

impl TokenStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStorage::new(path)))
    }

    pub fn headless() -> Self {
        Self { backend: None }
    }

    /// Whether a storage medium is attached (an interactive client context).
    pub fn is_interactive(&self) -> bool {
        self.backend.is_some()
    }

    pub fn get(&self, slot: TokenSlot) -> Option<String> {
        let backend = self.backend.as_ref()?;
        match backend.get_item(slot.key()) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(err) => {
                tracing::warn!(slot = slot.key(), error = %err, "token storage unreadable");
                None
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.get(TokenSlot::Access)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get(TokenSlot::Refresh)
    }

    /// Both tokens, when both slots are populated.
    pub fn pair(&self) -> Option<CredentialPair> {
        Some(CredentialPair {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
        })
    }

    /// Store a new access token and, if given and non-empty, a refresh token.
    ///
    /// An omitted refresh token leaves the stored one untouched.
    pub fn set(&self, access_token: &str, refresh_token: Option<&str>) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };

        Self::write(backend.as_ref(), TokenSlot::Access, access_token);
        if let Some(refresh) = refresh_token.filter(|t| !t.is_empty()) {
            Self::write(backend.as_ref(), TokenSlot::Refresh, refresh);
        }
    }

    pub fn set_pair(&self, pair: &CredentialPair) {
        self.set(&pair.access_token, Some(&pair.refresh_token));
    }

    /// Remove both slots. Idempotent.
    pub fn clear(&self) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };

        for slot in [TokenSlot::Access, TokenSlot::Refresh] {
            if let Err(err) = backend.remove_item(slot.key()) {
                tracing::warn!(slot = slot.key(), error = %err, "failed to clear token slot");
            }
        }
    }

    fn write(backend: &dyn StorageBackend, slot: TokenSlot, value: &str) {
        if let Err(err) = backend.set_item(slot.key(), value) {
            tracing::warn!(slot = slot.key(), error = %err, "failed to persist token");
        }
    }
}
