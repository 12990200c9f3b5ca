//! Persisted login token
//!
//! The token is written on login, read once when the session is created and
//! cleared on logout. Storage sits behind [`TokenStore`] so a session can be
//! backed by a file in the user config directory or by memory in tests.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use tracing::{debug, info};

use crate::config::Config;

pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn store(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

impl<T: TokenStore + ?Sized> TokenStore for Box<T> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn store(&self, token: &str) -> Result<()> {
        (**self).store(token)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

/// Token kept in a plain file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{config_dir}/storefront/token`
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(Config::config_dir()?.join("token")))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| anyhow!("Failed to read token file {:?}: {}", self.path, e))?;
        let token = content.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    fn store(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)
            .map_err(|e| anyhow!("Failed to write token file {:?}: {}", self.path, e))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Token kept for the life of the process only
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        let guard = self.token.lock().map_err(|_| anyhow!("token store lock poisoned"))?;
        Ok(guard.clone())
    }

    fn store(&self, token: &str) -> Result<()> {
        let mut guard = self.token.lock().map_err(|_| anyhow!("token store lock poisoned"))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self.token.lock().map_err(|_| anyhow!("token store lock poisoned"))?;
        *guard = None;
        Ok(())
    }
}

/// Login state of the shell, backed by an injected store
pub struct AuthSession<S: TokenStore> {
    store: S,
    token: Option<String>,
}

impl<S: TokenStore> AuthSession<S> {
    /// Read any token persisted by an earlier login.
    pub fn init(store: S) -> Result<Self> {
        let token = store.load()?;
        debug!(authenticated = token.is_some(), "auth session initialized");
        Ok(Self { store, token })
    }

    /// Persist a token issued by the auth service. An empty token is
    /// ignored and reported as `false`.
    pub fn login(&mut self, token: &str) -> Result<bool> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(false);
        }
        self.store.store(token)?;
        self.token = Some(token.to_string());
        info!("signed in");
        Ok(true)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.store.clear()?;
        self.token = None;
        info!("signed out");
        Ok(())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_lifecycle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storefront").join("token");

        let mut session = AuthSession::init(FileTokenStore::new(&path)).unwrap();
        assert!(!session.is_authenticated());

        assert!(session.login("abc.def.ghi").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "abc.def.ghi");

        // A fresh session reads what the previous one wrote
        let session2 = AuthSession::init(FileTokenStore::new(&path)).unwrap();
        assert_eq!(session2.token(), Some("abc.def.ghi"));

        session.logout().unwrap();
        assert!(!path.exists());
        assert!(!session.is_authenticated());
        assert!(AuthSession::init(FileTokenStore::new(&path)).unwrap().token().is_none());
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let mut session = AuthSession::init(MemoryTokenStore::new()).unwrap();
        assert!(!session.login("   ").unwrap());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_memory_store_starts_authenticated() {
        let mut session = AuthSession::init(MemoryTokenStore::with_token("t0k")).unwrap();
        assert!(session.is_authenticated());
        session.logout().unwrap();
        assert!(session.token().is_none());
        assert!(session.logout().is_ok());
    }

    #[test]
    fn test_blank_token_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token");
        fs::write(&path, "\n").unwrap();
        assert_eq!(FileTokenStore::new(&path).load().unwrap(), None);
    }
}
