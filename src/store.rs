//! Persistent storage of the session token.
//!
//! A device holds at most one [`SessionToken`], stored under the fixed key
//! [`STORAGE_KEY`]. Stores implement [`TokenStore`]:
//!
//! * [`FileTokenStore`] keeps the token in a small TOML file
//! * [`MemoryTokenStore`] keeps it in memory only
//!
//! "Nothing stored" is not an error: [`TokenStore::load`] returns `None`.
//! Errors are reserved for faults of the storage itself.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    token::SessionToken,
};

/// Key under which the session token is stored.
pub const STORAGE_KEY: &str = "spotify_session_token";

/// A single persistent slot holding the current session token.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns the stored token, or `None` if no token is stored.
    async fn load(&self) -> Result<Option<SessionToken>>;

    /// Stores `token`, overwriting any previous value.
    async fn save(&self, token: &SessionToken) -> Result<()>;

    /// Removes the stored token. Succeeds if none is stored.
    async fn clear(&self) -> Result<()>;
}

#[async_trait]
impl<T> TokenStore for Arc<T>
where
    T: TokenStore + ?Sized,
{
    async fn load(&self) -> Result<Option<SessionToken>> {
        (**self).load().await
    }

    async fn save(&self, token: &SessionToken) -> Result<()> {
        (**self).save(token).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }
}

/// Token store backed by a TOML file.
///
/// The file contains a single key:
///
/// ```toml
/// spotify_session_token = "..."
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Largest file that will be read. The token file should be small.
    const MAX_FILE_SIZE: u64 = 4096;

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<SessionToken>> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!("no token file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(Error::storage_fault(e)),
        };

        // Prevent out-of-memory condition on a corrupt or foreign file.
        if metadata.len() > Self::MAX_FILE_SIZE {
            return Err(Error::storage_fault(format!(
                "{} is too large",
                self.path.display()
            )));
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(Error::storage_fault)?;
        let table = contents.parse::<toml::Table>().map_err(|e| {
            Error::storage_fault(format!("{} format is invalid: {e}", self.path.display()))
        })?;

        match table.get(STORAGE_KEY) {
            None => Ok(None),
            Some(toml::Value::String(token)) if token.trim().is_empty() => {
                warn!("ignoring empty token in {}", self.path.display());
                Ok(None)
            }
            Some(toml::Value::String(token)) => token
                .parse()
                .map(Some)
                .map_err(|e: Error| Error::storage_fault(e.to_string())),
            Some(_) => Err(Error::storage_fault(format!(
                "{STORAGE_KEY} in {} is not a string",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, token: &SessionToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(Error::storage_fault)?;
            }
        }

        let mut table = toml::Table::new();
        table.insert(
            STORAGE_KEY.to_owned(),
            toml::Value::String(token.as_str().to_owned()),
        );
        let contents = toml::to_string(&table)?;

        // Write then rename, so a crash never leaves a truncated file behind.
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, contents)
            .await
            .map_err(Error::storage_fault)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(Error::storage_fault)?;
        }

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(Error::storage_fault)?;

        debug!("token saved to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("token removed from {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_fault(e)),
        }
    }
}

/// Token store that lives in memory only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<SessionToken>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `token`.
    #[must_use]
    pub fn with_token(token: SessionToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<SessionToken>> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, token: &SessionToken) -> Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}
