use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use chrono::Utc;
use tempfile::NamedTempFile;

use super::error::StorageError;
use super::token::{TokenGrant, TokenRecord};

pub const TOKEN_FILE_NAME: &str = "token.json";

/// Storage abstraction for the persisted credential.
///
/// Read failures are absorbed into "absent"; write and clear failures are
/// returned so the caller can decide whether they are fatal.
pub trait TokenStore: Send + Sync {
    /// Anchor `grant` to the current clock and persist it, replacing any
    /// previous record.
    fn write(&self, grant: &TokenGrant) -> Result<TokenRecord, StorageError>;
    fn read(&self) -> Option<TokenRecord>;
    /// Remove the record. Succeeds when nothing is stored.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Configuration for file-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

/// File-backed token store holding a single JSON record.
///
/// # Example
/// ```no_run
/// use orbital::auth::{FileTokenStore, TokenGrant, TokenStore, TokenStoreConfig};
///
/// let store = FileTokenStore::new(TokenStoreConfig::new("/tmp/orbital".into()));
/// let grant = TokenGrant {
///     access_token: "access".to_string(),
///     refresh_token: None,
///     token_type: Some("Bearer".to_string()),
///     scope: Some("openid".to_string()),
///     expires_in: Some(3600),
/// };
/// let record = store.write(&grant)?;
/// assert!(record.expires_at.is_some());
/// # Ok::<(), orbital::auth::StorageError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn token_path(&self) -> PathBuf {
        self.base_dir.join(TOKEN_FILE_NAME)
    }

    /// Stage `data` next to the token file, then rename it into place so a
    /// reader sees either the old record or the new one.
    fn replace_token_file(&self, data: &[u8]) -> Result<(), StorageError> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(StorageError::InvalidPath(
                "token directory is empty".to_string(),
            ));
        }
        fs::create_dir_all(&self.base_dir)?;

        // Created 0600 on unix; removed on drop if anything below fails.
        let mut staged = NamedTempFile::new_in(&self.base_dir)?;
        staged.write_all(data)?;
        staged.as_file().sync_all()?;
        let path = self.token_path();
        staged
            .persist(&path)
            .map_err(|err| StorageError::Io(err.error))?;

        #[cfg(unix)]
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn write(&self, grant: &TokenGrant) -> Result<TokenRecord, StorageError> {
        let record = TokenRecord::issue(grant, Utc::now());
        let serialized = serde_json::to_vec_pretty(&record)?;
        self.replace_token_file(&serialized)?;
        tracing::debug!(path = %self.token_path().display(), "stored token");
        Ok(record)
    }

    fn read(&self) -> Option<TokenRecord> {
        let path = self.token_path();
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "token file unreadable");
                return None;
            }
        };
        match serde_json::from_str::<TokenRecord>(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "token file unparseable");
                None
            }
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(self.token_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

/// `~/.orbital-cli`, or a relative `.orbital-cli` when no home is known.
pub fn default_orbital_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".orbital-cli"))
        .unwrap_or_else(|| PathBuf::from(".orbital-cli"))
}
