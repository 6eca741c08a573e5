//! Configuration system (layered: flags > env > config file > defaults).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::auth::http::parse_server_url;
use crate::auth::store::{default_orbital_dir, TokenStoreConfig};
use crate::error::OrbitalError;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3005";
pub const DEFAULT_SCOPE: &str = "openid profile email";
pub const CONFIG_FILE_NAME: &str = "config.toml";

const ENV_SERVER_URL: &str = "ORBITAL_SERVER_URL";
const ENV_CLIENT_ID: &str = "ORBITAL_CLIENT_ID";
const ENV_LEGACY_CLIENT_ID: &str = "GITHUB_CLIENT_ID";
const ENV_SCOPE: &str = "ORBITAL_SCOPE";
const ENV_CONFIG_DIR: &str = "ORBITAL_CONFIG_DIR";

/// Resolved settings handed to the auth service and HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrbitalConfig {
    pub server_url: String,
    pub client_id: Option<String>,
    pub scope: String,
    pub config_dir: PathBuf,
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub client_id: Option<String>,
    pub scope: Option<String>,
    pub config_dir: Option<PathBuf>,
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub server_url: Option<String>,
    pub client_id: Option<String>,
    pub scope: Option<String>,
}

impl ConfigFile {
    /// Missing file is an empty layer; an unparseable one is an error.
    pub fn load(path: &Path) -> Result<Self, OrbitalError> {
        let raw = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(OrbitalError::Configuration(format!(
                    "cannot read {}: {err}",
                    path.display()
                )))
            }
        };
        toml::from_str(&raw).map_err(|err| {
            OrbitalError::Configuration(format!("invalid {}: {err}", path.display()))
        })
    }
}

impl OrbitalConfig {
    /// Load `.env`, then resolve against the process environment.
    pub fn load(overrides: ConfigOverrides) -> Result<Self, OrbitalError> {
        let _ = dotenvy::dotenv();
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve(
        overrides: ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, OrbitalError> {
        let lookup = |key: &str| non_empty(env(key));
        let config_dir = overrides
            .config_dir
            .or_else(|| lookup(ENV_CONFIG_DIR).map(PathBuf::from))
            .unwrap_or_else(default_orbital_dir);
        let file = ConfigFile::load(&config_dir.join(CONFIG_FILE_NAME))?;

        let server_url = non_empty(overrides.server_url)
            .or_else(|| lookup(ENV_SERVER_URL))
            .or_else(|| non_empty(file.server_url))
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        validate_server_url(&server_url)?;

        let client_id = non_empty(overrides.client_id)
            .or_else(|| lookup(ENV_CLIENT_ID))
            .or_else(|| lookup(ENV_LEGACY_CLIENT_ID))
            .or_else(|| non_empty(file.client_id));

        let scope = non_empty(overrides.scope)
            .or_else(|| lookup(ENV_SCOPE))
            .or_else(|| non_empty(file.scope))
            .unwrap_or_else(|| DEFAULT_SCOPE.to_string());

        Ok(Self {
            server_url,
            client_id,
            scope,
            config_dir,
        })
    }

    /// Client id, required to start a login.
    pub fn require_client_id(&self) -> Result<&str, OrbitalError> {
        self.client_id
            .as_deref()
            .ok_or_else(|| OrbitalError::Configuration("no OAuth client id configured".into()))
    }

    pub fn token_store_config(&self) -> TokenStoreConfig {
        TokenStoreConfig::new(self.config_dir.clone())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_server_url(url: &str) -> Result<(), OrbitalError> {
    parse_server_url(url)
        .map(|_| ())
        .map_err(|err| OrbitalError::Configuration(err.to_string()))
}
