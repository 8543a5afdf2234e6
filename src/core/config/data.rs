use crate::core::constants::{BASE_API_URL_ENV, IDENTITY_CLIENT_ID_ENV, IDENTITY_POOL_ID_ENV};
use crate::core::config::io::ConfigError;
use crate::tenant::catalog::RawTenantRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Client identity advertised to the discovery endpoint.
pub const DEFAULT_CLIENT_NAME: &str = "Tools Interface";

/// Identity-provider settings required to construct a session manager.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IdentityConfig {
    pub user_pool_id: String,
    pub client_id: String,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Base API URL the discovery endpoint is derived from.
    pub base_api_url: Option<String>,
    /// Identity-provider settings; may also come from the environment.
    pub identity: Option<IdentityConfig>,
    /// Static tenant records bundled with the deployment.
    #[serde(default)]
    pub tenants: Vec<RawTenantRecord>,
    /// Name reported in the discovery handshake.
    pub client_name: Option<String>,
    /// Version reported in the discovery handshake.
    pub client_version: Option<String>,
}

impl Config {
    /// Resolves the base API URL, preferring the environment over the file.
    ///
    /// A missing value is a construction-time error, not something discovery
    /// can degrade around.
    pub fn require_base_api_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = non_empty_env(BASE_API_URL_ENV) {
            return Ok(url);
        }
        self.base_api_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingValue {
                name: BASE_API_URL_ENV,
            })
    }

    /// Resolves identity-provider settings, preferring the environment.
    pub fn require_identity(&self) -> Result<IdentityConfig, ConfigError> {
        let pool = non_empty_env(IDENTITY_POOL_ID_ENV);
        let client = non_empty_env(IDENTITY_CLIENT_ID_ENV);
        if let (Some(user_pool_id), Some(client_id)) = (pool.clone(), client.clone()) {
            return Ok(IdentityConfig {
                user_pool_id,
                client_id,
            });
        }
        if let Some(identity) = &self.identity {
            if !identity.user_pool_id.is_empty() && !identity.client_id.is_empty() {
                return Ok(identity.clone());
            }
        }
        let name = if pool.is_none() {
            IDENTITY_POOL_ID_ENV
        } else {
            IDENTITY_CLIENT_ID_ENV
        };
        Err(ConfigError::MissingValue { name })
    }

    pub fn client_name(&self) -> String {
        self.client_name
            .clone()
            .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string())
    }

    pub fn client_version(&self) -> String {
        self.client_version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Get a user-friendly display string for a path.
/// Converts absolute paths to use ~ notation on Unix-like systems when possible.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
