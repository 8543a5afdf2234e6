use crate::core::config::data::{path_display, Config};
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Errors that can occur when resolving configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        /// Path to the configuration file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        /// Path to the configuration file with invalid TOML.
        path: PathBuf,
        /// The TOML deserialization error.
        source: toml::de::Error,
    },

    /// A required value is present neither in the environment nor the file.
    MissingValue {
        /// Environment variable that would supply the value.
        name: &'static str,
    },
}

impl ConfigError {
    fn display_path(path: &Path) -> String {
        path_display(path)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(
                    f,
                    "Failed to read config at {}: {}",
                    Self::display_path(path),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    Self::display_path(path),
                    source
                )
            }
            ConfigError::MissingValue { name } => {
                write!(f, "Missing required configuration value: {name}")
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::MissingValue { .. } => None,
        }
    }
}

impl Config {
    /// Loads configuration from the default path, or defaults when absent.
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from_path(&Self::config_path())
    }

    pub fn load_from_path(config_path: &PathBuf) -> Result<Config, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
                path: config_path.clone(),
                source,
            })?;
            let config: Config =
                toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: config_path.clone(),
                    source,
                })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), Box<dyn StdError>> {
        let parent = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file
            .persist(config_path)
            .map_err(|err| -> Box<dyn StdError> { Box::new(err) })?;
        Ok(())
    }

    pub(crate) fn config_path() -> PathBuf {
        match ProjectDirs::from("com", "oap", "oap-discovery") {
            Some(proj_dirs) => proj_dirs.config_dir().join("config.toml"),
            None => PathBuf::from("config.toml"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::BASE_API_URL_ENV;

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        let config = Config::load_from_path(&path).expect("defaults should load");
        assert!(config.base_api_url.is_none());
        assert!(config.tenants.is_empty());
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            base_api_url: Some("https://api.example.com".to_string()),
            client_name: Some("Example".to_string()),
            ..Config::default()
        };
        config.save_to_path(&path).expect("config should save");

        let reloaded = Config::load_from_path(&path).expect("config should reload");
        assert_eq!(
            reloaded.base_api_url.as_deref(),
            Some("https://api.example.com")
        );
        assert_eq!(reloaded.client_name.as_deref(), Some("Example"));
    }

    #[test]
    fn parse_failure_reports_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "not valid toml [").expect("file should write");

        let err = Config::load_from_path(&path).expect_err("parse should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn missing_base_api_url_is_fatal() {
        let config = Config::default();
        if std::env::var(BASE_API_URL_ENV).is_ok() {
            return;
        }
        let err = config
            .require_base_api_url()
            .expect_err("missing base URL should error");
        assert!(matches!(err, ConfigError::MissingValue { .. }));
    }

    #[test]
    fn file_base_api_url_is_used_when_env_absent() {
        if std::env::var(BASE_API_URL_ENV).is_ok() {
            return;
        }
        let config = Config {
            base_api_url: Some("https://api.example.com".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.require_base_api_url().expect("file value should win"),
            "https://api.example.com"
        );
    }
}
