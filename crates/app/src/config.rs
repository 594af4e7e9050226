//! Server configuration
//!
//! Read from the file named by `BOXOFFICE_CONFIG`, else `config.toml` in the
//! platform config directory. Missing keys fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use boxoffice_core::EngineConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "BOXOFFICE_CONFIG";

const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "boxoffice.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub listen_port: u16,
    /// Deadline for one engine call before the client is told the outcome is unknown
    pub request_timeout_ms: u64,
    pub lock_shards: usize,
    /// Used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        let database_path = project_dirs()
            .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE));

        Self {
            database_path,
            listen_port: boxoffice_net::DEFAULT_PORT,
            request_timeout_ms: 5000,
            lock_shards: EngineConfig::default().lock_shards,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from the environment-named file, the default location, or defaults
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }

        let default_path = project_dirs()
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
            .ok_or(AppError::NoProjectDirs("config"))?;
        if default_path.exists() {
            Self::from_file(&default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| AppError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lock_shards == 0 {
            return Err(AppError::InvalidConfig("lock_shards must be positive".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(AppError::InvalidConfig(
                "request_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            lock_shards: self.lock_shards,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "boxoffice", "boxoffice")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config("listen_port = 9000\nlog_filter = \"debug\"\n");
        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.listen_port, 9000);
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.lock_shards, EngineConfig::default().lock_shards);
    }

    #[test]
    fn test_full_file() {
        let file = write_config(
            r#"
            database_path = "/var/lib/boxoffice/data.db"
            listen_port = 7000
            request_timeout_ms = 250
            lock_shards = 8
            log_filter = "boxoffice=trace"
            "#,
        );
        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/boxoffice/data.db"));
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.engine_config().lock_shards, 8);
    }

    #[test]
    fn test_malformed_file() {
        let file = write_config("listen_port = \"not a port\"");
        assert!(matches!(
            Config::from_file(file.path()),
            Err(AppError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::from_file(&dir.path().join("absent.toml")),
            Err(AppError::ConfigRead { .. })
        ));
    }

    #[test]
    fn test_zero_shards_rejected() {
        let file = write_config("lock_shards = 0");
        assert!(matches!(
            Config::from_file(file.path()),
            Err(AppError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_default_database_file_name() {
        let config = Config::default();
        assert_eq!(
            config.database_path.file_name().and_then(|n| n.to_str()),
            Some(DATABASE_FILE)
        );
        assert!(config.validate().is_ok());
    }
}
