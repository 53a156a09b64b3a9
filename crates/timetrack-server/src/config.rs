//! Server configuration loading.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// The only storage driver the server ships with.
pub const SQLITE_DRIVER: &str = "sqlite";

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Address to listen on, e.g. `127.0.0.1:8080`.
    pub addr: String,
    /// Storage settings.
    pub database: DatabaseConfig,
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Storage driver. Only `sqlite` is supported.
    pub driver: String,
    /// Path to the database file.
    pub path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            addr: "127.0.0.1:8080".to_string(),
            database: DatabaseConfig {
                driver: SQLITE_DRIVER.to_string(),
                path: data_dir.join("timetracker.db"),
            },
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, `server.toml` in the platform config
    /// directory, the given file, then `TIMETRACK_*` environment variables
    /// (`TIMETRACK_DATABASE__PATH` for nested keys).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("server.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("TIMETRACK_").split("__"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    fn validate(&self) -> Result<(), figment::Error> {
        if self.database.driver != SQLITE_DRIVER {
            return Err(figment::Error::from(format!(
                "unsupported database driver: {} (only {SQLITE_DRIVER} is supported)",
                self.database.driver
            )));
        }
        if self.addr.trim().is_empty() {
            return Err(figment::Error::from("addr cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Returns the platform-specific config directory for the tracker.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("timetracker"))
}

/// Returns the platform-specific data directory for the tracker.
///
/// On Linux: `~/.local/share/timetracker`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("timetracker"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use figment::Jail;

    #[test]
    fn defaults_use_sqlite_in_data_dir() {
        let config = Config::default();
        assert_eq!(config.addr, "127.0.0.1:8080");
        assert_eq!(config.database.driver, "sqlite");
        assert_eq!(
            config.database.path.file_name().unwrap(),
            "timetracker.db"
        );
    }

    #[test]
    fn file_values_override_defaults() {
        Jail::expect_with(|jail| {
            let dir = jail.directory().to_path_buf();
            jail.set_env("XDG_CONFIG_HOME", dir.display());
            jail.create_file(
                "server.toml",
                r#"
                addr = "0.0.0.0:9000"

                [database]
                path = "/var/lib/timetracker/entries.db"
                "#,
            )?;

            let config = Config::load_from(Some(Path::new("server.toml")))?;
            assert_eq!(config.addr, "0.0.0.0:9000");
            assert_eq!(config.database.driver, "sqlite");
            assert_eq!(
                config.database.path,
                PathBuf::from("/var/lib/timetracker/entries.db")
            );
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            let dir = jail.directory().to_path_buf();
            jail.set_env("XDG_CONFIG_HOME", dir.display());
            jail.create_file("server.toml", r#"addr = "0.0.0.0:9000""#)?;
            jail.set_env("TIMETRACK_ADDR", "127.0.0.1:7000");
            jail.set_env("TIMETRACK_DATABASE__PATH", "/tmp/env.db");

            let config = Config::load_from(Some(Path::new("server.toml")))?;
            assert_eq!(config.addr, "127.0.0.1:7000");
            assert_eq!(config.database.path, PathBuf::from("/tmp/env.db"));
            Ok(())
        });
    }

    #[test]
    fn unsupported_driver_is_rejected() {
        Jail::expect_with(|jail| {
            let dir = jail.directory().to_path_buf();
            jail.set_env("XDG_CONFIG_HOME", dir.display());
            jail.create_file(
                "server.toml",
                r#"
                [database]
                driver = "postgres"
                "#,
            )?;

            let err = Config::load_from(Some(Path::new("server.toml"))).unwrap_err();
            assert!(err.to_string().contains("unsupported database driver"));
            Ok(())
        });
    }
}
