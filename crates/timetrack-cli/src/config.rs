//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Who the tracked time belongs to.
    pub username: String,
    /// Base URL of the tracker server.
    pub backend_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            backend_url: "http://localhost:8080".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (TIMETRACKER_*)
        figment = figment.merge(Env::prefixed("TIMETRACKER_"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    fn validate(&self) -> Result<(), figment::Error> {
        if self.username.trim().is_empty() {
            return Err(figment::Error::from(
                "username must be set in the config file".to_string(),
            ));
        }
        if !is_http_url(&self.backend_url) {
            return Err(figment::Error::from(format!(
                "backend_url must be an http or https URL with a host, got {:?}",
                self.backend_url
            )));
        }
        Ok(())
    }

    /// Backend URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }
}

fn is_http_url(value: &str) -> bool {
    reqwest::Url::parse(value).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
    })
}

/// Returns the platform-specific config directory for the tracker.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("timetracker"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use figment::Jail;

    #[test]
    fn file_supplies_username_and_backend() {
        Jail::expect_with(|jail| {
            let dir = jail.directory().to_path_buf();
            jail.set_env("XDG_CONFIG_HOME", dir.display());
            jail.create_file(
                "client.toml",
                r#"
                username = "alice"
                backend_url = "https://tracker.example.com/"
                "#,
            )?;

            let config = Config::load_from(Some(Path::new("client.toml")))?;
            assert_eq!(config.username, "alice");
            assert_eq!(config.base_url(), "https://tracker.example.com");
            Ok(())
        });
    }

    #[test]
    fn backend_defaults_to_localhost() {
        Jail::expect_with(|jail| {
            let dir = jail.directory().to_path_buf();
            jail.set_env("XDG_CONFIG_HOME", dir.display());
            jail.set_env("TIMETRACKER_USERNAME", "bob");

            let config = Config::load()?;
            assert_eq!(config.username, "bob");
            assert_eq!(config.backend_url, "http://localhost:8080");
            Ok(())
        });
    }

    #[test]
    fn missing_username_is_rejected() {
        Jail::expect_with(|jail| {
            let dir = jail.directory().to_path_buf();
            jail.set_env("XDG_CONFIG_HOME", dir.display());
            jail.create_file("client.toml", r#"backend_url = "http://localhost:9000""#)?;

            let err = Config::load_from(Some(Path::new("client.toml"))).unwrap_err();
            assert!(err.to_string().contains("username must be set"));
            Ok(())
        });
    }

    #[test]
    fn non_http_backend_is_rejected() {
        Jail::expect_with(|jail| {
            let dir = jail.directory().to_path_buf();
            jail.set_env("XDG_CONFIG_HOME", dir.display());
            jail.create_file(
                "client.toml",
                r#"
                username = "alice"
                backend_url = "ftp://tracker"
                "#,
            )?;

            let err = Config::load_from(Some(Path::new("client.toml"))).unwrap_err();
            assert!(err.to_string().contains("backend_url"));
            Ok(())
        });
    }

    #[test]
    fn url_check_requires_host() {
        assert!(is_http_url("http://localhost:8080"));
        assert!(is_http_url("https://tracker.example.com/api"));
        assert!(!is_http_url("http://"));
        assert!(!is_http_url("http://:8080"));
        assert!(!is_http_url("localhost:8080"));
        assert!(!is_http_url("http://@"));
        assert!(!is_http_url("http://exa mple.com"));
        assert!(!is_http_url("http://host:notaport"));
        assert!(!is_http_url("https://[::1"));
        assert!(is_http_url("http://[::1]:8080"));
    }

    #[test]
    fn malformed_backend_is_rejected_at_load() {
        Jail::expect_with(|jail| {
            let dir = jail.directory().to_path_buf();
            jail.set_env("XDG_CONFIG_HOME", dir.display());
            jail.set_env("TIMETRACKER_USERNAME", "alice");
            jail.set_env("TIMETRACKER_BACKEND_URL", "http://host:notaport");

            let err = Config::load().unwrap_err();
            assert!(err.to_string().contains("backend_url"));
            Ok(())
        });
    }
}
