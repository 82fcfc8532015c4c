//! Runtime configuration: data directory, database location and portal
//! connection settings.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::scrape::Credentials;

const CONFIG_ENV: &str = "AOVEILLE_CONFIG";
const USERNAME_ENV: &str = "AOVEILLE_PORTAL_USERNAME";
const PASSWORD_ENV: &str = "AOVEILLE_PORTAL_PASSWORD";

/// Portal connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub login_url: String,
    /// URL fragment whose appearance confirms the post-login redirect.
    pub post_login_url_fragment: String,
    pub headless: bool,
    /// Upper bound for each element/URL wait during login and navigation.
    pub element_timeout_secs: u64,
    /// Settle delay after a pagination click, the listing swaps content
    /// in place without a navigation event.
    pub page_settle_secs: u64,
    /// Extra arguments appended to the browser command line.
    pub chrome_args: Vec<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: "https://client.sodipress.com/Account/Login?ReturnUrl=%2F".to_string(),
            post_login_url_fragment: "client.sodipress.com".to_string(),
            headless: true,
            element_timeout_secs: 10,
            page_settle_secs: 3,
            chrome_args: Vec::new(),
        }
    }
}

/// Application settings, file-backed with sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory for everything the application persists.
    pub data_dir: PathBuf,
    pub database_filename: String,
    pub portal: PortalConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let base = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            data_dir: base.join("aoveille"),
            database_filename: "aoveille.db".to_string(),
            portal: PortalConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from `AOVEILLE_CONFIG` or `./aoveille.toml` when
    /// present, otherwise defaults.
    pub fn load() -> Result<Self> {
        let path = match env::var(CONFIG_ENV) {
            Ok(p) => Some(PathBuf::from(p)),
            Err(_) => {
                let local = PathBuf::from("aoveille.toml");
                local.exists().then_some(local)
            }
        };

        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                let settings: Settings = toml::from_str(&raw)
                    .with_context(|| format!("invalid config file {}", path.display()))?;
                debug!(path = %path.display(), "loaded configuration file");
                Ok(settings)
            }
            None => Ok(Self::default()),
        }
    }

    /// Replace the data directory, used by the global `--data-dir` flag.
    pub fn with_data_dir(mut self, dir: &Path) -> Self {
        self.data_dir = dir.to_path_buf();
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Create the data directory tree if missing.
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("failed to create data directory {}", self.data_dir.display())
        })?;
        Ok(())
    }

    /// Portal credentials from the environment. Kept out of the config
    /// file so it stays shareable.
    pub fn credentials(&self) -> Result<Credentials> {
        let username = env::var(USERNAME_ENV)
            .with_context(|| format!("{USERNAME_ENV} is not set; portal login needs it"))?;
        let password = env::var(PASSWORD_ENV)
            .with_context(|| format!("{PASSWORD_ENV} is not set; portal login needs it"))?;
        Ok(Credentials { username, password })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_complete() {
        let settings = Settings::default();
        assert_eq!(settings.database_filename, "aoveille.db");
        assert!(settings.database_path().ends_with("aoveille.db"));
        assert!(settings.portal.headless);
        assert_eq!(settings.portal.element_timeout_secs, 10);
    }

    #[test]
    fn test_partial_toml_overlays_defaults() {
        let raw = r#"
            database_filename = "custom.db"

            [portal]
            headless = false
        "#;
        let settings: Settings = toml::from_str(raw).unwrap();
        assert_eq!(settings.database_filename, "custom.db");
        assert!(!settings.portal.headless);
        // Unspecified fields keep their defaults.
        assert_eq!(settings.portal.element_timeout_secs, 10);
        assert!(settings.portal.login_url.contains("sodipress"));
    }

    #[test]
    fn test_with_data_dir_overrides() {
        let settings = Settings::default().with_data_dir(Path::new("/tmp/elsewhere"));
        assert_eq!(settings.database_path(), PathBuf::from("/tmp/elsewhere/aoveille.db"));
    }
}
