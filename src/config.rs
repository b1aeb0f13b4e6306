//! Configuration management.
//!
//! Settings come from `siteintel.toml` in the data directory when present,
//! with serde-supplied defaults for everything else. Environment loading
//! (`.env`) happens in main before this runs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fetch::BrowserConfig;
use crate::intel::IntelConfig;

/// Name of the SQLite database file inside the data directory.
pub const DATABASE_FILE: &str = "siteintel.db";

/// Name of the optional config file inside the data directory.
pub const CONFIG_FILE: &str = "siteintel.toml";

/// Fetch client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Per-request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    /// User agent override; "impersonate" rotates real browser agents.
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_fetch_timeout() -> u64 {
    30
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: None,
        }
    }
}

/// Crawler settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlSettings {
    /// Headless browser fallback configuration.
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Risk intelligence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelSettings {
    /// Hard deadline for the risk-intel task, seconds.
    #[serde(default = "default_intel_deadline")]
    pub deadline_secs: u64,
    /// Per-probe timeout, seconds.
    #[serde(default = "default_intel_timeout")]
    pub request_timeout_secs: u64,
    /// RDAP bootstrap endpoint.
    #[serde(default = "default_rdap_endpoint")]
    pub rdap_endpoint: String,
}

fn default_intel_deadline() -> u64 {
    90
}

fn default_intel_timeout() -> u64 {
    15
}

fn default_rdap_endpoint() -> String {
    "https://rdap.org".to_string()
}

impl Default for IntelSettings {
    fn default() -> Self {
        Self {
            deadline_secs: default_intel_deadline(),
            request_timeout_secs: default_intel_timeout(),
            rdap_endpoint: default_rdap_endpoint(),
        }
    }
}

impl IntelSettings {
    pub fn to_config(&self) -> IntelConfig {
        IntelConfig {
            deadline: std::time::Duration::from_secs(self.deadline_secs),
            request_timeout: std::time::Duration::from_secs(self.request_timeout_secs),
            rdap_endpoint: self.rdap_endpoint.clone(),
        }
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(skip)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub crawl: CrawlSettings,
    #[serde(default)]
    pub intel: IntelSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            fetch: FetchSettings::default(),
            crawl: CrawlSettings::default(),
            intel: IntelSettings::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("SITEINTEL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./siteintel-data"))
}

impl Settings {
    /// Load settings for a data directory, reading the config file when it
    /// exists.
    pub fn load(data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let config_path = data_dir.join(CONFIG_FILE);

        let mut settings = if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match toml::from_str::<Settings>(&contents) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        debug!(path = %config_path.display(), error = %e, "bad config file, using defaults");
                        Settings::default()
                    }
                },
                Err(e) => {
                    debug!(path = %config_path.display(), error = %e, "unreadable config file, using defaults");
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };

        settings.data_dir = data_dir;
        settings
    }

    /// Path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Database URL for the pool and migration runner.
    pub fn database_url(&self) -> String {
        self.database_path().display().to_string()
    }

    /// Ensure the data directory exists.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        if !Path::new(&self.data_dir).exists() {
            fs::create_dir_all(&self.data_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.fetch.timeout_secs, 30);
        assert_eq!(settings.intel.deadline_secs, 90);
        assert!(settings.intel.rdap_endpoint.starts_with("https://"));
    }

    #[test]
    fn parses_partial_config() {
        let parsed: Settings = toml::from_str(
            r#"
            [fetch]
            timeout_secs = 10

            [intel]
            deadline_secs = 30
            "#,
        )
        .expect("parse");
        assert_eq!(parsed.fetch.timeout_secs, 10);
        assert_eq!(parsed.intel.deadline_secs, 30);
        // Unspecified sections keep defaults.
        assert_eq!(parsed.intel.request_timeout_secs, 15);
        assert!(parsed.crawl.browser.headless);
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[fetch]\ntimeout_secs = 7\n",
        )
        .expect("write config");

        let settings = Settings::load(Some(dir.path().to_path_buf()));
        assert_eq!(settings.fetch.timeout_secs, 7);
        assert_eq!(settings.database_path(), dir.path().join(DATABASE_FILE));
    }
}
