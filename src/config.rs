use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "mcq_harvest.toml";

/// Layered settings: defaults, then the optional TOML file, then `MCQ_*` env vars.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub site: SiteConfig,
    pub fetch: FetchConfig,
    pub sync: SyncConfig,
    pub import: ImportConfig,
    pub store: StoreConfig,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("MCQ")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    /// Substring the URL host must contain to be accepted.
    pub host: String,
    pub name: String,
    pub current_affairs_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.indiabix.com".into(),
            host: "indiabix.com".into(),
            name: "IndiaBix".into(),
            current_affairs_path: "current-affairs".into(),
        }
    }
}

impl SiteConfig {
    pub fn current_affairs_url(&self, date: chrono::NaiveDate) -> String {
        format!(
            "{}/{}/{}/",
            self.base_url.trim_end_matches('/'),
            self.current_affairs_path.trim_matches('/'),
            date.format("%Y-%m-%d")
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub request_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into(),
            request_delay_ms: 2000,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub deck: String,
    pub include_explanation: bool,
    pub max_range_days: i64,
    pub missing_window_days: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            deck: "IndiaBix::CurrentAffairs".into(),
            include_explanation: true,
            max_range_days: 90,
            missing_window_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub default_deck: String,
    pub auto_tag: bool,
    pub max_pages: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_deck: "IndiaBix::General".into(),
            auto_tag: true,
            max_pages: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub state_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/cards.sqlite"),
            state_path: PathBuf::from("data/sync_history.json"),
        }
    }
}
