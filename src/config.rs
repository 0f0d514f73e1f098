use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::duration::deserialize_duration;

pub const CONFIG_FILE_NAME: &str = "money-monitor.toml";

/// File written by the card export flow inside the download directory.
pub const MAX_EXPORT_FILE: &str = "max-credit-transactions.xlsx";

/// File written by the checking-account export flow inside the download directory.
pub const LEUMI_EXPORT_FILE: &str = "leumi-transactions.html";

/// Visible-text dump of the export popup, for diagnosing label drift.
pub const POPUP_DEBUG_FILE: &str = "popup_visible_texts.txt";

fn default_profile_dir() -> PathBuf {
    PathBuf::from("chrome_profile")
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_true() -> bool {
    true
}

/// Portal addresses and the user-specific labels the flows click on.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Landing page of the banking portal.
    pub url: String,

    /// Visible label of the card entry on the statements page.
    pub card_label: String,

    /// Visible label (substring) of the card selector in the export popup.
    pub card_selector_label: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: "https://www.leumi.co.il/he".to_string(),
            card_label: "MAX 2711".to_string(),
            card_selector_label: "max executive".to_string(),
        }
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn default_navigation_timeout() -> Duration {
    secs(20)
}
fn default_element_timeout() -> Duration {
    secs(15)
}
fn default_form_field_timeout() -> Duration {
    secs(10)
}
fn default_popup_timeout() -> Duration {
    secs(30)
}
fn default_download_timeout() -> Duration {
    secs(30)
}
fn default_export_ready_timeout() -> Duration {
    secs(30)
}
fn default_settle() -> Duration {
    Duration::from_millis(500)
}

/// Timeouts for every kind of browser wait.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Page loads and URL changes.
    #[serde(deserialize_with = "deserialize_duration")]
    pub navigation: Duration,

    /// Menu entries and other labelled controls.
    #[serde(deserialize_with = "deserialize_duration")]
    pub element: Duration,

    /// Login form inputs.
    #[serde(deserialize_with = "deserialize_duration")]
    pub form_field: Duration,

    /// Popup window appearing and becoming ready.
    #[serde(deserialize_with = "deserialize_duration")]
    pub popup: Duration,

    /// Download completing after the export trigger.
    #[serde(deserialize_with = "deserialize_duration")]
    pub download: Duration,

    /// Export control appearing once the export page is configured.
    #[serde(deserialize_with = "deserialize_duration")]
    pub export_ready: Duration,

    /// Pause after opening a dropdown so its options can render.
    #[serde(deserialize_with = "deserialize_duration")]
    pub settle: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation: default_navigation_timeout(),
            element: default_element_timeout(),
            form_field: default_form_field_timeout(),
            popup: default_popup_timeout(),
            download: default_download_timeout(),
            export_ready: default_export_ready_timeout(),
            settle: default_settle(),
        }
    }
}

/// Application configuration as written in `money-monitor.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Persistent browser profile. Relative paths resolve from the config file.
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,

    /// Where exports and debug artifacts are written.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Export the checking-account activity page.
    pub do_leumi_flow: bool,

    /// Export the credit-card statement spreadsheet.
    #[serde(default = "default_true")]
    pub do_max_flow: bool,

    /// Run the browser without a window.
    pub headless: bool,

    /// Optional TOML file with extra category/merchant translations.
    pub translations_file: Option<PathBuf>,

    pub portal: PortalConfig,

    pub timeouts: TimeoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile_dir: default_profile_dir(),
            download_dir: default_download_dir(),
            do_leumi_flow: false,
            do_max_flow: true,
            headless: false,
            translations_file: None,
            portal: PortalConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve every configured path against `config_dir`.
    pub fn resolve(self, config_dir: &Path) -> ResolvedConfig {
        ResolvedConfig {
            profile_dir: resolve_path(config_dir, &self.profile_dir),
            download_dir: resolve_path(config_dir, &self.download_dir),
            do_leumi_flow: self.do_leumi_flow,
            do_max_flow: self.do_max_flow,
            headless: self.headless,
            translations_file: self
                .translations_file
                .as_deref()
                .map(|p| resolve_path(config_dir, p)),
            portal: self.portal,
            timeouts: self.timeouts,
        }
    }
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Loaded configuration with absolute paths, passed into the run entry point.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub profile_dir: PathBuf,
    pub download_dir: PathBuf,
    pub do_leumi_flow: bool,
    pub do_max_flow: bool,
    pub headless: bool,
    pub translations_file: Option<PathBuf>,
    pub portal: PortalConfig,
    pub timeouts: TimeoutConfig,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./money-monitor.toml` if it exists in current directory
/// 2. `~/.local/share/money-monitor/money-monitor.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from(CONFIG_FILE_NAME);
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("money-monitor").join(CONFIG_FILE_NAME);
    }

    local_config
}

impl ResolvedConfig {
    /// Load and resolve config from a file path.
    ///
    /// Paths are resolved relative to the config file's parent directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        Ok(Config::load(&config_path)?.resolve(config_dir))
    }

    /// Load config, falling back to defaults rooted at the config file's
    /// intended directory when the file doesn't exist.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };

        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?;

        Ok(Config::default().resolve(config_dir))
    }

    pub fn max_export_path(&self) -> PathBuf {
        self.download_dir.join(MAX_EXPORT_FILE)
    }

    pub fn leumi_export_path(&self) -> PathBuf {
        self.download_dir.join(LEUMI_EXPORT_FILE)
    }

    pub fn popup_debug_path(&self) -> PathBuf {
        self.download_dir.join(POPUP_DEBUG_FILE)
    }
}
