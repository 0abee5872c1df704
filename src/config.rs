use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  /// Custom title for header (defaults to the backend domain if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub profile: ProfileConfig,
  #[serde(default)]
  pub reminders: ReminderConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Project URL, e.g. https://abcd.supabase.co
  pub url: String,
  /// Public (anon) API key. Prefer VITALS_ANON_KEY over putting it here.
  pub anon_key: Option<String>,
  /// Storage bucket for profile pictures
  #[serde(default = "default_avatar_bucket")]
  pub avatar_bucket: String,
  /// Request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_avatar_bucket() -> String {
  "avatars".to_string()
}

fn default_timeout_secs() -> u64 {
  15
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long a fetched result is served without revalidation
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
}

fn default_stale_secs() -> u64 {
  300
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: default_stale_secs(),
    }
  }
}

impl CacheConfig {
  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
  #[serde(default = "default_max_load_attempts")]
  pub max_load_attempts: u32,
  #[serde(default = "default_retry_delay_ms")]
  pub retry_delay_ms: u64,
}

fn default_max_load_attempts() -> u32 {
  crate::load::MAX_LOAD_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
  crate::load::RETRY_DELAY.as_millis() as u64
}

impl Default for ProfileConfig {
  fn default() -> Self {
    Self {
      max_load_attempts: default_max_load_attempts(),
      retry_delay_ms: default_retry_delay_ms(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
  #[serde(default = "default_interval_secs")]
  pub interval_secs: u64,
  /// Reminders due within this many minutes are notified
  #[serde(default = "default_lead_minutes")]
  pub lead_minutes: i64,
  /// Acts as the notification permission: false means denied
  #[serde(default = "default_true")]
  pub notifications: bool,
  #[serde(default = "default_mark_attempts")]
  pub mark_attempts: u32,
  #[serde(default = "default_mark_backoff_ms")]
  pub mark_backoff_ms: u64,
}

fn default_interval_secs() -> u64 {
  60
}

fn default_lead_minutes() -> i64 {
  15
}

fn default_true() -> bool {
  true
}

fn default_mark_attempts() -> u32 {
  3
}

fn default_mark_backoff_ms() -> u64 {
  500
}

impl Default for ReminderConfig {
  fn default() -> Self {
    Self {
      interval_secs: default_interval_secs(),
      lead_minutes: default_lead_minutes(),
      notifications: true,
      mark_attempts: default_mark_attempts(),
      mark_backoff_ms: default_mark_backoff_ms(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Keep session, theme and profile cache in memory only
  #[serde(default)]
  pub ephemeral: bool,
  /// Override the SQLite file location
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter directive, overridden by VITALS_LOG
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Override the log directory
  pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      dir: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./vitals.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/vitals/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/vitals/config.yaml\n\
                 with at least `backend: {{ url: https://<project>.supabase.co }}`."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("vitals.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("vitals").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    if config.backend.url.trim().is_empty() {
      return Err(eyre!("backend.url must not be empty"));
    }
    Ok(config)
  }

  /// Get the public API key, from VITALS_ANON_KEY or the config file.
  pub fn anon_key(&self) -> Result<String> {
    std::env::var("VITALS_ANON_KEY")
      .ok()
      .or_else(|| self.backend.anon_key.clone())
      .ok_or_else(|| {
        eyre!("Backend API key not found. Set VITALS_ANON_KEY or backend.anon_key in the config.")
      })
  }

  /// Directory for the local database and logs.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("vitals"))
  }

  pub fn header_title(&self) -> &str {
    match &self.title {
      Some(t) => t,
      None => extract_domain(&self.backend.url),
    }
  }
}

/// Extract domain from the backend URL
pub fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}
