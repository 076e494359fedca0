// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::lifecycle::LifecycleSettings;
use crate::platform::PermissionState;
use crate::sync::RetryPolicy;
use crate::utils::validate_http_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => anyhow::bail!("Unknown environment: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("Unknown log format: {}", other),
        }
    }
}

fn parse_permission(value: &str) -> anyhow::Result<PermissionState> {
    match value.to_ascii_lowercase().as_str() {
        "granted" => Ok(PermissionState::Granted),
        "denied" => Ok(PermissionState::Denied),
        "default" => Ok(PermissionState::Default),
        other => anyhow::bail!("Unknown notification permission: {}", other),
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("Invalid boolean: {}", other),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `development` unregisters stale workers and skips registration
    pub environment: Environment,

    /// Origin the application and its worker are served from
    pub app_origin: String,

    /// Worker script path, relative to the origin
    pub worker_script: String,

    /// Registration scope
    pub worker_scope: String,

    /// Periodic update re-check interval in seconds
    pub update_check_interval_secs: u64,

    /// URL probed with HEAD to decide reachability
    pub connectivity_probe_url: String,

    pub connectivity_poll_secs: u64,

    /// Offer the background-sync facility to the application
    pub background_sync: bool,

    /// Tag used for meal-log upload sync requests
    pub sync_tag: String,

    pub sync_max_attempts: u32,

    /// First retry delay; doubled on every further attempt
    pub sync_retry_base_secs: u64,

    /// SQLite database holding queued meal logs
    pub outbox_db_path: PathBuf,

    /// Directory for precached assets
    pub cache_dir: PathBuf,

    /// Meal-log persistence endpoint
    pub upload_endpoint: String,

    /// Optional bearer token for the upload endpoint
    pub upload_api_key: Option<String>,

    /// Meal logs sent per upload request
    pub upload_batch_size: u32,

    /// Answer given to notification permission requests
    pub notification_permission: PermissionState,

    /// Local UI/API bind address (e.g., "127.0.0.1:8080")
    pub local_api_bind: SocketAddr,

    /// Manual update checks allowed per client per window
    pub manual_check_limit: u32,

    pub manual_check_window_secs: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("MEALSYNC_CONFIG")
            .unwrap_or_else(|_| "config.toml".to_string());

        let mut config = Self::from_file_or_default(Path::new(&config_path))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `MEALSYNC_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("MEALSYNC_ENVIRONMENT") {
            self.environment = val.parse()?;
        }
        if let Some(val) = lookup("MEALSYNC_APP_ORIGIN") {
            self.app_origin = val;
        }
        if let Some(val) = lookup("MEALSYNC_WORKER_SCRIPT") {
            self.worker_script = val;
        }
        if let Some(val) = lookup("MEALSYNC_WORKER_SCOPE") {
            self.worker_scope = val;
        }
        if let Some(val) = lookup("MEALSYNC_UPDATE_CHECK_INTERVAL_SECS") {
            self.update_check_interval_secs = val.parse()?;
        }
        if let Some(val) = lookup("MEALSYNC_CONNECTIVITY_PROBE_URL") {
            self.connectivity_probe_url = val;
        }
        if let Some(val) = lookup("MEALSYNC_CONNECTIVITY_POLL_SECS") {
            self.connectivity_poll_secs = val.parse()?;
        }
        if let Some(val) = lookup("MEALSYNC_BACKGROUND_SYNC") {
            self.background_sync = parse_bool(&val)?;
        }
        if let Some(val) = lookup("MEALSYNC_SYNC_TAG") {
            self.sync_tag = val;
        }
        if let Some(val) = lookup("MEALSYNC_SYNC_MAX_ATTEMPTS") {
            self.sync_max_attempts = val.parse()?;
        }
        if let Some(val) = lookup("MEALSYNC_SYNC_RETRY_BASE_SECS") {
            self.sync_retry_base_secs = val.parse()?;
        }
        if let Some(val) = lookup("MEALSYNC_OUTBOX_DB_PATH") {
            self.outbox_db_path = PathBuf::from(val);
        }
        if let Some(val) = lookup("MEALSYNC_CACHE_DIR") {
            self.cache_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("MEALSYNC_UPLOAD_ENDPOINT") {
            self.upload_endpoint = val;
        }
        if let Some(val) = lookup("MEALSYNC_UPLOAD_API_KEY") {
            self.upload_api_key = Some(val);
        }
        if let Some(val) = lookup("MEALSYNC_UPLOAD_BATCH_SIZE") {
            self.upload_batch_size = val.parse()?;
        }
        if let Some(val) = lookup("MEALSYNC_NOTIFICATION_PERMISSION") {
            self.notification_permission = parse_permission(&val)?;
        }
        if let Some(val) = lookup("MEALSYNC_LOCAL_API_BIND") {
            self.local_api_bind = SocketAddr::from_str(&val)?;
        }
        if let Some(val) = lookup("MEALSYNC_MANUAL_CHECK_LIMIT") {
            self.manual_check_limit = val.parse()?;
        }
        if let Some(val) = lookup("MEALSYNC_MANUAL_CHECK_WINDOW_SECS") {
            self.manual_check_window_secs = val.parse()?;
        }
        if let Some(val) = lookup("MEALSYNC_LOG_LEVEL") {
            self.log_level = val;
        }
        if let Some(val) = lookup("MEALSYNC_LOG_FORMAT") {
            self.log_format = val.parse()?;
        }

        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        validate_http_url(&self.app_origin).context("app_origin")?;
        validate_http_url(&self.connectivity_probe_url).context("connectivity_probe_url")?;
        validate_http_url(&self.upload_endpoint).context("upload_endpoint")?;

        if !self.worker_scope.starts_with('/') {
            anyhow::bail!("worker_scope must start with '/': {}", self.worker_scope);
        }
        if self.worker_script.trim().is_empty() {
            anyhow::bail!("worker_script must not be empty");
        }
        if self.sync_tag.trim().is_empty() {
            anyhow::bail!("sync_tag must not be empty");
        }
        if self.update_check_interval_secs == 0 {
            anyhow::bail!("update_check_interval_secs must be greater than zero");
        }
        if self.connectivity_poll_secs == 0 {
            anyhow::bail!("connectivity_poll_secs must be greater than zero");
        }
        if self.sync_max_attempts == 0 {
            anyhow::bail!("sync_max_attempts must be at least 1");
        }
        if self.manual_check_window_secs == 0 {
            anyhow::bail!("manual_check_window_secs must be greater than zero");
        }
        if self.upload_batch_size == 0 {
            anyhow::bail!("upload_batch_size must be at least 1");
        }

        Ok(())
    }

    pub fn origin_url(&self) -> anyhow::Result<Url> {
        validate_http_url(&self.app_origin)
    }

    pub fn probe_url(&self) -> anyhow::Result<Url> {
        validate_http_url(&self.connectivity_probe_url)
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            script_url: self.worker_script.clone(),
            scope: self.worker_scope.clone(),
            environment: self.environment,
            recheck_interval: Duration::from_secs(self.update_check_interval_secs),
            sync_tag: self.sync_tag.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.sync_max_attempts,
            base_delay: Duration::from_secs(self.sync_retry_base_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            app_origin: String::from("http://localhost:3000"),
            worker_script: String::from("/sw.js"),
            worker_scope: String::from("/"),
            update_check_interval_secs: 1800, // 30 minutes
            connectivity_probe_url: String::from("http://localhost:3000/api/health"),
            connectivity_poll_secs: 15,
            background_sync: true,
            sync_tag: String::from("meal-log-upload"),
            sync_max_attempts: 3,
            sync_retry_base_secs: 5,
            outbox_db_path: PathBuf::from("outbox.db"),
            cache_dir: PathBuf::from("cache"),
            upload_endpoint: String::from("http://localhost:3000/api/meal-logs"),
            upload_api_key: None,
            upload_batch_size: 50,
            notification_permission: PermissionState::Default,
            local_api_bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            manual_check_limit: 5,
            manual_check_window_secs: 60,
            log_level: String::from("info"),
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::NamedTempFile;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.worker_script, "/sw.js");
        assert_eq!(config.worker_scope, "/");
        assert_eq!(config.update_check_interval_secs, 1800);
        assert_eq!(config.sync_tag, "meal-log-upload");
        assert_eq!(config.sync_max_attempts, 3);
        assert_eq!(config.notification_permission, PermissionState::Default);
        assert_eq!(config.local_api_bind, SocketAddr::from_str("127.0.0.1:8080").unwrap());
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.upload_batch_size, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_config_file() {
        let config = Config::from_file_or_default(Path::new("/nonexistent/mealsync.toml")).unwrap();
        assert_eq!(config.outbox_db_path, PathBuf::from("outbox.db"));
    }

    #[test]
    fn test_load_from_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
environment = "development"
app_origin = "https://meals.example.com"
worker_script = "/service-worker.js"
update_check_interval_secs = 600
background_sync = false
sync_tag = "meals"
notification_permission = "granted"
local_api_bind = "0.0.0.0:9000"
log_format = "json"
"#;
        fs::write(temp_file.path(), config_content).unwrap();

        let config = Config::from_file_or_default(temp_file.path()).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.app_origin, "https://meals.example.com");
        assert_eq!(config.worker_script, "/service-worker.js");
        assert_eq!(config.update_check_interval_secs, 600);
        assert!(!config.background_sync);
        assert_eq!(config.sync_tag, "meals");
        assert_eq!(config.notification_permission, PermissionState::Granted);
        assert_eq!(config.local_api_bind, SocketAddr::from_str("0.0.0.0:9000").unwrap());
        assert_eq!(config.log_format, LogFormat::Json);
        // Unset keys keep their defaults
        assert_eq!(config.worker_scope, "/");
        assert_eq!(config.sync_max_attempts, 3);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_toml_str("environment = \"staging\"").is_err());
        assert!(Config::from_toml_str("update_check_interval_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                ("MEALSYNC_ENVIRONMENT", "dev"),
                ("MEALSYNC_APP_ORIGIN", "https://env.example.com"),
                ("MEALSYNC_UPDATE_CHECK_INTERVAL_SECS", "120"),
                ("MEALSYNC_BACKGROUND_SYNC", "off"),
                ("MEALSYNC_UPLOAD_API_KEY", "env-key-456"),
                ("MEALSYNC_UPLOAD_BATCH_SIZE", "10"),
                ("MEALSYNC_NOTIFICATION_PERMISSION", "denied"),
                ("MEALSYNC_LOCAL_API_BIND", "192.168.1.1:9090"),
                ("MEALSYNC_LOG_LEVEL", "trace"),
                ("MEALSYNC_LOG_FORMAT", "JSON"),
            ]))
            .unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.app_origin, "https://env.example.com");
        assert_eq!(config.update_check_interval_secs, 120);
        assert!(!config.background_sync);
        assert_eq!(config.upload_api_key, Some("env-key-456".to_string()));
        assert_eq!(config.upload_batch_size, 10);
        assert_eq!(config.notification_permission, PermissionState::Denied);
        assert_eq!(config.local_api_bind, SocketAddr::from_str("192.168.1.1:9090").unwrap());
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_env_override_parse_errors() {
        let mut config = Config::default();
        assert!(config.apply_overrides(lookup(&[("MEALSYNC_SYNC_MAX_ATTEMPTS", "many")])).is_err());
        assert!(config.apply_overrides(lookup(&[("MEALSYNC_BACKGROUND_SYNC", "maybe")])).is_err());
        assert!(config.apply_overrides(lookup(&[("MEALSYNC_LOCAL_API_BIND", "localhost")])).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.app_origin = "file:///srv/app".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.worker_scope = "app/".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.update_check_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sync_max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.upload_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_settings() {
        let config = Config::default();

        let settings = config.lifecycle_settings();
        assert_eq!(settings.recheck_interval, Duration::from_secs(1800));
        assert_eq!(settings.sync_tag, "meal-log-upload");

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(5));
    }
}
