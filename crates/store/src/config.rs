// Store configuration.
//
// File: `~/.marginalia/config.toml`, every field optional.
// Environment overrides (`MARGINALIA_*`) are applied on top of the file.

use std::env::VarError;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use marginalia_common::schema::encode::Instructions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::BackoffPolicy;

/// Root directory for global state: `~/.marginalia/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".marginalia"))
}

/// Path to the config file: `~/.marginalia/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Name shown in document titles and the instructions block.
    pub app_name: String,
    pub app_url: String,
    /// Page linked from the instructions block.
    pub caveats_url: String,
    /// Collection whose annotations live in one backing document (e.g. a tractate).
    pub collection: String,
    /// Use a separate debug backing document.
    pub debug: bool,
    pub docs_api_base: String,
    pub drive_api_base: String,
    /// OAuth bearer token. Prefer `MARGINALIA_ACCESS_TOKEN` over the file.
    pub access_token: Option<String>,
    pub request_timeout_secs: u64,
    /// How often a write is rebuilt after the document moved underneath it.
    pub max_stale_retries: u32,
    pub backoff: BackoffPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            app_name: "talmud.page".into(),
            app_url: "https://talmud.page".into(),
            caveats_url: "https://talmud.page/caveats/google-docs".into(),
            collection: "Berakhot".into(),
            debug: false,
            docs_api_base: "https://docs.googleapis.com/v1/".into(),
            drive_api_base: "https://www.googleapis.com/drive/v3/".into(),
            access_token: None,
            request_timeout_secs: 30,
            max_stale_retries: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// File config (or defaults) with environment overrides applied.
    pub fn load() -> Self {
        let base = config_path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default();
        base.with_env_fn(|key| std::env::var(key))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply environment overrides from a lookup function.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `MARGINALIA_APP_NAME` | `app_name` |
    /// | `MARGINALIA_COLLECTION` | `collection` |
    /// | `MARGINALIA_DEBUG` | `debug` (`1`/`true`) |
    /// | `MARGINALIA_DOCS_API` | `docs_api_base` |
    /// | `MARGINALIA_DRIVE_API` | `drive_api_base` |
    /// | `MARGINALIA_ACCESS_TOKEN` | `access_token` |
    /// | `MARGINALIA_TIMEOUT_SECS` | `request_timeout_secs` |
    /// | `MARGINALIA_MAX_STALE_RETRIES` | `max_stale_retries` |
    ///
    /// Unparseable numbers leave the current value in place.
    pub fn with_env_fn<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        if let Ok(value) = env("MARGINALIA_APP_NAME") {
            self.app_name = value;
        }
        if let Ok(value) = env("MARGINALIA_COLLECTION") {
            self.collection = value;
        }
        if let Ok(value) = env("MARGINALIA_DEBUG") {
            let value = value.trim().to_ascii_lowercase();
            self.debug = matches!(value.as_str(), "1" | "true" | "yes");
        }
        if let Ok(value) = env("MARGINALIA_DOCS_API") {
            self.docs_api_base = value;
        }
        if let Ok(value) = env("MARGINALIA_DRIVE_API") {
            self.drive_api_base = value;
        }
        if let Ok(value) = env("MARGINALIA_ACCESS_TOKEN") {
            self.access_token = Some(value).filter(|token| !token.is_empty());
        }
        if let Some(secs) = parsed(env("MARGINALIA_TIMEOUT_SECS")) {
            self.request_timeout_secs = secs;
        }
        if let Some(retries) = parsed(env("MARGINALIA_MAX_STALE_RETRIES")) {
            self.max_stale_retries = retries;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Property string that tags the backing document for this collection.
    pub fn database_property(&self) -> String {
        let kind = if self.debug { "debug database" } else { "database" };
        format!("{} {kind}", self.collection)
    }

    /// Title given to a newly created backing document.
    pub fn document_title(&self) -> String {
        let kind = if self.debug { "debug notes" } else { "notes" };
        format!("{} {} {kind}", self.app_name, self.collection)
    }

    pub fn instructions(&self) -> Instructions {
        Instructions {
            app_name: self.app_name.clone(),
            app_url: self.app_url.clone(),
            caveats_url: self.caveats_url.clone(),
        }
    }
}

fn parsed<T: FromStr>(value: Result<String, VarError>) -> Option<T> {
    value.ok()?.trim().parse().ok()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from_map(
        map: HashMap<&'static str, &'static str>,
    ) -> impl Fn(&str) -> Result<String, VarError> {
        move |key: &str| {
            let value = map.get(key).map(|v| v.to_string());
            value.ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let cfg = StoreConfig::default().with_env_fn(env_from_map(HashMap::new()));
        assert_eq!(cfg, StoreConfig::default());
        assert_eq!(cfg.max_stale_retries, 3);
        assert_eq!(cfg.backoff.base_delay_ms, 200);
        assert!(cfg.access_token.is_none());
    }

    #[test]
    fn env_overrides_apply() {
        let mut m = HashMap::new();
        m.insert("MARGINALIA_COLLECTION", "Pesachim");
        m.insert("MARGINALIA_DEBUG", "true");
        m.insert("MARGINALIA_ACCESS_TOKEN", "ya29.token");
        m.insert("MARGINALIA_MAX_STALE_RETRIES", "7");
        let cfg = StoreConfig::default().with_env_fn(env_from_map(m));
        assert_eq!(cfg.collection, "Pesachim");
        assert!(cfg.debug);
        assert_eq!(cfg.access_token.as_deref(), Some("ya29.token"));
        assert_eq!(cfg.max_stale_retries, 7);
    }

    #[test]
    fn invalid_number_keeps_current_value() {
        let mut m = HashMap::new();
        m.insert("MARGINALIA_TIMEOUT_SECS", "soon");
        let cfg = StoreConfig::default().with_env_fn(env_from_map(m));
        assert_eq!(cfg.request_timeout_secs, 30);
    }

    #[test]
    fn empty_token_means_none() {
        let mut m = HashMap::new();
        m.insert("MARGINALIA_ACCESS_TOKEN", "");
        let cfg = StoreConfig {
            access_token: Some("old".into()),
            ..Default::default()
        };
        let cfg = cfg.with_env_fn(env_from_map(m));
        assert!(cfg.access_token.is_none());
    }

    #[test]
    fn property_and_title_follow_debug_flag() {
        let cfg = StoreConfig {
            collection: "Pesachim".into(),
            ..Default::default()
        };
        assert_eq!(cfg.database_property(), "Pesachim database");
        assert_eq!(cfg.document_title(), "talmud.page Pesachim notes");

        let debug = StoreConfig { debug: true, ..cfg };
        assert_eq!(debug.database_property(), "Pesachim debug database");
        assert_eq!(debug.document_title(), "talmud.page Pesachim debug notes");
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg: StoreConfig = toml::from_str(
            r#"
collection = "Shabbat"

[backoff]
max_attempts = 2
"#,
        )
        .unwrap();
        assert_eq!(cfg.collection, "Shabbat");
        assert_eq!(cfg.backoff.max_attempts, 2);
        assert_eq!(cfg.backoff.multiplier, 1.5);
        assert_eq!(cfg.app_name, "talmud.page");
    }

    #[test]
    fn roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = StoreConfig {
            collection: "Yoma".into(),
            debug: true,
            ..Default::default()
        };
        cfg.save_to(&path).unwrap();
        assert_eq!(StoreConfig::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = StoreConfig::load_from(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn global_dir_is_under_home() {
        if let Some(dir) = global_dir() {
            assert!(dir.ends_with(".marginalia"));
        }
    }
}
