//! Service settings.
//!
//! Loaded once at startup from a TOML or YAML file, then overridden from the
//! environment (`.env` is honoured). Every section has serde defaults so an
//! empty file is a valid configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use secrecy::SecretString;
use serde::Deserialize;

use crate::allowlist::COMMON_UNHARMONIZED_FIELDS;

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub pagination: PaginationSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub query: QuerySettings,

    #[serde(default)]
    pub allowlist: AllowlistSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub data: DataSettings,

    /// Stored `sex_at_birth` value → API code (`M`, `F`, `U`).
    #[serde(default = "default_sex_value_mappings")]
    pub sex_value_mappings: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            pagination: PaginationSettings::default(),
            cache: CacheSettings::default(),
            query: QuerySettings::default(),
            allowlist: AllowlistSettings::default(),
            server: ServerSettings::default(),
            data: DataSettings::default(),
            sex_value_mappings: default_sex_value_mappings(),
        }
    }
}

fn default_sex_value_mappings() -> BTreeMap<String, String> {
    [("Male", "M"), ("Female", "F"), ("Not Reported", "U"), ("Unknown", "U")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ── Database ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default)]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: SecretString,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_uri() -> String { "bolt://localhost:7687".to_string() }
fn default_password() -> SecretString { SecretString::from(String::new()) }
fn default_max_connections() -> usize { 16 }

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: String::new(),
            password: default_password(),
            max_connections: default_max_connections(),
        }
    }
}

// ── Pagination ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationSettings {
    #[serde(default = "default_per_page")]
    pub default_per_page: u64,

    #[serde(default = "default_max_per_page")]
    pub max_per_page: u64,
}

fn default_per_page() -> u64 { 100 }
fn default_max_per_page() -> u64 { 1000 }

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
        }
    }
}

// ── Cache ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_count_ttl")]
    pub count_ttl_secs: u64,

    #[serde(default = "default_summary_ttl")]
    pub summary_ttl_secs: u64,

    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

fn default_true() -> bool { true }
fn default_count_ttl() -> u64 { 300 }
fn default_summary_ttl() -> u64 { 600 }
fn default_cache_capacity() -> u64 { 10_000 }

impl CacheSettings {
    pub fn count_ttl(&self) -> Duration {
        Duration::from_secs(self.count_ttl_secs)
    }

    pub fn summary_ttl(&self) -> Duration {
        Duration::from_secs(self.summary_ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            count_ttl_secs: default_count_ttl(),
            summary_ttl_secs: default_summary_ttl(),
            max_capacity: default_cache_capacity(),
        }
    }
}

// ── Query execution ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct QuerySettings {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after the first failed one.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_timeout() -> u64 { 60 }
fn default_retry_attempts() -> u32 { 2 }
fn default_retry_backoff() -> u64 { 100 }

impl QuerySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

// ── Allowlist ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AllowlistSettings {
    /// Unharmonized keys accepted after the `metadata.unharmonized.` prefix.
    #[serde(default = "default_unharmonized_fields")]
    pub unharmonized_fields: Vec<String>,
}

fn default_unharmonized_fields() -> Vec<String> {
    COMMON_UNHARMONIZED_FIELDS.iter().map(|s| s.to_string()).collect()
}

impl Default for AllowlistSettings {
    fn default() -> Self {
        Self { unharmonized_fields: default_unharmonized_fields() }
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Public base url used for `Linked` sample identifiers.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_bind() -> String { "0.0.0.0:8000".to_string() }

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind(), base_url: None }
    }
}

// ── Static data files ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct DataSettings {
    #[serde(default = "default_field_mappings_path")]
    pub field_mappings: PathBuf,

    #[serde(default = "default_file_types_path")]
    pub file_types: PathBuf,
}

fn default_field_mappings_path() -> PathBuf { PathBuf::from("config_data/field_mappings.json") }
fn default_file_types_path() -> PathBuf { PathBuf::from("config_data/file_types.json") }

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            field_mappings: default_field_mappings_path(),
            file_types: default_file_types_path(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl Settings {
    /// Parse a settings document; the format follows the file extension.
    pub fn from_str_with_format(content: &str, yaml: bool) -> anyhow::Result<Self> {
        if yaml {
            serde_yaml::from_str(content).context("invalid YAML settings")
        } else {
            toml::from_str(content).context("invalid TOML settings")
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        Self::from_str_with_format(&content, yaml)
    }

    /// Load `.env`, then the file named by `CCDI_CONFIG` if set, then apply
    /// environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut settings = match std::env::var("CCDI_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides from a key lookup. Split out so tests need not touch
    /// the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(uri) = lookup("MEMGRAPH_URI") {
            self.database.uri = uri;
        }
        if let Some(user) = lookup("MEMGRAPH_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("MEMGRAPH_PASSWORD") {
            self.database.password = SecretString::from(password);
        }
        if let Some(bind) = lookup("CCDI_BIND") {
            self.server.bind = bind;
        }
        if let Some(base_url) = lookup("CCDI_BASE_URL") {
            self.server.base_url = Some(base_url);
        }
        if let Some(timeout) = lookup("CCDI_QUERY_TIMEOUT_SECS") {
            self.query.timeout_secs = timeout
                .parse()
                .with_context(|| format!("CCDI_QUERY_TIMEOUT_SECS is not an integer: {timeout}"))?;
        }
        if self.pagination.max_per_page == 0 {
            anyhow::bail!("pagination.max_per_page must be positive");
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.pagination.max_per_page, 1000);
        assert_eq!(settings.query.timeout(), Duration::from_secs(60));
        assert_eq!(settings.query.retry_attempts, 2);
        assert_eq!(settings.cache.count_ttl(), Duration::from_secs(300));
        assert_eq!(settings.sex_value_mappings.get("Female"), Some(&"F".to_string()));
    }

    #[test]
    fn test_empty_toml_is_valid() {
        let settings = Settings::from_str_with_format("", false).unwrap();
        assert_eq!(settings.database.uri, "bolt://localhost:7687");
        assert!(settings.allowlist.unharmonized_fields.contains(&"study_id".to_string()));
    }

    #[test]
    fn test_partial_toml_sections() {
        let toml = r#"
            [pagination]
            max_per_page = 50

            [cache]
            summary_ttl_secs = 30

            [sex_value_mappings]
            "M" = "M"
            "Male" = "M"
        "#;
        let settings = Settings::from_str_with_format(toml, false).unwrap();
        assert_eq!(settings.pagination.max_per_page, 50);
        assert_eq!(settings.pagination.default_per_page, 100);
        assert_eq!(settings.cache.summary_ttl(), Duration::from_secs(30));
        assert_eq!(settings.sex_value_mappings.len(), 2);
    }

    #[test]
    fn test_yaml_settings() {
        let yaml = "query:\n  timeout_secs: 5\nserver:\n  base_url: https://ccdi.example.org\n";
        let settings = Settings::from_str_with_format(yaml, true).unwrap();
        assert_eq!(settings.query.timeout(), Duration::from_secs(5));
        assert_eq!(settings.server.base_url.as_deref(), Some("https://ccdi.example.org"));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_env(|key| match key {
                "MEMGRAPH_URI" => Some("bolt://graph:7687".to_string()),
                "MEMGRAPH_PASSWORD" => Some("hunter2".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(settings.database.uri, "bolt://graph:7687");
        assert_eq!(settings.database.password.expose_secret(), "hunter2");
    }

    #[test]
    fn test_bad_timeout_override_is_rejected() {
        let mut settings = Settings::default();
        let result = settings.apply_env(|key| {
            (key == "CCDI_QUERY_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }
}
