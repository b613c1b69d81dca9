use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_TOKEN_URL: &str = "https://api.netatmo.com/oauth2/token";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://api.netatmo.com/oauth2/authorize";
pub const DEFAULT_STATION_DATA_URL: &str = "https://api.netatmo.com/api/getstationsdata";

pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_STATE_FILE: &str = "netatmo_state.json";

pub const DEFAULT_OTEL_ENABLED: bool = true;
pub const DEFAULT_OTEL_SERVICE_NAME: &str = "netatmo-monitor";
pub const DEFAULT_OTEL_NAMESPACE: &str = "netatmo";
pub const DEFAULT_OTEL_COLLECTOR_ENDPOINT: &str = "http://localhost:4318";
pub const DEFAULT_OTEL_EXPORT_INTERVAL_MS: u64 = 10_000;

/// Remote endpoints. Overridable so the clients can be pointed at a proxy or a mock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub token_url: String,
    pub authorize_url: String,
    pub station_data_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            station_data_url: DEFAULT_STATION_DATA_URL.to_string(),
        }
    }
}

impl ApiConfig {
    /// All three endpoints rooted at `base`, e.g. a mock server uri.
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            token_url: format!("{base}/oauth2/token"),
            authorize_url: format!("{base}/oauth2/authorize"),
            station_data_url: format!("{base}/api/getstationsdata"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// `KEY=value` settings file holding the NETATMO_* credentials.
    pub env_file: PathBuf,
    /// JSON file with the previous metric values. Defaults to the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self { env_file: PathBuf::from(DEFAULT_ENV_FILE), state_file: None }
    }
}

impl FilesConfig {
    pub fn state_file_path(&self) -> PathBuf {
        if let Some(path) = &self.state_file {
            return path.clone();
        }

        project_dirs()
            .map(|dirs| dirs.data_dir().join(DEFAULT_STATE_FILE))
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_FILE))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Send a random per-run `state` instead of the fixed literal.
    pub random_state: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub service_name: String,
    pub namespace: String,
    /// OTLP/HTTP collector base url; `/v1/metrics` is appended when missing.
    pub collector_endpoint: String,
    pub export_interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_OTEL_ENABLED,
            service_name: DEFAULT_OTEL_SERVICE_NAME.to_string(),
            namespace: DEFAULT_OTEL_NAMESPACE.to_string(),
            collector_endpoint: DEFAULT_OTEL_COLLECTOR_ENDPOINT.to_string(),
            export_interval_ms: DEFAULT_OTEL_EXPORT_INTERVAL_MS,
        }
    }
}

impl TelemetryConfig {
    pub fn export_interval(&self) -> Duration {
        Duration::from_millis(self.export_interval_ms)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [opentelemetry]
/// enabled = true
/// collector_endpoint = "http://otel-collector:4318"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub files: FilesConfig,
    pub auth: AuthConfig,
    #[serde(rename = "opentelemetry")]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load config from `path`. A missing file is created with defaults first.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let cfg = Self::default();
            cfg.save(path)?;
            tracing::info!(path = %path.display(), "Created default configuration file");
            return Ok(cfg);
        }

        Self::load(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Default path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "netatmo-otel", "netatmo-otel")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [opentelemetry]
            enabled = false
            "#,
        )
        .expect("partial config must parse");

        assert!(!cfg.telemetry.enabled);
        assert_eq!(cfg.telemetry.service_name, DEFAULT_OTEL_SERVICE_NAME);
        assert_eq!(cfg.api, ApiConfig::default());
        assert!(!cfg.auth.random_state);
    }

    #[test]
    fn load_or_create_writes_defaults_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let created = Config::load_or_create(&path).expect("create");
        assert!(path.exists());
        assert_eq!(created, Config::default());

        let mut edited = created.clone();
        edited.telemetry.namespace = "garden".into();
        edited.save(&path).expect("save");

        let loaded = Config::load_or_create(&path).expect("reload");
        assert_eq!(loaded.telemetry.namespace, "garden");
    }

    #[test]
    fn base_url_override_builds_all_endpoints() {
        let api = ApiConfig::with_base_url("http://127.0.0.1:9000/");
        assert_eq!(api.token_url, "http://127.0.0.1:9000/oauth2/token");
        assert_eq!(api.authorize_url, "http://127.0.0.1:9000/oauth2/authorize");
        assert_eq!(api.station_data_url, "http://127.0.0.1:9000/api/getstationsdata");
    }

    #[test]
    fn explicit_state_file_wins() {
        let files = FilesConfig { state_file: Some(PathBuf::from("/tmp/s.json")), ..Default::default() };
        assert_eq!(files.state_file_path(), PathBuf::from("/tmp/s.json"));
    }
}
