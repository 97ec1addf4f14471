use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// =============================================================================
// Unified config (figment-deserialized from defaults / timedate.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   timedate.toml:   [cors]
//                    allowed_origins = ["https://*.example.com"]
//
//   env var:         TIMEDATE_CORS__ALLOWED_ORIGINS=https://*.example.com,http://localhost:*
//
//   (double underscore = nesting; list fields also accept a comma-separated string)

pub const DEFAULT_CONFIG_FILE: &str = "timedate.toml";

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub cors: CorsFileConfig,
    #[serde(default)]
    pub websocket: WebSocketFileConfig,
    #[serde(default)]
    pub logging: LoggingFileConfig,
}

/// Listener settings (lives under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Cross-origin admission (lives under `[cors]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorsFileConfig {
    #[serde(default = "default_allowed_origins", deserialize_with = "list_or_csv")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_allowed_methods", deserialize_with = "list_or_csv")]
    pub allowed_methods: Vec<String>,
    #[serde(default = "default_allowed_headers", deserialize_with = "list_or_csv")]
    pub allowed_headers: Vec<String>,
    #[serde(default = "default_allow_credentials")]
    pub allow_credentials: bool,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl Default for CorsFileConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            allowed_methods: default_allowed_methods(),
            allowed_headers: default_allowed_headers(),
            allow_credentials: default_allow_credentials(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

/// Streaming session tunables (lives under `[websocket]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSocketFileConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

impl Default for WebSocketFileConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            write_timeout_secs: default_write_timeout_secs(),
        }
    }
}

/// Log output (lives under `[logging]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingFileConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Empty string disables the file layer.
    #[serde(default = "default_log_file")]
    pub file: String,
}

impl Default for LoggingFileConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: default_log_file(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:8080".to_string(),
    ]
}
fn default_allowed_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_allowed_headers() -> Vec<String> {
    ["Content-Type", "Authorization", "X-Requested-With"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_allow_credentials() -> bool {
    true
}
fn default_max_age_secs() -> u64 {
    3600
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_write_timeout_secs() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file() -> String {
    "server.log".to_string()
}

/// Accept either a sequence or a comma-separated string. Entries are trimmed
/// and blanks dropped.
fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrCsv {
        List(Vec<String>),
        Csv(String),
    }

    let raw = match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(items) => items,
        ListOrCsv::Csv(s) => s.split(',').map(String::from).collect(),
    };
    Ok(raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Build a figment that layers: defaults → config file → TIMEDATE_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `TIMEDATE_SERVER__PORT=9000`  →  `server.port = 9000`
///   `TIMEDATE_WEBSOCKET__TICK_INTERVAL_MS=500`  →  `websocket.tick_interval_ms = 500`
pub fn load_config(config_path: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("TIMEDATE_").split("__"))
}

/// Write a default config file at `path` unless one already exists.
///
/// Returns `true` when a file was written.
pub fn ensure_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let body = toml::to_string_pretty(&FileConfig::default())
        .context("Failed to render default config")?;
    let contents = format!(
        "# timedate configuration\n\
         #\n\
         # Every key can be overridden with TIMEDATE_<SECTION>__<KEY>, e.g.\n\
         #   TIMEDATE_SERVER__PORT=9000\n\
         #   TIMEDATE_CORS__ALLOWED_ORIGINS=https://*.example.com,http://localhost:*\n\
         #\n\
         # allowed_origins entries may be literal origins, \"*\", or wildcard\n\
         # patterns such as \"https://*.example.com\" and \"http://localhost:*\".\n\n{}",
        body
    );
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    info!("Wrote default config to {}", path.display());
    Ok(true)
}

// =============================================================================
// Runtime config structs (derived from FileConfig, used throughout the server)
// =============================================================================

/// Resolved server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
    pub websocket: WebSocketConfig,
}

#[derive(Clone, Debug)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age: Duration,
}

#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// Period of the broadcast task
    pub tick_interval: Duration,
    /// Upper bound on a single outbound send
    pub write_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self::from_file(&WebSocketFileConfig::default())
    }
}

impl WebSocketConfig {
    pub fn from_file(fc: &WebSocketFileConfig) -> Self {
        Self {
            // A zero period would make tokio's interval panic.
            tick_interval: Duration::from_millis(fc.tick_interval_ms.max(1)),
            write_timeout: Duration::from_secs(fc.write_timeout_secs.max(1)),
        }
    }
}

impl ServerConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            host: fc.server.host.clone(),
            port: fc.server.port,
            cors: CorsConfig {
                allowed_origins: fc.cors.allowed_origins.clone(),
                allowed_methods: fc.cors.allowed_methods.clone(),
                allowed_headers: fc.cors.allowed_headers.clone(),
                allow_credentials: fc.cors.allow_credentials,
                max_age: Duration::from_secs(fc.cors.max_age_secs),
            },
            websocket: WebSocketConfig::from_file(&fc.websocket),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Resolved log settings.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn from_file(fc: &LoggingFileConfig) -> Self {
        let file = fc.file.trim();
        Self {
            level: fc.level.trim().to_lowercase(),
            format: fc.format,
            file: (!file.is_empty()).then(|| PathBuf::from(file)),
        }
    }
}
