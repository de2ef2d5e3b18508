//! Configuration: TOML file on disk plus environment overrides.
//!
//! The file lives at `~/.config/chatrelay/config.toml` (or the platform
//! equivalent) and is created with commented defaults on first run.
//! Environment variables win over the file so deployments can inject
//! secrets without editing it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_gateway_port() -> u16 {
    8787
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.9
}

fn default_storage_backend() -> String {
    "sqlite".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where state (the sqlite database) lives. Not part of the file.
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Where this config was loaded from. Not part of the file.
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL override for self-hosted or gateway endpoints.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Exact-match CORS origin allow-list. Empty means wildcard.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "sqlite" or "memory".
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            api_key: None,
            api_url: None,
            provider: default_provider(),
            model: default_model(),
            gateway: GatewayConfig::default(),
            inference: InferenceConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Resolve the config and data directories, honoring the
/// `CHATRELAY_CONFIG_DIR` override used by tests and containers.
fn resolve_dirs() -> Result<(PathBuf, PathBuf)> {
    if let Ok(dir) = std::env::var("CHATRELAY_CONFIG_DIR") {
        let dir = PathBuf::from(dir);
        return Ok((dir.clone(), dir.join("data")));
    }

    let dirs = directories::ProjectDirs::from("", "", "chatrelay")
        .context("Could not determine a home directory for config")?;
    Ok((
        dirs.config_dir().to_path_buf(),
        dirs.data_dir().to_path_buf(),
    ))
}

impl Config {
    pub fn provider_name(&self) -> &str {
        &self.provider
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Load `config.toml`, creating it with defaults on first run, then
    /// apply environment overrides and validate.
    pub fn load_or_init() -> Result<Self> {
        let (config_dir, data_dir) = resolve_dirs()?;
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config dir {}", config_dir.display()))?;
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let config_path = config_dir.join("config.toml");

        let mut config: Config = if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("Invalid TOML in {}", config_path.display()))?
        } else {
            let config = Config::default();
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render default config")?;
            std::fs::write(&config_path, rendered)
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
            restrict_permissions(&config_path);
            tracing::info!(path = %config_path.display(), "Created default config");
            config
        };

        config.data_dir = data_dir;
        config.config_path = config_path;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables take precedence over the file. Both the
    /// namespaced and the bare spellings are accepted, namespaced first.
    pub fn apply_env_overrides(&mut self) {
        fn env_first(names: &[&str]) -> Option<String> {
            for name in names {
                if let Ok(value) = std::env::var(name) {
                    let value = value.trim().to_string();
                    if !value.is_empty() {
                        return Some(value);
                    }
                }
            }
            None
        }

        if let Some(key) = env_first(&["CHATRELAY_API_KEY", "API_KEY"]) {
            self.api_key = Some(key);
        }
        if let Some(url) = env_first(&["CHATRELAY_API_URL"]) {
            self.api_url = Some(url);
        }
        if let Some(provider) = env_first(&["CHATRELAY_PROVIDER"]) {
            self.provider = provider;
        }
        if let Some(model) = env_first(&["CHATRELAY_MODEL", "MODEL"]) {
            self.model = model;
        }
        if let Some(port) = env_first(&["CHATRELAY_GATEWAY_PORT", "PORT"]) {
            if let Ok(port) = port.parse() {
                self.gateway.port = port;
            }
        }
        if let Some(host) = env_first(&["CHATRELAY_GATEWAY_HOST", "HOST"]) {
            self.gateway.host = host;
        }
        if let Some(origins) = env_first(&["CHATRELAY_ALLOWED_ORIGINS", "ALLOWED_ORIGINS"]) {
            if origins == "*" {
                self.gateway.allowed_origins.clear();
            } else {
                self.gateway.allowed_origins = origins
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }
        if self.inference.max_tokens == 0 {
            anyhow::bail!("inference.max_tokens must be greater than zero");
        }
        if !(0.0..=2.0).contains(&self.inference.temperature) {
            anyhow::bail!(
                "inference.temperature must be between 0.0 and 2.0, got {}",
                self.inference.temperature
            );
        }
        if !(0.0..=1.0).contains(&self.inference.top_p) {
            anyhow::bail!(
                "inference.top_p must be between 0.0 and 1.0, got {}",
                self.inference.top_p
            );
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    // The file may hold an API key.
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
