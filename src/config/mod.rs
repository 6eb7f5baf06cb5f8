use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::flashcards::generator::Provider;
use crate::sources::ProxyCredentials;

pub const PROXY_USERNAME_VAR: &str = "WEBSHARE_PROXY_USERNAME";
pub const PROXY_PASSWORD_VAR: &str = "WEBSHARE_PROXY_PASSWORD";
pub const PORT_VAR: &str = "HERMES_PORT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Transcript fetching settings
    pub youtube: YoutubeConfig,

    /// Flashcard generation settings
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Static HTML viewer served at `/`
    pub html_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeConfig {
    /// Default language preference, first match wins
    pub languages: Vec<String>,

    /// Timeout for each request to YouTube
    pub request_timeout_secs: u64,

    /// Rotating proxy credentials; direct fetching is used when absent
    pub proxy: Option<ProxyCredentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub provider: Provider,

    /// Overrides the provider's default model
    pub model: Option<String>,

    /// Usually supplied through the provider's environment variable instead
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub timeout_secs: u64,

    /// Reject flashcards whose answer is not one of their options
    pub strict_validation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8888,
                html_path: None,
            },
            youtube: YoutubeConfig {
                languages: vec!["en".to_string()],
                request_timeout_secs: 30,
                proxy: None,
            },
            generation: GenerationConfig {
                provider: Provider::default(),
                model: None,
                api_key: None,
                timeout_secs: 120,
                strict_validation: true,
            },
        }
    }
}

impl Config {
    /// Load configuration from file (or defaults) and apply environment overrides
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str(&content).context("Failed to parse config file")?
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("hermes").join("config.yaml"))
    }

    /// Overlay secrets and deployment settings from the environment
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        match (non_empty(PROXY_USERNAME_VAR), non_empty(PROXY_PASSWORD_VAR)) {
            (Some(username), Some(password)) => {
                self.youtube.proxy = Some(ProxyCredentials { username, password });
            }
            (None, None) => {}
            _ => {
                tracing::warn!(
                    "Only one of {} and {} is set, ignoring proxy environment",
                    PROXY_USERNAME_VAR,
                    PROXY_PASSWORD_VAR
                );
            }
        }

        if let Some(key) = non_empty(self.generation.provider.config().env_var) {
            self.generation.api_key = Some(key);
        }

        if let Some(port) = non_empty(PORT_VAR) {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid {}: {}", PORT_VAR, port),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.youtube.languages.is_empty() {
            anyhow::bail!("At least one transcript language must be configured");
        }

        if self.youtube.request_timeout_secs == 0 || self.generation.timeout_secs == 0 {
            anyhow::bail!("Timeouts must be greater than zero");
        }

        if let Some(proxy) = &self.youtube.proxy {
            if proxy.username.is_empty() || proxy.password.is_empty() {
                anyhow::bail!("Proxy username and password must both be set");
            }
        }

        Ok(())
    }

    /// Whether flashcard generation can be offered
    pub fn generation_enabled(&self) -> bool {
        self.generation.api_key.is_some()
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Server: {}:{}", self.server.host, self.server.port);
        if let Some(html) = &self.server.html_path {
            println!("  HTML Viewer: {}", html.display());
        }
        println!("  Languages: {}", self.youtube.languages.join(", "));
        println!("  Request Timeout: {}s", self.youtube.request_timeout_secs);
        println!(
            "  Proxy: {}",
            if self.youtube.proxy.is_some() { "webshare (rotating)" } else { "none" }
        );
        println!("  Flashcard Provider: {}", self.generation.provider.name());
        println!(
            "  Flashcards: {}",
            if self.generation_enabled() {
                "enabled"
            } else {
                "disabled (no API key)"
            }
        );
        println!("  Strict Validation: {}", self.generation.strict_validation);
    }
}
