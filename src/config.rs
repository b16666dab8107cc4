use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Configuration for the portal client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection settings
    pub server: ServerConfig,

    /// Session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Result presentation settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// Logging settings
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the portal backend
    pub base_url: String,

    /// Connect timeout in seconds (0 = none). Streams themselves never time out.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Raw `Cookie` header value carrying the signed-in session
    pub cookie: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Poster shown for results without artwork
    pub placeholder_poster: String,

    /// Maximum number of result cards printed (0 = all)
    pub max_results: usize,

    /// Print JSON instead of cards
    pub json_output: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Log level used when RUST_LOG is unset
    pub log_level: String,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("portal-client/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            connect_timeout_seconds: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            placeholder_poster: "/placeholder-poster.svg".to_string(),
            max_results: 0,
            json_output: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Candidate configuration files, in search order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("portal-client.toml"),
            PathBuf::from("config/portal-client.toml"),
        ];
        if let Ok(home) = std::env::var("HOME") {
            paths.push(Path::new(&home).join(".config/portal-client/config.toml"));
        }
        paths
    }

    /// Load configuration from the first readable file, then apply
    /// environment overrides. Falls back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        for path in Self::search_paths() {
            if let Ok(config_str) = std::fs::read_to_string(&path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path.display());
                        config.apply_env();
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load a specific configuration file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env();
        Ok(config)
    }

    fn read_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Defaults with environment variable overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `PORTAL_*` overrides read through `var`
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = var("PORTAL_BASE_URL") {
            self.server.base_url = base_url;
        }

        if let Some(cookie) = var("PORTAL_SESSION_COOKIE") {
            self.session.cookie = Some(cookie);
        }

        if let Some(log_level) = var("PORTAL_LOG_LEVEL") {
            self.output.log_level = log_level;
        }

        if let Some(timeout) = var("PORTAL_CONNECT_TIMEOUT") {
            self.server.connect_timeout_seconds = timeout.parse().unwrap_or(default_connect_timeout());
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.server.base_url)
            .map_err(|e| anyhow!("base_url is not a valid URL: {}", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("base_url must use http or https, got {}", url.scheme()));
        }

        if self.server.user_agent.trim().is_empty() {
            return Err(anyhow!("user_agent must not be empty"));
        }

        if let Some(cookie) = &self.session.cookie {
            if cookie.contains(['\r', '\n']) {
                return Err(anyhow!("session cookie must be a single header line"));
            }
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Portal Client Configuration:\n\
            - Base URL: {}\n\
            - Connect Timeout: {}s\n\
            - Session Cookie: {}\n\
            - Max Results: {}\n\
            - JSON Output: {}\n\
            - Log Level: {}",
            self.server.base_url,
            self.server.connect_timeout_seconds,
            if self.session.cookie.is_some() { "set" } else { "none" },
            if self.display.max_results == 0 {
                "all".to_string()
            } else {
                self.display.max_results.to_string()
            },
            self.display.json_output,
            self.output.log_level
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            session: SessionConfig::default(),
            display: DisplayConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.server.base_url = base_url.into();
        self
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.config.session.cookie = Some(cookie.into());
        self
    }

    pub fn with_connect_timeout(mut self, seconds: u64) -> Self {
        self.config.server.connect_timeout_seconds = seconds;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.config.display.max_results = max_results;
        self
    }

    pub fn json_output(mut self, enable: bool) -> Self {
        self.config.display.json_output = enable;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.output.log_level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
