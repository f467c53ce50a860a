use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// External LLM vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    Gemini,
    Xai,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAI,
        ProviderKind::Xai,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Xai => "xai",
        }
    }

    /// Name shown to users on the result page
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::Anthropic => "Claude",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Xai => "Grok",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "gpt-4.1-mini",
            ProviderKind::Anthropic => "claude-3-5-sonnet-20241022",
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::Xai => "grok-3",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::Xai => "https://api.x.ai/v1",
        }
    }

    /// Environment variables holding the API key, in lookup order
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenAI => &["OPENAI_API_KEY"],
            ProviderKind::Anthropic => &["ANTHROPIC_API_KEY"],
            ProviderKind::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderKind::Xai => &["XAI_API_KEY"],
        }
    }

    fn model_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "UPSELLER_OPENAI_MODEL",
            ProviderKind::Anthropic => "UPSELLER_ANTHROPIC_MODEL",
            ProviderKind::Gemini => "UPSELLER_GEMINI_MODEL",
            ProviderKind::Xai => "UPSELLER_XAI_MODEL",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "chatgpt" => Ok(ProviderKind::OpenAI),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "xai" | "grok" => Ok(ProviderKind::Xai),
            other => Err(ConfigError::ValidationError(format!(
                "Unknown provider: {}. Must be one of: openai, anthropic, gemini, xai",
                other
            ))),
        }
    }
}

/// Main configuration for Upseller
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpsellerConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Credentials and endpoints per LLM vendor
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Single-provider text optimization
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Multi-provider analysis and meta summary
    #[serde(default)]
    pub council: CouncilConfig,

    /// Image upload limits
    #[serde(default)]
    pub upload: UploadConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Answer every request with scripted mock providers (no network)
    #[serde(default)]
    pub use_mock: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request body limit, covers multipart uploads
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub gemini: ProviderConfig,
    #[serde(default)]
    pub xai: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::OpenAI => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Xai => &self.xai,
        }
    }

    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderConfig {
        match kind {
            ProviderKind::OpenAI => &mut self.openai,
            ProviderKind::Anthropic => &mut self.anthropic,
            ProviderKind::Gemini => &mut self.gemini,
            ProviderKind::Xai => &mut self.xai,
        }
    }
}

/// Settings for one LLM vendor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Allow this provider to be used when a key is present
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier, vendor default when unset
    #[serde(default)]
    pub model: Option<String>,

    /// API base URL, vendor default when unset
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            model: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ProviderConfig {
    /// Enabled and holding a non-empty API key
    pub fn is_usable(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn model_for(&self, kind: ProviderKind) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| kind.default_model().to_string())
    }

    pub fn base_url_for(&self, kind: ProviderKind) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(kind.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default = "default_optimizer_provider")]
    pub provider: ProviderKind,

    #[serde(default = "default_optimizer_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Turns kept in the client-carried conversation
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            provider: default_optimizer_provider(),
            max_tokens: default_optimizer_max_tokens(),
            temperature: default_temperature(),
            max_history_turns: default_max_history_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilConfig {
    /// Providers asked for an opinion, in this order
    #[serde(default = "default_council_providers")]
    pub providers: Vec<ProviderKind>,

    /// Provider that fuses the opinions
    #[serde(default = "default_meta_provider")]
    pub meta_provider: ProviderKind,

    /// Ask all providers at once instead of one after another
    #[serde(default)]
    pub parallel: bool,

    #[serde(default = "default_opinion_max_tokens")]
    pub opinion_max_tokens: usize,

    #[serde(default = "default_meta_max_tokens")]
    pub meta_max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            providers: default_council_providers(),
            meta_provider: default_meta_provider(),
            parallel: false,
            opinion_max_tokens: default_opinion_max_tokens(),
            meta_max_tokens: default_meta_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_max_body_bytes() -> usize {
    8 * 1024 * 1024
}
fn default_timeout_secs() -> u64 {
    120
}
/// Upper bound for `providers.*.max_retries`
pub const MAX_PROVIDER_RETRIES: u32 = 10;

fn default_max_retries() -> u32 {
    2
}
fn default_optimizer_provider() -> ProviderKind {
    ProviderKind::OpenAI
}
fn default_optimizer_max_tokens() -> usize {
    450
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_history_turns() -> usize {
    10
}
fn default_council_providers() -> Vec<ProviderKind> {
    ProviderKind::ALL.to_vec()
}
fn default_meta_provider() -> ProviderKind {
    ProviderKind::OpenAI
}
fn default_opinion_max_tokens() -> usize {
    900
}
fn default_meta_max_tokens() -> usize {
    1500
}
fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Configuration manager with layered sources
#[derive(Debug)]
pub struct ConfigManager {
    config: UpsellerConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (explicit path, ./.upseller.toml, ~/.upseller/config.toml)
    /// 3. Sensible defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        info!("Loading Upseller configuration");

        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file(explicit_path)?;
        let config = Self::apply_env_overrides_with(config, |key| std::env::var(key).ok());
        Self::validate_config(&config)?;

        match config_path {
            Some(ref path) => info!(path = %path.display(), "Config file loaded"),
            None => info!("No config file, using defaults"),
        }
        let usable: Vec<&str> = ProviderKind::ALL
            .iter()
            .filter(|k| config.providers.get(**k).is_usable())
            .map(|k| k.as_str())
            .collect();
        info!(
            providers = ?usable,
            optimizer = %config.optimizer.provider,
            meta = %config.council.meta_provider,
            mock = config.use_mock,
            "Configuration loaded"
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Wrap an already built configuration after validating it
    pub fn from_config(config: UpsellerConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            } else {
                info!("Loaded .env file from current directory");
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".upseller.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .upseller.env: {}", e);
                } else {
                    info!("Loaded .upseller.env from home directory");
                }
            }
        }
    }

    /// Find and load config file
    fn load_config_file(
        explicit_path: Option<&Path>,
    ) -> Result<(UpsellerConfig, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            let config = Self::read_toml_file(path)?;
            return Ok((config, Some(path.to_path_buf())));
        }

        let local_config = Path::new(".upseller.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".upseller").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((UpsellerConfig::default(), None))
    }

    /// Read TOML config file
    pub fn read_toml_file(path: &Path) -> Result<UpsellerConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_overrides_with<F>(mut config: UpsellerConfig, lookup: F) -> UpsellerConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Provider credentials and models
        for kind in ProviderKind::ALL {
            let provider = config.providers.get_mut(kind);
            if let Some(key) = kind.api_key_vars().iter().find_map(|var| non_empty(var)) {
                provider.api_key = Some(key);
                provider.enabled = true;
            }
            if let Some(model) = non_empty(kind.model_var()) {
                provider.model = Some(model);
            }
        }

        // Server
        if let Some(host) = non_empty("UPSELLER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = non_empty("UPSELLER_PORT") {
            match port.parse() {
                Ok(p) => config.server.port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid UPSELLER_PORT"),
            }
        }

        // Optimizer and council
        if let Some(provider) = non_empty("UPSELLER_OPTIMIZER_PROVIDER") {
            match provider.parse() {
                Ok(kind) => config.optimizer.provider = kind,
                Err(e) => warn!("Ignoring UPSELLER_OPTIMIZER_PROVIDER: {}", e),
            }
        }
        if let Some(provider) = non_empty("UPSELLER_META_PROVIDER") {
            match provider.parse() {
                Ok(kind) => config.council.meta_provider = kind,
                Err(e) => warn!("Ignoring UPSELLER_META_PROVIDER: {}", e),
            }
        }
        if let Some(list) = non_empty("UPSELLER_COUNCIL_PROVIDERS") {
            let parsed: Result<Vec<ProviderKind>, _> = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect();
            match parsed {
                Ok(kinds) => config.council.providers = kinds,
                Err(e) => warn!("Ignoring UPSELLER_COUNCIL_PROVIDERS: {}", e),
            }
        }
        if let Some(parallel) = non_empty("UPSELLER_COUNCIL_PARALLEL") {
            config.council.parallel = parse_bool(&parallel);
        }
        if let Some(mock) = non_empty("UPSELLER_USE_MOCK_LLM") {
            config.use_mock = parse_bool(&mock);
        }

        // Logging
        if let Some(level) = non_empty("UPSELLER_LOG_LEVEL") {
            config.logging.level = level.to_lowercase();
        }
        if let Some(format) = non_empty("UPSELLER_LOG_FORMAT") {
            config.logging.format = format.to_lowercase();
        }

        config
    }

    /// Validate configuration
    pub fn validate_config(config: &UpsellerConfig) -> Result<(), ConfigError> {
        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        if config.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be non-zero".to_string(),
            ));
        }

        if config.council.providers.is_empty() {
            return Err(ConfigError::ValidationError(
                "Council needs at least one provider".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for kind in &config.council.providers {
            if !seen.insert(kind) {
                return Err(ConfigError::ValidationError(format!(
                    "Provider {} is listed twice in council.providers",
                    kind
                )));
            }
        }

        for (name, tokens) in [
            ("optimizer.max_tokens", config.optimizer.max_tokens),
            ("council.opinion_max_tokens", config.council.opinion_max_tokens),
            ("council.meta_max_tokens", config.council.meta_max_tokens),
            ("upload.max_image_bytes", config.upload.max_image_bytes),
        ] {
            if tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        for kind in ProviderKind::ALL {
            let retries = config.providers.get(kind).max_retries;
            if retries > MAX_PROVIDER_RETRIES {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{}.max_retries must be at most {}, got {}",
                    kind, MAX_PROVIDER_RETRIES, retries
                )));
            }
        }

        for (name, temperature) in [
            ("optimizer.temperature", config.optimizer.temperature),
            ("council.temperature", config.council.temperature),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be between 0.0 and 2.0, got {}",
                    name, temperature
                )));
            }
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &UpsellerConfig {
        &self.config
    }

    pub fn into_config(self) -> UpsellerConfig {
        self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = UpsellerConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}
