//! Configuration loading, validation, and management for Sitewright.
//!
//! Loads configuration from `~/.sitewright/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.sitewright/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model provider ("openai", "openrouter", "ollama", ...)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Filesystem sandbox for the file tools
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// `system.run` settings
    #[serde(default)]
    pub shell: ShellConfig,

    /// `shots.capture` settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// `page.extract` settings
    #[serde(default)]
    pub extract: ExtractConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("workspace", &self.workspace)
            .field("shell", &self.shell)
            .field("capture", &self.capture)
            .field("extract", &self.extract)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model invocations per user turn
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Where the system prompt lives. Defaults to `~/.sitewright/system_prompt.md`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_path: Option<PathBuf>,

    /// Append the registered tools' definitions to the system message
    #[serde(default = "default_true")]
    pub tool_catalog: bool,
}

fn default_max_steps() -> u32 {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            system_prompt_path: None,
            tool_catalog: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Relative tool paths resolve against this directory
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,

    /// Allowed root directories. Empty = allow all.
    #[serde(default)]
    pub allowed_roots: Vec<String>,

    /// Forbidden path prefixes
    #[serde(default = "default_forbidden_paths")]
    pub forbidden_paths: Vec<String>,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_forbidden_paths() -> Vec<String> {
    vec![
        "/etc".into(),
        "/proc".into(),
        "/sys".into(),
        "~/.ssh".into(),
        "~/.gnupg".into(),
        "~/.aws".into(),
    ]
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            allowed_roots: vec![],
            forbidden_paths: default_forbidden_paths(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// If non-empty, only these base commands may run
    #[serde(default)]
    pub allowed_commands: Vec<String>,

    #[serde(default = "default_shell_timeout")]
    pub timeout_secs: u64,

    /// stdout/stderr are each truncated to this many bytes
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_shell_timeout() -> u64 {
    120
}
fn default_max_output_bytes() -> usize {
    64 * 1024
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            allowed_commands: vec![],
            timeout_secs: default_shell_timeout(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

/// A named browser window size for screenshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Chromium-compatible browser binary
    #[serde(default = "default_browser")]
    pub browser: String,

    /// Screenshots go here (relative to the workspace root)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_capture_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_viewports")]
    pub viewports: Vec<Viewport>,
}

fn default_browser() -> String {
    "chromium".into()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("screenshots")
}
fn default_capture_timeout() -> u64 {
    60
}
fn default_viewports() -> Vec<Viewport> {
    vec![
        Viewport::new("desktop", 1440, 900),
        Viewport::new("tablet", 834, 1112),
        Viewport::new("mobile", 390, 844),
    ]
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            browser: default_browser(),
            output_dir: default_output_dir(),
            timeout_secs: default_capture_timeout(),
            viewports: default_viewports(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_extract_timeout")]
    pub timeout_secs: u64,

    /// Visible text is truncated to this many characters
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

fn default_user_agent() -> String {
    concat!("sitewright/", env!("CARGO_PKG_VERSION")).into()
}
fn default_extract_timeout() -> u64 {
    30
}
fn default_max_text_chars() -> usize {
    20_000
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_extract_timeout(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.sitewright/config.toml).
    ///
    /// Also checks environment variables:
    /// - `SITEWRIGHT_API_KEY` (highest priority), `OPENAI_API_KEY`, `OPENROUTER_API_KEY`
    /// - `SITEWRIGHT_PROVIDER`, `SITEWRIGHT_MODEL`, `SITEWRIGHT_MAX_STEPS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(key) = lookup("SITEWRIGHT_API_KEY") {
            self.api_key = Some(key);
        } else if self.api_key.is_none() {
            self.api_key = lookup("OPENAI_API_KEY").or_else(|| lookup("OPENROUTER_API_KEY"));
        }

        if let Some(provider) = lookup("SITEWRIGHT_PROVIDER") {
            self.provider = provider;
        }

        if let Some(model) = lookup("SITEWRIGHT_MODEL") {
            self.model = model;
        }

        if let Some(steps) = lookup("SITEWRIGHT_MAX_STEPS") {
            self.agent.max_steps = steps.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("SITEWRIGHT_MAX_STEPS is not a number: {steps}"))
            })?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sitewright")
    }

    /// The system prompt location: configured path, or the default file.
    pub fn system_prompt_path(&self) -> PathBuf {
        self.agent
            .system_prompt_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("system_prompt.md"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        if self.capture.viewports.is_empty() {
            return Err(ConfigError::ValidationError(
                "capture.viewports must list at least one viewport".into(),
            ));
        }

        if let Some(v) = self.capture.viewports.iter().find(|v| v.width == 0 || v.height == 0) {
            return Err(ConfigError::ValidationError(format!(
                "viewport '{}' has a zero dimension",
                v.name
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            workspace: WorkspaceConfig::default(),
            shell: ShellConfig::default(),
            capture: CaptureConfig::default(),
            extract: ExtractConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
