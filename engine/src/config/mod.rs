//! Configuration management
//!
//! This module handles loading, validation, and management of the Ferry
//! configuration. Configuration is stored in TOML format at
//! ~/.ferry/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, transcript log directory
//! - **ollama**: Generation backend URL, model, request timeout
//! - **interpreter**: Execution agent program and system message
//! - **router**: Routing keywords
//!
//! # Environment Overrides
//!
//! `OLLAMA_BASE_URL` and `OLLAMA_MODEL` take precedence over the file when
//! set and non-empty. Apply them with [`Config::apply_env_overrides`] before
//! validation.
//!
//! # Examples
//!
//! ```no_run
//! use ferry_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Model: {} at {}", config.ollama.model, config.ollama.base_url);
//! println!("Logs: {:?}", config.core.log_dir);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use sdk::execution::{ExecutionSettings, DEFAULT_SYSTEM_MESSAGE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::router::DEFAULT_KEYWORDS;

/// Environment variable overriding `ollama.base_url`
pub const ENV_OLLAMA_BASE_URL: &str = "OLLAMA_BASE_URL";

/// Environment variable overriding `ollama.model`
pub const ENV_OLLAMA_MODEL: &str = "OLLAMA_MODEL";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Generation backend settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Execution agent settings
    #[serde(default)]
    pub interpreter: InterpreterConfig,

    /// Routing settings
    #[serde(default)]
    pub router: RouterConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Transcript log directory (supports ~ expansion)
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,

    /// Request timeout in seconds, covering the whole stream
    #[serde(default = "default_ollama_timeout")]
    pub timeout_secs: u64,
}

/// Execution agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Agent program to spawn
    #[serde(default = "default_interpreter_program")]
    pub program: String,

    /// Extra arguments for the agent program
    #[serde(default)]
    pub args: Vec<String>,

    /// Seconds a single task may run before the agent is killed
    #[serde(default = "default_interpreter_timeout")]
    pub timeout_secs: u64,

    /// System message handed to the agent
    #[serde(default = "default_system_message")]
    pub system_message: String,
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Substrings that send a message to the execution agent
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_ollama_timeout() -> u64 {
    300
}

fn default_interpreter_program() -> String {
    "interpreter".to_string()
}

fn default_interpreter_timeout() -> u64 {
    600
}

fn default_system_message() -> String {
    DEFAULT_SYSTEM_MESSAGE.to_string()
}

fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
            timeout_secs: default_ollama_timeout(),
        }
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: default_interpreter_program(),
            args: Vec::new(),
            timeout_secs: default_interpreter_timeout(),
            system_message: default_system_message(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
        }
    }
}

impl OllamaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl InterpreterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from the default location (~/.ferry/config.toml)
    ///
    /// If the configuration file doesn't exist, writes a default one first.
    /// Environment overrides are applied before validation.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or written
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides();
        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        // Write the pristine defaults, not the env-overridden values
        let toml_string = toml::to_string_pretty(&Config::default())
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.ferry/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".ferry").join("config.toml"))
    }

    /// Apply `OLLAMA_BASE_URL` / `OLLAMA_MODEL` from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_OLLAMA_BASE_URL).ok(),
            std::env::var(ENV_OLLAMA_MODEL).ok(),
        );
    }

    /// Apply explicit overrides; empty values are ignored
    pub fn apply_overrides(&mut self, base_url: Option<String>, model: Option<String>) {
        if let Some(base_url) = base_url.filter(|v| !v.trim().is_empty()) {
            self.ollama.base_url = base_url.trim().to_string();
        }
        if let Some(model) = model.filter(|v| !v.trim().is_empty()) {
            self.ollama.model = model.trim().to_string();
        }
    }

    /// Immutable settings for the execution agent
    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings::local_ollama(self.ollama.base_url.clone(), &self.ollama.model)
            .with_system_message(self.interpreter.system_message.clone())
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates the log level
    /// - Requires a base URL, a model, an agent program, and keywords
    /// - Strips a trailing slash from the base URL
    /// - Expands ~ in the log directory
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` describing the first invalid field.
    pub fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let base_url = self.ollama.base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(EngineError::Config(format!(
                "ollama.base_url is empty. Set it in config.toml or via {}",
                ENV_OLLAMA_BASE_URL
            )));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(EngineError::Config(format!(
                "ollama.base_url must start with http:// or https://, got '{}'",
                base_url
            )));
        }
        self.ollama.base_url = base_url.to_string();

        if self.ollama.model.trim().is_empty() {
            return Err(EngineError::Config(format!(
                "ollama.model is empty. Set it in config.toml or via {}",
                ENV_OLLAMA_MODEL
            )));
        }

        if self.ollama.timeout_secs == 0 || self.interpreter.timeout_secs == 0 {
            return Err(EngineError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.interpreter.program.trim().is_empty() {
            return Err(EngineError::Config(
                "interpreter.program is empty".to_string(),
            ));
        }

        if self.router.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(EngineError::Config(
                "router.keywords must contain at least one keyword".to_string(),
            ));
        }

        self.core.log_dir = expand_path(&self.core.log_dir)?;

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
