//! Runtime configuration
//!
//! Configuration is layered, lowest priority first:
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, `EFFECTS_CONFIG_PATH`, or `effects.toml` in the
//!    working directory when present)
//! 3. `EFFECTS_*` environment variables, with `__` separating nested keys
//!    (e.g. `EFFECTS_CONTEXT__STACK_SIZE=262144`)
//! 4. Builder overrides
//!
//! A `.env` file is loaded into the environment before the layers are read.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Default stack size for each execution context (1 MiB)
pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;

/// Smallest stack size accepted for an execution context (64 KiB)
pub const MIN_STACK_SIZE: usize = 64 * 1024;

const ENV_PREFIX: &str = "EFFECTS";
const CONFIG_PATH_VAR: &str = "EFFECTS_CONFIG_PATH";
const DEFAULT_CONFIG_NAME: &str = "effects";

/// Errors produced while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/* ===================== Config ===================== */

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub context: ContextConfig,
    pub diagnostics: DiagnosticsConfig,
}

/// Settings for execution contexts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Stack size in bytes for every spawned context
    pub stack_size: usize,

    /// Prefix for the names of context threads
    pub thread_name_prefix: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            thread_name_prefix: "effect-ctx".to_string(),
        }
    }
}

/// Settings for leak and dispatch diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Log a warning whenever an unconsumed resumption is dropped
    pub warn_on_leak: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { warn_on_leak: true }
    }
}

impl Config {
    /// Start building a configuration
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load configuration from the default sources
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Check values that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "context.stack_size must be at least {} bytes, got {}",
                MIN_STACK_SIZE, self.context.stack_size
            )));
        }
        if self.context.thread_name_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "context.thread_name_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/* ===================== Builder ===================== */

/// Builder for [`Config`]
#[derive(Debug, Default, Clone)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    stack_size: Option<usize>,
    thread_name_prefix: Option<String>,
    warn_on_leak: Option<bool>,
    skip_environment: bool,
}

impl ConfigBuilder {
    /// Read this file instead of searching for `effects.toml`
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn stack_size(mut self, size: Option<usize>) -> Self {
        self.stack_size = size;
        self
    }

    pub fn thread_name_prefix(mut self, prefix: Option<String>) -> Self {
        self.thread_name_prefix = prefix;
        self
    }

    pub fn warn_on_leak(mut self, warn: Option<bool>) -> Self {
        self.warn_on_leak = warn;
        self
    }

    /// Ignore `.env`, `EFFECTS_*` variables and the default config file
    pub fn skip_environment(mut self, skip: bool) -> Self {
        self.skip_environment = skip;
        self
    }

    /// Resolve all layers into a validated [`Config`]
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut builder = config::Config::builder();

        if !self.skip_environment {
            dotenvy::dotenv().ok();
        }

        let path = self.config_path.clone().or_else(|| {
            if self.skip_environment {
                None
            } else {
                std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from)
            }
        });

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None if !self.skip_environment => {
                builder =
                    builder.add_source(config::File::with_name(DEFAULT_CONFIG_NAME).required(false));
            }
            None => {}
        }

        if !self.skip_environment {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        if let Some(size) = self.stack_size {
            let size = i64::try_from(size).map_err(|_| {
                ConfigError::Invalid(format!("context.stack_size {} is out of range", size))
            })?;
            builder = builder.set_override("context.stack_size", size)?;
        }
        if let Some(prefix) = self.thread_name_prefix {
            builder = builder.set_override("context.thread_name_prefix", prefix)?;
        }
        if let Some(warn) = self.warn_on_leak {
            builder = builder.set_override("diagnostics.warn_on_leak", warn)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.context.stack_size, DEFAULT_STACK_SIZE);
        assert!(config.diagnostics.warn_on_leak);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_without_sources_yields_defaults() {
        let config = Config::builder().skip_environment(true).build().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_builder_overrides_win() {
        let config = Config::builder()
            .skip_environment(true)
            .stack_size(Some(256 * 1024))
            .thread_name_prefix(Some("worker".to_string()))
            .warn_on_leak(Some(false))
            .build()
            .unwrap();

        assert_eq!(config.context.stack_size, 256 * 1024);
        assert_eq!(config.context.thread_name_prefix, "worker");
        assert!(!config.diagnostics.warn_on_leak);
    }

    #[test]
    fn test_small_stack_is_rejected() {
        let result = Config::builder()
            .skip_environment(true)
            .stack_size(Some(1024))
            .build();

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_file_layer_is_read() {
        let path = std::env::temp_dir().join(format!(
            "effects-config-test-{}.toml",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[context]\nstack_size = 131072\n\n[diagnostics]\nwarn_on_leak = false").unwrap();
        drop(file);

        let config = Config::builder()
            .skip_environment(true)
            .config_path(Some(path.clone()))
            .build()
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.context.stack_size, 131072);
        assert_eq!(config.context.thread_name_prefix, "effect-ctx");
        assert!(!config.diagnostics.warn_on_leak);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Config::builder()
            .skip_environment(true)
            .config_path(Some(PathBuf::from("/definitely/not/here/effects.toml")))
            .build();

        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_toml_rendering_lists_keys() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("stack_size"));
        assert!(rendered.contains("warn_on_leak"));
    }
}
