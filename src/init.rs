//! Process-wide initialization
//!
//! Installs the configuration every runtime created afterwards will use.
//! Runtimes are created lazily, one per root thread, so initialization is
//! optional: an uninitialized process runs with [`Config::default`].
//!
//! # Example
//!
//! ```rust
//! use effects_core::init::InitBuilder;
//!
//! InitBuilder::new()
//!     .stack_size(256 * 1024)
//!     .warn_on_leak(false)
//!     .init()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::config::Config;

/// Global initialization state
static INIT_STATE: OnceLock<InitState> = OnceLock::new();

#[derive(Debug)]
struct InitState {
    config: Config,
}

/// Options for initializing the effect runtime
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Config file path (overrides default search)
    pub config_path: Option<PathBuf>,

    /// Stack size for execution contexts (overrides config file and env vars)
    pub stack_size: Option<usize>,

    /// Whether to warn about leaked resumptions (overrides config file and env vars)
    pub warn_on_leak: Option<bool>,

    /// Ignore `.env`, environment variables and the default config file
    pub skip_environment: bool,
}

/// Builder for constructing InitOptions
#[derive(Debug, Default)]
pub struct InitBuilder {
    options: InitOptions,
}

impl InitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.options.stack_size = Some(bytes);
        self
    }

    pub fn warn_on_leak(mut self, warn: bool) -> Self {
        self.options.warn_on_leak = Some(warn);
        self
    }

    pub fn skip_environment(mut self, skip: bool) -> Self {
        self.options.skip_environment = skip;
        self
    }

    pub fn init(self) -> Result<()> {
        initialize(self.options)
    }
}

/// Load and install the process-wide configuration
///
/// Calling this function multiple times is safe - subsequent calls are no-ops.
/// Runtimes that already exist keep the configuration they started with.
pub fn initialize(options: InitOptions) -> Result<()> {
    if INIT_STATE.get().is_some() {
        return Ok(());
    }

    let config = Config::builder()
        .config_path(options.config_path)
        .stack_size(options.stack_size)
        .warn_on_leak(options.warn_on_leak)
        .skip_environment(options.skip_environment)
        .build()
        .context("Failed to load configuration")?;

    tracing::debug!(
        stack_size = config.context.stack_size,
        warn_on_leak = config.diagnostics.warn_on_leak,
        "effect runtime initialized"
    );

    INIT_STATE
        .set(InitState { config })
        .map_err(|_| anyhow!("Initialization already completed"))
}

pub fn is_initialized() -> bool {
    INIT_STATE.get().is_some()
}

/// The installed configuration, if [`initialize`] has run
pub fn get_config() -> Option<&'static Config> {
    INIT_STATE.get().map(|state| &state.config)
}

/// Configuration for a runtime being created now
pub(crate) fn current_config() -> Config {
    get_config().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_STACK_SIZE;

    #[test]
    fn test_init_is_idempotent() {
        InitBuilder::new().skip_environment(true).init().unwrap();
        assert!(is_initialized());

        // A second call with different options changes nothing
        InitBuilder::new()
            .skip_environment(true)
            .stack_size(128 * 1024)
            .init()
            .unwrap();

        assert_eq!(current_config().context.stack_size, DEFAULT_STACK_SIZE);
    }
}
