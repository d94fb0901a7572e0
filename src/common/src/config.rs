use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_REQUEST_TIMEOUT_MS, ENV_PREFIX,
};
use anyhow::{bail, Context, Result};
use config::{Config as RConfig, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use typed_builder::TypedBuilder;

/// Process-wide monitor configuration. Built once at startup and read-only
/// afterwards.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MonitorConfig {
    pub production: bool,
    pub enable_remote_logging: bool,
    pub enable_console_logging: bool,
    pub max_retries: u32,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentry_dsn: Option<String>,
    pub request_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::for_environment(false)
    }
}

impl MonitorConfig {
    /// Defaults for a development or production build. Console logging is
    /// only on outside production.
    pub fn for_environment(production: bool) -> Self {
        Self {
            production,
            enable_remote_logging: true,
            enable_console_logging: !production,
            max_retries: DEFAULT_MAX_RETRIES,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            remote_endpoint: None,
            sentry_dsn: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            state_dir: None,
        }
    }

    /// Defaults overlaid with every option the caller supplied.
    pub fn merged(overrides: MonitorOverrides) -> Self {
        let production = overrides.production.unwrap_or(false);
        let defaults = Self::for_environment(production);

        Self {
            production,
            enable_remote_logging: overrides
                .enable_remote_logging
                .unwrap_or(defaults.enable_remote_logging),
            enable_console_logging: overrides
                .enable_console_logging
                .unwrap_or(defaults.enable_console_logging),
            max_retries: overrides.max_retries.unwrap_or(defaults.max_retries),
            batch_size: overrides.batch_size.unwrap_or(defaults.batch_size),
            flush_interval_ms: overrides
                .flush_interval_ms
                .unwrap_or(defaults.flush_interval_ms),
            remote_endpoint: overrides.remote_endpoint.or(defaults.remote_endpoint),
            sentry_dsn: overrides.sentry_dsn.or(defaults.sentry_dsn),
            request_timeout_ms: overrides
                .request_timeout_ms
                .unwrap_or(defaults.request_timeout_ms),
            state_dir: overrides.state_dir.or(defaults.state_dir),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if let Some(endpoint) = &self.remote_endpoint {
            if endpoint.trim().is_empty() {
                bail!("remote_endpoint must not be empty when set");
            }
        }
        Ok(())
    }

    /// True when records can actually leave the process over HTTP.
    pub fn remote_delivery_enabled(&self) -> bool {
        self.enable_remote_logging && self.remote_endpoint.is_some()
    }
}

/// Caller-supplied options; anything left `None` keeps its default.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, TypedBuilder)]
#[serde(default)]
#[builder(field_defaults(default, setter(strip_option)))]
pub struct MonitorOverrides {
    pub production: Option<bool>,
    pub enable_remote_logging: Option<bool>,
    pub enable_console_logging: Option<bool>,
    pub max_retries: Option<u32>,
    pub batch_size: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    #[builder(setter(into))]
    pub remote_endpoint: Option<String>,
    #[builder(setter(into))]
    pub sentry_dsn: Option<String>,
    pub request_timeout_ms: Option<u64>,
    #[builder(setter(into))]
    pub state_dir: Option<PathBuf>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the configuration: defaults, then the optional TOML file at
    /// `path`, then `ARCU_*` environment variables.
    pub fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
        let mut builder = RConfig::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let overrides: MonitorOverrides = builder
            .build()
            .context("failed to read monitor configuration sources")?
            .try_deserialize()
            .context("failed to parse monitor configuration")?;

        let config = MonitorConfig::merged(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn load_default_config() -> Result<MonitorConfig> {
        Self::load_config(None)
    }
}
