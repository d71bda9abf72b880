//! Process configuration.
//!
//! Every section of the TOML file is optional and falls back to defaults
//! matching the single-arm demo rig. The provider API key never lives in the
//! file: it is read from the environment variable named by
//! `provider.api_key_env`.

use crate::bridge::{Bridge, BridgeComponents};
use crate::capture::{camera_from_config, CaptureConfig, CaptureConfigError, SharedCamera};
use crate::gate::ConcurrencyGate;
use crate::journal::{JournalConfig, VisionJournal};
use crate::metrics::BridgeMetrics;
use crate::policy::{CommandRunner, PolicyConfig, PolicyRegistry};
use crate::provider::{ProviderClient, ProviderConfig, SessionOptions};
use crate::server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Configuration errors, all reported at startup.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
    #[error("invalid camera configuration: {0}")]
    Camera(#[from] CaptureConfigError),
    #[error("policy command must name a program")]
    EmptyPolicyCommand,
    #[error("provider api_base must be an http(s) URL, got {0:?}")]
    InvalidApiBase(String),
    #[error("environment variable {0} is not set; the model provider API key is required")]
    MissingApiKey(String),
    #[error("failed to build {component}: {reason}")]
    Startup {
        component: &'static str,
        reason: String,
    },
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub camera: CaptureConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub session: SessionOptions,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate()?;
        if self
            .policy
            .command
            .first()
            .map_or(true, |program| program.trim().is_empty())
        {
            return Err(ConfigError::EmptyPolicyCommand);
        }
        let base = &self.provider.api_base;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidApiBase(base.clone()));
        }
        Ok(())
    }

    /// Reads the provider API key from the environment.
    pub fn api_key_from_env(&self) -> Result<String, ConfigError> {
        let name = &self.provider.api_key_env;
        match std::env::var(name) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey(name.clone())),
        }
    }

    /// Assembles the bridge from this configuration.
    pub fn build_bridge(&self, api_key: &str) -> Result<Bridge, ConfigError> {
        let provider = ProviderClient::new(self.provider.clone(), api_key).map_err(|e| {
            ConfigError::Startup {
                component: "provider client",
                reason: e.to_string(),
            }
        })?;
        let metrics = BridgeMetrics::new().map_err(|e| ConfigError::Startup {
            component: "metrics registry",
            reason: e.to_string(),
        })?;

        Ok(Bridge::new(BridgeComponents {
            registry: PolicyRegistry::new(Arc::new(CommandRunner::new(self.policy.clone()))),
            gate: ConcurrencyGate::new(),
            camera: SharedCamera::new(camera_from_config(&self.camera), self.camera.clone()),
            provider,
            journal: VisionJournal::new(&self.journal),
            session: self.session,
            metrics,
        }))
    }
}
