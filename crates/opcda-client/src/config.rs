// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client configuration.
//!
//! A [`ClientConfig`] names the server, the nodes to try in order, the tags
//! to add on connect and the recovery pacing. It can be built in code or
//! loaded from YAML, TOML or JSON with [`ConfigLoader`].
//!
//! ```yaml
//! server: Graybox.Simulator.1
//! nodes: [localhost, backup-host]
//! tags:
//!   - numeric.sin.int64
//!   - numeric.saw.float
//! recovery:
//!   interval: 100ms
//!   strategy: fixed
//! ```
//!
//! # Environment Variables
//!
//! Placeholders of the form `${VAR}` or `${VAR:default}` are resolved before
//! parsing. After parsing, these variables override the file:
//!
//! ```text
//! OPCDA_SERVER=Graybox.Simulator.1
//! OPCDA_NODES=localhost,backup-host
//! OPCDA_RECOVERY_INTERVAL=250ms
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use opcda_core::error::ConfigError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::recovery::{RecoveryPolicy, RetryStrategy};

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Node used when none is configured.
pub const DEFAULT_NODE: &str = "localhost";

/// Default prefix of override variables.
pub const DEFAULT_ENV_PREFIX: &str = "OPCDA";

fn default_nodes() -> Vec<String> {
    vec![DEFAULT_NODE.to_string()]
}

// =============================================================================
// ClientConfig
// =============================================================================

/// Settings for a [`Connection`](crate::Connection) or
/// [`Browser`](crate::Browser).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server program identifier.
    pub server: String,

    /// Nodes to try, in order.
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,

    /// Tags added when the connection is opened.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Recovery pacing.
    #[serde(default)]
    pub recovery: RecoveryPolicy,
}

impl ClientConfig {
    /// Creates a configuration for `server` on the default node.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            nodes: default_nodes(),
            tags: Vec::new(),
            recovery: RecoveryPolicy::default(),
        }
    }

    /// Creates a builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Checks the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::validation("server", "must not be empty"));
        }
        if self.nodes.is_empty() {
            return Err(ConfigError::validation("nodes", "at least one node is required"));
        }
        if let Some(i) = self.nodes.iter().position(|n| n.trim().is_empty()) {
            return Err(ConfigError::validation(
                format!("nodes[{i}]"),
                "node name must not be empty",
            ));
        }
        if let Some(i) = self.tags.iter().position(|t| t.is_empty()) {
            return Err(ConfigError::validation(
                format!("tags[{i}]"),
                "tag must not be empty",
            ));
        }
        if self.recovery.interval.is_zero() {
            return Err(ConfigError::validation(
                "recovery.interval",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// ClientConfigBuilder
// =============================================================================

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    server: Option<String>,
    nodes: Vec<String>,
    tags: Vec<String>,
    recovery: RecoveryPolicy,
}

impl ClientConfigBuilder {
    /// Sets the server program identifier.
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Appends a node.
    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.nodes.push(node.into());
        self
    }

    /// Appends several nodes.
    pub fn nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes.extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Appends a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Appends several tags.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Sets the pause between reconnect attempts.
    pub fn recovery_interval(mut self, interval: Duration) -> Self {
        self.recovery.interval = interval;
        self
    }

    /// Sets the reconnect backoff strategy.
    pub fn recovery_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.recovery.strategy = strategy;
        self
    }

    /// Sets the whole recovery policy.
    pub fn recovery(mut self, policy: RecoveryPolicy) -> Self {
        self.recovery = policy;
        self
    }

    /// Builds and validates the configuration. Without nodes the default
    /// node is used.
    pub fn build(self) -> ConfigResult<ClientConfig> {
        let config = ClientConfig {
            server: self.server.unwrap_or_default(),
            nodes: if self.nodes.is_empty() {
                default_nodes()
            } else {
                self.nodes
            },
            tags: self.tags,
            recovery: self.recovery,
        };
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads a [`ClientConfig`] from a file or string.
///
/// # Examples
///
/// ```no_run
/// use opcda_client::config::ConfigLoader;
///
/// let config = ConfigLoader::new().load("opcda.yaml").unwrap();
/// println!("{} on {:?}", config.server, config.nodes);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `OPCDA` prefix and environment handling on.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads a file; the format follows the extension.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<ClientConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let format = ConfigFormat::from_path(path)?;

        let config = self
            .load_from_str(&content, format)
            .map_err(|e| match e {
                ConfigError::Parse { path: None, message } => {
                    ConfigError::parse(Some(PathBuf::from(path)), message)
                }
                other => other,
            })?;

        debug!(
            server = %config.server,
            nodes = config.nodes.len(),
            tags = config.tags.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parses `content`, applies overrides and validates.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<ClientConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config: ClientConfig = parse_str(&content, format)?;
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&self, config: &mut ClientConfig) -> ConfigResult<()> {
        if let Ok(value) = env::var(format!("{}_SERVER", self.env_prefix)) {
            config.server = value;
        }

        if let Ok(value) = env::var(format!("{}_NODES", self.env_prefix)) {
            let nodes: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect();
            if nodes.is_empty() {
                return Err(ConfigError::invalid_env_var(
                    format!("{}_NODES", self.env_prefix),
                    "expected a comma separated list of nodes",
                ));
            }
            config.nodes = nodes;
        }

        let name = format!("{}_RECOVERY_INTERVAL", self.env_prefix);
        if let Ok(value) = env::var(&name) {
            config.recovery.interval = humantime_serde::re::humantime::parse_duration(&value)
                .map_err(|_| ConfigError::invalid_env_var(name, "expected a duration like 100ms"))?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::parse(None, e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::parse(None, e.to_string()))
        }
    }
}

/// YAML goes through the `config` crate.
fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::parse(None, e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::parse(None, e.to_string()))
}

/// Replaces `${VAR}` and `${VAR:default}`.
///
/// Unset variables without a default are kept verbatim.
fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!("Environment variable '{}' not found", name);
                result.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

/// Loads a configuration file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<ClientConfig> {
    ConfigLoader::new().load(path)
}

// =============================================================================
// Tests
// =============================================================================
