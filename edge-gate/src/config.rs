// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gate::Tenant;

/// Configuration loaded from environment variables.
///
/// All configuration is externalized to support 12-factor app deployment.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "json" or "pretty" (default: json)
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Runtime environment, also the scope of environment-scoped cookies (default: dev)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Stack the platform tokens must be minted for (default: eu)
    #[serde(default = "default_region")]
    pub region: String,

    /// Tenant prefix: "jmc" or "jwm" (default: jmc)
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Environment name used in parameter store keys (default: dev)
    #[serde(default = "default_environment")]
    pub standardized_env: String,

    /// Let verified crawlers read level-2 content (default: false)
    #[serde(default)]
    pub googlebot_allow_level2: bool,

    /// "false", "true" (302), "301" or "302" (default: false)
    #[serde(default = "default_www_redir")]
    pub www_redir_enabled: String,

    /// Public domain of the site
    #[serde(default)]
    pub domain: String,

    /// "production" or "non-production" (default: production)
    #[serde(default)]
    pub deployment: Deployment,

    /// Origin that authorized requests are forwarded to
    #[serde(default = "default_origin_url")]
    pub origin_url: String,

    /// JSON file backing the parameter store (default: none)
    #[serde(default)]
    pub parameters_file: Option<String>,

    /// Timeout for platform and identity provider calls (default: 5)
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Reported by /info
    #[serde(default = "default_build_version")]
    pub build_version: String,

    /// Reported by /info
    #[serde(default = "default_build_commit")]
    pub build_commit: String,
}

/// Whether the enterprise directory login guards the deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Deployment {
    #[default]
    Production,
    NonProduction,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_region() -> String {
    "eu".to_string()
}

fn default_prefix() -> String {
    "jmc".to_string()
}

fn default_www_redir() -> String {
    "false".to_string()
}

fn default_origin_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_upstream_timeout() -> u64 {
    5
}

fn default_build_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_build_commit() -> String {
    "unknown".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are uppercase with underscore separators.
    /// Example: `PREFIX`, `WWW_REDIR_ENABLED`, `LOG_LEVEL`, etc.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}

// =============================================================================
// Gate configuration
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid tenant: {0}")]
    InvalidTenant(String),

    #[error("Invalid WWW_REDIR_ENABLED value: {0}")]
    InvalidWwwRedirect(String),
}

/// Build metadata returned by `/info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub commit: String,
}

/// Static record the gatekeeper runs with, validated once at startup.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub environment: String,
    pub region: String,
    pub tenant: Tenant,
    pub standardized_env: String,
    pub googlebot_allow_level2: bool,
    /// Status of the `www.` redirect, `None` when disabled
    pub www_redirect: Option<u16>,
    pub deployment: Deployment,
    pub build: BuildInfo,
}

impl GateConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let tenant = config.prefix.parse().map_err(ConfigError::InvalidTenant)?;

        Ok(Self {
            environment: config.environment.clone(),
            region: config.region.clone(),
            tenant,
            standardized_env: config.standardized_env.clone(),
            googlebot_allow_level2: config.googlebot_allow_level2,
            www_redirect: parse_www_redirect(&config.www_redir_enabled)?,
            deployment: config.deployment,
            build: BuildInfo {
                version: config.build_version.clone(),
                commit: config.build_commit.clone(),
            },
        })
    }
}

/// `true` means 302.
fn parse_www_redirect(value: &str) -> Result<Option<u16>, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" => Ok(None),
        "true" => Ok(Some(302)),
        "301" => Ok(Some(301)),
        "302" => Ok(Some(302)),
        other => Err(ConfigError::InvalidWwwRedirect(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Config {
        envy::from_iter(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())))
            .expect("Failed to load config")
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]);

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.prefix, "jmc");
        assert_eq!(config.deployment, Deployment::Production);
        assert!(!config.googlebot_allow_level2);
        assert!(config.parameters_file.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PREFIX", "jwm"),
            ("DEPLOYMENT", "non-production"),
            ("GOOGLEBOT_ALLOW_LEVEL2", "true"),
            ("ENVIRONMENT", "review"),
            ("PARAMETERS_FILE", "/etc/edge-gate/params.json"),
        ]);

        assert_eq!(config.deployment, Deployment::NonProduction);
        assert!(config.googlebot_allow_level2);

        let gate = GateConfig::from_config(&config).unwrap();
        assert_eq!(gate.tenant, Tenant::Patient);
        assert_eq!(gate.environment, "review");
    }

    #[test]
    fn test_unknown_tenant_rejected() {
        let config = load(&[("PREFIX", "xyz")]);
        assert!(matches!(
            GateConfig::from_config(&config),
            Err(ConfigError::InvalidTenant(_))
        ));
    }

    #[test]
    fn test_www_redirect_values() {
        assert_eq!(parse_www_redirect("false").unwrap(), None);
        assert_eq!(parse_www_redirect("true").unwrap(), Some(302));
        assert_eq!(parse_www_redirect("301").unwrap(), Some(301));
        assert_eq!(parse_www_redirect("302").unwrap(), Some(302));
        assert!(parse_www_redirect("307").is_err());
    }
}
