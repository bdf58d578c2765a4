use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ai_gateway: AiGatewayConfig,
    pub github_star_check: GithubStarCheckConfig,
    pub voucher: VoucherConfig,
    pub jobs: crate::jobs::JobsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiGatewayConfig {
    /// Base URL of the gateway, e.g. "http://higress:8001"
    pub base_url: String,
    /// Admin path prefix for the quota counter endpoints
    pub admin_path: String,
    /// Optional auth header name sent on every call
    pub auth_header: String,
    /// Optional auth header value sent on every call
    pub auth_value: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Star policy for transfer-out. Held behind a lock by the quota service so
/// it can be swapped at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubStarCheckConfig {
    pub enabled: bool,
    pub required_repo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherConfig {
    /// HMAC signing key for voucher envelopes
    pub signing_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://quota_manager.db?mode=rwc".to_string(),
            },
            ai_gateway: AiGatewayConfig {
                base_url: "http://localhost:8001".to_string(),
                admin_path: "/v1/chat/quota".to_string(),
                auth_header: String::new(),
                auth_value: String::new(),
                timeout_secs: 10,
            },
            github_star_check: GithubStarCheckConfig {
                enabled: false,
                required_repo: String::new(),
            },
            voucher: VoucherConfig {
                signing_key: "change-me".to_string(),
            },
            jobs: crate::jobs::JobsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    pub fn load_from(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        match path {
            Some(path) => {
                builder = builder.add_source(File::with_name(path));
            }
            None => {
                if Path::new("config.yaml").exists() {
                    builder = builder.add_source(File::with_name("config"));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("QUOTA")
                .prefix_separator("_")
                .separator("__"),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_complete() {
        let config = Config::default();
        assert_eq!(config.ai_gateway.timeout_secs, 10);
        assert!(!config.github_star_check.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let config = Config::load().expect("load default config");
        assert_eq!(config.ai_gateway.admin_path, "/v1/chat/quota");
    }
}
