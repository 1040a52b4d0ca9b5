//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the resource gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment label (development, staging, production).
    pub environment: Environment,

    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-client rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Record store settings.
    pub store: StoreConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Access token lifetimes.
    pub tokens: TokenConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,

    /// Maximum concurrent connections. Further accepts wait for a slot.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration for request handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting. When off, every request is admitted and no
    /// reaper task runs.
    pub enabled: bool,

    /// Steady refill rate per client, in requests per second.
    pub requests_per_second: f64,

    /// Burst capacity per client.
    pub burst: u32,

    /// How often idle clients are swept, in seconds.
    pub sweep_interval_secs: u64,

    /// Idle time after which a client entry is evicted, in seconds.
    pub stale_after_secs: u64,

    /// Prefer `X-Forwarded-For` / `X-Real-IP` over the peer address.
    pub trust_forwarded_headers: bool,
}

impl RateLimitConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2.0,
            burst: 4,
            sweep_interval_secs: 60,
            stale_after_secs: 180,
            trust_forwarded_headers: false,
        }
    }
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Deadline for every individual store interaction, in seconds.
    pub timeout_secs: u64,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { timeout_secs: 3 }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time in-flight requests get to finish once shutdown starts, in seconds.
    pub grace_secs: u64,
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 20 }
    }
}

/// Token lifetimes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Lifetime of activation tokens in seconds (default 3 days).
    pub activation_ttl_secs: u64,

    /// Lifetime of authentication tokens in seconds (default 24 hours).
    pub authentication_ttl_secs: u64,
}

impl TokenConfig {
    pub fn activation_ttl(&self) -> Duration {
        Duration::from_secs(self.activation_ttl_secs)
    }

    pub fn authentication_ttl(&self) -> Duration {
        Duration::from_secs(self.authentication_ttl_secs)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            activation_ttl_secs: 3 * 24 * 60 * 60,
            authentication_ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Cross-origin resource sharing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to make cross-origin requests (exact match).
    pub trusted_origins: Vec<String>,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// bcrypt work factor for stored passwords.
    pub password_cost: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1_048_576, // 1MB
            password_cost: 12,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_contract() {
        let config = AppConfig::default();
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests_per_second, 2.0);
        assert_eq!(config.rate_limit.burst, 4);
        assert_eq!(config.rate_limit.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.rate_limit.stale_after(), Duration::from_secs(180));
        assert_eq!(config.store.timeout(), Duration::from_secs(3));
        assert_eq!(config.shutdown.grace(), Duration::from_secs(20));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            environment = "production"

            [rate_limit]
            burst = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.rate_limit.burst, 10);
        assert_eq!(config.rate_limit.requests_per_second, 2.0);
        assert_eq!(config.listener.bind_address, "0.0.0.0:4000");
    }
}
