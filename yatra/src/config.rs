//! Configuration management for the Yatra engine.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use yatra_runtime::RetryPolicy;

use crate::tenant::MASTER_TENANT_ID;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Transaction retry settings
    pub transactions: TransactionConfig,
    /// Metrics settings
    pub metrics: MetricsConfig,
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tracing filter directive (`RUST_LOG` takes precedence)
    pub log_filter: String,
    /// Tenant selected when none is given
    pub default_tenant: String,
    /// Display name of the built-in master tenant
    pub master_name: String,
    /// Names matched in remarks to attribute payments to a collector
    pub collectors: Vec<String>,
}

/// Transaction retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Reruns after a conflict before giving up
    pub max_retries: usize,
    /// First backoff delay in milliseconds
    pub initial_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,
}

impl TransactionConfig {
    /// Retry policy for [`yatra_runtime::run_transaction`]
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.max_retries)
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .build()
    }
}

/// Metrics settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder
    pub enabled: bool,
    /// Print the rendered metrics on exit
    pub dump_on_exit: bool,
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            app: AppConfig {
                log_filter: env::var("YATRA_LOG").unwrap_or_else(|_| "yatra=info".to_string()),
                default_tenant: env::var("YATRA_DEFAULT_TENANT")
                    .unwrap_or_else(|_| MASTER_TENANT_ID.to_string()),
                master_name: env::var("YATRA_MASTER_NAME")
                    .unwrap_or_else(|_| "Puri Yatra".to_string()),
                collectors: parse_list(
                    &env::var("YATRA_COLLECTORS").unwrap_or_else(|_| "chaitanya,narayana".to_string()),
                ),
            },
            transactions: TransactionConfig {
                max_retries: parse_or("TXN_MAX_RETRIES", 5),
                initial_delay_ms: parse_or("TXN_INITIAL_DELAY_MS", 50),
                max_delay_ms: parse_or("TXN_MAX_DELAY_MS", 2000),
            },
            metrics: MetricsConfig {
                enabled: parse_or("METRICS_ENABLED", true),
                dump_on_exit: parse_or("METRICS_DUMP", false),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_uses_configured_delays() {
        let config = TransactionConfig {
            max_retries: 3,
            initial_delay_ms: 10,
            max_delay_ms: 40,
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(40));
    }

    #[test]
    fn collector_list_is_trimmed_and_lowercased() {
        assert_eq!(parse_list(" Chaitanya, ,narayana "), vec!["chaitanya", "narayana"]);
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        assert_eq!(parse_or("YATRA_TEST_SURELY_UNSET_VARIABLE", 42_u64), 42);
    }
}
