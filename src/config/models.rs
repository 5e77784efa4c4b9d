use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Remote API connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(5)
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(15)
}

fn default_user_agent() -> String {
    format!("hookboard/{}", env!("CARGO_PKG_VERSION"))
}

/// Query cache settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Age after which a successfully fetched entry counts as stale
    #[serde(default = "default_stale_time")]
    pub stale_time: HumanDuration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: default_stale_time(),
        }
    }
}

fn default_stale_time() -> HumanDuration {
    HumanDuration::from_secs(30)
}

/// Default page sizes per view (mirror the server's own defaults)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaginationConfig {
    #[serde(default = "default_tasks_limit")]
    pub tasks_limit: usize,
    #[serde(default = "default_runs_limit")]
    pub runs_limit: usize,
    #[serde(default = "default_dlq_limit")]
    pub dlq_limit: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            tasks_limit: default_tasks_limit(),
            runs_limit: default_runs_limit(),
            dlq_limit: default_dlq_limit(),
        }
    }
}

fn default_tasks_limit() -> usize {
    50
}

fn default_runs_limit() -> usize {
    100
}

fn default_dlq_limit() -> usize {
    100
}

/// Mutation retry policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// Total attempts for idempotent mutations that hit a network error
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: HumanDuration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

fn default_max_attempts() -> u32 {
    1
}

fn default_retry_backoff() -> HumanDuration {
    HumanDuration::from_millis(500)
}

/// Session credentials
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Bearer token (loaded from environment, never from the config file)
    #[serde(skip)]
    pub token: Option<String>,
    /// Display name of the signed-in identity
    pub user: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.api.request_timeout.as_millis(), 15_000);
        assert_eq!(config.cache.stale_time.as_millis(), 30_000);
        assert_eq!(config.pagination.tasks_limit, 50);
        assert_eq!(config.pagination.runs_limit, 100);
        assert_eq!(config.dispatch.max_attempts, 1);
        assert!(config.auth.token.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[api]
base_url = "https://hooks.example.com/api"

[dispatch]
max_attempts = 3
retry_backoff = "250ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://hooks.example.com/api");
        assert_eq!(config.api.connect_timeout.as_millis(), 5_000);
        assert_eq!(config.dispatch.max_attempts, 3);
        assert_eq!(config.dispatch.retry_backoff.as_millis(), 250);
        assert_eq!(config.pagination.dlq_limit, 100);
    }
}
