use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Fetcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum pause after every completed dispatch.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Upper bound of the random delay added on top of `request_delay_ms`.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub backoff: BackoffConfig,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Base header template shared (read-only) by every request.
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,

    #[serde(default = "default_true")]
    pub follow_redirects: bool,

    /// Proxied requests skip certificate verification unless this is set.
    #[serde(default)]
    pub proxy_verify_tls: bool,
}

/// Delay applied between retry attempts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackoffConfig {
    #[serde(default)]
    pub strategy: BackoffStrategy,

    #[serde(default = "default_backoff_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_backoff_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default)]
    pub jitter: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    None,
    #[default]
    Fixed,
    Linear,
    Exponential,
}

/// Batch pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    10
}
fn default_request_delay_ms() -> u64 {
    1000
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_max_attempts() -> u32 {
    5
}
fn default_backoff_delay_ms() -> u64 {
    1000
}
fn default_backoff_max_delay_ms() -> u64 {
    30_000
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/130.0.0.0 Safari/537.36"
        .to_string()
}
fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Accept".to_string(), "*/*".to_string()),
        (
            "Accept-Language".to_string(),
            "en-US,en;q=0.9".to_string(),
        ),
    ])
}
fn default_true() -> bool {
    true
}
fn default_concurrency() -> usize {
    4
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_attempts: default_max_attempts(),
            backoff: BackoffConfig::default(),
            user_agent: default_user_agent(),
            headers: default_headers(),
            follow_redirects: true,
            proxy_verify_tls: false,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::default(),
            delay_ms: default_backoff_delay_ms(),
            max_delay_ms: default_backoff_max_delay_ms(),
            jitter: false,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Header template with the configured user agent folded in.
    /// An explicit `User-Agent` entry in `headers` wins, whatever its case.
    pub fn base_headers(&self) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();
        if !headers
            .keys()
            .any(|key| key.eq_ignore_ascii_case("user-agent"))
        {
            headers.insert("User-Agent".to_string(), self.user_agent.clone());
        }
        headers
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("FETCH").separator("__"))
            .build()
            .context("Failed to read configuration sources")?;

        cfg.try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg: AppConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.fetcher.max_attempts, 5);
        assert_eq!(cfg.fetcher.backoff.strategy, BackoffStrategy::Fixed);
        assert!(cfg.fetcher.follow_redirects);
        assert!(!cfg.fetcher.proxy_verify_tls);
        assert_eq!(cfg.pipeline.concurrency, 4);
    }

    #[test]
    fn toml_overrides_are_applied() {
        let toml = r#"
            [fetcher]
            max_attempts = 2
            request_delay_ms = 0

            [fetcher.backoff]
            strategy = "exponential"
            delay_ms = 250
        "#;
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.fetcher.max_attempts, 2);
        assert_eq!(cfg.fetcher.request_delay_ms, 0);
        assert_eq!(cfg.fetcher.backoff.strategy, BackoffStrategy::Exponential);
        assert_eq!(cfg.fetcher.backoff.delay_ms, 250);
        assert_eq!(cfg.fetcher.backoff.max_delay_ms, 30_000);
    }

    #[test]
    fn base_headers_respect_explicit_user_agent() {
        let mut cfg = FetcherConfig::default();
        assert_eq!(cfg.base_headers()["User-Agent"], cfg.user_agent);

        cfg.headers
            .insert("User-Agent".to_string(), "custom/1.0".to_string());
        assert_eq!(cfg.base_headers()["User-Agent"], "custom/1.0");
    }

    #[test]
    fn base_headers_keep_lowercase_user_agent() {
        let mut cfg = FetcherConfig::default();
        cfg.headers
            .insert("user-agent".to_string(), "lower/1.0".to_string());

        let headers = cfg.base_headers();
        assert_eq!(headers["user-agent"], "lower/1.0");
        assert!(!headers.contains_key("User-Agent"));
    }
}
