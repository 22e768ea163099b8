use crate::core::{AppError, Result};
use crate::modules::runs::services::RateLimiterConfig;
use std::env;
use std::num::NonZeroUsize;
use std::time::Duration;

pub mod server;
pub mod storage;

pub use server::ServerConfig;
pub use storage::{StorageBackend, StorageConfig};

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub automation: AutomationConfig,
    pub submission: SubmissionConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// The external engine that executes payment scenarios
#[derive(Clone)]
pub struct AutomationConfig {
    pub webhook_url: String,
    pub callback_base_url: String,
    pub webhook_secret: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for AutomationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationConfig")
            .field("webhook_url", &self.webhook_url)
            .field("callback_base_url", &self.callback_base_url)
            .field("webhook_secret", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AutomationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    pub min_interval_ms: u64,
    pub max_concurrent: Option<usize>,
}

impl SubmissionConfig {
    pub fn limiter_config(&self) -> Result<RateLimiterConfig> {
        let config = RateLimiterConfig::new(Duration::from_millis(self.min_interval_ms))
            .ok_or_else(|| {
                AppError::Configuration("SUBMIT_MIN_INTERVAL_MS must be greater than 0".to_string())
            })?;

        match self.max_concurrent {
            None => Ok(config),
            Some(max) => NonZeroUsize::new(max)
                .map(|max| config.with_max_concurrent(max))
                .ok_or_else(|| {
                    AppError::Configuration(
                        "SUBMIT_MAX_CONCURRENT must be greater than 0".to_string(),
                    )
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub rate_limit_per_minute: u32,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| AppError::Configuration(format!("Invalid {}", name)))
}

fn required_var(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Configuration(format!("{} not set", name)))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let server = ServerConfig::from_env()?;

        let log_format = match env::var("LOG_FORMAT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let max_concurrent = match env::var("SUBMIT_MAX_CONCURRENT") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse().map_err(|_| {
                AppError::Configuration("Invalid SUBMIT_MAX_CONCURRENT".to_string())
            })?),
            _ => None,
        };

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                log_format,
            },
            automation: AutomationConfig {
                webhook_url: required_var("AUTOMATION_WEBHOOK_URL")?,
                callback_base_url: env::var("AUTOMATION_CALLBACK_BASE_URL")
                    .unwrap_or_else(|_| server.public_base_url()),
                webhook_secret: required_var("AUTOMATION_WEBHOOK_SECRET")?,
                timeout_secs: parse_var("AUTOMATION_TIMEOUT_SECS", "30")?,
            },
            submission: SubmissionConfig {
                min_interval_ms: parse_var("SUBMIT_MIN_INTERVAL_MS", "5000")?,
                max_concurrent,
            },
            storage: StorageConfig::from_env()?,
            security: SecurityConfig {
                rate_limit_per_minute: parse_var("RATE_LIMIT_PER_MINUTE", "600")?,
            },
            server,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.submission.limiter_config()?;

        if self.automation.timeout_secs == 0 {
            return Err(AppError::Configuration(
                "AUTOMATION_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.security.rate_limit_per_minute == 0 {
            return Err(AppError::Configuration(
                "Rate limit must be greater than 0".to_string(),
            ));
        }

        if self.server.workers == 0 {
            return Err(AppError::Configuration(
                "SERVER_WORKERS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
