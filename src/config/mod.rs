use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub challenger: ChallengerConfig,
    pub defender: DefenderConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
}

/// Challenger backend configuration (skeptical question generation)
#[derive(Debug, Clone)]
pub struct ChallengerConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Defender backend configuration (apologetic response generation)
#[derive(Debug, Clone)]
pub struct DefenderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration applied to both generator clients
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let challenger = ChallengerConfig {
            api_key: env::var("CHALLENGER_API_KEY").map_err(|_| AppError::Config {
                message: "CHALLENGER_API_KEY is required".to_string(),
            })?,
            base_url: env::var("CHALLENGER_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            model: env::var("CHALLENGER_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
        };

        let defender = DefenderConfig {
            api_key: env::var("DEFENDER_API_KEY").map_err(|_| AppError::Config {
                message: "DEFENDER_API_KEY is required".to_string(),
            })?,
            base_url: env::var("DEFENDER_BASE_URL")
                .unwrap_or_else(|_| "https://api.apologistproject.org/v1".to_string()),
            model: env::var("DEFENDER_MODEL").unwrap_or_else(|_| "openai/gpt/4o".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/debates.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        };

        Ok(Config {
            challenger,
            defender,
            database,
            logging,
            request,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}
