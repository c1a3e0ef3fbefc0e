use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Default recursion ceiling for full generation.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Upper bound applied to `MAX_RETRIES`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Model endpoint.
    pub llm: LlmConfig,
    /// Expansion limits.
    pub generation: GenerationConfig,
    /// Persistence backend.
    pub storage: StorageConfig,
    /// Log filter and format.
    pub logging: LoggingConfig,
    /// HTTP timeouts and retries.
    pub request: RequestConfig,
}

/// Chat-completions endpoint configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Bearer token.
    pub api_key: String,
    /// Base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
}

/// Tree expansion limits
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Answers at this depth or deeper are not expanded.
    pub max_depth: usize,
}

/// Where finished and in-progress trees are written
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Selected backend.
    pub backend: StorageBackend,
    /// Output directory of the file backend.
    pub trees_dir: PathBuf,
    /// SQLite settings.
    pub database: DatabaseConfig,
}

/// Persistence backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// One pretty-printed JSON document per tree.
    File,
    /// Rows in a SQLite table.
    Sqlite,
    /// Persistence disabled.
    None,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file.
    pub path: PathBuf,
    /// Pool size.
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base backoff, doubled per retry.
    pub retry_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let llm = LlmConfig {
            api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-5.1".to_string()),
        };

        let max_depth = parse_var("MAX_DEPTH", DEFAULT_MAX_DEPTH);
        if max_depth == 0 {
            return Err(AppError::Config {
                message: "MAX_DEPTH must be at least 1".to_string(),
            });
        }
        let generation = GenerationConfig { max_depth };

        let backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "file".to_string())
            .to_lowercase()
            .as_str()
        {
            "file" => StorageBackend::File,
            "sqlite" => StorageBackend::Sqlite,
            "none" => StorageBackend::None,
            other => {
                return Err(AppError::Config {
                    message: format!("Unknown STORAGE_BACKEND: {}", other),
                })
            }
        };

        let storage = StorageConfig {
            backend,
            trees_dir: PathBuf::from(
                env::var("TREES_DIR").unwrap_or_else(|_| "./trees".to_string()),
            ),
            database: DatabaseConfig {
                path: PathBuf::from(
                    env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/trees.db".to_string()),
                ),
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5),
            },
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
            timeout_ms: parse_var("REQUEST_TIMEOUT_MS", 120_000),
            max_retries: parse_var("MAX_RETRIES", 2).min(MAX_RETRIES_LIMIT),
            retry_delay_ms: parse_var("RETRY_DELAY_MS", 1000),
        };

        Ok(Config {
            llm,
            generation,
            storage,
            logging,
            request,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}
