use thiserror::Error;

use crate::tree::DecisionTree;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Model error: {0}")]
    Llm(#[from] LlmError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Protocol error: {message}")]
    Protocol { message: String },
}

/// Errors raised by the chat-completions client
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Model unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Model refused the request: {message}")]
    Refused { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from a single root generation or expansion step
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Model call failed: {0}")]
    ModelCallFailed(#[from] LlmError),

    #[error("Model response invalid: {message}")]
    ModelResponseInvalid { message: String },

    #[error("Generation stopped early: {source}")]
    Incomplete {
        source: Box<GenerationError>,
        tree: Box<DecisionTree>,
    },
}

/// Persistence errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Persistence write failed for {name}: {message}")]
    WriteFailed { name: String, message: String },

    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Errors resolving sessions and nodes for incremental expansion
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: String },

    #[error("Node {node_id} is a question, not an answer")]
    NotAnAnswer { node_id: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("No tree has been generated yet")]
    NoCurrentTree,

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl GenerationError {
    /// Shorthand for a response that failed the shape check.
    pub fn invalid(message: impl Into<String>) -> Self {
        GenerationError::ModelResponseInvalid {
            message: message.into(),
        }
    }

    /// The tree built before a full generation stopped, if any.
    pub fn partial_tree(&self) -> Option<&DecisionTree> {
        match self {
            GenerationError::Incomplete { tree, .. } => Some(&**tree),
            _ => None,
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for model client operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Result type alias for generation steps
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
