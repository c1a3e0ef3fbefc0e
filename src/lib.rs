//! # Decision Tree Builder
//!
//! Builds branching decision trees by repeatedly asking a language model
//! for discriminating questions. Every question offers mutually exclusive
//! answers, every answer lists the outcomes still reachable through it, and
//! an answer stops branching once a single outcome is left.
//!
//! ## Features
//!
//! - **Full generation**: root question plus depth-first expansion of every
//!   answer, bounded by a configurable depth ceiling
//! - **Interactive expansion**: root only, then expand answers on request
//! - **Lifecycle events**: `root`, `expand`, `leaf`, `complete` and `error`,
//!   streamed per session in emission order
//! - **Persistence**: a full snapshot with the model call log after every
//!   change, as JSON files or SQLite rows
//!
//! ## Architecture
//!
//! ```text
//! stdin (JSON lines) → StdioServer → SessionManager → TreeGenerator → Chat model (HTTP)
//!                           ↑               │                 ↓
//!                     EventHub ← session channel         TreeStore (file / SQLite)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use decision_tree_builder::{Config, GenerationMode, OpenAiClient, SessionManager, TreeGenerator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let model = OpenAiClient::new(&config.llm, config.request.clone())?;
//!     let generator = TreeGenerator::new(Arc::new(model), &config.generation);
//!     let sessions = SessionManager::new(generator);
//!     let id = sessions
//!         .run("Technical Troubleshooter", "My screen flickers.", GenerationMode::Recursive)
//!         .await?;
//!     println!("{}", sessions.snapshot(Some(&id)).await?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration loaded from the environment.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Lifecycle events and sinks.
pub mod events;
/// Tree generation engine.
pub mod generator;
/// Chat model client and response contract.
pub mod llm;
/// Prompt templates and builders.
pub mod prompts;
/// Built-in expert roles.
pub mod roles;
/// JSON-lines stdio server.
pub mod server;
/// Generation sessions and event fan-out.
pub mod session;
/// Tree persistence backends.
pub mod storage;
/// Decision tree node model.
pub mod tree;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use events::{EventSink, TreeEvent};
pub use generator::TreeGenerator;
pub use llm::{ChatModel, OpenAiClient};
pub use server::StdioServer;
pub use session::{GenerationMode, SessionId, SessionManager};
pub use tree::{DecisionTree, NodeId};
