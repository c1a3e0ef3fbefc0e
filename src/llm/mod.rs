//! Chat-completions client and the structured response contract.

mod client;
mod schema;
mod types;

pub use client::*;
pub use schema::*;
pub use types::*;
