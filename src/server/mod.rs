//! Stdio front end.
//!
//! Clients send one JSON command per line on stdin (`generate`, `expand`,
//! `roles`, `tree`). Each command gets one reply line on stdout, and every
//! lifecycle event of every session is written to stdout as
//! `{"sessionId": ..., "type": ..., ...}` as soon as it is published.

mod protocol;
mod stdio;

pub use protocol::*;
pub use stdio::*;
