//! Wire types of the JSON-lines protocol.

use serde::{Deserialize, Serialize};

use crate::roles::RolePreset;
use crate::session::{GenerationMode, SessionId};
use crate::storage::TreeRecord;
use crate::tree::NodeId;

/// One request line, discriminated by its `command` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command {
    /// Start a new tree.
    Generate {
        /// Expert role.
        role: String,
        /// Initial user query.
        query: String,
        /// Recursive or interactive; recursive when omitted.
        #[serde(default)]
        mode: GenerationMode,
    },
    /// Expand one answer of an existing tree.
    Expand {
        /// Expert role used for the prompt.
        role: String,
        /// Initial query used for the prompt.
        query: String,
        /// Answer to expand.
        #[serde(rename = "answerId")]
        answer_id: NodeId,
        /// Target session; the current one when omitted.
        #[serde(rename = "sessionId", default)]
        session_id: Option<SessionId>,
    },
    /// List the built-in roles.
    Roles,
    /// Fetch the full document of a tree.
    Tree {
        /// Target session; the current one when omitted.
        #[serde(rename = "sessionId", default)]
        session_id: Option<SessionId>,
    },
}

/// Immediate reply to a request line, discriminated by `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Reply {
    /// Generation is running; events follow.
    Started {
        /// Session to watch for events.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
    /// Expansion is running; an event follows.
    Expanding {
        /// Session the answer belongs to.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
    /// Built-in roles.
    Roles {
        /// Roles in display order.
        roles: Vec<RolePreset>,
    },
    /// A tree snapshot.
    Tree {
        /// Metadata, nested nodes and call log.
        record: TreeRecord,
    },
    /// The request could not be handled.
    Error {
        /// Human-readable failure.
        message: String,
    },
}

impl Reply {
    /// Shorthand for an error reply.
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            message: message.into(),
        }
    }
}
