//! Generation sessions.
//!
//! A session is one tree plus the event channel that reports its changes.
//! [`SessionManager`] runs generation on spawned tasks, serializes every
//! mutation of a tree behind that tree's lock, forwards each session's
//! events into a shared [`EventHub`], and remembers the most recently
//! generated tree as the "current" one for requests that carry no
//! session id.

mod hub;

pub use hub::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::events::{ChannelSink, EventSink, TreeEvent, NO_OUTCOME};
use crate::generator::TreeGenerator;
use crate::tree::{AnswerNode, DecisionTree, Node, NodeId};

/// How much of the tree a generation request builds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Root question, then full expansion.
    #[default]
    Recursive,
    /// Root question only; answers are expanded on request.
    Interactive,
}

/// Finished sessions kept for `tree`/`expand` requests by default.
pub const DEFAULT_SESSION_RETENTION: usize = 16;

struct Session {
    sink: ChannelSink,
    tree: Option<Arc<Mutex<DecisionTree>>>,
    opened: u64,
    running: bool,
}

/// Owns all sessions and their trees.
pub struct SessionManager {
    generator: TreeGenerator,
    hub: EventHub,
    sessions: RwLock<HashMap<SessionId, Session>>,
    current: RwLock<Option<SessionId>>,
    retention: usize,
    opened: AtomicU64,
}

impl SessionManager {
    /// Create a manager around a configured generator.
    pub fn new(generator: TreeGenerator) -> Self {
        Self::with_hub(generator, EventHub::default())
    }

    /// Create a manager publishing into an existing hub.
    pub fn with_hub(generator: TreeGenerator, hub: EventHub) -> Self {
        Self {
            generator,
            hub,
            sessions: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            retention: DEFAULT_SESSION_RETENTION,
            opened: AtomicU64::new(0),
        }
    }

    /// Keep at most `retention` finished sessions besides the current one.
    ///
    /// Older finished sessions are dropped when a new session opens.
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    /// Receive events from every session.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.hub.subscribe()
    }

    /// Depth ceiling used for full generation.
    pub fn max_depth(&self) -> usize {
        self.generator.max_depth()
    }

    /// The session whose tree was generated most recently.
    pub async fn current(&self) -> Option<SessionId> {
        self.current.read().await.clone()
    }

    /// Number of sessions currently held.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Start a generation on a worker task and return its id immediately.
    pub async fn start(
        self: &Arc<Self>,
        role: impl Into<String>,
        query: impl Into<String>,
        mode: GenerationMode,
    ) -> SessionId {
        let session_id = self.open_session().await;
        let role = role.into();
        let query = query.into();

        let manager = Arc::clone(self);
        let id = session_id.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.generate(&id, &role, &query, mode).await {
                warn!(session_id = %id, error = %e, "Generation session failed");
            }
        });

        session_id
    }

    /// Run a generation to completion on the calling task.
    pub async fn run(&self, role: &str, query: &str, mode: GenerationMode) -> SessionResult<SessionId> {
        let session_id = self.open_session().await;
        self.generate(&session_id, role, query, mode).await?;
        Ok(session_id)
    }

    /// Expand one answer of a session's tree.
    ///
    /// `session` of `None` means the current session. A leaf answer
    /// produces a `leaf` event and `Ok(None)`. An unknown id fails with
    /// [`SessionError::NodeNotFound`] without emitting anything. The tree
    /// stays readable while the model is working.
    pub async fn expand(
        &self,
        session: Option<&SessionId>,
        role: &str,
        query: &str,
        answer_id: &NodeId,
    ) -> SessionResult<Option<NodeId>> {
        let (session_id, tree, sink) = self.resolve(session).await?;

        let leaf_outcome = {
            let guard = tree.lock().await;
            let answer = expansion_target(&guard, answer_id)?;
            answer
                .is_leaf()
                .then(|| answer.outcome().unwrap_or(NO_OUTCOME).to_string())
        };

        if let Some(outcome) = leaf_outcome {
            info!(
                session_id = %session_id,
                answer_id = %answer_id,
                outcome = %outcome,
                "Reached a conclusion"
            );
            sink.emit(TreeEvent::Leaf {
                parent_answer_id: answer_id.clone(),
                outcome,
            });
            return Ok(None);
        }

        let generator = self.generator.clone().with_sink(Arc::new(sink));
        Ok(generator
            .expand_shared(role, query, &tree, answer_id)
            .await?)
    }

    /// Validate an expansion request, then run it on a worker task.
    ///
    /// Session and node lookup failures are returned immediately; model
    /// failures surface later as `error` events. Returns the resolved
    /// session id.
    pub async fn spawn_expand(
        self: &Arc<Self>,
        session: Option<SessionId>,
        role: String,
        query: String,
        answer_id: NodeId,
    ) -> SessionResult<SessionId> {
        let (session_id, tree, _) = self.resolve(session.as_ref()).await?;
        expansion_target(&*tree.lock().await, &answer_id)?;

        let manager = Arc::clone(self);
        let id = session_id.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.expand(Some(&id), &role, &query, &answer_id).await {
                warn!(session_id = %id, answer_id = %answer_id, error = %e, "Expansion failed");
            }
        });

        Ok(session_id)
    }

    /// A copy of a session's tree as it is now.
    ///
    /// During a recursive generation this is the tree grown so far.
    pub async fn snapshot(&self, session: Option<&SessionId>) -> SessionResult<DecisionTree> {
        let (_, tree, _) = self.resolve(session).await?;
        let tree = tree.lock().await;
        Ok(tree.clone())
    }

    async fn open_session(&self) -> SessionId {
        let session_id = SessionId::new();
        let (sink, rx) = ChannelSink::channel();
        spawn_forwarder(session_id.clone(), rx, self.hub.clone());

        let current = self.current().await;
        let mut sessions = self.sessions.write().await;
        self.evict_finished(&mut sessions, current.as_ref());
        sessions.insert(
            session_id.clone(),
            Session {
                sink,
                tree: None,
                opened: self.opened.fetch_add(1, Ordering::Relaxed),
                running: true,
            },
        );

        info!(session_id = %session_id, sessions = sessions.len(), "Session opened");
        session_id
    }

    /// Drop the oldest idle sessions beyond the retention limit.
    fn evict_finished(&self, sessions: &mut HashMap<SessionId, Session>, current: Option<&SessionId>) {
        let mut idle: Vec<(u64, SessionId)> = sessions
            .iter()
            .filter(|(id, s)| !s.running && Some(*id) != current)
            .map(|(id, s)| (s.opened, id.clone()))
            .collect();
        if idle.len() <= self.retention {
            return;
        }

        idle.sort_by_key(|(opened, _)| *opened);
        let excess = idle.len() - self.retention;
        for (_, id) in idle.into_iter().take(excess) {
            sessions.remove(&id);
            debug!(session_id = %id, "Session evicted");
        }
    }

    async fn generate(
        &self,
        session_id: &SessionId,
        role: &str,
        query: &str,
        mode: GenerationMode,
    ) -> SessionResult<()> {
        let sink = self.sink_for(session_id).await?;
        let generator = self.generator.clone().with_sink(Arc::new(sink));

        let root = match generator.build_root(role, query).await {
            Ok(tree) => tree,
            Err(e) => {
                // Nothing to keep; dropping the sink ends the forwarder.
                self.sessions.write().await.remove(session_id);
                return Err(e.into());
            }
        };
        let tree = Arc::new(Mutex::new(root));

        // Registered before `root` goes out so listeners can act on it.
        self.register(session_id, Arc::clone(&tree)).await?;
        generator.announce_root(&*tree.lock().await);

        let expanded = match mode {
            GenerationMode::Recursive => generator.expand_all(&tree).await,
            GenerationMode::Interactive => Ok(()),
        };
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.running = false;
        }
        expanded?;

        let nodes = tree.lock().await.len();
        info!(
            session_id = %session_id,
            mode = ?mode,
            nodes,
            "Generation finished"
        );
        Ok(())
    }

    async fn sink_for(&self, session_id: &SessionId) -> SessionResult<ChannelSink> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.sink.clone())
            .ok_or_else(|| SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    async fn register(
        &self,
        session_id: &SessionId,
        tree: Arc<Mutex<DecisionTree>>,
    ) -> SessionResult<()> {
        {
            let mut sessions = self.sessions.write().await;
            let session =
                sessions
                    .get_mut(session_id)
                    .ok_or_else(|| SessionError::SessionNotFound {
                        session_id: session_id.to_string(),
                    })?;
            session.tree = Some(tree);
        }
        *self.current.write().await = Some(session_id.clone());
        Ok(())
    }

    async fn resolve(
        &self,
        session: Option<&SessionId>,
    ) -> SessionResult<(SessionId, Arc<Mutex<DecisionTree>>, ChannelSink)> {
        let session_id = match session {
            Some(id) => id.clone(),
            None => self.current().await.ok_or(SessionError::NoCurrentTree)?,
        };

        let sessions = self.sessions.read().await;
        let entry = sessions
            .get(&session_id)
            .ok_or_else(|| SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        let tree = entry.tree.clone().ok_or(SessionError::NoCurrentTree)?;

        Ok((session_id, tree, entry.sink.clone()))
    }
}

/// The answer an expansion request points at.
fn expansion_target<'a>(tree: &'a DecisionTree, node_id: &NodeId) -> SessionResult<&'a AnswerNode> {
    match tree.find_by_id(node_id) {
        Some(Node::Answer(answer)) => Ok(answer),
        Some(Node::Question(_)) => Err(SessionError::NotAnAnswer {
            node_id: node_id.to_string(),
        }),
        None => Err(SessionError::NodeNotFound {
            node_id: node_id.to_string(),
        }),
    }
}
