//! Tree generation engine.
//!
//! [`TreeGenerator`] asks the model for a root question, expands single
//! answers on demand, and can grow a whole tree depth-first until every
//! branch ends in a leaf or reaches the depth ceiling.
//!
//! Every successful model call is appended to the tree's call log. Every
//! structural change is persisted (best effort) and then reported to the
//! event sink. A failed call or response check emits an `error` event and
//! aborts only the current step; the tree built so far stays valid.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::GenerationConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::events::{EventSink, NullSink, TreeEvent};
use crate::llm::{parse_question, ChatModel, ChatRequest, ValidatedQuestion};
use crate::prompts::{build_expansion_prompt, build_root_prompt, PromptPair};
use crate::storage::{TreeRecord, TreeStore};
use crate::tree::{CallKind, CallRecord, DecisionTree, NodeId};

/// Prompts for one pending expansion.
struct ExpansionStep {
    prompts: PromptPair,
    answer_text: String,
}

/// Generates and expands decision trees.
///
/// Cloning is cheap; sessions clone a shared generator and attach their own
/// event sink with [`TreeGenerator::with_sink`].
#[derive(Clone)]
pub struct TreeGenerator {
    model: Arc<dyn ChatModel>,
    sink: Arc<dyn EventSink>,
    store: Option<Arc<dyn TreeStore>>,
    max_depth: usize,
}

impl TreeGenerator {
    /// Create a generator with no event sink and no persistence.
    pub fn new(model: Arc<dyn ChatModel>, config: &GenerationConfig) -> Self {
        Self {
            model,
            sink: Arc::new(NullSink),
            store: None,
            max_depth: config.max_depth,
        }
    }

    /// Report lifecycle events to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Persist the tree to `store` after every structural change.
    pub fn with_store(mut self, store: Arc<dyn TreeStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Depth at which full generation stops expanding.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Ask for the root question, build a new tree and emit `root`.
    pub async fn generate_root(&self, role: &str, query: &str) -> GenerationResult<DecisionTree> {
        let tree = self.build_root(role, query).await?;
        self.announce_root(&tree);
        Ok(tree)
    }

    /// [`generate_root`](Self::generate_root) without the `root` event.
    ///
    /// Lets a caller publish the tree before anyone can observe the event;
    /// follow up with [`announce_root`](Self::announce_root).
    pub async fn build_root(&self, role: &str, query: &str) -> GenerationResult<DecisionTree> {
        info!(role = %role, query = %query, "Fetching initial question");

        let prompts = build_root_prompt(role, query);
        let (question, record) = self.ask_or_fail(CallKind::Initial, prompts).await?;

        let mut tree = DecisionTree::new(role, query, self.model.model_name(), &question);
        tree.push_log(record);

        info!(
            root_id = %tree.root_id(),
            question = %tree.root().question,
            answers = tree.root().answers.len(),
            "Root question created"
        );

        self.persist(&tree).await;
        Ok(tree)
    }

    /// Emit the `root` event for a freshly built tree.
    pub fn announce_root(&self, tree: &DecisionTree) {
        self.sink.emit(TreeEvent::Root {
            node: tree.summarize(tree.root()),
        });
    }

    /// Expand one answer with a new discriminating question.
    ///
    /// Returns `Ok(None)` without calling the model or emitting anything if
    /// the answer is a leaf or is not an answer of `tree`. Expanding an
    /// answer that already has a child replaces that child.
    pub async fn expand_answer(
        &self,
        role: &str,
        query: &str,
        tree: &mut DecisionTree,
        answer_id: &NodeId,
    ) -> GenerationResult<Option<NodeId>> {
        let Some(step) = self.plan_expansion(role, query, tree, answer_id) else {
            return Ok(None);
        };

        let (question, record) = self
            .ask_or_fail(CallKind::Discriminating, step.prompts)
            .await?;
        Ok(self
            .apply_expansion(tree, answer_id, &step.answer_text, &question, record)
            .await)
    }

    /// [`expand_answer`](Self::expand_answer) on a shared tree.
    ///
    /// The lock is taken to read the path and again to attach the result,
    /// but never held while the model is working.
    pub async fn expand_shared(
        &self,
        role: &str,
        query: &str,
        tree: &Mutex<DecisionTree>,
        answer_id: &NodeId,
    ) -> GenerationResult<Option<NodeId>> {
        let step = {
            let guard = tree.lock().await;
            self.plan_expansion(role, query, &guard, answer_id)
        };
        let Some(step) = step else {
            return Ok(None);
        };

        let (question, record) = self
            .ask_or_fail(CallKind::Discriminating, step.prompts)
            .await?;

        let mut guard = tree.lock().await;
        Ok(self
            .apply_expansion(&mut guard, answer_id, &step.answer_text, &question, record)
            .await)
    }

    /// Expand every reachable answer until each is a leaf or at the ceiling.
    ///
    /// Traversal is depth-first in answer order. Answers whose depth is at
    /// least `max_depth` are not expanded even when they still hold several
    /// outcomes. The tree is locked per step, so readers see it grow. Emits
    /// `complete` on success; on failure the error has already been
    /// reported and the partial tree is left as is.
    pub async fn expand_all(&self, tree: &Mutex<DecisionTree>) -> GenerationResult<()> {
        let start = Instant::now();
        let (role, query, mut pending) = {
            let guard = tree.lock().await;
            let pending: Vec<NodeId> = guard.root().answers.iter().rev().cloned().collect();
            (guard.role().to_string(), guard.query().to_string(), pending)
        };
        let mut expansions = 0usize;

        while let Some(answer_id) = pending.pop() {
            let depth = tree.lock().await.depth(&answer_id).unwrap_or_default();
            if depth >= self.max_depth {
                debug!(answer_id = %answer_id, depth, "Max depth reached; not expanding");
                continue;
            }

            if let Some(child_id) = self
                .expand_shared(&role, &query, tree, &answer_id)
                .await?
            {
                expansions += 1;
                if let Some(child) = tree.lock().await.question(&child_id) {
                    pending.extend(child.answers.iter().rev().cloned());
                }
            }
        }

        let nodes = tree.lock().await.len();
        info!(
            expansions,
            nodes,
            latency_ms = start.elapsed().as_millis() as u64,
            "Decision tree complete"
        );
        self.sink.emit(TreeEvent::Complete);
        Ok(())
    }

    /// Generate the root, then expand the whole tree.
    ///
    /// If an expansion fails after the root exists, the error is
    /// [`GenerationError::Incomplete`] and carries the partial tree.
    pub async fn generate_full(&self, role: &str, query: &str) -> GenerationResult<DecisionTree> {
        let tree = Mutex::new(self.generate_root(role, query).await?);
        info!("Building decision tree recursively...");
        let expanded = self.expand_all(&tree).await;

        let tree = tree.into_inner();
        match expanded {
            Ok(()) => Ok(tree),
            Err(e) => Err(GenerationError::Incomplete {
                source: Box::new(e),
                tree: Box::new(tree),
            }),
        }
    }

    /// Read what an expansion needs from the tree.
    fn plan_expansion(
        &self,
        role: &str,
        query: &str,
        tree: &DecisionTree,
        answer_id: &NodeId,
    ) -> Option<ExpansionStep> {
        let Some(answer) = tree.answer(answer_id) else {
            warn!(answer_id = %answer_id, "Expansion target is not an answer of this tree");
            return None;
        };

        if answer.is_leaf() {
            debug!(answer_id = %answer_id, "Answer is a leaf; nothing to expand");
            return None;
        }

        let history = tree.history(answer_id);
        Some(ExpansionStep {
            prompts: build_expansion_prompt(role, query, &history, &answer.potential_outcomes),
            answer_text: answer.answer_text.clone(),
        })
    }

    /// Attach a validated question, then persist and emit `expand`.
    async fn apply_expansion(
        &self,
        tree: &mut DecisionTree,
        answer_id: &NodeId,
        answer_text: &str,
        question: &ValidatedQuestion,
        record: CallRecord,
    ) -> Option<NodeId> {
        let child_id = tree.attach_question(answer_id, question)?;
        tree.push_log(record);

        info!(
            answer_id = %answer_id,
            answer = %truncate(answer_text, 30),
            question = %question.question(),
            depth = tree.depth(&child_id).unwrap_or_default(),
            "Extending branch"
        );

        self.persist(tree).await;
        if let Some(child) = tree.question(&child_id) {
            self.sink.emit(TreeEvent::Expand {
                parent_answer_id: answer_id.clone(),
                node: tree.summarize(child),
            });
        }

        Some(child_id)
    }

    /// [`ask`](Self::ask), reporting a failure before returning it.
    async fn ask_or_fail(
        &self,
        kind: CallKind,
        prompts: PromptPair,
    ) -> GenerationResult<(ValidatedQuestion, CallRecord)> {
        match self.ask(kind, prompts).await {
            Ok(result) => Ok(result),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// One model call: prompt, validate, and time it.
    async fn ask(
        &self,
        kind: CallKind,
        prompts: PromptPair,
    ) -> GenerationResult<(ValidatedQuestion, CallRecord)> {
        let request = ChatRequest::question(self.model.model_name(), &prompts.system, &prompts.user);

        let start = Instant::now();
        let completion = self.model.complete(request).await?;
        let question = parse_question(&completion)?;
        let duration = start.elapsed();

        debug!(
            kind = ?kind,
            duration_ms = duration.as_millis() as u64,
            answers = question.answers().len(),
            "Model call validated"
        );

        let record = CallRecord {
            timestamp: Utc::now(),
            kind,
            duration_seconds: duration.as_secs_f64(),
            system_prompt: prompts.system,
            user_prompt: prompts.user,
            parsed_response: question.raw().clone(),
        };

        Ok((question, record))
    }

    /// Report a failed step and hand the error back.
    fn fail(&self, err: GenerationError) -> GenerationError {
        error!(error = %err, "Generation step failed");
        self.sink.emit(TreeEvent::Error {
            message: err.to_string(),
        });
        err
    }

    /// Write a snapshot; failures are logged and swallowed.
    async fn persist(&self, tree: &DecisionTree) {
        let Some(store) = &self.store else {
            return;
        };

        let record = TreeRecord::from_tree(tree);
        if let Err(e) = store.save(&record).await {
            warn!(name = %record.name(), error = %e, "Failed to persist tree");
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}
