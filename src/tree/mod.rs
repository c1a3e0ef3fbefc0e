//! Decision tree node model.
//!
//! A [`DecisionTree`] exclusively owns every node in an arena. Questions
//! and answers alternate strictly: a question's children are answers, an
//! answer has at most one child question. Parent links are [`NodeId`]s,
//! never owning references.
//!
//! The tree only grows. The one mutation after construction is attaching
//! a child question to an answer ([`DecisionTree::attach_question`]).

mod document;
mod render;

pub use document::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::llm::{QuestionSchema, ValidatedQuestion};

/// Unique, immutable node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A question with mutually exclusive answer options.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionNode {
    /// Node id.
    pub id: NodeId,
    /// Question text.
    pub question: String,
    /// Answer ids in presentation order. Populated once at creation.
    pub answers: Vec<NodeId>,
    /// The answer this question follows; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// One answer option and the outcomes still reachable through it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerNode {
    /// Node id.
    pub id: NodeId,
    /// Answer text.
    pub answer_text: String,
    /// Outcomes still possible once this answer is chosen.
    pub potential_outcomes: Vec<String>,
    /// Follow-up question, set by expansion.
    pub child: Option<NodeId>,
    /// The question this answer belongs to.
    pub parent: NodeId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl AnswerNode {
    /// A leaf has at most one outcome left and is never expanded.
    pub fn is_leaf(&self) -> bool {
        self.potential_outcomes.len() <= 1
    }

    /// The concluded outcome of a leaf, if any.
    pub fn outcome(&self) -> Option<&str> {
        self.potential_outcomes.first().map(String::as_str)
    }
}

/// Either kind of tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A question node.
    Question(QuestionNode),
    /// An answer node.
    Answer(AnswerNode),
}

impl Node {
    /// Node id.
    pub fn id(&self) -> &NodeId {
        match self {
            Node::Question(q) => &q.id,
            Node::Answer(a) => &a.id,
        }
    }

    /// Parent id; `None` only for the root question.
    pub fn parent(&self) -> Option<&NodeId> {
        match self {
            Node::Question(q) => q.parent.as_ref(),
            Node::Answer(a) => Some(&a.parent),
        }
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Node::Question(q) => q.created_at,
            Node::Answer(a) => a.created_at,
        }
    }

    /// Whether this node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    /// The question, if this is a question node.
    pub fn as_question(&self) -> Option<&QuestionNode> {
        match self {
            Node::Question(q) => Some(q),
            Node::Answer(_) => None,
        }
    }

    /// The answer, if this is an answer node.
    pub fn as_answer(&self) -> Option<&AnswerNode> {
        match self {
            Node::Answer(a) => Some(a),
            Node::Question(_) => None,
        }
    }
}

/// Which prompt a logged model call used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// Root question generation.
    Initial,
    /// Expansion of an answer.
    Discriminating,
}

/// One successful model call, appended to the root's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// When the call completed.
    pub timestamp: DateTime<Utc>,
    /// Which prompt pair was used.
    pub kind: CallKind,
    /// Wall-clock duration of the call.
    pub duration_seconds: f64,
    /// System prompt sent.
    pub system_prompt: String,
    /// User prompt sent.
    pub user_prompt: String,
    /// The response as parsed.
    pub parsed_response: QuestionSchema,
}

/// A decision tree and the session metadata it was generated under.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    role: String,
    query: String,
    model: String,
    root: NodeId,
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    logs: Vec<CallRecord>,
    last_updated: DateTime<Utc>,
}

impl DecisionTree {
    /// Build a tree whose root is `question`, with its answers in order.
    pub fn new(
        role: impl Into<String>,
        query: impl Into<String>,
        model: impl Into<String>,
        question: &ValidatedQuestion,
    ) -> Self {
        let mut tree = Self {
            role: role.into(),
            query: query.into(),
            model: model.into(),
            root: NodeId::new(),
            nodes: Vec::new(),
            index: HashMap::new(),
            logs: Vec::new(),
            last_updated: Utc::now(),
        };
        tree.root = tree.insert_question(None, question);
        tree.last_updated = tree.root().created_at;
        tree
    }

    /// Attach a new child question to an answer and return its id.
    ///
    /// Returns `None` if `answer_id` is not an answer in this tree. An
    /// existing child is replaced, not merged; callers must not expand the
    /// same answer twice.
    pub fn attach_question(
        &mut self,
        answer_id: &NodeId,
        question: &ValidatedQuestion,
    ) -> Option<NodeId> {
        self.answer(answer_id)?;
        let child_id = self.insert_question(Some(answer_id.clone()), question);
        if let Some(Node::Answer(answer)) = self.get_mut(answer_id) {
            answer.child = Some(child_id.clone());
        }
        self.last_updated = Utc::now();
        Some(child_id)
    }

    fn insert_question(&mut self, parent: Option<NodeId>, question: &ValidatedQuestion) -> NodeId {
        let question_id = NodeId::new();
        let created_at = Utc::now();

        let answer_ids: Vec<NodeId> = question
            .answers()
            .iter()
            .map(|answer| {
                let id = NodeId::new();
                self.push(Node::Answer(AnswerNode {
                    id: id.clone(),
                    answer_text: answer.answer_text.clone(),
                    potential_outcomes: answer.potential_outcomes.clone(),
                    child: None,
                    parent: question_id.clone(),
                    created_at,
                }));
                id
            })
            .collect();

        self.push(Node::Question(QuestionNode {
            id: question_id.clone(),
            question: question.question().to_string(),
            answers: answer_ids,
            parent,
            created_at,
        }));

        question_id
    }

    fn push(&mut self, node: Node) {
        self.index.insert(node.id().clone(), self.nodes.len());
        self.nodes.push(node);
    }

    fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        let idx = *self.index.get(id)?;
        self.nodes.get_mut(idx)
    }

    /// Append a call record to the root's log.
    pub fn push_log(&mut self, record: CallRecord) {
        self.logs.push(record);
    }

    /// The call log, oldest first.
    pub fn logs(&self) -> &[CallRecord] {
        &self.logs
    }

    /// Expert role the tree was generated for.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The user's initial query.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Model that generated the tree.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Creation time of the root.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.root().created_at
    }

    /// Time of the last structural change.
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Id of the root question.
    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    /// The root question.
    pub fn root(&self) -> &QuestionNode {
        match self.get(&self.root) {
            Some(Node::Question(q)) => q,
            _ => unreachable!("root is always a question node"),
        }
    }

    /// Direct lookup by id.
    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.index.get(id).and_then(|&idx| self.nodes.get(idx))
    }

    /// Lookup restricted to question nodes.
    pub fn question(&self, id: &NodeId) -> Option<&QuestionNode> {
        self.get(id).and_then(Node::as_question)
    }

    /// Lookup restricted to answer nodes.
    pub fn answer(&self, id: &NodeId) -> Option<&AnswerNode> {
        self.get(id).and_then(Node::as_answer)
    }

    /// Answers of a question, in presentation order.
    pub fn answers_of<'a>(
        &'a self,
        question: &'a QuestionNode,
    ) -> impl Iterator<Item = &'a AnswerNode> + 'a {
        question.answers.iter().filter_map(move |id| self.answer(id))
    }

    /// Depth below the root question (root = 0).
    pub fn depth(&self, id: &NodeId) -> Option<usize> {
        let mut node = self.get(id)?;
        let mut depth = 0;
        while let Some(parent) = node.parent() {
            node = self.get(parent)?;
            depth += 1;
        }
        Some(depth)
    }

    /// Nodes from the root down to `id`, inclusive.
    pub fn path(&self, id: &NodeId) -> Vec<&Node> {
        let mut path = Vec::new();
        let mut current = self.get(id);
        while let Some(node) = current {
            path.push(node);
            current = node.parent().and_then(|p| self.get(p));
        }
        path.reverse();
        path
    }

    /// Depth-first search from the root for a reachable node with this id.
    ///
    /// Visits a question, then each of its answers in order, then each
    /// answer's child.
    pub fn find_by_id(&self, target: &NodeId) -> Option<&Node> {
        let mut stack = vec![&self.root];
        while let Some(id) = stack.pop() {
            let node = self.get(id)?;
            if node.id() == target {
                return Some(node);
            }
            match node {
                Node::Question(q) => stack.extend(q.answers.iter().rev()),
                Node::Answer(a) => stack.extend(a.child.iter()),
            }
        }
        None
    }

    /// Number of nodes reachable from the root.
    pub fn len(&self) -> usize {
        self.reachable().count()
    }

    /// Always false: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// All reachable nodes in depth-first pre-order.
    pub fn reachable(&self) -> impl Iterator<Item = &Node> + '_ {
        let mut stack = vec![&self.root];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let node = self.get(id)?;
            match node {
                Node::Question(q) => stack.extend(q.answers.iter().rev()),
                Node::Answer(a) => stack.extend(a.child.iter()),
            }
            Some(node)
        })
    }

    /// Render the path to `id` as prompt context.
    ///
    /// One `Question:` line per question and one `Answer:` line per answer,
    /// root first. Indentation grows by one tab after each answer.
    pub fn history(&self, id: &NodeId) -> String {
        let mut lines = Vec::new();
        let mut indent = 0;
        for node in self.path(id) {
            match node {
                Node::Question(q) => {
                    lines.push(format!("{}Question: {}", "\t".repeat(indent), q.question));
                }
                Node::Answer(a) => {
                    lines.push(format!("{}Answer: {}", "\t".repeat(indent), a.answer_text));
                    indent += 1;
                }
            }
        }
        lines.join("\n")
    }
}
