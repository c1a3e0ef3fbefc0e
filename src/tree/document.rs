//! Serializable views of a tree.
//!
//! [`QuestionDocument`] / [`AnswerDocument`] are the full recursive form
//! written by persistence. [`QuestionSummary`] is the flat form carried by
//! lifecycle events: one question and its answers, no nested children.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DecisionTree, NodeId, QuestionNode};

/// Discriminator written as the `type` field of node documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A question node.
    Question,
    /// An answer node.
    Answer,
}

/// Recursive question document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDocument {
    /// Node id.
    pub id: NodeId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Depth below the root (root = 0).
    pub depth: usize,
    /// Always `question`.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Question text.
    pub question: String,
    /// Answers in presentation order.
    pub answers: Vec<AnswerDocument>,
}

/// Recursive answer document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDocument {
    /// Node id.
    pub id: NodeId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Depth below the root.
    pub depth: usize,
    /// Always `answer`.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Answer text.
    pub answer_text: String,
    /// Outcomes still reachable.
    pub potential_outcomes: Vec<String>,
    /// Follow-up question, if expanded.
    pub child: Option<Box<QuestionDocument>>,
}

/// A question and its answers without nested children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSummary {
    /// Question id.
    pub id: NodeId,
    /// Question text.
    pub question: String,
    /// Answers in presentation order.
    pub answers: Vec<AnswerSummary>,
}

/// Answer entry of a [`QuestionSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSummary {
    /// Answer id.
    pub id: NodeId,
    /// Answer text.
    pub text: String,
    /// Outcomes still reachable.
    pub outcomes: Vec<String>,
}

impl DecisionTree {
    /// The whole tree as a recursive document.
    pub fn to_document(&self) -> QuestionDocument {
        self.question_document(self.root(), 0)
    }

    fn question_document(&self, question: &QuestionNode, depth: usize) -> QuestionDocument {
        let answers = self
            .answers_of(question)
            .map(|answer| AnswerDocument {
                id: answer.id.clone(),
                created_at: answer.created_at,
                depth: depth + 1,
                kind: NodeKind::Answer,
                answer_text: answer.answer_text.clone(),
                potential_outcomes: answer.potential_outcomes.clone(),
                child: answer
                    .child
                    .as_ref()
                    .and_then(|id| self.question(id))
                    .map(|child| Box::new(self.question_document(child, depth + 2))),
            })
            .collect();

        QuestionDocument {
            id: question.id.clone(),
            created_at: question.created_at,
            depth,
            kind: NodeKind::Question,
            question: question.question.clone(),
            answers,
        }
    }

    /// Flat summary of one question for lifecycle events.
    pub fn summarize(&self, question: &QuestionNode) -> QuestionSummary {
        QuestionSummary {
            id: question.id.clone(),
            question: question.question.clone(),
            answers: self
                .answers_of(question)
                .map(|a| AnswerSummary {
                    id: a.id.clone(),
                    text: a.answer_text.clone(),
                    outcomes: a.potential_outcomes.clone(),
                })
                .collect(),
        }
    }
}
