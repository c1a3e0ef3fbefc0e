//! Chat model stand-ins shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use decision_tree_builder::error::{LlmError, LlmResult};
use decision_tree_builder::llm::{ChatModel, ChatRequest};

pub const FLICKER: &str = r#"{"question":"Is the flicker constant or intermittent?","answers":[{"answer_text":"Constant","potential_outcomes":["Hardware fault"]},{"answer_text":"Intermittent","potential_outcomes":["Loose cable","Driver issue"]}]}"#;

pub const CABLE: &str = r#"{"question":"Does wiggling the cable change it?","answers":[{"answer_text":"Yes","potential_outcomes":["Loose cable"]},{"answer_text":"No","potential_outcomes":["Driver issue"]}]}"#;

/// Replays canned responses in order and records every request.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<LlmResult<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<LlmResult<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(responses: &[&str]) -> Self {
        Self::new(responses.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> LlmResult<String> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::InvalidResponse {
                    message: "script exhausted".to_string(),
                })
            })
    }

    fn model_name(&self) -> String {
        "scripted".to_string()
    }
}

/// Splits whatever outcome set it is asked about into two halves.
///
/// The root question splits `initial`; every later question splits the
/// bullet list under `# Current Possible Outcomes` in the user prompt.
pub struct SplittingModel {
    initial: Vec<String>,
    calls: AtomicUsize,
}

impl SplittingModel {
    pub fn new(outcomes: &[&str]) -> Self {
        Self {
            initial: outcomes.iter().map(|o| o.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Outcome bullets following the outcomes header of a user prompt.
pub fn prompt_outcomes(user_prompt: &str) -> Option<Vec<String>> {
    let (_, tail) = user_prompt.split_once("# Current Possible Outcomes")?;
    Some(
        tail.lines()
            .filter_map(|l| l.strip_prefix("- "))
            .map(str::to_string)
            .collect(),
    )
}

#[async_trait]
impl ChatModel for SplittingModel {
    async fn complete(&self, request: ChatRequest) -> LlmResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let outcomes = request
            .user_prompt()
            .and_then(prompt_outcomes)
            .unwrap_or_else(|| self.initial.clone());

        let (left, right) = outcomes.split_at(outcomes.len() / 2);
        let answers: Vec<_> = [left, right]
            .iter()
            .filter(|half| !half.is_empty())
            .enumerate()
            .map(|(i, half)| json!({"answer_text": format!("Group {}", i + 1), "potential_outcomes": half}))
            .collect();

        Ok(json!({"question": format!("Question {}?", n + 1), "answers": answers}).to_string())
    }

    fn model_name(&self) -> String {
        "splitter".to_string()
    }
}

/// Never narrows anything down: one answer, always two outcomes.
pub struct StubbornModel;

#[async_trait]
impl ChatModel for StubbornModel {
    async fn complete(&self, _request: ChatRequest) -> LlmResult<String> {
        Ok(json!({
            "question": "Anything else?",
            "answers": [{"answer_text": "Maybe", "potential_outcomes": ["A", "B"]}]
        })
        .to_string())
    }

    fn model_name(&self) -> String {
        "stubborn".to_string()
    }
}
