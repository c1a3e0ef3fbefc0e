//! Structured-output contract for question generation.
//!
//! The model is asked for one JSON object of the form
//! `{"question": ..., "answers": [{"answer_text": ..., "potential_outcomes": [...]}]}`.
//! [`parse_question`] turns raw completion text into a [`ValidatedQuestion`]
//! or a [`GenerationError::ModelResponseInvalid`]; nothing unvalidated reaches
//! the node model.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::{GenerationError, GenerationResult};

/// Raw response shape as produced by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSchema {
    /// The discriminating question text.
    pub question: String,
    /// Answer options in presentation order.
    pub answers: Vec<AnswerSchema>,
}

/// One answer option in a raw response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSchema {
    /// Text of the answer option.
    pub answer_text: String,
    /// Outcomes still reachable when this answer is chosen.
    pub potential_outcomes: Vec<String>,
}

/// A response that passed the shape check.
///
/// Guarantees at least one answer and at least one outcome per answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuestion {
    question: String,
    answers: Vec<ValidatedAnswer>,
    raw: QuestionSchema,
}

/// An answer option with a non-empty outcome list.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAnswer {
    /// Text of the answer option.
    pub answer_text: String,
    /// Non-empty list of outcomes.
    pub potential_outcomes: Vec<String>,
}

impl ValidatedQuestion {
    /// The question text.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Validated answers in response order.
    pub fn answers(&self) -> &[ValidatedAnswer] {
        &self.answers
    }

    /// The parsed response as received, kept for the call log.
    pub fn raw(&self) -> &QuestionSchema {
        &self.raw
    }
}

impl TryFrom<QuestionSchema> for ValidatedQuestion {
    type Error = GenerationError;

    fn try_from(schema: QuestionSchema) -> GenerationResult<Self> {
        if schema.answers.is_empty() {
            return Err(GenerationError::invalid("response contains no answers"));
        }

        let mut answers = Vec::with_capacity(schema.answers.len());
        for (i, answer) in schema.answers.iter().enumerate() {
            if answer.potential_outcomes.is_empty() {
                return Err(GenerationError::invalid(format!(
                    "answer {} ('{}') has no potential outcomes",
                    i, answer.answer_text
                )));
            }
            answers.push(ValidatedAnswer {
                answer_text: answer.answer_text.clone(),
                potential_outcomes: answer.potential_outcomes.clone(),
            });
        }

        Ok(Self {
            question: schema.question.clone(),
            answers,
            raw: schema,
        })
    }
}

/// Parse and validate a completion into a question.
pub fn parse_question(completion: &str) -> GenerationResult<ValidatedQuestion> {
    let json_str = extract_json_from_completion(completion).map_err(|e| {
        warn!(
            error = %e,
            completion_preview = %completion.chars().take(200).collect::<String>(),
            "Failed to extract JSON from model response"
        );
        GenerationError::invalid(e)
    })?;

    let schema = serde_json::from_str::<QuestionSchema>(json_str)
        .map_err(|e| GenerationError::invalid(format!("Failed to parse question: {}", e)))?;

    ValidatedQuestion::try_from(schema)
}

/// Extract JSON from a completion string, handling markdown code blocks.
///
/// Attempts extraction in this order:
/// 1. Raw JSON (fast path)
/// 2. ```json ... ``` code blocks
/// 3. ``` ... ``` code blocks
pub(crate) fn extract_json_from_completion(completion: &str) -> Result<&str, String> {
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty or malformed".to_string());
    }

    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ``` block but content was empty or malformed".to_string());
    }

    Err(format!(
        "No JSON found in response. First 100 chars: '{}'",
        completion.chars().take(100).collect::<String>()
    ))
}

/// JSON Schema sent as the `response_format` of each request.
pub fn question_json_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "question": { "type": "string" },
            "answers": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "answer_text": { "type": "string" },
                        "potential_outcomes": {
                            "type": "array",
                            "items": { "type": "string" }
                        }
                    },
                    "required": ["answer_text", "potential_outcomes"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["question", "answers"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLICKER: &str = r#"{"question":"Is the flicker constant or intermittent?","answers":[{"answer_text":"Constant","potential_outcomes":["Hardware fault"]},{"answer_text":"Intermittent","potential_outcomes":["Loose cable","Driver issue"]}]}"#;

    #[test]
    fn test_parse_valid_question() {
        let q = parse_question(FLICKER).unwrap();
        assert_eq!(q.question(), "Is the flicker constant or intermittent?");
        assert_eq!(q.answers().len(), 2);
        assert_eq!(q.answers()[1].potential_outcomes.len(), 2);
        assert_eq!(q.raw().answers[0].answer_text, "Constant");
    }

    #[test]
    fn test_parse_fenced_question() {
        let fenced = format!("Here you go:\n```json\n{}\n```", FLICKER);
        let q = parse_question(&fenced).unwrap();
        assert_eq!(q.answers().len(), 2);
    }

    #[test]
    fn test_empty_answers_rejected() {
        let err = parse_question(r#"{"question":"Q?","answers":[]}"#).unwrap_err();
        assert!(matches!(err, GenerationError::ModelResponseInvalid { .. }));
    }

    #[test]
    fn test_empty_outcomes_rejected() {
        let err = parse_question(
            r#"{"question":"Q?","answers":[{"answer_text":"A","potential_outcomes":[]}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no potential outcomes"));
    }

    #[test]
    fn test_missing_field_rejected() {
        let err = parse_question(r#"{"question":"Q?"}"#).unwrap_err();
        assert!(err.to_string().contains("Failed to parse question"));
    }

    #[test]
    fn test_non_json_rejected() {
        let err = parse_question("I think you should ask about the cable.").unwrap_err();
        assert!(err.to_string().contains("No JSON found"));
    }

    #[test]
    fn test_extract_plain_code_block() {
        let s = "```\n{\"a\":1}\n```";
        assert_eq!(extract_json_from_completion(s).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_schema_requires_both_fields() {
        let schema = question_json_schema();
        assert_eq!(schema["required"], json!(["question", "answers"]));
    }
}
