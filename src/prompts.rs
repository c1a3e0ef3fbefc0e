//! Centralized prompt definitions for tree generation
//!
//! Two prompt pairs are used: one for the root question of a new tree and
//! one for every later discriminating question. Builders are pure string
//! substitution so the exact text sent to the model is reproducible.

/// System prompt for the root question. `{role}` is substituted.
pub const INITIAL_SYSTEM_PROMPT: &str = r#"# Role
You are {role}. Your task is to create the starting point for a decision tree.

# Your Task
Generate a response with this exact structure:
```json
{
    "question": "The most useful initial question to ask",
    "answers": [
        {"answer_text": "Answer option 1", "potential_outcomes": ["Outcome A", "Outcome B"]},
        {"answer_text": "Answer option 2", "potential_outcomes": ["Outcome C", "Outcome D"]}
    ]
}
```

# Requirements
- List ALL logically possible outcomes for this domain
- Create distinct answer options that are mutually exclusive
- Ensure answer options cover all possible scenarios
- Outcomes should be specific and actionable
- The question should be the most useful starting point for differentiation
"#;

/// System prompt for every question below the root. `{role}` is substituted.
pub const DISCRIMINATING_SYSTEM_PROMPT: &str = r#"# Role
You are {role}. Your task is to create the next branching question for a decision tree.

# Task
Generate a response with this exact structure:
```json
{
    "question": "The question that best differentiates these outcomes",
    "answers": [
        {"answer_text": "Answer option 1", "potential_outcomes": ["Outcome A", "Outcome C"]},
        {"answer_text": "Answer option 2", "potential_outcomes": ["Outcome B"]}
    ]
}
```

# Requirements
- Create exactly ONE question that best distinguishes between the possible outcomes
- Answers must be mutually exclusive and collectively exhaustive
- Each answer's outcomes list must be a non-empty subset of the original outcomes
- The question should maximally reduce uncertainty in one step
"#;

/// User prompt for the root question. `{query}` is substituted.
pub const INITIAL_USER_PROMPT: &str = "\nInitial user query: {query}\n";

/// User prompt for discriminating questions.
///
/// `{query}`, `{history}` and `{outcomes}` are substituted.
pub const DISCRIMINATING_USER_PROMPT: &str = r#"
# Decision Path
Initial query: {query}

{history}

# Current Possible Outcomes
{outcomes}
"#;

/// A system + user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    /// Instructions for the model.
    pub system: String,
    /// The user turn.
    pub user: String,
}

/// Build the prompts for a tree's root question.
pub fn build_root_prompt(role: &str, query: &str) -> PromptPair {
    PromptPair {
        system: fill(INITIAL_SYSTEM_PROMPT, &[("role", role)]),
        user: fill(INITIAL_USER_PROMPT, &[("query", query)]),
    }
}

/// Build the prompts for expanding an answer.
///
/// `history` is the rendered path from the root (see
/// [`DecisionTree::history`](crate::tree::DecisionTree::history)); `outcomes`
/// is the outcome set the new question must split.
pub fn build_expansion_prompt(
    role: &str,
    query: &str,
    history: &str,
    outcomes: &[String],
) -> PromptPair {
    let outcomes = render_outcomes(outcomes);
    PromptPair {
        system: fill(DISCRIMINATING_SYSTEM_PROMPT, &[("role", role)]),
        user: fill(
            DISCRIMINATING_USER_PROMPT,
            &[("query", query), ("history", history), ("outcomes", &outcomes)],
        ),
    }
}

/// Single-pass placeholder substitution.
///
/// Substituted text is never rescanned, and braces that do not name a
/// variable (the JSON examples) are copied through.
fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = vars
            .iter()
            .find(|(key, _)| tail.starts_with(key) && tail[key.len()..].starts_with('}'));
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Render outcomes as a `- ` bullet list.
pub fn render_outcomes(outcomes: &[String]) -> String {
    outcomes
        .iter()
        .map(|o| format!("- {}", o))
        .collect::<Vec<_>>()
        .join("\n")
}
