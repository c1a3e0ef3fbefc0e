use std::fmt;

use super::{AnswerNode, DecisionTree, QuestionNode};

impl DecisionTree {
    /// Tab-indented outline of the whole tree.
    ///
    /// Answers at or beyond `max_depth` are marked `[MAX DEPTH REACHED]`.
    /// The marker is display-only; stored outcomes are untouched.
    pub fn render(&self, max_depth: usize) -> String {
        let mut out = String::new();
        self.render_question(&mut out, self.root(), 0, max_depth);
        out
    }

    fn render_question(&self, out: &mut String, q: &QuestionNode, level: usize, max_depth: usize) {
        out.push_str(&"\t".repeat(level));
        out.push_str("Question: ");
        out.push_str(&q.question);
        out.push('\n');
        for answer in self.answers_of(q) {
            self.render_answer(out, answer, level + 1, max_depth);
        }
    }

    fn render_answer(&self, out: &mut String, a: &AnswerNode, level: usize, max_depth: usize) {
        out.push_str(&format!(
            "{}Answer: \"{}\" -> [{}]",
            "\t".repeat(level),
            a.answer_text,
            a.potential_outcomes.join(", ")
        ));
        if level >= max_depth {
            out.push_str(" [MAX DEPTH REACHED]");
        }
        out.push('\n');

        if let Some(child) = a.child.as_ref().and_then(|id| self.question(id)) {
            self.render_question(out, child, level + 1, max_depth);
        }
    }
}

impl fmt::Display for QuestionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<QuestionNode question='{}' branches={}>",
            self.question,
            self.answers.len()
        )
    }
}

impl fmt::Display for AnswerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<AnswerNode answer='{}' outcomes={}>",
            self.answer_text,
            self.potential_outcomes.len()
        )
    }
}
