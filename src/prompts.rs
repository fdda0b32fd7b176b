//! Prompt template for LLM candidate reranking.

use crate::gateway::Message;

/// Rendered prompt ready for the LLM.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub template_slug: String,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// A prompt template with `{question}` and `{candidates}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    /// Render the prompt. Candidates are listed one per line, numbered from 1.
    ///
    /// Question and candidates are inserted verbatim: the reply is matched
    /// against the exact candidate text.
    pub fn render<S: AsRef<str>>(&self, question: &str, candidates: &[S]) -> PromptInstance {
        let numbered = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c.as_ref()))
            .collect::<Vec<_>>()
            .join("\n");

        let count = candidates.len().to_string();
        let user = fill(
            self.user,
            &[
                ("{question}", question),
                ("{candidates}", numbered.as_str()),
                ("{count}", count.as_str()),
            ],
        );

        PromptInstance {
            template_slug: self.slug.to_string(),
            system: self.system.trim().to_string(),
            user: user.trim().to_string(),
        }
    }
}

/// Single-pass placeholder substitution; inserted values are never rescanned.
fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'scan: while let Some(ch) = rest.chars().next() {
        for &(key, value) in vars {
            if let Some(after) = rest.strip_prefix(key) {
                out.push_str(value);
                rest = after;
                continue 'scan;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

pub const RERANK_V1: PromptTemplate = PromptTemplate {
    slug: "jeopardy_rerank_v1",
    system: "You are a helpful assistant that reranks candidate answers based on relevance to the Jeopardy question.",
    user: r#"Given the Jeopardy question: "{question}",
Here are the candidate answers (Wikipedia page titles):

{candidates}

Rerank these answers from most likely to least likely to be the correct answer to the Jeopardy question.
Return ONLY the reordered list of answers, numbered 1 to {count}."#,
};
