
use itertools::Itertools;

use super::ChatMessage;
use crate::vector_store::ScoredChunk;

pub const DEFAULT_SYSTEM_TEMPLATE: &str =
    "Answer based on the following context:\n<Documents>\n{context}\n</Documents>";
pub const DEFAULT_USER_TEMPLATE: &str = "{question}";

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Two-message prompt with `{context}` and `{question}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPromptTemplate {
    system_template: String,
    user_template: String,
}

impl Default for ChatPromptTemplate {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_TEMPLATE, DEFAULT_USER_TEMPLATE)
    }
}

impl ChatPromptTemplate {
    #[inline]
    pub fn new(system_template: impl Into<String>, user_template: impl Into<String>) -> Self {
        Self {
            system_template: system_template.into(),
            user_template: user_template.into(),
        }
    }

    /// Fill both templates. Values are inserted literally, so braces inside
    /// the context or question are never treated as placeholders.
    #[inline]
    pub fn render(&self, context: &str, question: &str) -> Vec<ChatMessage> {
        let values = [("context", context), ("question", question)];
        vec![
            ChatMessage::system(substitute(&self.system_template, &values)),
            ChatMessage::user(substitute(&self.user_template, &values)),
        ]
    }
}

/// Join retrieved chunk texts with a blank line between them
#[inline]
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .join(CONTEXT_SEPARATOR)
}

fn substitute(template: &str, values: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some((before, after)) = rest.split_once('{') {
        output.push_str(before);

        let replacement = after.split_once('}').and_then(|(name, tail)| {
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, tail))
        });

        match replacement {
            Some((value, tail)) => {
                output.push_str(value);
                rest = tail;
            }
            None => {
                output.push('{');
                rest = after;
            }
        }
    }

    output.push_str(rest);
    output
}
