//! Conversation buffer memory.
//!
//! Keeps every turn verbatim and renders them as a plain transcript that is
//! prepended to the next question.

use serde::{Deserialize, Serialize};

pub const HUMAN_PREFIX: &str = "Human";
pub const AI_PREFIX: &str = "AI";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationBufferMemory {
    turns: Vec<ConversationTurn>,
}

impl ConversationBufferMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_context(&mut self, input: impl Into<String>, output: impl Into<String>) {
        self.turns.push(ConversationTurn {
            input: input.into(),
            output: output.into(),
        });
    }

    /// The transcript: `Human: ...` / `AI: ...` lines, empty when nothing was said yet.
    pub fn buffer(&self) -> String {
        self.turns
            .iter()
            .map(|turn| {
                format!(
                    "{}: {}\n{}: {}",
                    HUMAN_PREFIX, turn.input, AI_PREFIX, turn.output
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
