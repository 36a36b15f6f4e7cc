//! RAG Agent
//!
//! Answers questions about the nutrition corpus while remembering the
//! conversation. Each question is prefixed with the transcript so far, so a
//! follow-up like "how many letters are in my favorite food?" can be
//! resolved against earlier turns as well as against retrieved chunks.

use super::memory::ConversationBufferMemory;
use super::retrieval_qa::RetrievalQA;
use crate::types::AppResult;
use crate::utils::text::wrap_text_preserve_newlines;
use tracing::info;

pub struct RagAgent {
    chain: RetrievalQA,
    memory: ConversationBufferMemory,
    wrap_width: usize,
}

impl RagAgent {
    pub fn new(chain: RetrievalQA, wrap_width: usize) -> Self {
        Self {
            chain,
            memory: ConversationBufferMemory::new(),
            wrap_width,
        }
    }

    /// The question actually sent to retrieval and the model.
    pub fn contextualize(history: &str, query: &str) -> String {
        format!("{}\n\nUser: {}", history, query)
    }

    /// Answer `query`, record the turn and return the answer wrapped for the terminal.
    pub async fn call(&mut self, query: &str) -> AppResult<String> {
        let history = self.memory.buffer();
        let modified_query = Self::contextualize(&history, query);

        info!(
            query_len = query.len(),
            history_turns = self.memory.turns().len(),
            "Calling RAG agent"
        );

        let response = self.chain.invoke(&modified_query).await?;
        self.memory.save_context(query, response.result.as_str());

        Ok(wrap_text_preserve_newlines(&response.result, self.wrap_width))
    }

    pub fn memory(&self) -> &ConversationBufferMemory {
        &self.memory
    }

    pub fn reset(&mut self) {
        self.memory.clear();
        info!("Conversation memory cleared");
    }
}
