//! Retrieval QA ("stuff" chain)
//!
//! Retrieves the closest chunks for a question and stuffs all of them into the
//! system instruction. The question itself goes to the model as the only user
//! message.

use crate::embeddings::{Document, Retriever};
use crate::llm::provider::LLM;
use crate::types::{AppResult, LLMMessage, LLMRequest};
use tracing::info;

const SYSTEM_PREAMBLE: &str = "Use the following pieces of context to answer the user's question. \n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n";

const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Sampling settings for the answer call.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct QAResult {
    pub query: String,
    pub result: String,
    /// Number of chunks that were stuffed into the prompt.
    pub context_documents: usize,
    pub source_documents: Option<Vec<Document>>,
}

pub struct RetrievalQA {
    llm: LLM,
    retriever: Retriever,
    settings: ChatSettings,
    return_source_documents: bool,
}

impl RetrievalQA {
    pub fn new(llm: LLM, retriever: Retriever, settings: ChatSettings) -> Self {
        Self {
            llm,
            retriever,
            settings,
            return_source_documents: false,
        }
    }

    pub fn with_source_documents(mut self, enabled: bool) -> Self {
        self.return_source_documents = enabled;
        self
    }

    /// System instruction carrying the retrieved context. Chunk text is
    /// inserted verbatim; braces are never treated as placeholders.
    pub fn build_system_prompt(documents: &[Document]) -> String {
        let context = documents
            .iter()
            .map(|d| d.page_content.as_str())
            .collect::<Vec<_>>()
            .join(DOCUMENT_SEPARATOR);

        format!("{}{}", SYSTEM_PREAMBLE, context)
    }

    pub async fn invoke(&self, query: &str) -> AppResult<QAResult> {
        let documents = self.retriever.get_relevant_documents(query).await?;

        let request = LLMRequest {
            provider: self.settings.provider.clone(),
            model: self.settings.model.clone(),
            messages: vec![LLMMessage::user(query)],
            max_tokens: self.settings.max_output_tokens,
            temperature: Some(self.settings.temperature),
            system_instruction: Some(Self::build_system_prompt(&documents)),
        };

        let response = self.llm.create_chat_completion(&request).await?;

        info!(
            context_documents = documents.len(),
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            finish_reason = %response.finish_reason,
            "Answered question"
        );

        Ok(QAResult {
            query: query.to_string(),
            result: response.content,
            context_documents: documents.len(),
            source_documents: self.return_source_documents.then_some(documents),
        })
    }
}
