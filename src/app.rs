//! Application wiring: index bootstrap and agent construction.

use crate::agents::{ChatSettings, RagAgent, RetrievalQA};
use crate::config::Config;
use crate::embeddings::{DocumentProcessor, Embedder, GoogleEmbedder, TextChunker, VectorStore};
use crate::llm::provider::{LLMProviderConfig, LLM};
use crate::types::{AppError, AppResult};
use crate::utils::retry::RetryPolicy;
use std::sync::Arc;
use tracing::{info, warn};

pub struct App {
    pub config: Config,
    pub store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl App {
    /// Open the persisted index, or build it from the data directory when missing.
    pub async fn bootstrap(config: Config) -> AppResult<Self> {
        let embedder = Self::google_embedder(&config)?;
        let store = Self::load_or_build_index(&config, embedder.as_ref(), false).await?;
        Ok(Self {
            config,
            store: Arc::new(store),
            embedder,
        })
    }

    pub fn google_embedder(config: &Config) -> AppResult<Arc<dyn Embedder>> {
        let embedder = GoogleEmbedder::new(
            config.require_api_key()?,
            &config.google.api_base,
            &config.index.embedding_model,
        )
        .with_batch_size(config.index.embedding_batch_size)
        .with_retry_policy(RetryPolicy::new(config.retry.max_retries));
        Ok(Arc::new(embedder))
    }

    /// Reuse `{persist_directory}/index.json` unless `force` is set.
    pub async fn load_or_build_index(
        config: &Config,
        embedder: &dyn Embedder,
        force: bool,
    ) -> AppResult<VectorStore> {
        let persist = &config.index.persist_directory;

        if !force && VectorStore::exists(persist) {
            let store = VectorStore::open(persist)?;
            if store.embedding_model() != embedder.model_name() {
                warn!(
                    stored = store.embedding_model(),
                    configured = embedder.model_name(),
                    "Index was built with a different embedding model; rebuild with `ingest --force`"
                );
            }
            return Ok(store);
        }

        Self::build_index(config, embedder).await
    }

    pub async fn build_index(config: &Config, embedder: &dyn Embedder) -> AppResult<VectorStore> {
        let raw = DocumentProcessor::load_directory(&config.index.data_directory)?;
        let chunker = TextChunker::new(config.index.chunk_size, config.index.chunk_overlap)?;
        let chunks = chunker.split_documents(&raw);

        if chunks.is_empty() {
            return Err(AppError::InvalidRequest(format!(
                "no text found in PDFs under {}",
                config.index.data_directory.display()
            )));
        }

        info!(pages = raw.len(), chunks = chunks.len(), "Building vector store");
        VectorStore::from_documents(chunks, embedder, Some(config.index.persist_directory.as_path())).await
    }

    /// A fresh agent with empty memory over this app's index.
    pub fn agent(&self) -> AppResult<RagAgent> {
        let llm = LLM::new(LLMProviderConfig::google(&self.config)?)?;
        let retriever = self
            .store
            .clone()
            .as_retriever(self.embedder.clone(), self.config.chat.top_k);
        let settings = ChatSettings {
            provider: llm.provider_name().to_string(),
            model: self.config.chat.model.clone(),
            temperature: self.config.chat.temperature,
            max_output_tokens: self.config.chat.max_output_tokens,
        };

        Ok(RagAgent::new(
            RetrievalQA::new(llm, retriever, settings),
            self.config.chat.wrap_width,
        ))
    }
}
