//! Persistent in-memory vector store with cosine-similarity search.
//!
//! The whole index is kept in memory and written to
//! `{persist_directory}/index.json`. A nutrition corpus of a few PDFs is a
//! few thousand chunks, so exhaustive search is fast enough.

use super::document_processor::Document;
use super::embedder::Embedder;
use crate::types::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const INDEX_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: Uuid,
    pub document: Document,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    embedding_model: String,
    dimension: usize,
    created_at: chrono::DateTime<chrono::Utc>,
    entries: Vec<VectorEntry>,
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    entries: Vec<VectorEntry>,
    embedding_model: String,
    dimension: usize,
    persist_directory: Option<PathBuf>,
}

impl VectorStore {
    /// Whether a persisted index exists under `persist_directory`.
    pub fn exists(persist_directory: &Path) -> bool {
        persist_directory.join(INDEX_FILE).is_file()
    }

    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            embedding_model: embedding_model.into(),
            dimension: 0,
            persist_directory: None,
        }
    }

    /// Embed `documents` and build a store, persisting it when a directory is given.
    pub async fn from_documents(
        documents: Vec<Document>,
        embedder: &dyn Embedder,
        persist_directory: Option<&Path>,
    ) -> AppResult<Self> {
        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        info!(chunks = texts.len(), model = embedder.model_name(), "Embedding documents");
        let embeddings = embedder.embed_documents(&texts).await?;

        let mut store = Self::new(embedder.model_name());
        store.persist_directory = persist_directory.map(Path::to_path_buf);
        store.add(documents, embeddings)?;
        store.persist()?;
        Ok(store)
    }

    /// Load a persisted store.
    pub fn open(persist_directory: &Path) -> AppResult<Self> {
        let path = persist_directory.join(INDEX_FILE);
        let file = std::fs::File::open(&path)?;
        let persisted: PersistedIndex = serde_json::from_reader(std::io::BufReader::new(file))?;

        if persisted.version != FORMAT_VERSION {
            return Err(AppError::Internal(format!(
                "unsupported index version {} in {}",
                persisted.version,
                path.display()
            )));
        }
        if let Some(bad) = persisted.entries.iter().find(|e| e.embedding.len() != persisted.dimension) {
            return Err(AppError::Internal(format!(
                "entry {} has dimension {}, index declares {}",
                bad.id,
                bad.embedding.len(),
                persisted.dimension
            )));
        }

        info!(
            path = %path.display(),
            entries = persisted.entries.len(),
            model = %persisted.embedding_model,
            "Loaded vector store"
        );

        Ok(Self {
            entries: persisted.entries,
            embedding_model: persisted.embedding_model,
            dimension: persisted.dimension,
            persist_directory: Some(persist_directory.to_path_buf()),
        })
    }

    pub fn add(&mut self, documents: Vec<Document>, embeddings: Vec<Vec<f32>>) -> AppResult<Vec<Uuid>> {
        if documents.len() != embeddings.len() {
            return Err(AppError::InvalidRequest(format!(
                "{} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }

        let dimension = match (self.dimension, embeddings.first()) {
            (0, Some(first)) => first.len(),
            (dimension, _) => dimension,
        };
        if let Some(bad) = embeddings.iter().find(|e| e.is_empty() || e.len() != dimension) {
            return Err(AppError::InvalidRequest(format!(
                "embedding dimension {} does not match store dimension {}",
                bad.len(),
                dimension
            )));
        }
        self.dimension = dimension;

        let mut ids = Vec::with_capacity(documents.len());
        for (document, embedding) in documents.into_iter().zip(embeddings) {
            let id = Uuid::new_v4();
            self.entries.push(VectorEntry { id, document, embedding });
            ids.push(id);
        }
        Ok(ids)
    }

    /// Write the index to its persist directory; a no-op for in-memory stores.
    pub fn persist(&self) -> AppResult<()> {
        let Some(dir) = &self.persist_directory else {
            return Ok(());
        };
        std::fs::create_dir_all(dir)?;

        let persisted = PersistedIndex {
            version: FORMAT_VERSION,
            embedding_model: self.embedding_model.clone(),
            dimension: self.dimension,
            created_at: chrono::Utc::now(),
            entries: self.entries.clone(),
        };

        let path = dir.join(INDEX_FILE);
        let tmp = dir.join(format!("{}.tmp", INDEX_FILE));
        {
            let mut writer = std::io::BufWriter::new(std::fs::File::create(&tmp)?);
            serde_json::to_writer(&mut writer, &persisted)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, &path)?;

        info!(path = %path.display(), entries = self.entries.len(), "Persisted vector store");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Top `k` entries by cosine similarity, best first. Equal scores keep insertion order.
    pub fn similarity_search_by_vector(&self, query: &[f32], k: usize) -> AppResult<Vec<SearchResult>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(AppError::InvalidRequest(format!(
                "query dimension {} does not match store dimension {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.embedding)))
            .collect();

        // Stable sort keeps insertion order among ties; NaN scores rank last.
        let rank = |score: f32| if score.is_nan() { f32::NEG_INFINITY } else { score };
        scored.sort_by(|a, b| rank(b.1).total_cmp(&rank(a.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult {
                document: self.entries[i].document.clone(),
                score,
            })
            .collect())
    }

    pub fn as_retriever(self: Arc<Self>, embedder: Arc<dyn Embedder>, k: usize) -> Retriever {
        Retriever {
            store: self,
            embedder,
            k,
        }
    }
}

/// Cosine similarity; zero when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Embeds a query and returns the `k` most similar stored documents.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl Retriever {
    pub fn k(&self) -> usize {
        self.k
    }

    pub async fn get_relevant_documents(&self, query: &str) -> AppResult<Vec<Document>> {
        let query_embedding = self.embedder.embed_query(query).await?;
        let results = self.store.similarity_search_by_vector(&query_embedding, self.k)?;

        debug!(
            k = self.k,
            returned = results.len(),
            top_score = results.first().map(|r| r.score),
            "Retrieved documents"
        );

        Ok(results.into_iter().map(|r| r.document).collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Deterministic embedder: one dimension per keyword, counting occurrences.
    pub(crate) struct KeywordEmbedder {
        pub keywords: Vec<&'static str>,
    }

    impl KeywordEmbedder {
        pub(crate) fn nutrition() -> Self {
            Self {
                keywords: vec!["pumpkin", "calories", "workout", "pizza"],
            }
        }

        fn embed(&self, text: &str) -> Vec<f32> {
            let lower = text.to_lowercase();
            self.keywords
                .iter()
                .map(|k| lower.matches(k).count() as f32)
                .collect()
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword-test"
        }

        async fn embed_documents(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| self.embed(t)).collect())
        }

        async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
            Ok(self.embed(text))
        }
    }

    pub(crate) fn nutrition_docs() -> Vec<Document> {
        vec![
            Document::new("Pumpkin bites: pumpkin puree, oats, honey.", "recipes.pdf", 0),
            Document::new("Adults need about 2000 calories a day.", "guide.pdf", 4),
            Document::new("A pre-workout meal: banana and oats before your workout.", "sports.pdf", 1),
        ]
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_similarity_and_limits_k() {
        let mut store = VectorStore::new("test");
        store
            .add(
                nutrition_docs(),
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            )
            .unwrap();

        let results = store.similarity_search_by_vector(&[1.0, 0.1], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.metadata.source, "recipes.pdf");
        assert_eq!(results[1].document.metadata.source, "sports.pdf");
        assert!(results[0].score >= results[1].score);

        let all = store.similarity_search_by_vector(&[1.0, 0.1], 10).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut store = VectorStore::new("test");
        store
            .add(nutrition_docs(), vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]])
            .unwrap();
        let results = store.similarity_search_by_vector(&[2.0, 0.0], 3).unwrap();
        let sources: Vec<_> = results.iter().map(|r| r.document.metadata.source.as_str()).collect();
        assert_eq!(sources, vec!["recipes.pdf", "guide.pdf", "sports.pdf"]);
    }

    #[test]
    fn test_nan_scores_rank_last() {
        let mut store = VectorStore::new("test");
        store
            .add(
                nutrition_docs(),
                vec![vec![f32::NAN, 1.0], vec![0.0, 1.0], vec![1.0, 0.0]],
            )
            .unwrap();
        let results = store.similarity_search_by_vector(&[1.0, 0.0], 3).unwrap();
        let sources: Vec<_> = results.iter().map(|r| r.document.metadata.source.as_str()).collect();
        assert_eq!(sources, vec!["sports.pdf", "guide.pdf", "recipes.pdf"]);
        assert!(results[2].score.is_nan());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut store = VectorStore::new("test");
        let docs = nutrition_docs();
        assert!(store.add(docs.clone(), vec![vec![1.0, 0.0], vec![1.0], vec![0.0, 1.0]]).is_err());

        let mut store = VectorStore::new("test");
        store.add(docs, vec![vec![1.0, 0.0]; 3]).unwrap();
        assert!(store.similarity_search_by_vector(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_empty_store_returns_nothing() {
        let store = VectorStore::new("test");
        assert!(store.similarity_search_by_vector(&[1.0], 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let persist = dir.path().join("db");
        assert!(!VectorStore::exists(&persist));

        let embedder = KeywordEmbedder::nutrition();
        let store = VectorStore::from_documents(nutrition_docs(), &embedder, Some(persist.as_path()))
            .await
            .unwrap();
        assert!(VectorStore::exists(&persist));
        assert!(!persist.join("index.json.tmp").exists());

        let reopened = VectorStore::open(&persist).unwrap();
        assert_eq!(reopened.len(), store.len());
        assert_eq!(reopened.dimension(), 4);
        assert_eq!(reopened.embedding_model(), "keyword-test");
    }

    #[tokio::test]
    async fn test_retriever_embeds_query_and_searches() {
        let embedder = Arc::new(KeywordEmbedder::nutrition());
        let store = VectorStore::from_documents(nutrition_docs(), embedder.as_ref(), None)
            .await
            .unwrap();
        let retriever = Arc::new(store).as_retriever(embedder, 1);

        let docs = retriever
            .get_relevant_documents("Tell me the ingredients of pumpkin bites.")
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.source, "recipes.pdf");
    }
}
