// Document loading, chunking, embeddings and vector search

pub mod document_processor;
pub mod embedder;
pub mod text_chunker;
pub mod vector_search;

pub use document_processor::{Document, DocumentMetadata, DocumentProcessor};
pub use embedder::{Embedder, GoogleEmbedder};
pub use text_chunker::{TextChunker, DEFAULT_SEPARATORS};
pub use vector_search::{cosine_similarity, Retriever, SearchResult, VectorEntry, VectorStore};
