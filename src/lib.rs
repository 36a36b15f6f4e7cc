// Nutrition RAG - conversational question answering over nutrition PDFs

pub mod agents;
pub mod app;
pub mod config;
pub mod embeddings;
pub mod llm;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use app::App;
pub use config::Config;
