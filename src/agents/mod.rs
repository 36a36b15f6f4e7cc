//! Agent System
//!
//! The conversational question-answering pipeline over the nutrition corpus:
//!
//! - **Memory**: keeps the conversation transcript
//! - **Retrieval QA**: retrieves relevant chunks and asks the model
//! - **RAG Agent**: ties both together and formats the answer
//!
//! ## Pipeline Overview
//!
//! ```text
//! User Question
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Memory    │  → Prepends the transcript so far
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Retriever  │  → Top-k chunks from the vector store
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │ Retrieval   │  → Context as system instruction, question as user turn
//! │     QA      │
//! └─────────────┘
//!      │
//!      ▼
//!  Wrapped Answer
//! ```

pub mod memory;
pub mod rag;
pub mod retrieval_qa;

pub use memory::{ConversationBufferMemory, ConversationTurn};
pub use rag::RagAgent;
pub use retrieval_qa::{ChatSettings, QAResult, RetrievalQA};
