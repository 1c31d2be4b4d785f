//! Document processing pipeline: chunking, embedding, and vector store orchestration.

pub mod chunking;
mod service;
pub mod types;

pub use chunking::{ChunkerSettings, TextChunker};
pub use service::DocumentProcessor;
pub use types::{ChunkingError, ErrorKind, ProcessingError};
