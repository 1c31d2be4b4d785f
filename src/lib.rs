#![deny(missing_docs)]

//! Core library for Rusty Docs: turns uploaded documents into embedded, searchable chunks.

/// Environment-driven configuration management.
pub mod config;
/// Document and search result entities.
pub mod document;
/// Embedding client abstraction, adapters, and the retrying generator.
pub mod embedding;
/// Format-specific text extraction.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Document processing pipeline.
pub mod processing;
/// Retry policy shared by external calls.
pub mod retry;
/// Vector store client and index backends.
pub mod vector_store;
