//! Text extraction from uploaded byte streams.
//!
//! Each supported format implements [`TextExtractor`]; the [`ExtractorRegistry`] maps declared
//! file types onto extractors so new formats can be registered without touching the dispatch
//! code.

mod csv;
mod pdf;
mod registry;
mod text;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub use self::csv::CsvExtractor;
pub use pdf::PdfExtractor;
pub use registry::ExtractorRegistry;
pub use text::PlainTextExtractor;

/// Byte stream handed to extractors.
pub type ByteStream<'a> = &'a mut (dyn AsyncRead + Send + Unpin);

/// Errors raised while turning an upload into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No extractor is registered for the declared file type.
    #[error("File type '{0}' is not supported")]
    UnsupportedFormat(String),
    /// The stream could not be read.
    #[error("Failed to read document stream: {0}")]
    Io(#[from] std::io::Error),
    /// The stream was not valid UTF-8 text.
    #[error("Document is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    /// CSV content could not be parsed.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] ::csv::Error),
    /// PDF content could not be parsed.
    #[error("Failed to parse PDF: {0}")]
    Pdf(String),
}

impl ExtractionError {
    /// Whether the failure is a dispatch miss rather than a read or parse problem.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, Self::UnsupportedFormat(_))
    }
}

/// Capability implemented by each format-specific extractor.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Consume the stream and return its full text.
    async fn extract_text(&self, stream: ByteStream<'_>) -> Result<String, ExtractionError>;
}

async fn read_all(stream: ByteStream<'_>) -> Result<Vec<u8>, ExtractionError> {
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await?;
    Ok(bytes)
}
