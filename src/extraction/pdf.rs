use async_trait::async_trait;
use lopdf::Document;

use super::{ByteStream, ExtractionError, TextExtractor, read_all};

/// Extracts PDF text page by page, one line per page in page order.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract_text(&self, stream: ByteStream<'_>) -> Result<String, ExtractionError> {
        let bytes = read_all(stream).await?;
        tokio::task::spawn_blocking(move || extract_pages(&bytes))
            .await
            .map_err(|error| ExtractionError::Pdf(format!("extraction task failed: {error}")))?
    }
}

fn extract_pages(bytes: &[u8]) -> Result<String, ExtractionError> {
    let document = Document::load_mem(bytes)
        .map_err(|error| ExtractionError::Pdf(format!("failed to load PDF: {error}")))?;

    // `get_pages` is keyed by page number, so iteration follows page order.
    let pages = document.get_pages();
    let mut content = String::new();
    for page_number in pages.keys() {
        let text = document.extract_text(&[*page_number]).map_err(|error| {
            ExtractionError::Pdf(format!("failed to read page {page_number}: {error}"))
        })?;
        content.push_str(text.trim_end_matches(['\r', '\n']));
        content.push('\n');
    }

    tracing::debug!(pages = pages.len(), "Extracted PDF text");
    Ok(content)
}
