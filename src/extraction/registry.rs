use std::collections::HashMap;
use std::sync::Arc;

use super::{
    ByteStream, CsvExtractor, ExtractionError, PdfExtractor, PlainTextExtractor, TextExtractor,
};

/// Maps declared file types onto the extractor responsible for them.
///
/// Lookups are case-insensitive: `"PDF"` and `"pdf"` dispatch to the same extractor.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Create a registry with no extractors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry covering `txt`, `csv`, and `pdf`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("txt", PlainTextExtractor);
        registry.register("csv", CsvExtractor);
        registry.register("pdf", PdfExtractor);
        registry
    }

    /// Register `extractor` for `file_type`, replacing any previous registration.
    pub fn register<E>(&mut self, file_type: &str, extractor: E)
    where
        E: TextExtractor + 'static,
    {
        self.extractors
            .insert(normalize(file_type), Arc::new(extractor));
    }

    /// Whether an extractor is registered for `file_type`.
    pub fn is_supported(&self, file_type: &str) -> bool {
        self.extractors.contains_key(&normalize(file_type))
    }

    /// Registered file types in sorted order.
    pub fn file_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Extract the text of `stream` using the extractor registered for `file_type`.
    pub async fn extract(
        &self,
        stream: ByteStream<'_>,
        file_type: &str,
    ) -> Result<String, ExtractionError> {
        let Some(extractor) = self.extractors.get(&normalize(file_type)) else {
            tracing::warn!(file_type, "No extractor registered for file type");
            return Err(ExtractionError::UnsupportedFormat(file_type.to_string()));
        };
        extractor.extract_text(stream).await
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("file_types", &self.file_types())
            .finish()
    }
}

fn normalize(file_type: &str) -> String {
    file_type.trim().trim_start_matches('.').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Shouting;

    #[async_trait]
    impl TextExtractor for Shouting {
        async fn extract_text(&self, _stream: ByteStream<'_>) -> Result<String, ExtractionError> {
            Ok("LOUD".to_string())
        }
    }

    #[test]
    fn defaults_cover_text_csv_and_pdf() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(registry.file_types(), vec!["csv", "pdf", "txt"]);
        assert!(registry.is_supported("PDF"));
        assert!(registry.is_supported(".txt"));
        assert!(!registry.is_supported("xyz"));
    }

    #[tokio::test]
    async fn dispatches_case_insensitively() {
        let registry = ExtractorRegistry::with_defaults();
        let mut stream = "Hello world.".as_bytes();
        let text = registry.extract(&mut stream, "TXT").await.expect("text");
        assert_eq!(text, "Hello world.");
    }

    #[tokio::test]
    async fn unknown_type_is_unsupported() {
        let registry = ExtractorRegistry::with_defaults();
        let mut stream = "irrelevant".as_bytes();
        let error = registry
            .extract(&mut stream, "xyz")
            .await
            .expect_err("unsupported");
        assert!(error.is_unsupported_format());
        assert_eq!(error.to_string(), "File type 'xyz' is not supported");
    }

    #[tokio::test]
    async fn registration_replaces_existing_extractor() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.register("txt", Shouting);
        let mut stream = "quiet".as_bytes();
        let text = registry.extract(&mut stream, "txt").await.expect("text");
        assert_eq!(text, "LOUD");
    }
}
