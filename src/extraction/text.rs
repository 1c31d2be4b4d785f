use async_trait::async_trait;

use super::{ByteStream, ExtractionError, TextExtractor, read_all};

/// Reads the stream verbatim as UTF-8 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract_text(&self, stream: ByteStream<'_>) -> Result<String, ExtractionError> {
        let bytes = read_all(stream).await?;
        let text = String::from_utf8(bytes)?;
        tracing::debug!(chars = text.chars().count(), "Extracted plain text");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_stream_contents_verbatim() {
        let content = "This is a test text file content.\nSecond line.";
        let mut stream = content.as_bytes();
        let text = PlainTextExtractor
            .extract_text(&mut stream)
            .await
            .expect("text");
        assert_eq!(text, content);
    }

    #[tokio::test]
    async fn empty_stream_yields_empty_text() {
        let mut stream: &[u8] = &[];
        let text = PlainTextExtractor
            .extract_text(&mut stream)
            .await
            .expect("text");
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn rejects_invalid_utf8() {
        let mut stream: &[u8] = &[0x66, 0x6f, 0xff, 0xfe];
        let error = PlainTextExtractor
            .extract_text(&mut stream)
            .await
            .expect_err("invalid utf-8");
        assert!(matches!(error, ExtractionError::Encoding(_)));
    }
}
