use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord};

use super::{ByteStream, ExtractionError, TextExtractor, read_all};

/// Flattens CSV into one comma-joined line per record, header first.
///
/// Quoted fields are unquoted, and rows shorter than the header are padded with empty
/// values instead of failing.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvExtractor;

#[async_trait]
impl TextExtractor for CsvExtractor {
    async fn extract_text(&self, stream: ByteStream<'_>) -> Result<String, ExtractionError> {
        let bytes = read_all(stream).await?;
        let text = flatten_csv(&bytes)?;
        tracing::debug!(bytes = bytes.len(), "Extracted CSV text");
        Ok(text)
    }
}

fn flatten_csv(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let width = headers.len();
    let mut content = String::new();
    if width > 0 {
        push_line(&mut content, &headers, width);
    }

    let mut record = StringRecord::new();
    while reader.read_record(&mut record)? {
        push_line(&mut content, &record, width.max(record.len()));
    }

    Ok(content)
}

fn push_line(content: &mut String, record: &StringRecord, width: usize) {
    for index in 0..width {
        if index > 0 {
            content.push(',');
        }
        content.push_str(record.get(index).unwrap_or_default());
    }
    content.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn extract(input: &str) -> Result<String, ExtractionError> {
        let mut stream = input.as_bytes();
        CsvExtractor.extract_text(&mut stream).await
    }

    #[tokio::test]
    async fn joins_header_and_records_line_by_line() {
        let text = extract("name,city\nAda,London\nGrace,Arlington\n")
            .await
            .expect("csv");
        assert_eq!(text, "name,city\nAda,London\nGrace,Arlington\n");
    }

    #[tokio::test]
    async fn unquotes_fields() {
        let text = extract("name,quote\n\"Lovelace, Ada\",\"said \"\"hi\"\"\"\n")
            .await
            .expect("csv");
        assert_eq!(text, "name,quote\nLovelace, Ada,said \"hi\"\n");
    }

    #[tokio::test]
    async fn pads_short_rows() {
        let text = extract("a,b,c\n1\n1,2\n").await.expect("csv");
        assert_eq!(text, "a,b,c\n1,,\n1,2,\n");
    }

    #[tokio::test]
    async fn empty_input_yields_empty_text() {
        let text = extract("").await.expect("csv");
        assert!(text.is_empty());
    }
}
