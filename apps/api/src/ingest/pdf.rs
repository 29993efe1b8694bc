//! PDF text extraction.

use crate::ingest::IngestError;

/// Extracts text from PDF bytes. Unreadable PDFs and PDFs with no
/// extractable text are hard errors: the job that carries them is marked
/// failed rather than storing an empty document.
pub fn extract_pdf_text(content: &[u8]) -> Result<String, IngestError> {
    let text = pdf_extract::extract_text_from_mem(content)
        .map_err(|e| IngestError::Extraction(format!("unreadable PDF: {e}")))?;

    if text.trim().is_empty() {
        return Err(IngestError::Extraction(
            "PDF contains no extractable text".to_string(),
        ));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_are_an_extraction_error() {
        let err = extract_pdf_text(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, IngestError::Extraction(_)));
    }

    #[test]
    fn test_empty_input_is_an_extraction_error() {
        assert!(extract_pdf_text(&[]).is_err());
    }
}
