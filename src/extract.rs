use std::path::Path;

use tracing::debug;

use crate::error::ImportError;

pub trait TextExtractor: Send + Sync {
    /// Short name used in logs.
    fn kind(&self) -> &'static str;

    fn extract(&self, bytes: &[u8], source_name: &str) -> Result<String, ImportError>;
}

/// UTF-8 text, as saved by an external converter.
pub struct PlainText;

impl TextExtractor for PlainText {
    fn kind(&self) -> &'static str {
        "text"
    }

    fn extract(&self, bytes: &[u8], source_name: &str) -> Result<String, ImportError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ImportError::Extraction {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        non_empty(self.kind(), text.to_string(), source_name)
    }
}

#[cfg(feature = "pdf")]
pub struct PdfText;

#[cfg(feature = "pdf")]
impl TextExtractor for PdfText {
    fn kind(&self) -> &'static str {
        "pdf"
    }

    fn extract(&self, bytes: &[u8], source_name: &str) -> Result<String, ImportError> {
        let text =
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ImportError::Extraction {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
        non_empty(self.kind(), text, source_name)
    }
}

/// Stand-in used for `.pdf` inputs when the crate is built without PDF support.
#[cfg(not(feature = "pdf"))]
pub struct PdfUnsupported;

#[cfg(not(feature = "pdf"))]
impl TextExtractor for PdfUnsupported {
    fn kind(&self) -> &'static str {
        "pdf"
    }

    fn extract(&self, _bytes: &[u8], source_name: &str) -> Result<String, ImportError> {
        Err(ImportError::Extraction {
            source_name: source_name.to_string(),
            message: "built without the `pdf` feature".into(),
        })
    }
}

fn non_empty(kind: &str, text: String, source_name: &str) -> Result<String, ImportError> {
    if text.trim().is_empty() {
        return Err(ImportError::EmptyText {
            source_name: source_name.to_string(),
        });
    }
    debug!(source = source_name, kind, chars = text.len(), "text extracted");
    Ok(text)
}

/// Pick an extractor from the file extension.
pub fn extractor_for(path: &Path) -> Box<dyn TextExtractor> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if !is_pdf {
        return Box::new(PlainText);
    }
    #[cfg(feature = "pdf")]
    {
        Box::new(PdfText)
    }
    #[cfg(not(feature = "pdf"))]
    {
        Box::new(PdfUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let text = PlainText.extract(b"14611\n12/10/2025", "a.txt").unwrap();
        assert_eq!(text, "14611\n12/10/2025");
    }

    #[test]
    fn blank_text_is_an_error() {
        let err = PlainText.extract(b"  \n\n ", "blank.txt").unwrap_err();
        assert!(matches!(err, ImportError::EmptyText { .. }));
    }

    #[test]
    fn invalid_utf8_is_an_extraction_error() {
        let err = PlainText.extract(&[0xff, 0xfe, 0x00], "bin.txt").unwrap_err();
        assert!(matches!(err, ImportError::Extraction { .. }));
    }

    #[test]
    fn extractor_by_extension() {
        assert_eq!(extractor_for(Path::new("fall.txt")).kind(), "text");
        assert_eq!(extractor_for(Path::new("fall")).kind(), "text");
        assert_eq!(extractor_for(Path::new("FALL.PDF")).kind(), "pdf");
    }

    #[test]
    fn non_pdf_bytes_fail_pdf_extraction() {
        let extractor = extractor_for(Path::new("fall.pdf"));
        let err = extractor.extract(b"not a pdf", "fall.pdf").unwrap_err();
        assert!(matches!(err, ImportError::Extraction { .. }));
    }
}
