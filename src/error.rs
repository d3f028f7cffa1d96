use thiserror::Error;

/// Failures from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures that abort a whole document import. Per-entry store failures are
/// not errors at this level; they end up in the import summary.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("text extraction failed for {source_name}: {message}")]
    Extraction {
        source_name: String,
        message: String,
    },
    #[error("no text extracted from {source_name}")]
    EmptyText { source_name: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_source() {
        let err = ImportError::EmptyText {
            source_name: "fall.pdf".into(),
        };
        assert_eq!(err.to_string(), "no text extracted from fall.pdf");

        let err = ImportError::Extraction {
            source_name: "fall.pdf".into(),
            message: "bad xref".into(),
        };
        assert!(err.to_string().contains("bad xref"));
    }

    #[test]
    fn store_error_is_transparent() {
        let err: ImportError = StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows).into();
        assert!(err.to_string().starts_with("sqlite: "));
    }
}
