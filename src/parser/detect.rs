use std::fmt;

use serde::Serialize;

/// Known schedule templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// Wide table rendered column by column: all CRNs, then all dates, ...
    ColumnBlocks,
    /// One table row per interleaved run of lines, anchored on a CRN line.
    InterleavedRows,
    Unknown,
}

impl Layout {
    pub fn as_str(self) -> &'static str {
        match self {
            Layout::ColumnBlocks => "column-blocks",
            Layout::InterleavedRows => "interleaved-rows",
            Layout::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const COMBINED_HEADERS: &[&str] = &["COMBINED CRN"];
const EXAM_DATE_HEADERS: &[&str] = &["EXAM DATE"];
const EXAM_TIME_HEADERS: &[&str] = &["EXAM TIME", "TIME OF DAY"];
const EXAM_ROOM_HEADERS: &[&str] = &["EXAM ROOM", "ROOM", "LOCATION"];

const FINAL_DAY_HEADERS: &[&str] = &["FINAL DAY", "FINAL DATE"];
const MULTI_SECTION_HEADERS: &[&str] = &["MULTI-SECTION CRN", "MULTI SECTION CRN"];

/// Classify normalized text by its column-header tokens.
///
/// Column-blocks is tested first: its header set is the stricter one, and the
/// interleaved template never carries a combined-CRN column.
pub fn detect_layout(text: &str) -> Layout {
    let upper = text.to_uppercase();
    let has_any = |tokens: &[&str]| tokens.iter().any(|t| upper.contains(t));

    if has_any(COMBINED_HEADERS)
        && has_any(EXAM_DATE_HEADERS)
        && has_any(EXAM_TIME_HEADERS)
        && has_any(EXAM_ROOM_HEADERS)
    {
        Layout::ColumnBlocks
    } else if has_any(FINAL_DAY_HEADERS) && has_any(MULTI_SECTION_HEADERS) {
        Layout::InterleavedRows
    } else {
        Layout::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_blocks_headers() {
        let text = "CRN\nCourse\nExam Date\nExam Time\nExam Room\nCombined CRNs";
        assert_eq!(detect_layout(text), Layout::ColumnBlocks);
    }

    #[test]
    fn interleaved_headers_only() {
        let text = "FINAL DAY\nMULTI-SECTION CRNS\n14611";
        assert_eq!(detect_layout(text), Layout::InterleavedRows);
    }

    #[test]
    fn final_date_variant() {
        let text = "Final Date   Time   Multi Section CRNs";
        assert_eq!(detect_layout(text), Layout::InterleavedRows);
    }

    #[test]
    fn partial_column_headers_are_not_column_blocks() {
        // Combined header without the per-row exam columns.
        let text = "Combined CRNs\nFINAL DAY\nMULTI-SECTION CRNS";
        assert_eq!(detect_layout(text), Layout::InterleavedRows);
    }

    #[test]
    fn unknown() {
        assert_eq!(detect_layout("Spring schedule\n14611"), Layout::Unknown);
        assert_eq!(detect_layout(""), Layout::Unknown);
    }

    #[test]
    fn idempotent() {
        let text = std::fs::read_to_string("tests/fixtures/column_blocks.txt").unwrap();
        assert_eq!(detect_layout(&text), detect_layout(&text));
        let text = std::fs::read_to_string("tests/fixtures/interleaved_rows.txt").unwrap();
        assert_eq!(detect_layout(&text), detect_layout(&text));
        assert_eq!(detect_layout(&text), Layout::InterleavedRows);
    }
}
