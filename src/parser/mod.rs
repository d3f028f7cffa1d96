pub mod blocks;
pub mod detect;
pub mod fields;
pub mod normalize;
pub mod rows;

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::model::ExamEntry;
pub use detect::Layout;

/// Result of parsing one document.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedSchedule {
    /// Layout named by the column headers.
    pub detected: Layout,
    /// Parser whose entries were kept.
    pub chosen: Layout,
    /// Both parsers ran on an unknown layout and produced the same non-zero count.
    pub ambiguous: bool,
    /// Non-empty text produced no entries; the template may have changed.
    pub needs_review: bool,
    pub entries: Vec<ExamEntry>,
}

/// Normalize → detect → parse. On an unknown layout both parsers run and the
/// one with more entries wins.
pub fn parse_schedule(raw: &str) -> ParsedSchedule {
    let text = normalize::normalize(raw);
    for (line, reason) in rejected_lines(&text) {
        debug!(line, reason, "field candidate rejected");
    }
    let detected = detect::detect_layout(&text);

    let (chosen, entries, ambiguous) = match detected {
        Layout::ColumnBlocks => (detected, blocks::parse_column_blocks(&text), false),
        Layout::InterleavedRows => (detected, rows::parse_interleaved_rows(&text), false),
        Layout::Unknown => {
            let by_blocks = blocks::parse_column_blocks(&text);
            let by_rows = rows::parse_interleaved_rows(&text);
            if by_rows.len() > by_blocks.len() {
                (Layout::InterleavedRows, by_rows, false)
            } else {
                let tie = !by_blocks.is_empty() && by_blocks.len() == by_rows.len();
                if tie {
                    warn!(
                        entries = by_blocks.len(),
                        "layout unknown and both parsers agree on count, keeping column-blocks"
                    );
                }
                (Layout::ColumnBlocks, by_blocks, tie)
            }
        }
    };

    let needs_review = entries.is_empty() && !text.trim().is_empty();
    if needs_review {
        warn!(%detected, "no exam entries parsed from non-empty document, template may need review");
    }
    info!(%detected, %chosen, entries = entries.len(), "parsed schedule");

    ParsedSchedule {
        detected,
        chosen,
        ambiguous,
        needs_review,
        entries,
    }
}

/// One-based line numbers of field-shaped lines that yield no value. The
/// extractors stay silent so each line is reported once per document, however
/// many parsers look at it.
pub(crate) fn rejected_lines(text: &str) -> Vec<(usize, &'static str)> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| fields::rejection(line).map(|reason| (i + 1, reason)))
        .collect()
}

/// Keep the first entry per reference number, in document order.
pub(crate) fn dedupe_by_crn(entries: Vec<ExamEntry>) -> Vec<ExamEntry> {
    let mut seen = HashSet::new();
    entries.into_iter().filter(|e| seen.insert(e.crn)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.txt", name)).unwrap()
    }

    /// Drop every line that names a column, leaving only data.
    fn strip_headers(text: &str) -> String {
        text.lines()
            .filter(|l| {
                let upper = l.to_uppercase();
                !["CRN", "EXAM", "FINAL", "COURSE", "TIME", "LOCATION", "DATE", "DAY"]
                    .iter()
                    .any(|w| upper.starts_with(w))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn column_blocks_document() {
        let parsed = parse_schedule(&fixture("column_blocks"));
        assert_eq!(parsed.detected, Layout::ColumnBlocks);
        assert_eq!(parsed.chosen, Layout::ColumnBlocks);
        assert_eq!(parsed.entries.len(), 7);
        assert!(!parsed.ambiguous);
        assert!(!parsed.needs_review);
    }

    #[test]
    fn interleaved_document() {
        let parsed = parse_schedule(&fixture("interleaved_rows"));
        assert_eq!(parsed.detected, Layout::InterleavedRows);
        assert_eq!(parsed.entries.len(), 6);
    }

    #[test]
    fn unknown_layout_keeps_larger_result() {
        let text = strip_headers(&fixture("interleaved_rows"));
        let parsed = parse_schedule(&text);
        assert_eq!(parsed.detected, Layout::Unknown);
        assert_eq!(parsed.chosen, Layout::InterleavedRows);
        assert_eq!(parsed.entries.len(), 6);

        let text = strip_headers(&fixture("column_blocks"));
        let parsed = parse_schedule(&text);
        assert_eq!(parsed.detected, Layout::Unknown);
        assert_eq!(parsed.chosen, Layout::ColumnBlocks);
        assert_eq!(parsed.entries.len(), 7);
    }

    #[test]
    fn unknown_tie_is_flagged() {
        // One CRN, one date, one time: both parsers read the same single entry.
        let parsed = parse_schedule("14611\n12/10/2025\n8:00 AM - 10:00 AM");
        assert_eq!(parsed.detected, Layout::Unknown);
        assert_eq!(parsed.entries.len(), 1);
        assert!(parsed.ambiguous);
        assert_eq!(parsed.chosen, Layout::ColumnBlocks);
    }

    #[test]
    fn empty_result_needs_review() {
        let parsed = parse_schedule("FINAL DAY\nMULTI-SECTION CRNS\nnothing useful here");
        assert!(parsed.entries.is_empty());
        assert!(parsed.needs_review);

        let parsed = parse_schedule("");
        assert!(!parsed.needs_review);
    }

    #[test]
    fn malformed_line_reported_once() {
        let text = "14611\n13/45/2025\n12/10/2025\n8:00 AM - 10:00 AM\nWENTW 212";
        assert_eq!(rejected_lines(text), [(2, "date components out of range")]);

        // Unknown layout: both parsers run over the same lines.
        let parsed = parse_schedule(text);
        assert_eq!(parsed.detected, Layout::Unknown);
        assert_eq!(parsed.entries.len(), 1);
    }

    #[test]
    fn dedupe_keeps_first() {
        let a = parse_schedule("14611\n12/10/2025\n8:00 AM - 10:00 AM").entries;
        let b = parse_schedule("14611\n12/11/2025\n8:00 AM - 10:00 AM").entries;
        let merged = dedupe_by_crn(a.iter().chain(b.iter()).cloned().collect());
        assert_eq!(merged, a);
    }
}
