use std::sync::LazyLock;

use regex::Regex;

static AMENDMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:\*+|†|\(R\)|(?:AMENDED|REVISED)\s*:)\s*").unwrap()
});
static ANNOTATION_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:NOTES|COMMENTS|CHANGES)$").unwrap());
static ANNOTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\((?:NEW|CHANGED|UPDATED|MOVED|CANCELL?ED)\)$").unwrap()
});
static FOOTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:printed|generated|last\s+updated)\b.*\d.*|page\s+\d+\s+of\s+\d+)$")
        .unwrap()
});
static UPDATED_TERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bUPDATED\s+(FALL|SPRING|SUMMER|WINTER)\b").unwrap());

/// Strip document-generation artifacts before any parsing.
///
/// Each rewrite is independent of the others; lines are trimmed and blank
/// lines survive so positional layouts stay intact.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    raw.replace("\r\n", "\n")
        .split('\n')
        .filter(|line| !FOOTER_RE.is_match(line.trim()))
        .map(clean_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_line(line: &str) -> String {
    let line = line.trim();
    let line = AMENDMENT_RE.replace(line, "");
    let line = ANNOTATION_RE.replace(&line, "");
    let line = ANNOTATION_HEADER_RE.replace(&line, "");
    let line = UPDATED_TERM_RE.replace_all(&line, "$1");
    line.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn amendment_marker() {
        assert_eq!(normalize("*14611"), "14611");
        assert_eq!(normalize("** WENTW 212"), "WENTW 212");
        assert_eq!(normalize("AMENDED: 12/10/2025"), "12/10/2025");
    }

    #[test]
    fn annotation_column() {
        assert_eq!(normalize("CRN EXAM DATE EXAM TIME NOTES"), "CRN EXAM DATE EXAM TIME");
        assert_eq!(normalize("GOLIS 1400 (CHANGED)"), "GOLIS 1400");
    }

    #[test]
    fn footer_stamp_dropped() {
        let text = "14611\nPrinted: 11/14/2025 3:42 PM\nPage 2 of 9";
        assert_eq!(normalize(text), "14611");
    }

    #[test]
    fn updated_term_prefix() {
        assert_eq!(normalize("UPDATED FALL 2025 FINAL EXAMS"), "FALL 2025 FINAL EXAMS");
        // Not before a season token: left alone.
        assert_eq!(normalize("UPDATED SCHEDULE"), "UPDATED SCHEDULE");
    }

    #[test]
    fn crlf_and_blank_lines() {
        assert_eq!(normalize("a\r\n\r\nb "), "a\n\nb");
    }
}
