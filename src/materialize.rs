use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ImportError, StoreError};
use crate::extract::TextExtractor;
use crate::model::{Crn, CrnSet, ExamEntry, Location, Room, TimeRange};
use crate::parser::{self, Layout, ParsedSchedule};

pub type TermId = i64;
pub type CourseId = i64;

/// An exam row as handed to the store, keyed by (term, crn).
#[derive(Debug, Clone, PartialEq)]
pub struct ExamRecord {
    pub term_id: TermId,
    pub crn: Crn,
    pub combined: CrnSet,
    pub date: NaiveDate,
    pub time: TimeRange,
    pub location: Option<Location>,
    /// Owning course; `None` leaves the record an orphan.
    pub course_id: Option<CourseId>,
}

impl ExamRecord {
    fn from_entry(term_id: TermId, entry: &ExamEntry, course_id: Option<CourseId>) -> ExamRecord {
        ExamRecord {
            term_id,
            crn: entry.crn,
            combined: entry.combined.clone(),
            date: entry.date,
            time: entry.time,
            location: entry.location.clone(),
            course_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

/// Lookup-or-create and upsert operations the materializer needs.
pub trait ExamStore {
    fn resolve_term(&mut self, code: &str) -> Result<TermId, StoreError>;
    /// Returns true when the room did not exist before.
    fn ensure_room(&mut self, room: &Room) -> Result<bool, StoreError>;
    fn find_course(&mut self, term: TermId, crn: Crn) -> Result<Option<CourseId>, StoreError>;
    /// An existing (term, crn) row is always reported as `Updated`.
    fn upsert_exam(&mut self, record: &ExamRecord) -> Result<Upsert, StoreError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub linked: usize,
    pub orphan: usize,
    pub rooms_created: usize,
    /// `"<crn>: <error>"` per entry that failed to persist.
    pub errors: Vec<String>,
    pub layout: Layout,
    pub chosen: Layout,
    pub ambiguous: bool,
    pub needs_review: bool,
}

impl ImportSummary {
    fn new(parsed: &ParsedSchedule) -> ImportSummary {
        ImportSummary {
            total: 0,
            created: 0,
            updated: 0,
            linked: 0,
            orphan: 0,
            rooms_created: 0,
            errors: Vec::new(),
            layout: parsed.detected,
            chosen: parsed.chosen,
            ambiguous: parsed.ambiguous,
            needs_review: parsed.needs_review,
        }
    }
}

/// Persist every entry of a parsed document under `term_code`.
///
/// Only term resolution is fatal. A failure on one entry is recorded in
/// `errors` and the batch carries on.
pub fn materialize<S: ExamStore + ?Sized>(
    store: &mut S,
    term_code: &str,
    parsed: &ParsedSchedule,
) -> Result<ImportSummary, ImportError> {
    let term = store.resolve_term(term_code)?;
    let mut summary = ImportSummary::new(parsed);

    for entry in &parsed.entries {
        summary.total += 1;
        if let Err(e) = persist_entry(store, term, entry, &mut summary) {
            warn!(crn = %entry.crn, error = %e, "failed to persist exam entry");
            summary.errors.push(format!("{}: {}", entry.crn, e));
        }
    }

    info!(
        term = term_code,
        total = summary.total,
        created = summary.created,
        updated = summary.updated,
        orphan = summary.orphan,
        errors = summary.errors.len(),
        "materialized exams"
    );
    Ok(summary)
}

fn persist_entry<S: ExamStore + ?Sized>(
    store: &mut S,
    term: TermId,
    entry: &ExamEntry,
    summary: &mut ImportSummary,
) -> Result<(), StoreError> {
    if let Some(location) = &entry.location {
        for room in location.rooms() {
            if store.ensure_room(room)? {
                summary.rooms_created += 1;
            }
        }
    }

    let course_id = store.find_course(term, entry.crn)?;
    match store.upsert_exam(&ExamRecord::from_entry(term, entry, course_id))? {
        Upsert::Created => summary.created += 1,
        Upsert::Updated => summary.updated += 1,
    }
    if course_id.is_some() {
        summary.linked += 1;
    } else {
        summary.orphan += 1;
    }
    Ok(())
}

/// Extract, parse and persist one document.
pub fn import_document<S: ExamStore + ?Sized>(
    extractor: &dyn TextExtractor,
    bytes: &[u8],
    source_name: &str,
    term_code: &str,
    store: &mut S,
) -> Result<ImportSummary, ImportError> {
    let text = extractor.extract(bytes, source_name)?;
    let parsed = parser::parse_schedule(&text);
    materialize(store, term_code, &parsed)
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::extract::PlainText;

    #[derive(Default)]
    struct MemoryStore {
        terms: HashMap<String, TermId>,
        rooms: HashSet<Room>,
        courses: HashMap<(TermId, Crn), CourseId>,
        exams: HashMap<(TermId, Crn), ExamRecord>,
        failing: Option<Crn>,
    }

    impl ExamStore for MemoryStore {
        fn resolve_term(&mut self, code: &str) -> Result<TermId, StoreError> {
            let next = self.terms.len() as TermId + 1;
            Ok(*self.terms.entry(code.to_string()).or_insert(next))
        }

        fn ensure_room(&mut self, room: &Room) -> Result<bool, StoreError> {
            Ok(self.rooms.insert(room.clone()))
        }

        fn find_course(&mut self, term: TermId, crn: Crn) -> Result<Option<CourseId>, StoreError> {
            Ok(self.courses.get(&(term, crn)).copied())
        }

        fn upsert_exam(&mut self, record: &ExamRecord) -> Result<Upsert, StoreError> {
            if self.failing == Some(record.crn) {
                return Err(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
            }
            let key = (record.term_id, record.crn);
            match self.exams.insert(key, record.clone()) {
                Some(_) => Ok(Upsert::Updated),
                None => Ok(Upsert::Created),
            }
        }
    }

    fn crn(n: u32) -> Crn {
        Crn::new(n).unwrap()
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.txt", name)).unwrap()
    }

    #[test]
    fn first_import_creates_everything() {
        let mut store = MemoryStore::default();
        let parsed = parser::parse_schedule(&fixture("interleaved_rows"));
        let summary = materialize(&mut store, "202508", &parsed).unwrap();

        assert_eq!(summary.total, 6);
        assert_eq!(summary.created, 6);
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.orphan, 6);
        assert_eq!(summary.linked, 0);
        // WENTW 212, GOLIS 1400, GOLIS 1410; ONLINE names no room.
        assert_eq!(summary.rooms_created, 3);
        assert!(summary.errors.is_empty());
        assert_eq!(summary.layout, Layout::InterleavedRows);
    }

    #[test]
    fn reimport_updates_without_duplicates() {
        let mut store = MemoryStore::default();
        let parsed = parser::parse_schedule(&fixture("column_blocks"));
        let first = materialize(&mut store, "202508", &parsed).unwrap();
        let second = materialize(&mut store, "202508", &parsed).unwrap();

        assert_eq!(first.created, 7);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 7);
        assert_eq!(second.rooms_created, 0);
        assert_eq!(store.exams.len(), 7);
    }

    #[test]
    fn existing_course_is_linked() {
        let mut store = MemoryStore::default();
        let term = store.resolve_term("202508").unwrap();
        store.courses.insert((term, crn(14611)), 42);

        let parsed = parser::parse_schedule(&fixture("interleaved_rows"));
        let summary = materialize(&mut store, "202508", &parsed).unwrap();
        assert_eq!(summary.linked, 1);
        assert_eq!(summary.orphan, 5);
        assert_eq!(store.exams[&(term, crn(14611))].course_id, Some(42));
    }

    #[test]
    fn entry_failure_is_recorded_and_batch_continues() {
        let mut store = MemoryStore {
            failing: Some(crn(20002)),
            ..Default::default()
        };
        let parsed = parser::parse_schedule(&fixture("interleaved_rows"));
        let summary = materialize(&mut store, "202508", &parsed).unwrap();

        assert_eq!(summary.total, 6);
        assert_eq!(summary.created, 5);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].starts_with("20002: "));
    }

    #[test]
    fn empty_document_is_fatal() {
        let mut store = MemoryStore::default();
        let err = import_document(&PlainText, b"\n \n", "blank.txt", "202508", &mut store)
            .unwrap_err();
        assert!(matches!(err, ImportError::EmptyText { .. }));
        assert!(store.terms.is_empty());
    }

    #[test]
    fn unparseable_document_flags_review() {
        let mut store = MemoryStore::default();
        let summary = import_document(
            &PlainText,
            b"Final Day\nMulti-Section CRNs\nschedule to follow",
            "new.txt",
            "202508",
            &mut store,
        )
        .unwrap();
        assert_eq!(summary.total, 0);
        assert!(summary.needs_review);
    }
}
