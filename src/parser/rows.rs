use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use super::dedupe_by_crn;
use super::fields::{parse_date, parse_location, parse_time_range};
use crate::model::{Crn, CrnSet, ExamEntry, Location, TimeRange};

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}$").unwrap());
static CHAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(?:\s*-\s*\d{5})+$").unwrap());

/// A row as printed, before its fields are known to be complete.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    pub crn: Crn,
    /// Always contains `crn`.
    pub combined: CrnSet,
    /// Backfill key. Equal to `combined` except for the bare rows of a stack
    /// that ends on a chained row, which take that row's chain.
    pub group: CrnSet,
    pub date: Option<NaiveDate>,
    pub time: Option<TimeRange>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowState {
    Complete(ExamEntry),
    Incomplete(RowRecord),
}

impl RowRecord {
    fn new(crn: Crn) -> RowRecord {
        RowRecord {
            crn,
            combined: CrnSet::from([crn]),
            group: CrnSet::from([crn]),
            date: None,
            time: None,
            location: None,
        }
    }

    pub fn promote(self) -> RowState {
        match (self.date, self.time) {
            (Some(date), Some(time)) => RowState::Complete(ExamEntry::new(
                self.crn,
                self.combined,
                date,
                time,
                self.location,
            )),
            _ => RowState::Incomplete(self),
        }
    }
}

/// Fill a dateless row from a complete sibling in the same group.
///
/// A row that already has its own date is never touched; the donor's
/// location is only used when the row has none.
pub fn backfill(row: RowRecord, donor: Option<&ExamEntry>) -> RowState {
    match donor {
        Some(donor) if row.date.is_none() => RowRecord {
            date: Some(donor.date),
            time: Some(donor.time),
            location: row.location.or_else(|| donor.location.clone()),
            ..row
        }
        .promote(),
        _ => row.promote(),
    }
}

fn anchor(line: &str) -> Option<Crn> {
    if !ANCHOR_RE.is_match(line) {
        return None;
    }
    line.parse().ok().and_then(Crn::new)
}

fn chain(line: &str) -> Option<CrnSet> {
    if !CHAIN_RE.is_match(line) {
        return None;
    }
    let set: CrnSet = line
        .split('-')
        .filter_map(|n| n.trim().parse().ok().and_then(Crn::new))
        .collect();
    (!set.is_empty()).then_some(set)
}

/// Read one row starting at the anchor on `lines[start]`. Returns the row and
/// the index where scanning should resume.
fn read_row(lines: &[&str], start: usize, crn: Crn) -> (RowRecord, usize) {
    let mut row = RowRecord::new(crn);
    let mut j = start + 1;

    if let Some(set) = lines.get(j).and_then(|l| chain(l)) {
        row.combined = set;
        row.combined.insert(crn);
        row.group = row.combined.clone();
        j += 1;
    }

    while j < lines.len() {
        let line = lines[j];
        if anchor(line).is_some() {
            break;
        }
        j += 1;

        if row.date.is_none() {
            match parse_date(line) {
                Some(date) => row.date = Some(date),
                None => continue,
            }
        }

        if let Some(time) = parse_time_range(line) {
            row.time = Some(time);
            if let Some(next) = lines.get(j).filter(|l| anchor(l).is_none()) {
                row.location =
                    Some(parse_location(next).unwrap_or_else(|| Location::Text(next.to_string())));
                j += 1;
            }
            break;
        }
    }

    (row, j)
}

/// Give every bare row of a stacked run the union of the run as its combined
/// set and the closing row's group as its backfill key. A closing row that
/// read a chain line keeps its printed chain.
fn merge_stack(rows: &mut [RowRecord]) {
    let union: CrnSet = rows.iter().flat_map(|r| r.combined.iter().copied()).collect();
    let Some((last, bare)) = rows.split_last_mut() else {
        return;
    };
    // Only the closing row can have read a chain; bare anchors are singletons.
    if last.combined.len() == 1 {
        last.combined = union.clone();
        last.group = union.clone();
    }
    for row in bare {
        row.combined = union.clone();
        row.group = last.group.clone();
    }
}

/// Scan the document top to bottom and emit one raw row per anchor.
pub fn scan_rows(text: &str) -> Vec<RowRecord> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut rows = Vec::new();
    let mut stack_start: Option<usize> = None;
    let mut i = 0;

    while i < lines.len() {
        let Some(crn) = anchor(lines[i]) else {
            i += 1;
            continue;
        };
        let (row, next) = read_row(&lines, i, crn);
        // Nothing between this anchor and the next one: the CRN cell wrapped
        // over several lines and the rows share one exam.
        let stacked = next == i + 1 && next < lines.len();
        rows.push(row);

        if stacked {
            stack_start.get_or_insert(rows.len() - 1);
        } else if let Some(from) = stack_start.take() {
            merge_stack(&mut rows[from..]);
        }
        i = next;
    }

    rows
}

/// Backfill and promote scanned rows. Rows still missing a date or time are
/// dropped; nothing is defaulted.
pub fn resolve_rows(rows: Vec<RowRecord>) -> Vec<ExamEntry> {
    let mut donors: HashMap<CrnSet, ExamEntry> = HashMap::new();
    let states: Vec<RowState> = rows
        .into_iter()
        .map(|row| {
            let group = row.group.clone();
            let state = row.promote();
            if let RowState::Complete(entry) = &state {
                donors.entry(group).or_insert_with(|| entry.clone());
            }
            state
        })
        .collect();

    let entries = states
        .into_iter()
        .filter_map(|state| {
            let row = match state {
                RowState::Complete(entry) => return Some(entry),
                RowState::Incomplete(row) => row,
            };
            let donor = donors.get(&row.group);
            match backfill(row, donor) {
                RowState::Complete(entry) => Some(entry),
                RowState::Incomplete(row) => {
                    debug!(crn = %row.crn, "row incomplete after backfill, dropped");
                    None
                }
            }
        })
        .collect();

    dedupe_by_crn(entries)
}

/// Parse a document whose table rows each start on a bare CRN line.
pub fn parse_interleaved_rows(text: &str) -> Vec<ExamEntry> {
    let rows = scan_rows(text);
    debug!(rows = rows.len(), "interleaved rows scanned");
    resolve_rows(rows)
}
