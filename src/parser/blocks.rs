use std::ops::Range;

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::dedupe_by_crn;
use super::fields;
use crate::model::{CrnSet, ExamEntry, Location, TimeRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTag {
    Crn,
    Date,
    Time,
    Location,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineValue {
    Crns(CrnSet),
    Date(NaiveDate),
    Time(TimeRange),
    Location(Location),
    Other,
}

impl LineValue {
    pub fn tag(&self) -> LineTag {
        match self {
            LineValue::Crns(_) => LineTag::Crn,
            LineValue::Date(_) => LineTag::Date,
            LineValue::Time(_) => LineTag::Time,
            LineValue::Location(_) => LineTag::Location,
            LineValue::Other => LineTag::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedLine {
    /// Zero-based line number in the normalized text.
    pub index: usize,
    pub value: LineValue,
}

type Rule = fn(&str) -> Option<LineValue>;

/// Classification priority, first match wins. Column headers are claimed
/// before anything else; dates come before times and locations because a
/// month name followed by digits also reads as a building and room.
const RULES: &[Rule] = &[header_rule, date_rule, time_rule, crn_rule, location_rule];

const HEADER_WORDS: &[&str] = &[
    "BUILDING", "COMBINED", "COURSE", "CRN", "CRNS", "DATE", "DAY", "EXAM", "EXAMINATION",
    "EXAMINATIONS", "EXAMS", "FALL", "FINAL", "FINALS", "INSTRUCTOR", "LOCATION", "MULTI-SECTION",
    "OF", "ROOM", "SCHEDULE", "SECTION", "SPRING", "SUMMER", "TIME", "TITLE", "WINTER",
];

fn header_rule(line: &str) -> Option<LineValue> {
    let is_header = line.split_whitespace().all(|word| {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
            .to_ascii_uppercase();
        HEADER_WORDS.contains(&word.as_str())
            || (word.len() == 4 && word.chars().all(|c| c.is_ascii_digit()))
    });
    is_header.then_some(LineValue::Other)
}

fn date_rule(line: &str) -> Option<LineValue> {
    if !fields::is_date_line(line) {
        return None;
    }
    fields::parse_date(line).map(LineValue::Date)
}

fn time_rule(line: &str) -> Option<LineValue> {
    if !fields::is_time_line(line) {
        return None;
    }
    fields::parse_time_range(line).map(LineValue::Time)
}

fn crn_rule(line: &str) -> Option<LineValue> {
    fields::parse_crn_line(line).map(LineValue::Crns)
}

fn location_rule(line: &str) -> Option<LineValue> {
    fields::parse_location(line).map(LineValue::Location)
}

/// Tag every non-blank line with exactly one kind.
pub fn classify_lines(text: &str) -> Vec<ClassifiedLine> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let value = RULES
                .iter()
                .find_map(|rule| rule(line))
                .unwrap_or(LineValue::Other);
            Some(ClassifiedLine { index, value })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockData {
    Crns(Vec<CrnSet>),
    Dates(Vec<NaiveDate>),
    Times(Vec<TimeRange>),
    Locations(Vec<Location>),
    Other(usize),
}

/// A maximal run of consecutive same-kind lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Line numbers covered, end exclusive.
    pub lines: Range<usize>,
    pub data: BlockData,
}

impl Block {
    fn start(line: ClassifiedLine) -> Block {
        let data = match line.value {
            LineValue::Crns(v) => BlockData::Crns(vec![v]),
            LineValue::Date(v) => BlockData::Dates(vec![v]),
            LineValue::Time(v) => BlockData::Times(vec![v]),
            LineValue::Location(v) => BlockData::Locations(vec![v]),
            LineValue::Other => BlockData::Other(1),
        };
        Block {
            lines: line.index..line.index + 1,
            data,
        }
    }

    /// Append a line of the same kind, or hand it back.
    fn absorb(&mut self, line: ClassifiedLine) -> Result<(), ClassifiedLine> {
        match (&mut self.data, line.value) {
            (BlockData::Crns(vs), LineValue::Crns(v)) => vs.push(v),
            (BlockData::Dates(vs), LineValue::Date(v)) => vs.push(v),
            (BlockData::Times(vs), LineValue::Time(v)) => vs.push(v),
            (BlockData::Locations(vs), LineValue::Location(v)) => vs.push(v),
            (BlockData::Other(n), LineValue::Other) => *n += 1,
            (_, value) => {
                return Err(ClassifiedLine {
                    index: line.index,
                    value,
                })
            }
        }
        self.lines.end = line.index + 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        match &self.data {
            BlockData::Crns(v) => v.len(),
            BlockData::Dates(v) => v.len(),
            BlockData::Times(v) => v.len(),
            BlockData::Locations(v) => v.len(),
            BlockData::Other(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn crns(&self) -> Option<&[CrnSet]> {
        match &self.data {
            BlockData::Crns(v) => Some(v),
            _ => None,
        }
    }

    fn dates(&self) -> Option<&[NaiveDate]> {
        match &self.data {
            BlockData::Dates(v) => Some(v),
            _ => None,
        }
    }

    fn times(&self) -> Option<&[TimeRange]> {
        match &self.data {
            BlockData::Times(v) => Some(v),
            _ => None,
        }
    }

    fn locations(&self) -> Option<&[Location]> {
        match &self.data {
            BlockData::Locations(v) => Some(v),
            _ => None,
        }
    }
}

/// Collapse classified lines into blocks, preserving document order.
pub fn group_blocks(lines: Vec<ClassifiedLine>) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for line in lines {
        let line = match blocks.last_mut() {
            Some(last) => match last.absorb(line) {
                Ok(()) => continue,
                Err(line) => line,
            },
            None => line,
        };
        blocks.push(Block::start(line));
    }
    blocks
}

struct Alignment<'a> {
    crns: &'a [CrnSet],
    dates: &'a [NaiveDate],
    times: &'a [TimeRange],
    locations: Option<&'a [Location]>,
}

/// Find the columns belonging to the date block at `at`.
///
/// CRNs: nearest same-sized block before it. Times: nearest same-sized block
/// after it. Locations: nearest same-sized block after the times. No search
/// crosses a neighbouring date block.
fn align(blocks: &[Block], at: usize) -> Option<Alignment<'_>> {
    let dates = blocks[at].dates()?;
    let size = dates.len();

    let lower = blocks[..at]
        .iter()
        .rposition(|b| b.dates().is_some())
        .map_or(0, |i| i + 1);
    let upper = blocks[at + 1..]
        .iter()
        .position(|b| b.dates().is_some())
        .map_or(blocks.len(), |i| at + 1 + i);

    let crns = blocks[lower..at]
        .iter()
        .rev()
        .find_map(|b| b.crns().filter(|v| v.len() == size))?;

    let (time_at, times) = blocks[at + 1..upper]
        .iter()
        .enumerate()
        .find_map(|(i, b)| b.times().filter(|v| v.len() == size).map(|v| (at + 1 + i, v)))?;

    let locations = blocks[time_at + 1..upper]
        .iter()
        .find_map(|b| b.locations().filter(|v| v.len() == size));

    Some(Alignment {
        crns,
        dates,
        times,
        locations,
    })
}

/// Parse a column-block document into exam entries, first occurrence of each
/// reference number winning.
pub fn parse_column_blocks(text: &str) -> Vec<ExamEntry> {
    let blocks = group_blocks(classify_lines(text));
    let mut entries = Vec::new();

    for (at, block) in blocks.iter().enumerate() {
        if block.dates().is_none() {
            continue;
        }
        let Some(aligned) = align(&blocks, at) else {
            warn!(
                lines = ?block.lines,
                size = block.len(),
                "date block has no matching crn/time blocks, skipping"
            );
            continue;
        };

        for (row, set) in aligned.crns.iter().enumerate() {
            let location = aligned.locations.map(|locs| locs[row].clone());
            for crn in set {
                entries.push(ExamEntry::new(
                    *crn,
                    set.clone(),
                    aligned.dates[row],
                    aligned.times[row],
                    location.clone(),
                ));
            }
        }
    }

    debug!(blocks = blocks.len(), entries = entries.len(), "column blocks zipped");
    dedupe_by_crn(entries)
}
