use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

/// Smallest numeral accepted as a course reference number.
pub const MIN_CRN: u32 = 10_000;
const MAX_CRN: u32 = 99_999;

/// Course reference number: the per-section identifier within a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Crn(u32);

impl Crn {
    pub fn new(n: u32) -> Option<Crn> {
        (MIN_CRN..=MAX_CRN).contains(&n).then_some(Crn(n))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Crn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sections sharing one exam sitting. Sorted, so it doubles as a grouping key.
pub type CrnSet = BTreeSet<Crn>;

pub fn format_crns(set: &CrnSet) -> String {
    set.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
}

/// Exam window in minutes since midnight, `start < end <= 1439`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    start: u16,
    end: u16,
}

impl TimeRange {
    pub fn new(start: u16, end: u16) -> Option<TimeRange> {
        (start < end && end < 24 * 60).then_some(TimeRange { start, end })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", format_12h(self.start), format_12h(self.end))
    }
}

/// Render a minute-of-day as `H:MM AM|PM`.
pub fn format_12h(minute: u16) -> String {
    let (hour, min) = (minute / 60, minute % 60);
    let meridiem = if hour < 12 { "AM" } else { "PM" };
    let hour12 = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", hour12, min, meridiem)
}

/// One physical room, keyed by building abbreviation and room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Room {
    pub building: String,
    pub room: String,
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.building, self.room)
    }
}

/// Locations that name no physical room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    Online,
    Tba,
    Virtual,
    SeeFaculty,
}

impl Sentinel {
    pub fn as_str(self) -> &'static str {
        match self {
            Sentinel::Online => "ONLINE",
            Sentinel::Tba => "TBA",
            Sentinel::Virtual => "VIRTUAL",
            Sentinel::SeeFaculty => "SEE FACULTY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Building code with one or more rooms, e.g. `CEIS 414A / CEIS 414B`.
    Rooms(Vec<Room>),
    /// Named venue such as `Ingle Auditorium`.
    Venue(String),
    /// Building code printed without a room.
    Building(String),
    Unassigned(Sentinel),
    /// Text captured positionally that matched no known pattern.
    Text(String),
}

impl Location {
    pub fn rooms(&self) -> &[Room] {
        match self {
            Location::Rooms(rooms) => rooms,
            _ => &[],
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Rooms(rooms) => {
                let parts: Vec<String> = rooms.iter().map(|r| r.to_string()).collect();
                f.write_str(&parts.join(" / "))
            }
            Location::Venue(name) | Location::Building(name) | Location::Text(name) => {
                f.write_str(name)
            }
            Location::Unassigned(s) => f.write_str(s.as_str()),
        }
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A fully parsed exam slot for one section. Only constructed once date and
/// time are both known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamEntry {
    pub crn: Crn,
    pub combined: CrnSet,
    pub date: NaiveDate,
    pub time: TimeRange,
    pub location: Option<Location>,
}

impl ExamEntry {
    pub fn new(
        crn: Crn,
        mut combined: CrnSet,
        date: NaiveDate,
        time: TimeRange,
        location: Option<Location>,
    ) -> ExamEntry {
        combined.insert(crn);
        ExamEntry {
            crn,
            combined,
            date,
            time,
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crn_bounds() {
        assert!(Crn::new(9_999).is_none());
        assert!(Crn::new(100_000).is_none());
        assert_eq!(Crn::new(14611).map(Crn::get), Some(14611));
    }

    #[test]
    fn time_range_rejects_inverted() {
        assert!(TimeRange::new(600, 600).is_none());
        assert!(TimeRange::new(700, 600).is_none());
        assert!(TimeRange::new(0, 1440).is_none());
        assert!(TimeRange::new(765, 885).is_some());
    }

    #[test]
    fn twelve_hour_rendering() {
        assert_eq!(format_12h(0), "12:00 AM");
        assert_eq!(format_12h(720), "12:00 PM");
        assert_eq!(format_12h(765), "12:45 PM");
        assert_eq!(format_12h(885), "2:45 PM");
        assert_eq!(format_12h(8 * 60 + 5), "8:05 AM");
    }

    #[test]
    fn entry_always_contains_own_crn() {
        let crn = Crn::new(14611).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 12, 10).unwrap();
        let e = ExamEntry::new(crn, CrnSet::new(), date, TimeRange::new(1, 2).unwrap(), None);
        assert!(e.combined.contains(&crn));
    }

    #[test]
    fn room_list_display() {
        let loc = Location::Rooms(vec![
            Room { building: "CEIS".into(), room: "414A".into() },
            Room { building: "CEIS".into(), room: "414B".into() },
        ]);
        assert_eq!(loc.to_string(), "CEIS 414A / CEIS 414B");
        assert_eq!(loc.rooms().len(), 2);
        assert!(Location::Unassigned(Sentinel::Tba).rooms().is_empty());
    }
}
