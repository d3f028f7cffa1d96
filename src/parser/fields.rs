use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Match, Regex};

use crate::model::{Crn, CrnSet, Location, Room, Sentinel, TimeRange};

// ── Dates ──

static NUMERIC_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());
static LONG_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2}),?\s+(\d{4})\b",
    )
    .unwrap()
});
static SHORT_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sept|sep|oct|nov|dec)\.?\s+(\d{1,2}),?\s+(\d{4})\b")
        .unwrap()
});
static WEEKDAY_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:mon|tues?|wed(?:nes)?|thu(?:rs?)?|fri|sat(?:ur)?|sun)(?:day)?\.?,?)?$")
        .unwrap()
});

#[derive(Clone, Copy)]
enum DateForm {
    Numeric,
    MonthName,
}

fn date_patterns() -> [(&'static Regex, DateForm); 3] {
    [
        (&*NUMERIC_DATE_RE, DateForm::Numeric),
        (&*LONG_DATE_RE, DateForm::MonthName),
        (&*SHORT_DATE_RE, DateForm::MonthName),
    ]
}

/// Find the first date in `text`: `MM/DD/YYYY`, `December 10, 2025` or `Dec 10, 2025`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    find_date(text).map(|(date, _)| date)
}

/// True when the line is a date and nothing else, bar a leading weekday name.
pub fn is_date_line(line: &str) -> bool {
    let line = line.trim();
    match find_date(line) {
        Some((_, (start, end))) => {
            WEEKDAY_PREFIX_RE.is_match(line[..start].trim()) && line[end..].trim().is_empty()
        }
        None => false,
    }
}

fn find_date(text: &str) -> Option<(NaiveDate, (usize, usize))> {
    for (re, form) in date_patterns() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let whole = caps.get(0)?;
        if let Some(date) = date_from_captures(&caps, form) {
            return Some((date, (whole.start(), whole.end())));
        }
    }
    None
}

fn date_from_captures(caps: &Captures, form: DateForm) -> Option<NaiveDate> {
    let (month, day, year): (u32, u32, i32) = match form {
        DateForm::Numeric => (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?),
        DateForm::MonthName => (
            month_number(&caps[1])?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        ),
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let prefix = name.get(..3)?.to_ascii_lowercase();
    MONTHS.iter().position(|m| *m == prefix).map(|i| i as u32 + 1)
}

// ── Time ranges ──

static TWELVE_HOUR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})(?::([0-5]\d))?\s*([ap])\.?\s?m\b\.?\s*(?:-|–|—|to)\s*(\d{1,2})(?::([0-5]\d))?\s*([ap])\.?\s?m\b\.?",
    )
    .unwrap()
});
static TWENTY_FOUR_HOUR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([01]\d|2[0-3])([0-5]\d)\s*[-–]\s*([01]\d|2[0-3])([0-5]\d)\b").unwrap()
});

/// Find a time range: `8:00 AM - 10:00 AM`, `8:00 AM - 10 AM` or `0800-1000`.
///
/// Start and end are matched together; a range that does not move forward
/// in time is rejected as a whole.
pub fn parse_time_range(text: &str) -> Option<TimeRange> {
    find_time_range(text).map(|(range, _)| range)
}

/// True when the line is a time range and nothing else.
pub fn is_time_line(line: &str) -> bool {
    let line = line.trim();
    find_time_range(line).is_some_and(|(_, m)| covers(line, m))
}

fn find_time_range(text: &str) -> Option<(TimeRange, (usize, usize))> {
    if let Some(caps) = TWELVE_HOUR_RE.captures(text) {
        let whole = caps.get(0)?;
        let start = twelve_hour_minutes(&caps[1], caps.get(2), &caps[3]);
        let end = twelve_hour_minutes(&caps[4], caps.get(5), &caps[6]);
        if let Some(range) = start.zip(end).and_then(|(s, e)| TimeRange::new(s, e)) {
            return Some((range, (whole.start(), whole.end())));
        }
    }

    let caps = TWENTY_FOUR_HOUR_RE.captures(text)?;
    let whole = caps.get(0)?;
    let start = caps[1].parse::<u16>().ok()? * 60 + caps[2].parse::<u16>().ok()?;
    let end = caps[3].parse::<u16>().ok()? * 60 + caps[4].parse::<u16>().ok()?;
    TimeRange::new(start, end).map(|r| (r, (whole.start(), whole.end())))
}

/// 12 AM is hour 0, 12 PM stays hour 12.
fn twelve_hour_minutes(hour: &str, minute: Option<Match>, meridiem: &str) -> Option<u16> {
    let hour: u16 = hour.parse().ok()?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let minute: u16 = match minute {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let pm = meridiem.eq_ignore_ascii_case("p");
    Some((hour % 12 + if pm { 12 } else { 0 }) * 60 + minute)
}

fn covers(line: &str, (start, end): (usize, usize)) -> bool {
    line[..start].trim().is_empty() && line[end..].trim().is_empty()
}

// ── Locations ──

static SENTINEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(see\s+faculty|see\s+instructor|online|remote|virtual|tba|tbd)\b").unwrap()
});
/// Room tokens: `212`, `414A`, `B101`, or a bare suffix such as `B`.
const ROOM_TOKEN: &str = r"(?:\d[0-9A-Za-z]*|[A-Za-z]\d[0-9A-Za-z]*|[A-Za-z]{1,2})";
static ROOMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^([A-Z]{{4,6}})\s+({t}(?:\s*[/,]\s*{t}|\s+{t})*)$",
        t = ROOM_TOKEN
    ))
    .unwrap()
});
static VENUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z][a-z.'&\- ]*?\s(?:auditorium|hall|center|centre|room))\b").unwrap()
});
static BUILDING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{4,6}$").unwrap());

/// Recognize an exam location. Checks run in a fixed order: sentinels before
/// building codes, so `SEE FACULTY` or `ONLINE` never become a building.
pub fn parse_location(line: &str) -> Option<Location> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(caps) = SENTINEL_RE.captures(line) {
        return Some(Location::Unassigned(sentinel(&caps[1])));
    }

    if let Some(caps) = ROOMS_RE.captures(line) {
        let rooms = &caps[2];
        if rooms.chars().any(|c| c.is_ascii_digit()) {
            return Some(Location::Rooms(expand_rooms(&caps[1], rooms)));
        }
    }

    if let Some(caps) = VENUE_RE.captures(line) {
        return Some(Location::Venue(caps[1].trim().to_string()));
    }

    if BUILDING_RE.is_match(line) {
        return Some(Location::Building(line.to_string()));
    }

    None
}

fn sentinel(token: &str) -> Sentinel {
    let upper = token.to_ascii_uppercase();
    if upper.starts_with("SEE") {
        Sentinel::SeeFaculty
    } else if upper == "VIRTUAL" {
        Sentinel::Virtual
    } else if upper == "TBA" || upper == "TBD" {
        Sentinel::Tba
    } else {
        Sentinel::Online
    }
}

/// Expand a slash or space separated room list against its building code.
///
/// A letters-only token inherits the leading digits of the most recent token
/// that began with digits: `414A/B` becomes `414A`, `414B`.
pub fn expand_rooms(building: &str, list: &str) -> Vec<Room> {
    let mut rooms = Vec::new();
    let mut last_digits: Option<String> = None;

    for token in list
        .split(|c: char| c == '/' || c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
        let room = match &last_digits {
            Some(prefix) if token.chars().all(|c| c.is_ascii_alphabetic()) => {
                format!("{}{}", prefix, token.to_ascii_uppercase())
            }
            _ => token.to_ascii_uppercase(),
        };
        if !digits.is_empty() {
            last_digits = Some(digits);
        }
        rooms.push(Room {
            building: building.to_string(),
            room,
        });
    }

    rooms
}

// ── Reference numbers ──

static MERGED_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{5})(\d{5})\b").unwrap());
static CRN_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(?:\s*[-,/&;]\s*\d{5}|\s+\d{5})*$").unwrap());
static NUMERAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Split two 5-digit numbers that a column wrap fused into one 10-digit numeral.
pub fn repair_merged_crns(line: &str) -> String {
    MERGED_PAIR_RE.replace_all(line, "$1 $2").into_owned()
}

/// Decode a line made only of reference numbers and separators.
///
/// Numerals below 10,000 are dropped; a line left with none is not a CRN line.
pub fn parse_crn_line(line: &str) -> Option<CrnSet> {
    let repaired = repair_merged_crns(line.trim());
    if !CRN_LINE_RE.is_match(&repaired) {
        return None;
    }

    let mut set = CrnSet::new();
    for m in NUMERAL_RE.find_iter(&repaired) {
        if let Some(crn) = m.as_str().parse::<u32>().ok().and_then(Crn::new) {
            set.insert(crn);
        }
    }

    (!set.is_empty()).then_some(set)
}

// ── Rejections ──

/// Why a line shaped like a date, time range or CRN list yields no value.
/// `None` when the line parses, or looks like none of them.
pub fn rejection(line: &str) -> Option<&'static str> {
    let line = line.trim();

    let date_shaped = date_patterns().iter().any(|(re, _)| re.is_match(line));
    if date_shaped && find_date(line).is_none() {
        return Some("date components out of range");
    }

    let time_shaped = TWELVE_HOUR_RE.is_match(line) || TWENTY_FOUR_HOUR_RE.is_match(line);
    if time_shaped && find_time_range(line).is_none() {
        return Some("time range out of range or inverted");
    }

    let repaired = repair_merged_crns(line);
    let small_crn = CRN_LINE_RE.is_match(&repaired)
        && NUMERAL_RE
            .find_iter(&repaired)
            .any(|m| m.as_str().parse::<u32>().ok().and_then(Crn::new).is_none());
    if small_crn {
        return Some("reference number below 10000");
    }

    None
}
