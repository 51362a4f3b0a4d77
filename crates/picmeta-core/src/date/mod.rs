pub mod exif;
pub mod reconcile;
pub mod resolve;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

pub use reconcile::reconcile;
pub use resolve::resolve;

pub const MIN_YEAR: i32 = 1800;
pub const MAX_YEAR: i32 = 2100;

static LEADING_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}[-_]?\d{0,2}[-_]?\d{0,2}_?").unwrap());
static LEADING_YYMMDD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{6}_?").unwrap());

/// Placeholder time for dates that carry no time-of-day.
pub fn default_time() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// A calendar date (and optional time) recovered from a filename or path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDate {
    year: i32,
    month: u32,
    day: u32,
    time: Option<NaiveTime>,
    source: String,
}

impl ParsedDate {
    /// Build a date, rejecting anything outside the accepted ranges.
    pub fn new(year: i32, month: u32, day: u32, source: impl Into<String>) -> Option<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        Some(Self {
            year,
            month,
            day,
            time: None,
            source: source.into(),
        })
    }

    pub fn with_time(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }

    /// Text the date was parsed from (the bare filename).
    pub fn source_text(&self) -> &str {
        &self.source
    }

    /// Calendar date, with the day clamped to the end of its month
    /// (`2023-02-30` becomes `2023-02-28`).
    pub fn date(&self) -> NaiveDate {
        let mut day = self.day;
        loop {
            if let Some(d) = NaiveDate::from_ymd_opt(self.year, self.month, day) {
                return d;
            }
            if day <= 28 {
                // unreachable for validated months
                return NaiveDate::MIN;
            }
            day -= 1;
        }
    }

    /// Timestamp for this date; noon when no time-of-day was parsed.
    pub fn to_timestamp(&self) -> NaiveDateTime {
        self.date().and_time(self.time.unwrap_or_else(default_time))
    }

    /// Midnight at the start of this date.
    pub fn start_of_day(&self) -> NaiveDateTime {
        self.date().and_time(NaiveTime::MIN)
    }

    /// `YYYY-MM-DD[_HHMMSS]_description.ext`; the time is omitted when absent
    /// or equal to the noon placeholder. `ext` includes its leading dot.
    pub fn standardized_filename(&self, description: &str, ext: &str) -> String {
        let desc = clean_description(description);
        match self.time {
            Some(t) if t != default_time() => format!(
                "{:04}-{:02}-{:02}_{}_{}{}",
                self.year,
                self.month,
                self.day,
                t.format("%H%M%S"),
                desc,
                ext
            ),
            _ => format!("{:04}-{:02}-{:02}_{}{}", self.year, self.month, self.day, desc, ext),
        }
    }

    /// Destination directory for this date: `YYYY/YYYY-MM`.
    pub fn directory_path(&self) -> String {
        format!("{:04}/{:04}-{:02}", self.year, self.year, self.month)
    }
}

/// True when the timestamp's calendar year matches the parsed year.
pub fn same_year(ts: &NaiveDateTime, parsed: &ParsedDate) -> bool {
    ts.year() == parsed.year
}

fn clean_description(description: &str) -> String {
    let desc: String = description.nfc().collect();
    let desc = LEADING_DATE_RE.replace(&desc, "");
    let desc = LEADING_YYMMDD_RE.replace(&desc, "");
    let desc = desc.trim().replace(' ', "_");
    if desc.is_empty() {
        "photo".to_string()
    } else {
        desc
    }
}
