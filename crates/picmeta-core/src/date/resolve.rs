use chrono::NaiveTime;
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;

use super::ParsedDate;

/// One rule of the cascade: a pattern plus the extraction applied to its
/// first match. Extraction returns `None` for out-of-range values, which
/// hands control to the next rule.
struct DatePattern {
    name: &'static str,
    regex: &'static LazyLock<Regex>,
    extract: fn(&Captures, &str) -> Option<ParsedDate>,
}

static RE_DATE_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})\s+(\d{2})\.(\d{2})\.(\d{2})").unwrap());
static RE_DATE_HYPHEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());
static RE_DATE_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})_(\d{2})_(\d{2})").unwrap());
static RE_DATE_COMPACT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})(?:\D|$)").unwrap());
static RE_YEAR_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})_(\d{2})(?:_|\D|$)").unwrap());
static RE_SHORT_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{2})(\d{2})(\d{2})(?:\D|$)").unwrap());
static RE_SHORT_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{2})(\d{2})(?:\D|$)").unwrap());
static RE_YEAR_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[/\\](\d{4})(?:_|/|\\)").unwrap());
static RE_YEAR_AND_BEFORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})\s+and\s+before").unwrap());
static RE_YEAR_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|[/\\])(\d{4})[A-Za-z_]").unwrap());

// Most specific first, so a looser rule never swallows a stricter one.
static PATTERNS: &[DatePattern] = &[
    DatePattern { name: "YYYY-MM-DD HH.MM.SS", regex: &RE_DATE_TIME, extract: date_time },
    DatePattern { name: "YYYY-MM-DD", regex: &RE_DATE_HYPHEN, extract: full_date },
    DatePattern { name: "YYYY_MM_DD", regex: &RE_DATE_UNDERSCORE, extract: full_date },
    DatePattern { name: "YYYYMMDD", regex: &RE_DATE_COMPACT, extract: full_date },
    DatePattern { name: "YYYY_MM", regex: &RE_YEAR_MONTH, extract: year_month },
    DatePattern { name: "YYMMDD", regex: &RE_SHORT_DATE, extract: short_date },
    DatePattern { name: "YYMM", regex: &RE_SHORT_MONTH, extract: short_month },
    DatePattern { name: "/YYYY/", regex: &RE_YEAR_SEGMENT, extract: year_only },
    DatePattern { name: "YYYY and before", regex: &RE_YEAR_AND_BEFORE, extract: year_only },
    DatePattern { name: "YYYYname", regex: &RE_YEAR_PREFIX, extract: year_only },
];

fn num<T: std::str::FromStr>(caps: &Captures, i: usize) -> Option<T> {
    caps.get(i)?.as_str().parse().ok()
}

/// Two-digit years above 50 belong to the 1900s, the rest to the 2000s.
pub fn infer_century(yy: i32) -> i32 {
    if yy > 50 {
        1900 + yy
    } else {
        2000 + yy
    }
}

fn date_time(caps: &Captures, base: &str) -> Option<ParsedDate> {
    let time = NaiveTime::from_hms_opt(num(caps, 4)?, num(caps, 5)?, num(caps, 6)?)?;
    Some(full_date(caps, base)?.with_time(time))
}

fn full_date(caps: &Captures, base: &str) -> Option<ParsedDate> {
    ParsedDate::new(num(caps, 1)?, num(caps, 2)?, num(caps, 3)?, base)
}

fn year_month(caps: &Captures, base: &str) -> Option<ParsedDate> {
    ParsedDate::new(num(caps, 1)?, num(caps, 2)?, 1, base)
}

fn short_date(caps: &Captures, base: &str) -> Option<ParsedDate> {
    ParsedDate::new(infer_century(num(caps, 1)?), num(caps, 2)?, num(caps, 3)?, base)
}

fn short_month(caps: &Captures, base: &str) -> Option<ParsedDate> {
    ParsedDate::new(infer_century(num(caps, 1)?), num(caps, 2)?, 1, base)
}

fn year_only(caps: &Captures, base: &str) -> Option<ParsedDate> {
    ParsedDate::new(num(caps, 1)?, 1, 1, base)
}

/// Best-guess date for a filename or path.
///
/// The cascade runs over the bare filename (extension removed) first and
/// then over the full path, so dates carried by parent directories are
/// found when the filename has none. Only the first match of each rule is
/// considered. Returns `None` when nothing valid matches anywhere; the
/// caller routes such files to the unknown bucket.
pub fn resolve(path: &str) -> Option<ParsedDate> {
    let base = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);
    let stem = Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(base);

    for search in [stem, path] {
        for pat in PATTERNS {
            let Some(caps) = pat.regex.captures(search) else {
                continue;
            };
            if let Some(parsed) = (pat.extract)(&caps, base) {
                log::trace!("{} matched {:?} in {:?}", pat.name, &caps[0], search);
                return Some(parsed);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(path: &str) -> Option<(i32, u32, u32)> {
        resolve(path).map(|d| (d.year(), d.month(), d.day()))
    }

    #[test]
    fn test_rule_cascade() {
        let d = resolve("2019-11-02 18.30.00.jpg").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2019, 11, 2));
        assert_eq!(d.time(), NaiveTime::from_hms_opt(18, 30, 0));

        assert_eq!(ymd("2019-11-02 birthday.jpg"), Some((2019, 11, 2)));
        assert_eq!(ymd("2019_11_02_birthday.jpg"), Some((2019, 11, 2)));
        assert_eq!(ymd("20240315_vacation.jpg"), Some((2024, 3, 15)));
        assert_eq!(ymd("20240315.jpg"), Some((2024, 3, 15)));
        assert_eq!(ymd("2019_11_identity.jpg"), Some((2019, 11, 1)));
        assert_eq!(ymd("990615_beach.jpg"), Some((1999, 6, 15)));
        assert_eq!(ymd("050615_beach.jpg"), Some((2005, 6, 15)));
        assert_eq!(ymd("9906_beach.jpg"), Some((1999, 6, 1)));
        assert_eq!(ymd("/photos/1985/scan01.jpg"), Some((1985, 1, 1)));
        assert_eq!(ymd("/photos/1949 and before/scan.jpg"), Some((1949, 1, 1)));
        assert_eq!(ymd("1933Lilian.jpg"), Some((1933, 1, 1)));
        assert_eq!(ymd("/family/1903_Ivan/portrait.jpg"), Some((1903, 1, 1)));
    }

    #[test]
    fn test_two_digit_century_cutover() {
        assert_eq!(infer_century(51), 1951);
        assert_eq!(infer_century(50), 2050);
        assert_eq!(infer_century(0), 2000);
        assert_eq!(infer_century(99), 1999);
    }

    #[test]
    fn test_filename_takes_priority_over_path() {
        assert_eq!(ymd("/photos/2001_05_06/20240315_vacation.jpg"), Some((2024, 3, 15)));
        assert_eq!(ymd("/photos/2001_05_06/vacation.jpg"), Some((2001, 5, 6)));
    }

    #[test]
    fn test_out_of_range_falls_through() {
        // month 13 rejected by YYYYMMDD and no looser rule matches
        assert_eq!(ymd("20241340_x.jpg"), None);
        // rejected hyphen date falls through to the path
        assert_eq!(ymd("/archive/1999/2019-14-02.jpg"), Some((1999, 1, 1)));
        // year outside the accepted range
        assert_eq!(ymd("/x/1700/old.jpg"), None);
    }

    #[test]
    fn test_invalid_time_keeps_date() {
        let d = resolve("2019-11-02 25.61.00.jpg").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2019, 11, 2));
        assert_eq!(d.time(), None);
    }

    #[test]
    fn test_unparseable() {
        assert!(resolve("photo_final.jpg").is_none());
        assert!(resolve("/photos/holiday/IMG.jpg").is_none());
        assert!(resolve("").is_none());
    }

    #[test]
    fn test_results_in_range() {
        let inputs = [
            "2019-11-02 18.30.00.jpg",
            "20240315_vacation.jpg",
            "990615_beach.jpg",
            "0001_x.jpg",
            "9913_x.jpg",
            "/a/2100/b.jpg",
            "/a/1800_start/b.jpg",
            "123456.jpg",
        ];
        for input in inputs {
            if let Some(d) = resolve(input) {
                assert!((1800..=2100).contains(&d.year()), "{input}");
                assert!((1..=12).contains(&d.month()), "{input}");
                assert!((1..=31).contains(&d.day()), "{input}");
            }
        }
    }

    #[test]
    fn test_source_text_is_basename() {
        let d = resolve("/photos/trip/20240315_vacation.jpg").unwrap();
        assert_eq!(d.source_text(), "20240315_vacation.jpg");
    }
}
