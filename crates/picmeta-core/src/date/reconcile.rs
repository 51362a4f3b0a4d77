use chrono::NaiveDateTime;

use super::{same_year, ParsedDate};

/// Outcome of weighing an embedded capture timestamp against a parsed date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub timestamp: NaiveDateTime,
    /// The timestamp came from embedded capture metadata.
    pub authoritative: bool,
}

/// Decide which timestamp to trust.
///
/// An embedded timestamp wins only when its year agrees with the parsed
/// date, and then it is kept whole, time-of-day included. A year mismatch
/// means the embedded clock is wrong or unset (scans, legacy cameras), so
/// the parsed date wins.
pub fn reconcile(embedded: Option<NaiveDateTime>, parsed: &ParsedDate) -> Reconciled {
    match embedded {
        Some(ts) if same_year(&ts, parsed) => Reconciled {
            timestamp: ts,
            authoritative: true,
        },
        _ => Reconciled {
            timestamp: parsed.to_timestamp(),
            authoritative: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d).unwrap().and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn test_no_embedded_uses_parsed() {
        let parsed = ParsedDate::new(2024, 3, 15, "x").unwrap();
        let r = reconcile(None, &parsed);
        assert_eq!(r.timestamp, ts(2024, 3, 15, 12, 0, 0));
        assert!(!r.authoritative);
    }

    #[test]
    fn test_year_match_trusts_embedded() {
        let parsed = ParsedDate::new(2019, 1, 1, "x").unwrap();
        let embedded = ts(2019, 6, 5, 14, 22, 10);
        let r = reconcile(Some(embedded), &parsed);
        assert_eq!(r.timestamp, embedded);
        assert!(r.authoritative);
    }

    #[test]
    fn test_year_mismatch_overrides_embedded() {
        let parsed = ParsedDate::new(1998, 1, 1, "x").unwrap();
        let r = reconcile(Some(ts(1970, 1, 1, 0, 0, 0)), &parsed);
        assert_eq!(r.timestamp, ts(1998, 1, 1, 12, 0, 0));
        assert!(!r.authoritative);
    }
}
