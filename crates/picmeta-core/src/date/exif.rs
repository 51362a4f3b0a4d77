use chrono::{NaiveDate, NaiveDateTime};
use exif::{In, Reader, Tag};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Capture time embedded in an image's EXIF block, if any.
/// EXIF datetimes have no timezone info - they are local time as-is.
pub fn read_exif_date(path: &Path) -> Option<NaiveDateTime> {
    let file = File::open(path).ok()?;
    let reader = Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;

    let tags = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

    for tag in &tags {
        if let Some(field) = reader.get_field(*tag, In::PRIMARY) {
            let val = field.display_value().to_string();
            if let Some(dt) = parse_capture_datetime(&val) {
                return Some(dt);
            }
        }
    }

    None
}

/// Parse the datetime spellings produced by EXIF decoders and exiftool.
///
/// Accepts `YYYY:MM:DD HH:MM:SS` (any of `-`, `/`, `.` as date separators),
/// an optional trailing `Z` or `±HH:MM` offset which is dropped, and
/// `YYYY-MM-DDTHH:MM:SS`. The all-zero placeholder cameras write when their
/// clock was never set yields `None`.
pub fn parse_capture_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_matches('"');
    let (date_part, rest) = (s.get(..10)?, s.get(10..)?);
    let date_part = date_part.replace(['-', '/', '\\', '.'], ":");
    let time_part = rest.trim_start_matches(['T', ' ']);
    let time_part = strip_offset(time_part);

    let date = NaiveDate::parse_from_str(&date_part, "%Y:%m:%d").ok()?;
    if time_part.is_empty() {
        return date.and_hms_opt(0, 0, 0);
    }
    let time = chrono::NaiveTime::parse_from_str(time_part, "%H:%M:%S").ok()?;
    Some(date.and_time(time))
}

fn strip_offset(time: &str) -> &str {
    let time = time.trim_end_matches('Z');
    // HH:MM:SS is 8 bytes; anything after it is an offset or sub-seconds
    match time.get(..8) {
        Some(hms) if time.len() > 8 => hms,
        _ => time,
    }
}
