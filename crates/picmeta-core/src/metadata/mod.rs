//! Reading and writing capture timestamps embedded in media files.

pub mod exiftool;

use std::path::Path;

use chrono::NaiveDateTime;

use crate::date;
use crate::error::{Error, Result};

pub use exiftool::{ExifToolBackend, ExifToolMode};

pub trait CaptureTimeReader: Send + Sync {
    /// Embedded capture time of a local file, if it carries one.
    fn read_capture_timestamp(&self, path: &Path) -> Option<NaiveDateTime>;
}

pub trait CaptureTimeWriter: Send + Sync {
    /// Rewrite the original-capture, creation and modification dates.
    fn write_capture_timestamp(&self, path: &Path, ts: NaiveDateTime) -> Result<()>;
}

fn is_image(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE)
}

/// Images are decoded in-process; videos, and images the decoder cannot
/// read, go to a native exiftool when one is available.
#[derive(Debug, Clone, Default)]
pub struct MediaTimestampReader {
    exiftool: Option<ExifToolBackend>,
}

impl MediaTimestampReader {
    /// Only a native exiftool is used for reads; a container start per
    /// file is too slow for the pre-allocation pass.
    pub fn new(exiftool: Option<ExifToolBackend>) -> Self {
        Self {
            exiftool: exiftool.filter(ExifToolBackend::is_native),
        }
    }
}

impl CaptureTimeReader for MediaTimestampReader {
    fn read_capture_timestamp(&self, path: &Path) -> Option<NaiveDateTime> {
        if is_image(path) {
            if let Some(ts) = date::exif::read_exif_date(path) {
                return Some(ts);
            }
        }
        self.exiftool.as_ref()?.read_timestamp(path)
    }
}

/// Writes through exiftool, then stamps the file's modification time.
#[derive(Debug, Clone)]
pub struct ExifToolWriter {
    backend: ExifToolBackend,
}

impl ExifToolWriter {
    pub fn new(backend: ExifToolBackend) -> Self {
        Self { backend }
    }
}

impl CaptureTimeWriter for ExifToolWriter {
    fn write_capture_timestamp(&self, path: &Path, ts: NaiveDateTime) -> Result<()> {
        self.backend
            .write_timestamp(path, ts)
            .map_err(|e| Error::metadata_write(path, e))?;
        set_file_mtime(path, ts).map_err(|e| Error::metadata_write(path, e))
    }
}

/// NaiveDateTime is local time; convert to a UTC epoch for the mtime.
pub fn set_file_mtime(path: &Path, ts: NaiveDateTime) -> std::io::Result<()> {
    if let Some(local) = ts.and_local_timezone(chrono::Local).earliest() {
        let ft = filetime::FileTime::from_unix_time(local.timestamp(), 0);
        filetime::set_file_mtime(path, ft)?;
    }
    Ok(())
}
