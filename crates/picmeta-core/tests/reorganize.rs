use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime};
use picmeta_core::metadata::{CaptureTimeReader, CaptureTimeWriter};
use picmeta_core::reorganize::{self, Collaborators, RunOutcome};
use picmeta_core::storage::LocalFs;
use picmeta_core::{Error, Mode, ReorganizeOptions, ThrottledProgress};
use tempfile::{tempdir, TempDir};

fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

/// Embedded timestamps keyed by file name.
#[derive(Default)]
struct FakeReader(HashMap<&'static str, NaiveDateTime>);

impl CaptureTimeReader for FakeReader {
    fn read_capture_timestamp(&self, path: &Path) -> Option<NaiveDateTime> {
        let name = path.file_name()?.to_str()?;
        self.0.get(name).copied()
    }
}

#[derive(Default)]
struct RecordingWriter {
    writes: Mutex<Vec<(PathBuf, NaiveDateTime)>>,
    fail: bool,
}

impl RecordingWriter {
    fn written(&self) -> HashMap<String, NaiveDateTime> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|(p, t)| (p.file_name().unwrap().to_string_lossy().into_owned(), *t))
            .collect()
    }
}

impl CaptureTimeWriter for RecordingWriter {
    fn write_capture_timestamp(&self, path: &Path, ts: NaiveDateTime) -> picmeta_core::Result<()> {
        if self.fail {
            return Err(Error::ExifTool("exit status: 1".into()));
        }
        self.writes.lock().unwrap().push((path.to_path_buf(), ts));
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    src: PathBuf,
    dst: PathBuf,
}

impl Fixture {
    fn new(files: &[&str]) -> Self {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        for f in files {
            let path = src.join(f);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, f.as_bytes()).unwrap();
        }
        Self { _dir: dir, src, dst }
    }

    fn options(&self) -> ReorganizeOptions {
        ReorganizeOptions::new(self.src.to_str().unwrap(), self.dst.to_str().unwrap())
    }

    fn run(
        &self,
        options: &ReorganizeOptions,
        reader: &FakeReader,
        writer: &RecordingWriter,
    ) -> picmeta_core::Result<RunOutcome> {
        let io = Collaborators {
            source: &LocalFs,
            dest: &LocalFs,
            reader,
            writer: Some(writer),
        };
        let cb = |_: &str, _: u64, _: u64, _: &str| {};
        reorganize::run(options, &io, &ThrottledProgress::new(&cb))
    }
}

#[test]
fn synthetic_timestamps_survive_parallel_workers() {
    let names: Vec<String> = (1..=40).map(|i| format!("2024_01_IMG_{}.jpg", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let fx = Fixture::new(&refs);

    let mut options = fx.options();
    options.workers = 8;
    let writer = RecordingWriter::default();
    let outcome = fx.run(&options, &FakeReader::default(), &writer).unwrap();

    assert_eq!(outcome.stats.processed, 40);
    assert_eq!(outcome.stats.metadata_updated, 40);

    let written = writer.written();
    for i in 1..=40u32 {
        let name = format!("2024-01-01_IMG_{}.jpg", i);
        assert!(fx.dst.join("2024/2024-01").join(&name).is_file(), "{}", name);
        assert_eq!(written[&name], ts(2024, 1, 1, 0, 0, i - 1), "{}", name);
    }
}

#[test]
fn embedded_timestamp_wins_when_year_matches() {
    let fx = Fixture::new(&["2019_06_a.jpg", "2019_06_b.jpg", "2019_06_c.jpg"]);
    let reader = FakeReader(HashMap::from([("2019_06_b.jpg", ts(2019, 6, 5, 14, 22, 10))]));
    let writer = RecordingWriter::default();

    let outcome = fx.run(&fx.options(), &reader, &writer).unwrap();
    assert_eq!(outcome.assignment.authoritative_count(), 1);

    let written = writer.written();
    assert_eq!(written["2019-06-01_a.jpg"], ts(2019, 6, 1, 0, 0, 0));
    assert_eq!(written["2019-06-01_b.jpg"], ts(2019, 6, 5, 14, 22, 10));
    assert_eq!(written["2019-06-01_c.jpg"], ts(2019, 6, 5, 14, 22, 11));
}

#[test]
fn vendor_metadata_and_non_media_are_ignored() {
    let fx = Fixture::new(&[
        "2020_05_party.jpg",
        "@eaDir/2020_05_party.jpg/SYNOPHOTO_THUMB_M.jpg",
        "notes.txt",
    ]);
    let outcome = fx
        .run(&fx.options(), &FakeReader::default(), &RecordingWriter::default())
        .unwrap();

    assert_eq!(outcome.stats.total, 1);
    assert_eq!(outcome.stats.processed, 1);
    assert!(!fx.dst.join("unknown").exists());
}

#[test]
fn metadata_failure_is_not_an_error() {
    let fx = Fixture::new(&["990615_beach.jpg"]);
    let writer = RecordingWriter {
        fail: true,
        ..Default::default()
    };
    let outcome = fx.run(&fx.options(), &FakeReader::default(), &writer).unwrap();

    assert!(fx.dst.join("1999/1999-06/1999-06-15_beach.jpg").is_file());
    assert_eq!(outcome.stats.processed, 1);
    assert_eq!(outcome.stats.transferred, 1);
    assert_eq!(outcome.stats.errored, 0);
    assert_eq!(outcome.stats.metadata_updated, 0);
    assert_eq!(outcome.stats.metadata_failed, 1);
}

#[test]
fn skip_existing_leaves_destination_alone() {
    let fx = Fixture::new(&["20240315_vacation.jpg", "20240316_vacation.jpg"]);
    let existing = fx.dst.join("2024/2024-03/2024-03-15_vacation.jpg");
    fs::create_dir_all(existing.parent().unwrap()).unwrap();
    fs::write(&existing, b"already here").unwrap();

    let mut options = fx.options();
    options.skip_existing = true;
    let writer = RecordingWriter::default();
    let outcome = fx.run(&options, &FakeReader::default(), &writer).unwrap();

    assert_eq!(fs::read(&existing).unwrap(), b"already here");
    assert!(fx.dst.join("2024/2024-03/2024-03-16_vacation.jpg").is_file());
    assert_eq!(outcome.stats.skipped, 1);
    assert_eq!(outcome.stats.processed, 1);
    assert_eq!(writer.written().len(), 1);
}

#[test]
fn fix_metadata_only_touches_existing_files() {
    let fx = Fixture::new(&["20240315_vacation.jpg", "20240316_vacation.jpg", "photo_final.jpg"]);
    let existing = fx.dst.join("2024/2024-03/2024-03-15_vacation.jpg");
    fs::create_dir_all(existing.parent().unwrap()).unwrap();
    fs::write(&existing, b"copied earlier").unwrap();

    let mut options = fx.options();
    options.mode = Mode::FixMetadata;
    let writer = RecordingWriter::default();
    let outcome = fx.run(&options, &FakeReader::default(), &writer).unwrap();

    assert_eq!(fs::read(&existing).unwrap(), b"copied earlier");
    assert!(!fx.dst.join("2024/2024-03/2024-03-16_vacation.jpg").exists());
    assert!(!fx.dst.join("unknown").exists());

    let written = writer.written();
    assert_eq!(written.len(), 1);
    assert_eq!(written["2024-03-15_vacation.jpg"], ts(2024, 3, 15, 0, 0, 0));
    assert_eq!(outcome.stats.processed, 1);
    assert_eq!(outcome.stats.transferred, 0);
    assert_eq!(outcome.stats.skipped, 2);
}

#[test]
fn test_dir_scopes_scan_but_not_context() {
    let fx = Fixture::new(&["Trip/2018_07_a.jpg", "Other/2018_07_b.jpg"]);
    let mut options = fx.options();
    options.test_dir = Some("Trip".into());

    let outcome = fx
        .run(&options, &FakeReader::default(), &RecordingWriter::default())
        .unwrap();

    assert_eq!(outcome.stats.total, 1);
    assert!(fx.dst.join("2018/2018-07/2018-07-01_Trip_2018_07_a.jpg").is_file());
}

#[test]
fn remote_dest_without_host_is_rejected() {
    let fx = Fixture::new(&[]);
    let mut options = fx.options();
    options.remote_dest = true;

    let err = fx
        .run(&options, &FakeReader::default(), &RecordingWriter::default())
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}
