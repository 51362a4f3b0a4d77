//! The two-phase reorganization pipeline.
//!
//! Phase 1 enumerates the source and runs the sequential pre-allocation
//! pass. Phase 2 opens a fixed-size worker pool over the frozen
//! [`TimestampAssignment`]; workers only read it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use chrono::NaiveDateTime;
use rayon::prelude::*;

use crate::allocate::{self, AssignedTimestamp, TimestampAssignment};
use crate::context;
use crate::date::{self, ParsedDate};
use crate::error::{Error, Result};
use crate::media::CandidatePath;
use crate::metadata::{CaptureTimeReader, CaptureTimeWriter};
use crate::natural::natural_sort;
use crate::stats::{FileOutcome, MetadataOutcome, ProcessingStatistics};
use crate::storage::{self, Destination, MediaSource};
use crate::{Mode, ReorganizeOptions, ThrottledProgress};

/// Destination subdirectory for files whose date cannot be resolved.
pub const UNKNOWN_DIR: &str = "unknown";

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The external pieces a run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub source: &'a dyn MediaSource,
    pub dest: &'a dyn Destination,
    pub reader: &'a dyn CaptureTimeReader,
    /// `None` disables metadata updates.
    pub writer: Option<&'a dyn CaptureTimeWriter>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub stats: ProcessingStatistics,
    pub assignment: TimestampAssignment,
}

/// Enumerate, pre-allocate, then process every candidate on
/// `options.workers` threads. Only configuration and enumeration failures
/// are returned as errors; per-file failures end up in the statistics.
pub fn run(
    options: &ReorganizeOptions,
    io: &Collaborators<'_>,
    progress: &ThrottledProgress<'_>,
) -> Result<RunOutcome> {
    options.validate()?;

    let candidates = enumerate(io.source, &options.scan_root())?;
    let total = candidates.len() as u64;
    progress.report("scan", total, total, || format!("Found {} media files", total));
    log::info!(
        "Found {} media files to process with {} workers",
        total,
        options.workers
    );

    let assignment = preallocate(io, &candidates, progress);
    log::info!(
        "Pre-allocated {} timestamps ({} from EXIF)",
        assignment.len(),
        assignment.authoritative_count()
    );
    if assignment.is_empty() && total > 0 {
        log::warn!("None of the {} files has a date in its name", total);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .thread_name(|i| format!("picmeta-worker-{}", i))
        .build()
        .map_err(|e| Error::Configuration(format!("cannot start worker pool: {}", e)))?;

    let worker = Worker {
        options,
        io,
        assignment: &assignment,
        dest_root: PathBuf::from(&options.dest),
        reserved: Mutex::new(HashSet::new()),
    };
    let stats = Mutex::new(ProcessingStatistics::new(total));
    let started = Instant::now();

    pool.install(|| {
        candidates.par_iter().for_each(|candidate| {
            let outcome = worker.process(candidate);
            let snapshot = {
                let mut stats = stats.lock().unwrap_or_else(PoisonError::into_inner);
                stats.record(&outcome);
                *stats
            };
            progress.report("process", snapshot.completed(), total, || {
                snapshot.progress_message(started.elapsed())
            });
        });
    });

    Ok(RunOutcome {
        stats: stats.into_inner().unwrap_or_else(PoisonError::into_inner),
        assignment,
    })
}

/// Media below `root` in natural order.
pub fn enumerate(source: &dyn MediaSource, root: &str) -> Result<Vec<CandidatePath>> {
    let mut files = storage::list_media_files(source, root)?;
    natural_sort(&mut files);
    Ok(files
        .into_iter()
        .enumerate()
        .filter_map(|(i, path)| CandidatePath::new(path, i))
        .collect())
}

fn preallocate(
    io: &Collaborators<'_>,
    candidates: &[CandidatePath],
    progress: &ThrottledProgress<'_>,
) -> TimestampAssignment {
    let total = candidates
        .iter()
        .filter(|c| date::resolve(&c.path).is_some())
        .count() as u64;
    let mut done = 0;

    allocate::preallocate(candidates, |candidate| {
        let ts = embedded_timestamp(io, candidate);
        done += 1;
        progress.report("prealloc", done, total, || {
            format!("Pre-allocating timestamps ({}/{})", done, total)
        });
        ts
    })
}

/// A fetch failure only costs the embedded timestamp.
fn embedded_timestamp(io: &Collaborators<'_>, candidate: &CandidatePath) -> Option<NaiveDateTime> {
    match io.source.fetch(&candidate.path) {
        Ok(local) => io.reader.read_capture_timestamp(local.path()),
        Err(e) => {
            log::warn!("Cannot read {} for its embedded timestamp: {}", candidate.path, e);
            None
        }
    }
}

struct Worker<'a> {
    options: &'a ReorganizeOptions,
    io: &'a Collaborators<'a>,
    assignment: &'a TimestampAssignment,
    dest_root: PathBuf,
    /// Unknown-bucket names claimed during this run.
    reserved: Mutex<HashSet<PathBuf>>,
}

impl Worker<'_> {
    fn process(&self, candidate: &CandidatePath) -> FileOutcome {
        log::debug!("Processing: {}", candidate.path);

        let result = match date::resolve(&candidate.path) {
            Some(parsed) => self.place(candidate, &parsed),
            None => self.route_unknown(candidate),
        };
        result.unwrap_or_else(|e| {
            log::error!("{}", e);
            FileOutcome::Failed
        })
    }

    /// `dest/YYYY/YYYY-MM/<standardized name>`, with the directory context
    /// folded into the description.
    fn destination_for(&self, candidate: &CandidatePath, parsed: &ParsedDate) -> PathBuf {
        let context = context::extract(&candidate.path, &self.options.source);
        let description = if context.is_empty() {
            candidate.stem().to_string()
        } else {
            format!("{}_{}", context, candidate.stem())
        };
        self.dest_root
            .join(parsed.directory_path())
            .join(parsed.standardized_filename(&description, &candidate.ext))
    }

    fn place(&self, candidate: &CandidatePath, parsed: &ParsedDate) -> Result<FileOutcome> {
        let dest = self.destination_for(candidate, parsed);
        let Some(assigned) = self.assignment.get(&candidate.path).copied() else {
            log::error!("No pre-allocated timestamp for {}", candidate.path);
            return Ok(FileOutcome::Failed);
        };

        match self.options.mode {
            Mode::FixMetadata => self.fix_metadata(&dest, assigned),
            Mode::Copy => self.copy(candidate, &dest, assigned),
        }
    }

    fn fix_metadata(&self, dest: &Path, assigned: AssignedTimestamp) -> Result<FileOutcome> {
        match self.io.dest.exists(dest) {
            Ok(true) => {}
            Ok(false) => {
                log::debug!("Skipping (dest doesn't exist): {}", dest.display());
                return Ok(FileOutcome::Skipped);
            }
            Err(e) => {
                log::warn!("Skipping {}: cannot check destination: {}", dest.display(), e);
                return Ok(FileOutcome::Skipped);
            }
        }

        if self.options.dry_run {
            log::info!(
                "[DRY RUN] Would fix metadata: {} -> {} (from {})",
                dest.display(),
                assigned.timestamp.format(TS_FORMAT),
                assigned.source_label()
            );
            return Ok(FileOutcome::DryRun);
        }

        let metadata = self.write_metadata(dest, assigned);
        Ok(FileOutcome::MetadataOnly { metadata })
    }

    fn copy(
        &self,
        candidate: &CandidatePath,
        dest: &Path,
        assigned: AssignedTimestamp,
    ) -> Result<FileOutcome> {
        if self.options.skip_existing && self.io.dest.exists(dest)? {
            log::debug!("Skipping (already exists): {}", dest.display());
            return Ok(FileOutcome::Skipped);
        }

        if self.options.dry_run {
            log::info!(
                "[DRY RUN] Would copy: {} -> {} | timestamp: {} (from {})",
                candidate.path,
                dest.display(),
                assigned.timestamp.format(TS_FORMAT),
                assigned.source_label()
            );
            return Ok(FileOutcome::DryRun);
        }

        self.transfer(candidate, dest)?;
        let metadata = self.write_metadata(dest, assigned);
        Ok(FileOutcome::Transferred { metadata })
    }

    fn route_unknown(&self, candidate: &CandidatePath) -> Result<FileOutcome> {
        log::info!(
            "Skipping ({}) -> {}/",
            Error::UnparseableDate(candidate.path.clone()),
            UNKNOWN_DIR
        );
        if self.options.mode == Mode::FixMetadata {
            return Ok(FileOutcome::Unparsed { transferred: false });
        }

        let target = self.reserve_unknown(candidate)?;
        if self.options.dry_run {
            log::info!(
                "[DRY RUN] Would route to unknown: {} -> {}",
                candidate.path,
                target.display()
            );
            return Ok(FileOutcome::Unparsed { transferred: false });
        }

        self.transfer(candidate, &target)?;
        Ok(FileOutcome::Unparsed { transferred: true })
    }

    /// First free name among `stem.ext`, `stem_1.ext`, `stem_2.ext`, ...
    /// The lock is held across the existence checks so two workers never
    /// claim the same name.
    fn reserve_unknown(&self, candidate: &CandidatePath) -> Result<PathBuf> {
        let dir = self.dest_root.join(UNKNOWN_DIR);
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);

        let mut counter = 0u32;
        loop {
            let name = match counter {
                0 => candidate.file_name().to_string(),
                n => format!("{}_{}{}", candidate.stem(), n, candidate.ext),
            };
            let path = dir.join(name);
            if !reserved.contains(&path) && !self.io.dest.exists(&path)? {
                reserved.insert(path.clone());
                return Ok(path);
            }
            counter += 1;
        }
    }

    fn transfer(&self, candidate: &CandidatePath, dest: &Path) -> Result<()> {
        let local = self
            .io
            .source
            .fetch(&candidate.path)
            .map_err(|e| Error::transfer(&candidate.path, e))?;
        self.io.dest.transfer(local.path(), dest)
    }

    fn write_metadata(&self, dest: &Path, assigned: AssignedTimestamp) -> MetadataOutcome {
        let Some(writer) = self.io.writer else {
            return MetadataOutcome::NotAttempted;
        };

        log::debug!(
            "[Timestamp] {} -> {} (from {})",
            dest.display(),
            assigned.timestamp.format(TS_FORMAT),
            assigned.source_label()
        );
        let mut edit = |local: &Path| writer.write_capture_timestamp(local, assigned.timestamp);
        match self.io.dest.edit_in_place(dest, &mut edit) {
            Ok(()) => MetadataOutcome::Updated,
            Err(e) => {
                log::warn!("Failed to update metadata for {}: {}", dest.display(), e);
                MetadataOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalFs;
    use std::fs;
    use tempfile::tempdir;

    struct NoMetadata;

    impl CaptureTimeReader for NoMetadata {
        fn read_capture_timestamp(&self, _path: &Path) -> Option<NaiveDateTime> {
            None
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
    }

    fn run_local(options: &ReorganizeOptions) -> Result<RunOutcome> {
        let io = Collaborators {
            source: &LocalFs,
            dest: &LocalFs,
            reader: &NoMetadata,
            writer: None,
        };
        let cb = |_: &str, _: u64, _: u64, _: &str| {};
        run(options, &io, &ThrottledProgress::new(&cb))
    }

    #[test]
    fn test_vacation_and_unknown_collisions() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        touch(&src.join("20240315_vacation.jpg"));
        touch(&src.join("photo_final.jpg"));
        touch(&src.join("more/photo_final.jpg"));

        let mut options = ReorganizeOptions::new(src.to_str().unwrap(), dst.to_str().unwrap());
        options.workers = 2;
        let outcome = run_local(&options).unwrap();

        assert!(dst.join("2024/2024-03/2024-03-15_vacation.jpg").is_file());
        assert!(dst.join("unknown/photo_final.jpg").is_file());
        assert!(dst.join("unknown/photo_final_1.jpg").is_file());
        assert_eq!(outcome.stats.total, 3);
        assert_eq!(outcome.stats.processed, 1);
        assert_eq!(outcome.stats.skipped, 2);
        assert_eq!(outcome.stats.transferred, 3);
        assert_eq!(outcome.stats.errored, 0);
        assert_eq!(outcome.assignment.len(), 1);
    }

    #[test]
    fn test_unknown_respects_existing_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        touch(&src.join("photo_final.jpg"));
        touch(&dst.join("unknown/photo_final.jpg"));

        let options = ReorganizeOptions::new(src.to_str().unwrap(), dst.to_str().unwrap());
        run_local(&options).unwrap();

        assert!(dst.join("unknown/photo_final_1.jpg").is_file());
        // the pre-existing file is untouched
        let original = fs::read_to_string(dst.join("unknown/photo_final.jpg")).unwrap();
        assert!(original.contains("dst"));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        touch(&src.join("2001_02_a.jpg"));
        touch(&src.join("photo_final.jpg"));

        let mut options = ReorganizeOptions::new(src.to_str().unwrap(), dst.to_str().unwrap());
        options.dry_run = true;
        let outcome = run_local(&options).unwrap();

        assert!(!dst.exists());
        assert_eq!(outcome.stats.processed, 1);
        assert_eq!(outcome.stats.skipped, 1);
        assert_eq!(outcome.stats.transferred, 0);
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let dir = tempdir().unwrap();
        let options = ReorganizeOptions::new(
            dir.path().join("nope").to_str().unwrap(),
            dir.path().join("dst").to_str().unwrap(),
        );
        let err = run_local(&options).unwrap_err();
        assert!(matches!(err, Error::Enumeration { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_destination_includes_context() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        touch(&src.join("2019-07-04 Lake Trip/Day 1/IMG_1.jpg"));

        let options = ReorganizeOptions::new(src.to_str().unwrap(), dst.to_str().unwrap());
        run_local(&options).unwrap();

        assert!(dst
            .join("2019/2019-07/2019-07-04_Lake_Trip_Day_1_IMG_1.jpg")
            .is_file());
    }

    /// A destination host that cannot be reached.
    struct Unreachable;

    impl Destination for Unreachable {
        fn exists(&self, _path: &Path) -> Result<bool> {
            Err(Error::Remote("ssh: connect to host nas port 22: Connection refused".into()))
        }

        fn transfer(&self, _src: &Path, dest: &Path) -> Result<()> {
            Err(Error::transfer(dest, Error::Remote("unreachable".into())))
        }

        fn edit_in_place(&self, _dest: &Path, _edit: &mut dyn FnMut(&Path) -> Result<()>) -> Result<()> {
            Err(Error::Remote("unreachable".into()))
        }
    }

    #[test]
    fn test_fix_metadata_skips_when_existence_is_unknown() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("20240315_vacation.jpg"));
        touch(&src.join("20240316_vacation.jpg"));

        let mut options = ReorganizeOptions::new(src.to_str().unwrap(), "/volume1/photo");
        options.mode = Mode::FixMetadata;
        let io = Collaborators {
            source: &LocalFs,
            dest: &Unreachable,
            reader: &NoMetadata,
            writer: None,
        };
        let cb = |_: &str, _: u64, _: u64, _: &str| {};
        let outcome = run(&options, &io, &ThrottledProgress::new(&cb)).unwrap();

        assert_eq!(outcome.stats.skipped, 2);
        assert_eq!(outcome.stats.errored, 0);
        assert_eq!(outcome.stats.processed, 0);
    }
}
