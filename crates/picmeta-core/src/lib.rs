pub mod allocate;
pub mod context;
pub mod date;
pub mod error;
pub mod media;
pub mod metadata;
pub mod natural;
pub mod reorganize;
pub mod stats;
pub mod storage;

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use error::{Error, Result};
pub use metadata::ExifToolMode;
pub use stats::ProcessingStatistics;

use metadata::{CaptureTimeWriter, ExifToolBackend, ExifToolWriter, MediaTimestampReader};
use storage::{Destination, LocalFs, MediaSource, SshRemote};

fn default_workers() -> usize {
    4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Copy into the dated layout and stamp the copies.
    #[default]
    Copy,
    /// Only rewrite timestamps of files already in the dated layout.
    FixMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorganizeOptions {
    pub source: String,
    pub dest: String,
    #[serde(default)]
    pub dry_run: bool,
    /// Source host; also the destination host unless `dest_ssh_host` is set.
    #[serde(default)]
    pub ssh_host: Option<String>,
    #[serde(default)]
    pub dest_ssh_host: Option<String>,
    #[serde(default)]
    pub remote_dest: bool,
    #[serde(default)]
    pub skip_existing: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Subdirectory of `source` to scan instead of the whole tree.
    #[serde(default)]
    pub test_dir: Option<String>,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub exiftool: ExifToolMode,
}

impl ReorganizeOptions {
    pub fn new(source: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            dry_run: false,
            ssh_host: None,
            dest_ssh_host: None,
            remote_dest: false,
            skip_existing: false,
            workers: default_workers(),
            test_dir: None,
            mode: Mode::Copy,
            exiftool: ExifToolMode::Auto,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(Error::Configuration("source directory is required".into()));
        }
        if self.dest.trim().is_empty() {
            return Err(Error::Configuration("destination directory is required".into()));
        }
        if self.workers == 0 {
            return Err(Error::Configuration("workers must be at least 1".into()));
        }
        if self.remote_dest && self.dest_host().is_none() {
            return Err(Error::Configuration(
                "remote destination requires --dest-ssh-host or --ssh-host".into(),
            ));
        }
        Ok(())
    }

    /// Host of the destination tree, when it is remote.
    pub fn dest_host(&self) -> Option<&str> {
        self.dest_ssh_host.as_deref().or(self.ssh_host.as_deref())
    }

    /// Where enumeration starts: `source`, or `source/test_dir`.
    pub fn scan_root(&self) -> String {
        match self.test_dir.as_deref().filter(|d| !d.is_empty()) {
            Some(sub) => format!(
                "{}/{}",
                self.source.trim_end_matches('/'),
                sub.trim_start_matches('/')
            ),
            None => self.source.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub stats: ProcessingStatistics,
    pub preallocated: usize,
    pub authoritative: usize,
    pub synthetic: usize,
    pub elapsed_secs: f64,
}

/// Progress callback; it may borrow from the caller for `'a`.
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

const EMIT_EVERY: u64 = 100;
const EMIT_INTERVAL: Duration = Duration::from_secs(10);

/// Throttled progress reporter: emits every 100 completions, after 10s of
/// silence, or on the final completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        Self {
            inner,
            last_emit: Mutex::new(Instant::now()),
        }
    }

    /// `current` is the number of completed items. The message is only
    /// built when the update is actually forwarded.
    pub fn report<F>(&self, stage: &str, current: u64, total: u64, message: F)
    where
        F: FnOnce() -> String,
    {
        let forced = current >= total || current % EMIT_EVERY == 0;
        {
            let mut last = self.last_emit.lock().unwrap_or_else(PoisonError::into_inner);
            if !forced && last.elapsed() < EMIT_INTERVAL {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, &message());
    }
}

/// Run a full reorganization with the collaborators `options` asks for.
pub fn process(
    options: &ReorganizeOptions,
    progress_callback: &ProgressCallback<'_>,
) -> anyhow::Result<ProcessResult> {
    options.validate()?;
    let started = Instant::now();

    let source_remote = options.ssh_host.as_deref().map(SshRemote::new);
    let dest_remote = if options.remote_dest {
        options.dest_host().map(SshRemote::new)
    } else {
        None
    };

    let source: &dyn MediaSource = match &source_remote {
        Some(remote) => remote,
        None => &LocalFs,
    };
    // Same host on both sides shares one handle.
    let dest: &dyn Destination = match (&dest_remote, &source_remote) {
        (Some(d), Some(s)) if d == s => s,
        (Some(d), _) => d,
        (None, _) => &LocalFs,
    };

    let backend = ExifToolBackend::detect(options.exiftool);
    match &backend {
        Some(ExifToolBackend::Native(path)) => log::info!("Using exiftool at {}", path.display()),
        Some(ExifToolBackend::Docker { image }) => log::info!("Using exiftool via Docker image {}", image),
        None if options.exiftool == ExifToolMode::Off => log::info!("Metadata updates disabled"),
        None => log::warn!("exiftool not found (native or Docker); metadata will not be updated"),
    }

    let reader = MediaTimestampReader::new(backend.clone());
    let writer = backend.map(ExifToolWriter::new);

    let collaborators = reorganize::Collaborators {
        source,
        dest,
        reader: &reader,
        writer: writer.as_ref().map(|w| w as &dyn CaptureTimeWriter),
    };

    log::info!(
        "Reorganizing {}{} -> {}{}",
        source_remote
            .as_ref()
            .map(|r| format!("{}:", r.host()))
            .unwrap_or_default(),
        options.scan_root(),
        dest_remote
            .as_ref()
            .map(|r| format!("{}:", r.host()))
            .unwrap_or_default(),
        options.dest
    );
    if options.dry_run {
        log::info!("DRY RUN: nothing will be copied or modified");
    }

    let tp = ThrottledProgress::new(progress_callback);
    let outcome = reorganize::run(options, &collaborators, &tp)?;

    Ok(ProcessResult {
        stats: outcome.stats,
        preallocated: outcome.assignment.len(),
        authoritative: outcome.assignment.authoritative_count(),
        synthetic: outcome.assignment.len() - outcome.assignment.authoritative_count(),
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}
