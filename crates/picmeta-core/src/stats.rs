use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Run-wide counters. Workers never touch these directly; they report a
/// [`FileOutcome`] and the orchestrator records it under one lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStatistics {
    pub total: u64,
    pub processed: u64,
    pub skipped: u64,
    pub errored: u64,
    pub transferred: u64,
    pub metadata_updated: u64,
    pub metadata_failed: u64,
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Copied; `metadata` says whether the timestamp write went through.
    Transferred { metadata: MetadataOutcome },
    /// Existing destination had its timestamp rewritten (or not).
    MetadataOnly { metadata: MetadataOutcome },
    /// Dry run: everything was decided, nothing was written.
    DryRun,
    /// Routed to the unknown bucket.
    Unparsed { transferred: bool },
    /// Destination already present, or missing in fix-metadata mode.
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataOutcome {
    Updated,
    Failed,
    /// No writer configured
    NotAttempted,
}

impl ProcessingStatistics {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &FileOutcome) {
        match *outcome {
            FileOutcome::Transferred { metadata } => {
                self.processed += 1;
                self.transferred += 1;
                self.record_metadata(metadata);
            }
            FileOutcome::MetadataOnly { metadata } => {
                self.processed += 1;
                self.record_metadata(metadata);
            }
            FileOutcome::DryRun => self.processed += 1,
            FileOutcome::Unparsed { transferred } => {
                self.skipped += 1;
                if transferred {
                    self.transferred += 1;
                }
            }
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Failed => self.errored += 1,
        }
    }

    fn record_metadata(&mut self, metadata: MetadataOutcome) {
        match metadata {
            MetadataOutcome::Updated => self.metadata_updated += 1,
            MetadataOutcome::Failed => self.metadata_failed += 1,
            MetadataOutcome::NotAttempted => {}
        }
    }

    /// Files that reached a final state.
    pub fn completed(&self) -> u64 {
        self.processed + self.skipped + self.errored
    }

    /// One-line progress summary with rate and ETA.
    pub fn progress_message(&self, elapsed: Duration) -> String {
        let done = self.completed();
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 { done as f64 / secs } else { 0.0 };
        let eta = if rate > 0.0 {
            let remaining = self.total.saturating_sub(done) as f64 / rate;
            format_duration(Duration::from_secs_f64(remaining))
        } else {
            "?".to_string()
        };

        format!(
            "processed {}, skipped {}, errors {} | {:.1} files/s | elapsed {} | ETA {}",
            self.processed,
            self.skipped,
            self.errored,
            rate,
            format_duration(elapsed),
            eta
        )
    }
}

/// `1h2m3s`, `2m3s` or `3s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{}m{}s", h, m, s)
    } else if m > 0 {
        format!("{}m{}s", m, s)
    } else {
        format!("{}s", s)
    }
}
