//! Sequential pre-allocation of output timestamps.
//!
//! Runs single-threaded over the whole candidate set before any worker
//! starts. The resulting [`TimestampAssignment`] is frozen and shared
//! read-only with the workers, so the order of synthetic timestamps follows
//! the natural order of the filenames regardless of which worker finishes
//! first.

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};

use crate::date::{self, ParsedDate};
use crate::media::CandidatePath;
use crate::natural::natural_cmp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignedTimestamp {
    pub timestamp: NaiveDateTime,
    /// Taken from embedded capture metadata rather than synthesized.
    pub authoritative: bool,
}

impl AssignedTimestamp {
    pub fn source_label(&self) -> &'static str {
        if self.authoritative {
            "EXIF"
        } else {
            "parsed+sequential"
        }
    }
}

/// Final timestamp per candidate path. Built once by [`preallocate`]; there
/// is no way to mutate it afterwards.
#[derive(Debug, Clone, Default)]
pub struct TimestampAssignment {
    entries: HashMap<String, AssignedTimestamp>,
}

impl TimestampAssignment {
    pub fn get(&self, path: &str) -> Option<&AssignedTimestamp> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn authoritative_count(&self) -> usize {
        self.entries.values().filter(|a| a.authoritative).count()
    }
}

/// The running clock carried through the pre-allocation pass.
#[derive(Debug, Default)]
struct RunningClock {
    last: Option<NaiveDateTime>,
}

impl RunningClock {
    /// Authoritative timestamps may move the clock forward, never back.
    fn observe(&mut self, ts: NaiveDateTime) {
        if self.last.map_or(true, |last| ts > last) {
            self.last = Some(ts);
        }
    }

    /// Next synthetic timestamp: midnight of `parsed` for the first one,
    /// one second after the clock afterwards.
    fn next_synthetic(&mut self, parsed: &ParsedDate) -> NaiveDateTime {
        let ts = match self.last {
            None => parsed.start_of_day(),
            Some(last) => last + Duration::seconds(1),
        };
        self.last = Some(ts);
        ts
    }
}

/// Compute the final timestamp of every candidate whose date resolves.
///
/// Candidates are walked in natural order. `embedded` supplies the
/// embedded capture timestamp of a candidate (it may fetch remote content);
/// it is called once per resolvable candidate, in order. Unresolvable
/// candidates get no entry.
pub fn preallocate<F>(paths: &[CandidatePath], mut embedded: F) -> TimestampAssignment
where
    F: FnMut(&CandidatePath) -> Option<NaiveDateTime>,
{
    let mut sorted: Vec<&CandidatePath> = paths.iter().collect();
    sorted.sort_by(|a, b| natural_cmp(&a.path, &b.path));

    let mut clock = RunningClock::default();
    let mut entries = HashMap::with_capacity(sorted.len());

    for candidate in sorted {
        let Some(parsed) = date::resolve(&candidate.path) else {
            continue;
        };

        let reconciled = date::reconcile(embedded(candidate), &parsed);
        let timestamp = if reconciled.authoritative {
            clock.observe(reconciled.timestamp);
            reconciled.timestamp
        } else {
            clock.next_synthetic(&parsed)
        };

        let assigned = AssignedTimestamp {
            timestamp,
            authoritative: reconciled.authoritative,
        };
        log::debug!(
            "[Prealloc] {} -> {} (from {})",
            candidate.file_name(),
            timestamp.format("%Y-%m-%d %H:%M:%S"),
            assigned.source_label()
        );
        entries.insert(candidate.path.clone(), assigned);
    }

    TimestampAssignment { entries }
}
