//! End-of-run counters and the cooperative cancel flag.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Every line read lands in exactly one bucket besides `processed`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub processed: u64,
    pub skipped_malformed: u64,
    pub skipped_missing_created: u64,
    pub skipped_invalid_created: u64,
    /// Matching submission without an id (collection pass only).
    pub skipped_missing_id: u64,
    pub unknown_kind: u64,
    /// Well-formed record of the kind this pass does not consume.
    pub wrong_kind: u64,
    pub filtered_out: u64,
    /// Comment whose parent is not in the id set.
    pub unresolved: u64,
    pub matched: u64,
    pub joined: u64,
    pub cancelled: bool,
}

impl ScanStats {
    /// Sum of all per-outcome buckets; equals `processed` after a pass.
    pub fn accounted(&self) -> u64 {
        self.skipped_malformed
            + self.skipped_missing_created
            + self.skipped_invalid_created
            + self.skipped_missing_id
            + self.unknown_kind
            + self.wrong_kind
            + self.filtered_out
            + self.unresolved
            + self.matched
            + self.joined
    }
}

impl fmt::Display for ScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} malformed={} missing_created={} invalid_created={} missing_id={} unknown={} \
             wrong_kind={} filtered_out={} unresolved={} matched={} joined={}",
            self.processed,
            self.skipped_malformed,
            self.skipped_missing_created,
            self.skipped_invalid_created,
            self.skipped_missing_id,
            self.unknown_kind,
            self.wrong_kind,
            self.filtered_out,
            self.unresolved,
            self.matched,
            self.joined,
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

/// Shared flag checked between records. Clone it into a signal handler or
/// another thread and call [`CancelToken::cancel`].
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
