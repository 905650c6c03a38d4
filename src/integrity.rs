//! Pre-flight archive validation: a bad frame found here costs seconds, the
//! same frame found mid-scan aborts a pass that may have run for hours.

use crate::progress::make_count_progress;
use crate::util::init_tracing_once;
use crate::zstd_jsonl::{quick_validate_zst, validate_zst_full};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug)]
pub enum IntegrityMode {
    /// Decode the first `sample_bytes` of output per archive. Misses damage
    /// past the sample.
    Quick { sample_bytes: u64 },
    /// Decode to EOF, verifying frame checksums.
    Full,
}

impl IntegrityMode {
    fn label(self) -> &'static str {
        match self {
            IntegrityMode::Quick { .. } => "check (quick)",
            IntegrityMode::Full => "check (full)",
        }
    }
}

/// Returns `(path, error)` for every archive that failed, sorted by path.
/// At most `file_concurrency` archives are decoded at once.
pub fn check_archives(
    paths: &[PathBuf],
    mode: IntegrityMode,
    window_limit: u64,
    file_concurrency: usize,
    progress: bool,
) -> Vec<(PathBuf, String)> {
    init_tracing_once();
    let pb = progress.then(|| make_count_progress(paths.len() as u64, mode.label()));

    let check = |path: &Path| -> Option<(PathBuf, String)> {
        let res = match mode {
            IntegrityMode::Quick { sample_bytes } => quick_validate_zst(path, window_limit, sample_bytes),
            IntegrityMode::Full => validate_zst_full(path, window_limit),
        };
        if let Some(pb) = &pb {
            pb.inc(1);
        }
        res.err().map(|e| {
            tracing::warn!(path = %path.display(), error = %e, "archive failed integrity check");
            (path.to_path_buf(), e.to_string())
        })
    };

    let pool = rayon::ThreadPoolBuilder::new().num_threads(file_concurrency.max(1)).build();
    let mut bad: Vec<(PathBuf, String)> = match pool {
        Ok(pool) if file_concurrency > 1 => {
            pool.install(|| paths.par_iter().filter_map(|p| check(p)).collect())
        }
        Ok(_) => paths.iter().filter_map(|p| check(p)).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "check pool unavailable, checking sequentially");
            paths.iter().filter_map(|p| check(p)).collect()
        }
    };

    if let Some(pb) = pb {
        pb.finish_with_message(format!("{} bad of {}", bad.len(), paths.len()));
    }
    bad.sort();
    tracing::info!(archives = paths.len(), bad = bad.len(), "integrity check finished");
    bad
}
