//! Progress reporting: byte-based bar over compressed input with the live
//! counters in its message.

use crate::stats::ScanStats;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// User progress hook; receives the running counters.
pub type ProgressFn = dyn FnMut(&ScanStats) + Send;

pub fn make_progress_bar_labeled(total_bytes: u64, label: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    let style = ProgressStyle::with_template(
        "{spinner:.green} {prefix} {bytes:>10}/{total_bytes:<10} [{bar:.cyan/blue}] {percent:>3}%  \
         {bytes_per_sec}  eta: {eta_precise}\n  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    if let Some(label) = label {
        pb.set_prefix(label.to_string());
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Count-style progress bar (items processed out of total), with a label.
pub fn make_count_progress(total: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
         elapsed: {elapsed_precise}  eta: {eta_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    if !label.is_empty() {
        pb.set_message(label.to_string());
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn total_compressed_size(paths: &[PathBuf]) -> u64 {
    paths.iter().map(|p| fs::metadata(p).map(|m| m.len()).unwrap_or(0)).sum()
}

/// Bar plus optional user callback, fed by the pipeline between records.
pub struct ProgressScope<'a> {
    pb: Option<ProgressBar>,
    every: u64,
    callback: Option<&'a mut ProgressFn>,
    last_bytes: u64,
}

impl<'a> ProgressScope<'a> {
    pub fn new(
        label: &str,
        paths: &[PathBuf],
        show_bar: bool,
        every: u64,
        callback: Option<&'a mut ProgressFn>,
    ) -> Self {
        let pb = show_bar.then(|| make_progress_bar_labeled(total_compressed_size(paths), Some(label)));
        Self { pb, every: every.max(1), callback, last_bytes: 0 }
    }

    /// Called when a new archive starts; its byte counter restarts at 0.
    pub fn start_archive(&mut self) {
        self.last_bytes = 0;
    }

    /// `cur_bytes` is the compressed offset inside the current archive.
    #[inline]
    pub fn tick(&mut self, stats: &ScanStats, cur_bytes: u64) {
        if let Some(pb) = &self.pb {
            if cur_bytes > self.last_bytes {
                pb.inc(cur_bytes - self.last_bytes);
                self.last_bytes = cur_bytes;
            }
        }
        if stats.processed % self.every == 0 {
            if let Some(pb) = &self.pb {
                pb.set_message(stats.to_string());
            }
            if let Some(cb) = self.callback.as_deref_mut() {
                cb(stats);
            }
        }
    }

    pub fn finish(&mut self, stats: &ScanStats) {
        if let Some(pb) = self.pb.take() {
            pb.finish_with_message(stats.to_string());
        }
        if let Some(cb) = self.callback.as_deref_mut() {
            cb(stats);
        }
    }
}
