//! The single parameterized scan shared by every mode:
//! ArchiveStream → parse → classify/extract → {keyword filter | id join} → sink.

use crate::config::{FilterConfig, Mode};
use crate::correlate::{parent_id_of, parent_ref, IdCorrelator, JoinState};
use crate::error::{ArchiveError, FieldError, PipelineError};
use crate::filters::KeywordFilter;
use crate::idset::{IdSet, IdSetBuilder};
use crate::normalize::{classify, extract, FieldSet, Kind};
use crate::progress::{ProgressFn, ProgressScope};
use crate::record::parse;
use crate::sink::TableSink;
use crate::stats::{CancelToken, ScanStats};
use crate::util::init_tracing_once;
use crate::zstd_jsonl::ArchiveStream;
use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Terminal stage for one pass.
#[derive(Clone, Copy)]
pub enum Stage<'a> {
    /// Emit every record whose title/text matches.
    Filter(&'a KeywordFilter),
    /// Submissions only; matching ids go to the id set.
    CollectIds(&'a KeywordFilter),
    /// Comments only; emit those whose parent is in the set.
    ResolveComments(&'a IdSet),
}

impl Stage<'_> {
    fn label(&self) -> &'static str {
        match self {
            Stage::Filter(_) => "filter",
            Stage::CollectIds(_) => "collect ids",
            Stage::ResolveComments(_) => "resolve comments",
        }
    }
}

/// What happened to one line. Pure function of (line, stage, cap).
#[derive(Debug)]
pub enum LineOutcome {
    Malformed,
    Field(FieldError),
    Unknown,
    WrongKind,
    MissingId,
    FilteredOut,
    Unresolved,
    Matched(FieldSet),
    Collected(String),
    Joined(FieldSet),
}

impl LineOutcome {
    fn count(&self, stats: &mut ScanStats) {
        stats.processed += 1;
        match self {
            LineOutcome::Malformed => stats.skipped_malformed += 1,
            LineOutcome::Field(FieldError::MissingCreatedAt) => stats.skipped_missing_created += 1,
            LineOutcome::Field(FieldError::InvalidCreatedAt) => stats.skipped_invalid_created += 1,
            LineOutcome::Unknown => stats.unknown_kind += 1,
            LineOutcome::WrongKind => stats.wrong_kind += 1,
            LineOutcome::MissingId => stats.skipped_missing_id += 1,
            LineOutcome::FilteredOut => stats.filtered_out += 1,
            LineOutcome::Unresolved => stats.unresolved += 1,
            LineOutcome::Matched(_) | LineOutcome::Collected(_) => stats.matched += 1,
            LineOutcome::Joined(_) => stats.joined += 1,
        }
    }
}

/// Classify one raw line for `stage`.
///
/// The keyword filter sees the untruncated text; the cap is applied only to
/// rows that are emitted.
pub fn process_line(line: &str, stage: Stage<'_>, max_text_len: Option<usize>) -> LineOutcome {
    let rec = match parse(line) {
        Ok(r) => r,
        Err(_) => return LineOutcome::Malformed,
    };
    let kind = classify(&rec);
    if kind == Kind::Unknown {
        return LineOutcome::Unknown;
    }

    match stage {
        Stage::Filter(filter) => {
            let mut row = match extract(&rec, kind, None) {
                Ok(r) => r,
                Err(e) => return LineOutcome::Field(e),
            };
            if !filter.matches(&row) {
                return LineOutcome::FilteredOut;
            }
            row.cap_text(max_text_len);
            LineOutcome::Matched(row)
        }
        Stage::CollectIds(filter) => {
            if kind != Kind::Submission {
                return LineOutcome::WrongKind;
            }
            let row = match extract(&rec, kind, None) {
                Ok(r) => r,
                Err(e) => return LineOutcome::Field(e),
            };
            if !filter.matches(&row) {
                return LineOutcome::FilteredOut;
            }
            if row.id.is_empty() {
                return LineOutcome::MissingId;
            }
            LineOutcome::Collected(row.id)
        }
        Stage::ResolveComments(ids) => {
            if kind != Kind::Comment {
                return LineOutcome::WrongKind;
            }
            let parent = parent_ref(&rec).map(parent_id_of).unwrap_or("");
            if parent.is_empty() || !ids.contains(parent) {
                return LineOutcome::Unresolved;
            }
            match extract(&rec, kind, max_text_len) {
                Ok(row) => LineOutcome::Joined(row),
                Err(e) => LineOutcome::Field(e),
            }
        }
    }
}

/// Counters of both join passes.
#[derive(Clone, Debug, Default)]
pub struct JoinReport {
    pub collect: ScanStats,
    pub resolve: ScanStats,
    pub ids: usize,
}

#[derive(Clone, Debug)]
pub enum RunReport {
    Filter(ScanStats),
    Join(JoinReport),
}

/// Entry point. Holds the immutable config plus the optional cancel flag and
/// progress callback; every run method streams and never buffers an archive.
pub struct Pipeline {
    cfg: FilterConfig,
    filter: KeywordFilter,
    cancel: Option<CancelToken>,
    on_progress: Option<Box<ProgressFn>>,
}

impl Pipeline {
    pub fn new(cfg: FilterConfig) -> Self {
        let filter = KeywordFilter::new(&cfg.terms);
        Self { cfg, filter, cancel: None, on_progress: None }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Called every `progress_every` lines and once at the end of each pass.
    pub fn with_progress_callback(mut self, f: impl FnMut(&ScanStats) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn config(&self) -> &FilterConfig {
        &self.cfg
    }

    /// Dispatch on `mode`. In join mode `inputs[..split_at]` are submission
    /// archives and `inputs[split_at..]` comment archives; `split_at` is
    /// ignored for the standalone filter.
    pub fn run(&mut self, inputs: &[PathBuf], split_at: usize, ids_out: Option<&Path>, out_csv: &Path) -> Result<RunReport> {
        match self.cfg.mode {
            Mode::StandaloneFilter => Ok(RunReport::Filter(self.run_filter(inputs, out_csv)?)),
            Mode::TwoPassJoin => {
                if split_at > inputs.len() {
                    bail!("join split {} is out of range for {} inputs", split_at, inputs.len());
                }
                let (subs, comments) = inputs.split_at(split_at);
                Ok(RunReport::Join(self.run_join(subs, comments, ids_out, out_csv)?))
            }
        }
    }

    /// Standalone keyword filter over all `inputs`, in order, into one table.
    pub fn run_filter(&mut self, inputs: &[PathBuf], out_csv: &Path) -> Result<ScanStats> {
        init_tracing_once();
        let mut sink = TableSink::create(out_csv, self.cfg.quote_policy, self.cfg.write_buffer_bytes)?;
        let filter = self.filter.clone();
        let stats = self.scan(inputs, Stage::Filter(&filter), |outcome| match outcome {
            LineOutcome::Matched(row) => sink.write(&row),
            _ => Ok(()),
        });
        finish_sink(sink, stats, out_csv)
    }

    /// Pass 1 on its own. With `ids_out`, the artifact is promoted only when
    /// the pass completes.
    pub fn collect_ids(&mut self, submissions: &[PathBuf], ids_out: Option<&Path>) -> Result<(IdSet, ScanStats)> {
        init_tracing_once();
        let mut builder = match ids_out {
            Some(p) => IdSetBuilder::persisted(p, self.cfg.write_buffer_bytes)
                .with_context(|| format!("create id artifact {}", p.display()))?,
            None => IdSetBuilder::in_memory(),
        };
        let filter = self.filter.clone();
        let res = self.scan(submissions, Stage::CollectIds(&filter), |outcome| match outcome {
            LineOutcome::Collected(id) => builder
                .insert(&id)
                .map(|_| ())
                .map_err(|source| PipelineError::Artifact {
                    path: ids_out.map(Path::to_path_buf).unwrap_or_default(),
                    source,
                }),
            _ => Ok(()),
        });
        match res {
            Ok(stats) if !stats.cancelled => {
                let ids = builder.finish()?;
                tracing::info!(ids = ids.len(), artifact = ?ids_out, "collected submission ids");
                Ok((ids, stats))
            }
            Ok(stats) => {
                tracing::warn!("collection cancelled; id artifact not written");
                builder.abandon();
                Ok((IdSet::new(), stats))
            }
            Err(e) => {
                builder.abandon();
                Err(e.into())
            }
        }
    }

    /// Pass 2 on its own, against an in-memory set.
    pub fn resolve_comments(&mut self, comments: &[PathBuf], ids: &IdSet, out_csv: &Path) -> Result<ScanStats> {
        init_tracing_once();
        let mut sink = TableSink::create(out_csv, self.cfg.quote_policy, self.cfg.write_buffer_bytes)?;
        let stats = self.scan(comments, Stage::ResolveComments(ids), |outcome| match outcome {
            LineOutcome::Joined(row) => sink.write(&row),
            _ => Ok(()),
        });
        finish_sink(sink, stats, out_csv)
    }

    /// Both passes in one process.
    pub fn run_join(
        &mut self,
        submissions: &[PathBuf],
        comments: &[PathBuf],
        ids_out: Option<&Path>,
        out_csv: &Path,
    ) -> Result<JoinReport> {
        let mut join = IdCorrelator::new(self);
        let collect = join.collect(submissions, ids_out)?;
        if collect.cancelled {
            return Ok(JoinReport { collect, ..Default::default() });
        }
        let ids = match join.state() {
            JoinState::ResolveComments(ids) => ids.len(),
            _ => 0,
        };
        let resolve = join.resolve(comments, out_csv)?;
        Ok(JoinReport { collect, resolve, ids })
    }

    /// Pass 2 alone from a persisted id artifact (e.g. after a crash in pass 2).
    pub fn resolve_from_artifact(&mut self, ids_path: &Path, comments: &[PathBuf], out_csv: &Path) -> Result<ScanStats> {
        init_tracing_once();
        let mut join = IdCorrelator::from_artifact(self, ids_path)?;
        join.resolve(comments, out_csv)
    }

    // ------------------------------------------------------------------

    fn scan(
        &mut self,
        inputs: &[PathBuf],
        stage: Stage<'_>,
        mut apply: impl FnMut(LineOutcome) -> Result<(), PipelineError>,
    ) -> Result<ScanStats, PipelineError> {
        let cfg = &self.cfg;
        let cancel = self.cancel.as_ref();
        let pool = if cfg.worker_threads > 1 {
            Some(rayon::ThreadPoolBuilder::new().num_threads(cfg.worker_threads).build()?)
        } else {
            None
        };
        let mut progress = ProgressScope::new(
            stage.label(),
            inputs,
            cfg.progress,
            cfg.progress_every,
            self.on_progress.as_deref_mut(),
        );
        let mut stats = ScanStats::default();

        tracing::info!(stage = stage.label(), archives = inputs.len(), workers = cfg.worker_threads, "pass started");
        for path in inputs {
            progress.start_archive();
            let mut stream = ArchiveStream::open_cfg(path, cfg.window_limit, cfg.read_buffer_bytes)?;
            let res = match &pool {
                None => scan_sequential(&mut stream, stage, cfg, cancel, &mut stats, &mut progress, &mut apply),
                Some(pool) => scan_batched(&mut stream, stage, cfg, pool, cancel, &mut stats, &mut progress, &mut apply),
            };
            if let Err(e) = res {
                tracing::warn!(stage = stage.label(), path = %path.display(), %stats, "pass aborted");
                return Err(e);
            }
            tracing::debug!(path = %path.display(), lines = stream.lines_read(), "archive done");
            if stats.cancelled {
                break;
            }
        }
        progress.finish(&stats);
        tracing::info!(stage = stage.label(), %stats, "pass finished");
        Ok(stats)
    }
}

fn finish_sink(mut sink: TableSink, stats: Result<ScanStats, PipelineError>, out_csv: &Path) -> Result<ScanStats> {
    match stats {
        Ok(stats) => {
            let rows = sink.rows();
            sink.finish()?;
            tracing::info!(path = %out_csv.display(), rows, "table written");
            Ok(stats)
        }
        Err(e) => {
            // Keep what was already emitted before surfacing the fatal error.
            if let Err(flush_err) = sink.flush() {
                tracing::warn!(error = %flush_err, "flush after abort failed");
            }
            Err(e.into())
        }
    }
}

fn scan_sequential(
    stream: &mut ArchiveStream,
    stage: Stage<'_>,
    cfg: &FilterConfig,
    cancel: Option<&CancelToken>,
    stats: &mut ScanStats,
    progress: &mut ProgressScope<'_>,
    apply: &mut impl FnMut(LineOutcome) -> Result<(), PipelineError>,
) -> Result<(), PipelineError> {
    let mut line = String::with_capacity(16 * 1024);
    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            stats.cancelled = true;
            return Ok(());
        }
        if !stream.next_line(&mut line)? {
            return Ok(());
        }
        let outcome = process_line(&line, stage, cfg.max_text_len);
        outcome.count(stats);
        apply(outcome)?;
        progress.tick(stats, stream.compressed_bytes_read());
    }
}

/// Read `batch_lines` lines, process them on `pool`, apply in input order.
/// At most one batch is in flight, so a slow sink throttles reading.
#[allow(clippy::too_many_arguments)]
fn scan_batched(
    stream: &mut ArchiveStream,
    stage: Stage<'_>,
    cfg: &FilterConfig,
    pool: &rayon::ThreadPool,
    cancel: Option<&CancelToken>,
    stats: &mut ScanStats,
    progress: &mut ProgressScope<'_>,
    apply: &mut impl FnMut(LineOutcome) -> Result<(), PipelineError>,
) -> Result<(), PipelineError> {
    let mut batch: Vec<String> = Vec::with_capacity(cfg.batch_lines);
    loop {
        batch.clear();
        let mut fatal: Option<ArchiveError> = None;
        let mut eof = false;
        while batch.len() < cfg.batch_lines {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                stats.cancelled = true;
                break;
            }
            let mut line = String::new();
            match stream.next_line(&mut line) {
                Ok(true) => batch.push(line),
                Ok(false) => {
                    eof = true;
                    break;
                }
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            }
        }

        let cap = cfg.max_text_len;
        let outcomes: Vec<LineOutcome> =
            pool.install(|| batch.par_iter().map(|l| process_line(l, stage, cap)).collect());
        for outcome in outcomes {
            outcome.count(stats);
            apply(outcome)?;
            progress.tick(stats, stream.compressed_bytes_read());
        }

        if let Some(e) = fatal {
            return Err(e.into());
        }
        if eof || stats.cancelled {
            return Ok(());
        }
    }
}
