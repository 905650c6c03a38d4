use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Default decompression window ceiling (2 GiB); large dumps use `--long=31`.
pub const DEFAULT_WINDOW_LIMIT: u64 = 1 << 31;

/// Environment variable with extra comma/semicolon separated terms.
pub const TERMS_ENV: &str = "REDSIFT_TERMS";

/// Which terminal stage the pipeline runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Keyword filter over every record of every archive.
    StandaloneFilter,
    /// Collect matching submission ids, then keep comments under them.
    TwoPassJoin,
}

/// CSV quoting policy for the output table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuotePolicy {
    All,
    Minimal,
}

/// Immutable run configuration, built once and passed to every stage.
#[derive(Clone, Debug)]
pub struct FilterConfig {
    pub terms: Vec<String>,            // lowercase, sorted, deduped
    pub max_text_len: Option<usize>,   // chars; None keeps the whole field
    pub window_limit: u64,             // bytes
    pub mode: Mode,
    pub quote_policy: QuotePolicy,

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,

    // parallel batches; 1 = strictly sequential
    pub worker_threads: usize,
    pub batch_lines: usize,

    pub progress: bool,
    pub progress_every: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            max_text_len: None,
            window_limit: DEFAULT_WINDOW_LIMIT,
            mode: Mode::StandaloneFilter,
            quote_policy: QuotePolicy::All,
            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
            worker_threads: 1,
            batch_lines: 8192,
            progress: false,
            progress_every: 1_000_000,
        }
    }
}

impl FilterConfig {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::default().with_terms(terms)
    }

    /// Replace the term list. Terms are trimmed and lowercased; blanks are dropped.
    pub fn with_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.terms = terms.into_iter().map(|t| normalize_term(t.as_ref())).collect();
        self.terms.retain(|t| !t.is_empty());
        self.terms.sort();
        self.terms.dedup();
        self
    }

    /// Append terms from a newline-delimited file (`#` starts a comment line).
    pub fn with_terms_file(mut self, path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("open terms file {}", path.display()))?;
        for line in BufReader::new(f).lines() {
            let line = line.with_context(|| format!("read terms file {}", path.display()))?;
            if line.trim_start().starts_with('#') {
                continue;
            }
            self.terms.push(line);
        }
        let terms = std::mem::take(&mut self.terms);
        Ok(self.with_terms(terms))
    }

    /// Merge extra terms from `REDSIFT_TERMS` (comma or semicolon separated).
    pub fn with_env_terms(mut self) -> Self {
        if let Ok(s) = std::env::var(TERMS_ENV) {
            let extra: Vec<String> = s
                .split(|c: char| c == ',' || c == ';')
                .map(|t| t.to_string())
                .collect();
            if !extra.is_empty() {
                tracing::debug!(count = extra.len(), "merging terms from {}", TERMS_ENV);
            }
            self.terms.extend(extra);
            let terms = std::mem::take(&mut self.terms);
            self = self.with_terms(terms);
        }
        self
    }

    pub fn with_max_text_len(mut self, cap: Option<usize>) -> Self {
        self.max_text_len = cap;
        self
    }
    pub fn with_window_limit(mut self, bytes: u64) -> Self {
        self.window_limit = bytes;
        self
    }
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
    pub fn with_quote_policy(mut self, policy: QuotePolicy) -> Self {
        self.quote_policy = policy;
        self
    }
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }
    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n.max(1);
        self
    }
    pub fn with_batch_lines(mut self, n: usize) -> Self {
        self.batch_lines = n.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_every(mut self, lines: u64) -> Self {
        self.progress_every = lines.max(1);
        self
    }

    /// zstd `window_log_max` derived from `window_limit`, clamped to 10..=31.
    pub fn window_log_max(&self) -> u32 {
        window_log_for(self.window_limit)
    }
}

pub fn window_log_for(limit: u64) -> u32 {
    if limit == 0 {
        return 10;
    }
    let log = 63 - limit.leading_zeros();
    log.clamp(10, 31)
}

#[inline]
pub fn normalize_term(s: &str) -> String {
    s.trim().to_lowercase()
}
