//! Error taxonomy: fatal archive errors abort a run, parse/field errors are
//! per-line skips that only bump counters.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal: the archive cannot be opened or decoded any further.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot open archive {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "archive {path} needs a larger decompression window than the configured limit \
         of {window_limit} bytes (window_log_max={window_log_max})"
    )]
    WindowTooSmall {
        path: PathBuf,
        window_limit: u64,
        window_log_max: u32,
    },
    #[error("corrupt zstd stream in {path} after line {line} (compressed offset ~{compressed_offset}): {source}")]
    Corrupt {
        path: PathBuf,
        line: u64,
        compressed_offset: u64,
        #[source]
        source: io::Error,
    },
}

/// Recoverable: one line could not be turned into a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Recoverable: a record is missing a field the output row requires.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    #[error("created_utc is missing")]
    MissingCreatedAt,
    #[error("created_utc is not a valid epoch timestamp")]
    InvalidCreatedAt,
}

/// Anything that stops a pipeline pass.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("output {path}: {source}")]
    Sink {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("id artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
