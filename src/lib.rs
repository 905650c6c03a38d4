mod config;
mod error;
mod paths;
mod util;
mod zstd_jsonl;

mod record;
mod normalize;
mod filters;
mod idset;
mod correlate;
mod sink;

mod stats;
mod progress;
mod pipeline;
mod integrity;

pub use crate::config::{FilterConfig, Mode, QuotePolicy, DEFAULT_WINDOW_LIMIT, TERMS_ENV};
pub use crate::error::{ArchiveError, FieldError, ParseError, PipelineError};

// Leaf stages, usable on their own.
pub use crate::zstd_jsonl::{ArchiveLines, ArchiveStream};
pub use crate::record::{parse, Record};
pub use crate::normalize::{classify, extract, truncate_text, FieldSet, Kind, ELLIPSIS};
pub use crate::filters::{matches, KeywordFilter};
pub use crate::idset::{IdSet, IdSetBuilder};
pub use crate::correlate::{parent_id_of, parent_ref, IdCorrelator, JoinState};
pub use crate::sink::{TableSink, HEADER};

// Orchestration.
pub use crate::pipeline::{process_line, JoinReport, LineOutcome, Pipeline, RunReport, Stage};
pub use crate::stats::{CancelToken, ScanStats};
pub use crate::progress::ProgressFn;

// Integrity checker mode, and direct zstd validators.
pub use crate::integrity::{check_archives, IntegrityMode};
pub use crate::zstd_jsonl::{quick_validate_zst, validate_zst_full};

pub use crate::paths::expand_inputs;
pub use crate::util::init_tracing_once;
