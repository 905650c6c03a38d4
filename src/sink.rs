//! CSV table writer with a fixed column order.

use crate::config::QuotePolicy;
use crate::error::PipelineError;
use crate::normalize::FieldSet;
use crate::util::create_file;
use csv::{QuoteStyle, Writer, WriterBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};

pub const HEADER: [&str; 10] = [
    "id",
    "created_utc",
    "subreddit",
    "author",
    "score",
    "num_comments",
    "type",
    "title",
    "text",
    "permalink",
];

/// Append-only, ordered row sink. Rows already written survive a fatal
/// abort as long as the caller invokes [`TableSink::flush`] before bailing.
pub struct TableSink {
    path: PathBuf,
    w: Writer<File>,
    rows: u64,
}

impl TableSink {
    /// Create (truncate) `path` and write the header row.
    pub fn create(path: &Path, policy: QuotePolicy, buf_bytes: usize) -> Result<Self, PipelineError> {
        let file = create_file(path)
            .map_err(|e| PipelineError::Sink { path: path.to_path_buf(), source: e.into() })?;
        let style = match policy {
            QuotePolicy::All => QuoteStyle::Always,
            QuotePolicy::Minimal => QuoteStyle::Necessary,
        };
        let w = WriterBuilder::new()
            .quote_style(style)
            .buffer_capacity(buf_bytes.max(8 * 1024))
            .from_writer(file);
        let mut sink = Self { path: path.to_path_buf(), w, rows: 0 };
        sink.w.write_record(HEADER).map_err(|e| sink.err(e))?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows written so far (header excluded).
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn write(&mut self, row: &FieldSet) -> Result<(), PipelineError> {
        let created = row.created_iso();
        let score = row.score.to_string();
        let num_comments = row.num_comments.to_string();
        let record: [&str; 10] = [
            &row.id,
            &created,
            &row.subreddit,
            &row.author,
            &score,
            &num_comments,
            row.kind.as_str(),
            row.title.as_deref().unwrap_or(""),
            &row.text,
            &row.permalink,
        ];
        self.w.write_record(record).map_err(|e| self.err(e))?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), PipelineError> {
        self.w.flush().map_err(|e| PipelineError::Sink { path: self.path.clone(), source: e.into() })
    }

    /// Flush and close; returns the number of data rows.
    pub fn finish(mut self) -> Result<u64, PipelineError> {
        self.flush()?;
        Ok(self.rows)
    }

    fn err(&self, e: csv::Error) -> PipelineError {
        PipelineError::Sink { path: self.path.clone(), source: e }
    }
}
