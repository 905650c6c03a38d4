use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use zstd::stream::read::Decoder;

use crate::config::window_log_for;
use crate::error::ArchiveError;
use crate::util::open_file;

/// Read-buffer floor; smaller values only add syscalls.
const MIN_READ_BUF: usize = 8 * 1024;

/// A `Read` wrapper that counts compressed bytes read.
struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}
impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

type LineReader = BufReader<Decoder<'static, BufReader<CountingReader<File>>>>;

/// Lazy, restartable line stream over one zstd NDJSON archive.
///
/// Memory is bounded by `read_buf_bytes` plus the longest line; the decoded
/// archive is never held in full. Invalid UTF-8 inside a line is replaced
/// with U+FFFD instead of failing the run.
pub struct ArchiveStream {
    path: PathBuf,
    window_limit: u64,
    read_buf_bytes: usize,
    reader: LineReader,
    counter: Arc<AtomicU64>,
    lines: u64,
    raw: Vec<u8>,
}

impl ArchiveStream {
    /// Open with the default 256 KiB read buffer.
    pub fn open(path: &Path, window_limit: u64) -> Result<Self, ArchiveError> {
        Self::open_cfg(path, window_limit, 256 * 1024)
    }

    pub fn open_cfg(path: &Path, window_limit: u64, read_buf_bytes: usize) -> Result<Self, ArchiveError> {
        let counter = Arc::new(AtomicU64::new(0));
        let reader = open_reader(path, window_limit, read_buf_bytes, counter.clone())?;
        Ok(Self {
            path: path.to_path_buf(),
            window_limit,
            read_buf_bytes,
            reader,
            counter,
            lines: 0,
            raw: Vec::with_capacity(16 * 1024),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines yielded so far since the last (re)start.
    pub fn lines_read(&self) -> u64 {
        self.lines
    }

    /// Compressed bytes consumed from the file so far.
    pub fn compressed_bytes_read(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Rewind to the first line by reopening the archive.
    pub fn restart(&mut self) -> Result<(), ArchiveError> {
        self.counter.store(0, Ordering::Relaxed);
        self.reader = open_reader(&self.path, self.window_limit, self.read_buf_bytes, self.counter.clone())?;
        self.lines = 0;
        Ok(())
    }

    /// Read the next line into `buf` (trailing `\r?\n` stripped).
    /// Returns `Ok(false)` at end of stream.
    pub fn next_line(&mut self, buf: &mut String) -> Result<bool, ArchiveError> {
        buf.clear();
        self.raw.clear();
        let n = match self.reader.read_until(b'\n', &mut self.raw) {
            Ok(n) => n,
            Err(e) => return Err(self.decode_error(e)),
        };
        if n == 0 {
            return Ok(false);
        }
        if self.raw.last() == Some(&b'\n') {
            self.raw.pop();
            if self.raw.last() == Some(&b'\r') {
                self.raw.pop();
            }
        }
        buf.push_str(&String::from_utf8_lossy(&self.raw));
        self.lines += 1;
        Ok(true)
    }

    /// Owned-line iterator; stops after the first error.
    pub fn lines(self) -> ArchiveLines {
        ArchiveLines { stream: self, done: false }
    }

    fn decode_error(&self, e: io::Error) -> ArchiveError {
        let e = classify_decode_error(&self.path, self.window_limit, e, self.lines, self.compressed_bytes_read());
        log_fatal(&e);
        e
    }
}

pub struct ArchiveLines {
    stream: ArchiveStream,
    done: bool,
}

impl Iterator for ArchiveLines {
    type Item = Result<String, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = String::new();
        match self.stream.next_line(&mut buf) {
            Ok(true) => Some(Ok(buf)),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn open_reader(
    path: &Path,
    window_limit: u64,
    read_buf_bytes: usize,
    counter: Arc<AtomicU64>,
) -> Result<LineReader, ArchiveError> {
    let file = open_file(path)
        .map_err(|source| ArchiveError::Unreadable { path: path.to_path_buf(), source })?;
    let cnt = CountingReader { inner: file, counter };
    let mut decoder = Decoder::new(cnt)
        .map_err(|source| ArchiveError::Unreadable { path: path.to_path_buf(), source })?;
    decoder
        .window_log_max(window_log_for(window_limit))
        .map_err(|source| ArchiveError::Unreadable { path: path.to_path_buf(), source })?;
    Ok(BufReader::with_capacity(read_buf_bytes.max(MIN_READ_BUF), decoder))
}

/// Map a zstd read error to the fatal taxonomy. zstd reports an oversized
/// frame window as "Frame requires too much memory for decoding".
fn classify_decode_error(path: &Path, window_limit: u64, e: io::Error, line: u64, compressed_offset: u64) -> ArchiveError {
    let msg = e.to_string().to_lowercase();
    if msg.contains("too much memory") || (msg.contains("window") && msg.contains("too large")) {
        return ArchiveError::WindowTooSmall {
            path: path.to_path_buf(),
            window_limit,
            window_log_max: window_log_for(window_limit),
        };
    }
    ArchiveError::Corrupt { path: path.to_path_buf(), line, compressed_offset, source: e }
}

fn log_fatal(e: &ArchiveError) {
    tracing::warn!(
        error = %e,
        "archive aborted; rows emitted so far are flushed (verify with `redsift check --full`)"
    );
}

/// Decode up to `max_decompressed_bytes` of output and stop.
pub fn quick_validate_zst(path: &Path, window_limit: u64, max_decompressed_bytes: u64) -> Result<(), ArchiveError> {
    drain(path, window_limit, Some(max_decompressed_bytes))
}

/// Decode the whole archive to EOF.
pub fn validate_zst_full(path: &Path, window_limit: u64) -> Result<(), ArchiveError> {
    drain(path, window_limit, None)
}

fn drain(path: &Path, window_limit: u64, limit: Option<u64>) -> Result<(), ArchiveError> {
    let counter = Arc::new(AtomicU64::new(0));
    let mut reader = open_reader(path, window_limit, MIN_READ_BUF, counter.clone())?;
    let copied = match limit {
        Some(n) => io::copy(&mut reader.by_ref().take(n), &mut io::sink()),
        None => io::copy(&mut reader, &mut io::sink()),
    };
    copied
        .map(|_| ())
        .map_err(|e| classify_decode_error(path, window_limit, e, 0, counter.load(Ordering::Relaxed)))
}
