//! Tracing setup and file operations that tolerate transient sharing errors
//! (AV scanners, backup agents and network volumes hold dumps open briefly).

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::thread::sleep;
use std::time::Duration;

static TRACING: Once = Once::new();

/// Install the stderr `fmt` subscriber once per process. `RUST_LOG` wins,
/// otherwise `info`.
pub fn init_tracing_once() {
    TRACING.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    });
}

/// Linear backoff for file operations: attempt `n` waits `n * step` first.
#[derive(Clone, Copy, Debug)]
pub struct Retry {
    pub attempts: usize,
    pub step: Duration,
}

impl Retry {
    /// Opening and creating archives and tables.
    pub const OPEN: Retry = Retry { attempts: 16, step: Duration::from_millis(50) };
    /// Promoting the id artifact.
    pub const RENAME: Retry = Retry { attempts: 20, step: Duration::from_millis(50) };

    pub fn run<T>(self, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if attempt + 1 < self.attempts && is_transient(&e) => {
                    attempt += 1;
                    tracing::debug!(attempt, error = %e, "transient io error, retrying");
                    sleep(self.step * attempt as u32);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Windows codes for access-denied, sharing/lock violations, device-not-ready
/// and mapped-section conflicts. Everything else fails immediately.
#[cfg(windows)]
fn is_transient(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(5 | 21 | 32 | 33 | 1117 | 1224))
}

#[cfg(not(windows))]
fn is_transient(_e: &io::Error) -> bool {
    false
}

pub fn open_file(path: &Path) -> io::Result<File> {
    Retry::OPEN.run(|| File::open(path))
}

pub fn create_file(path: &Path) -> io::Result<File> {
    Retry::OPEN.run(|| File::create(path))
}

/// `<dest>.tmp`, next to `dest`.
pub fn tmp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}

/// Move `tmp` over `dest`. On Unix the rename replaces `dest` atomically;
/// Windows refuses to rename onto an existing file, so `dest` goes first
/// there. Falls back to copy and delete when the rename is refused.
pub fn promote_file(tmp: &Path, dest: &Path) -> Result<()> {
    if cfg!(windows) && dest.exists() {
        Retry::RENAME
            .run(|| match fs::remove_file(dest) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            })
            .with_context(|| format!("remove stale {}", dest.display()))?;
    }
    if let Err(e) = Retry::RENAME.run(|| fs::rename(tmp, dest)) {
        tracing::debug!(error = %e, "rename refused, copying instead");
        Retry::RENAME
            .run(|| fs::copy(tmp, dest))
            .with_context(|| format!("copy {} -> {}", tmp.display(), dest.display()))?;
        Retry::RENAME
            .run(|| fs::remove_file(tmp))
            .with_context(|| format!("remove {}", tmp.display()))?;
    }
    Ok(())
}
