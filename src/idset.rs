//! Membership-only set of qualifying submission ids, plus its newline-delimited
//! side artifact (`<id>\n` per line, unique, in first-seen order).

use crate::util::{create_file, open_file, promote_file, tmp_path_for};
use ahash::AHashSet;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Read-only after the collection pass; O(1) average lookups.
#[derive(Clone, Debug, Default)]
pub struct IdSet {
    ids: AHashSet<String>,
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Load a persisted artifact. Blank lines and surrounding whitespace are ignored.
    pub fn load(path: &Path) -> io::Result<Self> {
        let rdr = BufReader::with_capacity(64 * 1024, open_file(path)?);
        let mut ids = AHashSet::new();
        for line in rdr.lines() {
            let line = line?;
            let id = line.trim();
            if !id.is_empty() {
                ids.insert(id.to_string());
            }
        }
        Ok(Self { ids })
    }
}

impl<S: Into<String>> FromIterator<S> for IdSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self { ids: iter.into_iter().map(Into::into).collect() }
    }
}

/// The artifact while it is being written: lines go to `<dest>.tmp`, and
/// `dest` only appears once the pass commits.
struct PendingArtifact {
    tmp: PathBuf,
    dest: PathBuf,
    w: BufWriter<File>,
}

impl PendingArtifact {
    fn create(dest: &Path, buf_bytes: usize) -> io::Result<Self> {
        let tmp = tmp_path_for(dest);
        let file = create_file(&tmp)?;
        Ok(Self { w: BufWriter::with_capacity(buf_bytes.max(8 * 1024), file), tmp, dest: dest.to_path_buf() })
    }

    fn push(&mut self, id: &str) -> io::Result<()> {
        self.w.write_all(id.as_bytes())?;
        self.w.write_all(b"\n")
    }

    fn commit(mut self) -> Result<()> {
        self.w.flush().with_context(|| format!("flush {}", self.tmp.display()))?;
        self.w.get_ref().sync_all().with_context(|| format!("sync {}", self.tmp.display()))?;
        drop(self.w);
        promote_file(&self.tmp, &self.dest)
    }

    fn discard(self) {
        drop(self.w);
        if let Err(e) = fs::remove_file(&self.tmp) {
            tracing::debug!(path = %self.tmp.display(), error = %e, "could not remove partial id artifact");
        }
    }
}

/// Single writer for the collection pass: dedups in memory and streams each
/// new id to a temp file that is promoted only by [`IdSetBuilder::finish`].
pub struct IdSetBuilder {
    set: IdSet,
    out: Option<PendingArtifact>,
}

impl IdSetBuilder {
    /// In-memory only; nothing is persisted.
    pub fn in_memory() -> Self {
        Self { set: IdSet::new(), out: None }
    }

    /// Persist to `path` on finish (written to `<path>.tmp` meanwhile).
    pub fn persisted(path: &Path, write_buf: usize) -> io::Result<Self> {
        Ok(Self { set: IdSet::new(), out: Some(PendingArtifact::create(path, write_buf)?) })
    }

    /// Returns true if `id` was new.
    pub fn insert(&mut self, id: &str) -> io::Result<bool> {
        if id.is_empty() || self.set.ids.contains(id) {
            return Ok(false);
        }
        self.set.ids.insert(id.to_string());
        if let Some(out) = &mut self.out {
            out.push(id)?;
        }
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Flush and atomically promote the artifact, then hand back the set.
    pub fn finish(self) -> Result<IdSet> {
        if let Some(out) = self.out {
            out.commit()?;
        }
        Ok(self.set)
    }

    /// Drop the temp artifact without promoting it (failed or cancelled pass).
    pub fn abandon(self) {
        if let Some(out) = self.out {
            out.discard();
        }
    }
}
