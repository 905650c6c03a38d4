//! Two-pass join: collect matching submission ids, then keep the comments
//! whose parent resolves into that set.
//!
//! `CollectIds → ResolveComments → Done`. The id set is written once in the
//! first state and only read in the second. Between the two it can live on
//! disk, so the comments pass can run later or in another process.

use crate::idset::IdSet;
use crate::pipeline::Pipeline;
use crate::record::Record;
use crate::stats::ScanStats;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// `t3_abc` → `abc`: split once on the first `_`, keep the remainder.
/// A reference with no `_` is returned whole.
#[inline]
pub fn parent_id_of(reference: &str) -> &str {
    match reference.split_once('_') {
        Some((_, rest)) => rest,
        None => reference,
    }
}

/// Parent reference of a comment: `link_id`, else `parent_id` when it names
/// a submission (`t3_`). A `t1_` parent is a comment id and never resolves
/// against the submission set.
pub fn parent_ref(rec: &Record) -> Option<&str> {
    rec.str_field("link_id")
        .filter(|s| !s.is_empty())
        .or_else(|| rec.str_field("parent_id").filter(|s| s.starts_with("t3_")))
}

#[derive(Debug)]
pub enum JoinState {
    CollectIds,
    ResolveComments(IdSet),
    Done,
}

impl JoinState {
    fn name(&self) -> &'static str {
        match self {
            JoinState::CollectIds => "CollectIds",
            JoinState::ResolveComments(_) => "ResolveComments",
            JoinState::Done => "Done",
        }
    }
}

pub struct IdCorrelator<'p> {
    pipeline: &'p mut Pipeline,
    state: JoinState,
}

impl<'p> IdCorrelator<'p> {
    pub fn new(pipeline: &'p mut Pipeline) -> Self {
        Self { pipeline, state: JoinState::CollectIds }
    }

    /// Start directly in `ResolveComments` from an artifact written by an earlier pass.
    pub fn from_artifact(pipeline: &'p mut Pipeline, ids_path: &Path) -> Result<Self> {
        let ids = IdSet::load(ids_path).with_context(|| format!("load id artifact {}", ids_path.display()))?;
        tracing::info!(path = %ids_path.display(), ids = ids.len(), "loaded submission id set");
        Ok(Self { pipeline, state: JoinState::ResolveComments(ids) })
    }

    /// Start in `ResolveComments` with a set built elsewhere.
    pub fn with_ids(pipeline: &'p mut Pipeline, ids: IdSet) -> Self {
        Self { pipeline, state: JoinState::ResolveComments(ids) }
    }

    pub fn state(&self) -> &JoinState {
        &self.state
    }

    /// Pass 1. A cancelled pass stays in `CollectIds` and persists nothing.
    pub fn collect(&mut self, submissions: &[PathBuf], ids_out: Option<&Path>) -> Result<ScanStats> {
        if !matches!(self.state, JoinState::CollectIds) {
            bail!("collect called in state {}", self.state.name());
        }
        let (ids, stats) = self.pipeline.collect_ids(submissions, ids_out)?;
        if !stats.cancelled {
            self.state = JoinState::ResolveComments(ids);
        }
        Ok(stats)
    }

    /// Pass 2. Moves to `Done` and releases the id set.
    pub fn resolve(&mut self, comments: &[PathBuf], out_csv: &Path) -> Result<ScanStats> {
        let ids = match std::mem::replace(&mut self.state, JoinState::Done) {
            JoinState::ResolveComments(ids) => ids,
            other => {
                let name = other.name();
                self.state = other;
                bail!("resolve called in state {}", name);
            }
        };
        self.pipeline.resolve_comments(comments, &ids, out_csv)
    }
}
