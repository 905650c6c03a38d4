//! Keyword filter: case-insensitive substring match of the configured terms
//! against `title + " " + text`.

use crate::normalize::FieldSet;
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

/// Multi-pattern matcher over lowercased haystacks. Terms are not
/// word-bounded: "debt" matches inside "indebted".
#[derive(Clone, Debug)]
pub struct KeywordFilter {
    terms: Vec<String>,
    ac: Option<AhoCorasick>,
}

impl KeywordFilter {
    /// Build from lowercase terms. An empty list matches nothing.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: Vec<String> = terms.into_iter().map(|t| t.as_ref().to_lowercase()).collect();
        let ac = if terms.is_empty() {
            None
        } else {
            // Automaton build only fails on pathological pattern sets; fall back
            // to the naive scan in that case.
            AhoCorasickBuilder::new()
                .match_kind(MatchKind::Standard)
                .prefilter(true)
                .build(&terms)
                .map_err(|e| tracing::warn!("keyword automaton unavailable, using naive scan: {e}"))
                .ok()
        };
        Self { terms, ac }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// True iff any term occurs in the lowercased `title + " " + text`.
    pub fn matches(&self, row: &FieldSet) -> bool {
        self.matches_parts(row.title.as_deref(), &row.text)
    }

    pub fn matches_parts(&self, title: Option<&str>, text: &str) -> bool {
        if self.terms.is_empty() {
            return false;
        }
        let mut hay = String::with_capacity(title.map_or(0, str::len) + text.len() + 1);
        if let Some(t) = title {
            hay.push_str(t);
            hay.push(' ');
        }
        hay.push_str(text);
        self.matches_haystack(&hay.to_lowercase())
    }

    /// `hay` must already be lowercase.
    #[inline]
    pub fn matches_haystack(&self, hay: &str) -> bool {
        match &self.ac {
            Some(ac) => ac.is_match(hay),
            None => self.terms.iter().any(|t| hay.contains(t.as_str())),
        }
    }
}

/// Free-function form: does `row` contain any of `terms`?
pub fn matches(row: &FieldSet, terms: &[String]) -> bool {
    let hay = match &row.title {
        Some(t) => format!("{} {}", t, row.text),
        None => row.text.clone(),
    }
    .to_lowercase();
    terms.iter().any(|t| hay.contains(t.to_lowercase().as_str()))
}
