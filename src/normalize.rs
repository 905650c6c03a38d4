//! Structural classification and canonical row extraction.

use crate::error::FieldError;
use crate::record::Record;
use serde_json::Value;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// Marker appended to truncated text.
pub const ELLIPSIS: &str = "...";

const CREATED_FMT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Submission,
    Comment,
    Unknown,
}

impl Kind {
    /// Value written to the `type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Submission => "submission",
            Kind::Comment => "comment",
            Kind::Unknown => "unknown",
        }
    }
}

/// Canonical output row.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSet {
    pub id: String,
    pub created_at: OffsetDateTime,
    pub subreddit: String,
    pub author: String,
    pub score: i64,
    pub num_comments: i64,
    pub kind: Kind,
    pub title: Option<String>, // Some only for submissions
    pub text: String,
    pub permalink: String,
}

impl FieldSet {
    /// `created_at` as `YYYY-MM-DDTHH:MM:SS` (UTC, no offset suffix).
    pub fn created_iso(&self) -> String {
        self.created_at
            .format(CREATED_FMT)
            .unwrap_or_else(|_| self.created_at.unix_timestamp().to_string())
    }

    /// Apply the text cap in place; see [`truncate_text`].
    pub fn cap_text(&mut self, max_text_len: Option<usize>) {
        if let Some(cap) = max_text_len {
            if let Some(t) = truncate_text(&self.text, cap) {
                self.text = t;
            }
        }
    }
}

/// Submission iff both `title` and `selftext` are present; comment iff `body`
/// is present without both submission markers.
pub fn classify(rec: &Record) -> Kind {
    let has_title = rec.has("title");
    let has_selftext = rec.has("selftext");
    if has_title && has_selftext {
        Kind::Submission
    } else if rec.has("body") {
        Kind::Comment
    } else {
        Kind::Unknown
    }
}

/// Build the canonical row for a classified record.
///
/// Only `created_utc` is required. Optional strings default to `""` and the
/// counters to 0. Newlines in the text become spaces so each row stays on
/// one output line, then the cap (in chars) is applied.
pub fn extract(rec: &Record, kind: Kind, max_text_len: Option<usize>) -> Result<FieldSet, FieldError> {
    let created_at = created_at(rec)?;

    let (title, raw_text) = match kind {
        Kind::Submission => (Some(string_field(rec, "title")), rec.str_field("selftext")),
        _ => (None, rec.str_field("body")),
    };

    let mut row = FieldSet {
        id: string_field(rec, "id"),
        created_at,
        subreddit: string_field(rec, "subreddit"),
        author: string_field(rec, "author"),
        score: int_field(rec, "score"),
        num_comments: int_field(rec, "num_comments"),
        kind,
        title,
        text: single_line(raw_text.unwrap_or("")),
        permalink: string_field(rec, "permalink"),
    };
    row.cap_text(max_text_len);
    Ok(row)
}

/// Returns the truncated text when `s` is longer than `cap` chars, else `None`.
pub fn truncate_text(s: &str, cap: usize) -> Option<String> {
    let (cut, _) = s.char_indices().nth(cap)?;
    let mut out = String::with_capacity(cut + ELLIPSIS.len());
    out.push_str(&s[..cut]);
    out.push_str(ELLIPSIS);
    Some(out)
}

/// Each `\n` / `\r` becomes one space.
pub fn single_line(s: &str) -> String {
    if !s.contains(['\n', '\r']) {
        return s.to_string();
    }
    s.replace(['\n', '\r'], " ")
}

fn created_at(rec: &Record) -> Result<OffsetDateTime, FieldError> {
    let secs = match rec.get("created_utc") {
        None | Some(Value::Null) => return Err(FieldError::MissingCreatedAt),
        Some(v) => as_i64_lenient(v).ok_or(FieldError::InvalidCreatedAt)?,
    };
    OffsetDateTime::from_unix_timestamp(secs).map_err(|_| FieldError::InvalidCreatedAt)
}

fn string_field(rec: &Record, key: &str) -> String {
    match rec.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn int_field(rec: &Record, key: &str) -> i64 {
    rec.get(key).and_then(as_i64_lenient).unwrap_or(0)
}

/// Integer from a JSON number (floats truncated) or a numeric string.
fn as_i64_lenient(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && f.abs() < i64::MAX as f64).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}
