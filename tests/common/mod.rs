#![allow(dead_code)]

use serde_json::json;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write a compressed `.zst` file containing the provided JSONL lines.
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    write_zst_bytes(path, lines.join("\n").as_bytes(), None);
}

/// Compress raw bytes (a trailing newline is appended), optionally forcing a
/// frame window of `2^window_log` bytes.
pub fn write_zst_bytes(path: &Path, body: &[u8], window_log: Option<u32>) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    if let Some(log) = window_log {
        enc.window_log(log).unwrap();
    }
    enc.write_all(body).unwrap();
    enc.write_all(b"\n").unwrap();
    enc.finish().unwrap();
}

/// Append non-zstd garbage after the last valid frame.
pub fn append_garbage(path: &Path) {
    let mut f = fs::OpenOptions::new().append(true).open(path).unwrap();
    f.write_all(b"this is definitely not a zstd frame, just trailing junk bytes").unwrap();
}

pub struct Row {
    pub fields: Vec<String>,
}

impl Row {
    pub fn get(&self, col: &str) -> &str {
        let idx = redsift::HEADER.iter().position(|h| *h == col).unwrap();
        &self.fields[idx]
    }
}

/// Read the output table; asserts the header matches the fixed schema.
pub fn read_rows(path: &Path) -> Vec<Row> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let header: Vec<String> = rdr.headers().unwrap().iter().map(|s| s.to_string()).collect();
    assert_eq!(header, redsift::HEADER.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    rdr.records()
        .map(|r| Row { fields: r.unwrap().iter().map(|s| s.to_string()).collect() })
        .collect()
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path).unwrap().lines().map(|s| s.to_string()).collect()
}

pub fn submission(id: &str, title: &str, selftext: &str, created: i64) -> String {
    json!({
        "author": "bob", "created_utc": created, "domain": "self.Economics", "id": id,
        "is_self": true, "num_comments": 4, "over_18": false, "score": 17,
        "selftext": selftext, "title": title, "subreddit": "Economics",
        "permalink": format!("/r/Economics/comments/{id}/x/"),
        "url": format!("https://www.reddit.com/r/Economics/comments/{id}/x/")
    })
    .to_string()
}

pub fn comment(id: &str, link_id: &str, body: &str, created: i64) -> String {
    json!({
        "author": "alice", "body": body, "controversiality": 0, "created_utc": created,
        "id": id, "link_id": link_id, "parent_id": link_id, "score": 3,
        "subreddit": "Economics", "permalink": format!("/r/Economics/comments/x/y/{id}/")
    })
    .to_string()
}

/// The reference scenario: 3 submissions (only `s2` mentions "national debt"
/// in its title) and 2 comments (one under `s2`, one under `s3`).
pub fn make_scenario() -> (tempfile::TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let subs = dir.path().join("Economics_submissions.zst");
    let cmts = dir.path().join("Economics_comments.zst");

    write_zst_lines(
        &subs,
        &[
            submission("s1", "Interest rates rise again", "The Fed moved today.", 1136073600),
            submission("s2", "What the National Debt means for you", "", 1136073700),
            submission("s3", "Housing market", "prices are up", 1136073800),
        ],
    );
    write_zst_lines(
        &cmts,
        &[
            comment("c1", "t3_s2", "It is mostly held domestically.\nSee the data.", 1136074600),
            comment("c2", "t3_s3", "Rents too, national debt aside", 1136074700),
        ],
    );
    (dir, subs, cmts)
}

/// Mixed archive for the standalone filter: submissions, comments, an
/// unknown record, and a comment with no `created_utc`.
pub fn make_mixed_archive(dir: &Path) -> PathBuf {
    let path = dir.join("mixed.zst");
    write_zst_lines(&path, &mixed_lines());
    path
}

pub fn mixed_lines() -> Vec<String> {
    vec![
        submission("s1", "National Debt hits record", "Long body text here", 1136073600),
        submission("s2", "Cats", "a story about the national deficit", 1136073601),
        submission("s3", "Dogs", "nothing to see", 1136073602),
        comment("c1", "t3_s3", "The NATIONAL DEBT is fine", 1136073603),
        comment("c2", "t3_s3", "unrelated", 1136073604),
        json!({"id": "x1", "kind": "t5", "display_name": "Economics"}).to_string(),
        json!({"id": "c3", "body": "national debt but no timestamp", "link_id": "t3_s1"}).to_string(),
    ]
}
