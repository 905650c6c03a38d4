use redsift::{
    classify, extract, matches, parent_id_of, parent_ref, parse, truncate_text, FieldError, FilterConfig, IdSet,
    KeywordFilter, Kind, LineOutcome, ParseError, Record, Stage, TERMS_ENV,
};
use serde_json::json;
use std::io::Write;

fn rec(v: serde_json::Value) -> Record {
    parse(&v.to_string()).unwrap()
}

#[test]
fn parse_rejects_blank_and_non_object_lines() {
    assert_eq!(parse("").unwrap_err(), ParseError::Empty);
    assert_eq!(parse("   \t").unwrap_err(), ParseError::Empty);
    assert!(matches!(parse("{\"id\":").unwrap_err(), ParseError::Malformed(_)));
    match parse("[1, 2]").unwrap_err() {
        ParseError::Malformed(msg) => assert!(msg.contains("array"), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }

    let r = parse(r#"{"id":"a","n":null}"#).unwrap();
    assert_eq!(r.len(), 2);
    assert!(r.has("n"));
    assert_eq!(r.str_field("n"), None);
    assert_eq!(r.str_field("id"), Some("a"));
}

#[test]
fn classification_is_structural() {
    assert_eq!(classify(&rec(json!({"title": "t", "selftext": ""}))), Kind::Submission);
    // Both markers win even when a body is present.
    assert_eq!(classify(&rec(json!({"title": "t", "selftext": "s", "body": "b"}))), Kind::Submission);
    assert_eq!(classify(&rec(json!({"body": "b"}))), Kind::Comment);
    assert_eq!(classify(&rec(json!({"title": "t", "body": "b"}))), Kind::Comment);
    assert_eq!(classify(&rec(json!({"title": "t"}))), Kind::Unknown);
    assert_eq!(classify(&rec(json!({"selftext": null}))), Kind::Unknown);
    assert_eq!(Kind::Submission.as_str(), "submission");
    assert_eq!(Kind::Comment.as_str(), "comment");
}

#[test]
fn extract_fills_defaults_and_reads_lenient_numbers() {
    let r = rec(json!({
        "id": 42, "body": "a\nb", "created_utc": "1136073600", "score": 7.9, "num_comments": "12"
    }));
    let row = extract(&r, Kind::Comment, None).unwrap();
    assert_eq!(row.id, "42");
    assert_eq!(row.subreddit, "");
    assert_eq!(row.author, "");
    assert_eq!(row.permalink, "");
    assert_eq!(row.score, 7);
    assert_eq!(row.num_comments, 12);
    assert_eq!(row.title, None);
    assert_eq!(row.text, "a b");
    assert_eq!(row.created_iso(), "2006-01-01T00:00:00");

    let s = rec(json!({"title": null, "selftext": "body", "created_utc": 0}));
    let row = extract(&s, Kind::Submission, Some(2)).unwrap();
    assert_eq!(row.title.as_deref(), Some(""));
    assert_eq!(row.text, "bo...");
    assert_eq!(row.created_iso(), "1970-01-01T00:00:00");
}

#[test]
fn extract_requires_a_valid_created_utc() {
    let missing = rec(json!({"body": "x"}));
    assert_eq!(extract(&missing, Kind::Comment, None).unwrap_err(), FieldError::MissingCreatedAt);
    let null = rec(json!({"body": "x", "created_utc": null}));
    assert_eq!(extract(&null, Kind::Comment, None).unwrap_err(), FieldError::MissingCreatedAt);
    let text = rec(json!({"body": "x", "created_utc": "soon"}));
    assert_eq!(extract(&text, Kind::Comment, None).unwrap_err(), FieldError::InvalidCreatedAt);
    let huge = rec(json!({"body": "x", "created_utc": i64::MAX}));
    assert_eq!(extract(&huge, Kind::Comment, None).unwrap_err(), FieldError::InvalidCreatedAt);
}

#[test]
fn truncation_counts_chars_not_bytes() {
    assert_eq!(truncate_text("abc", 3), None);
    assert_eq!(truncate_text("abcd", 3).as_deref(), Some("abc..."));
    assert_eq!(truncate_text("ééé", 2).as_deref(), Some("éé..."));
    assert_eq!(truncate_text("x", 0).as_deref(), Some("..."));
    assert_eq!(truncate_text("", 0), None);
}

#[test]
fn parent_references_split_on_the_first_underscore() {
    assert_eq!(parent_id_of("t3_abc"), "abc");
    assert_eq!(parent_id_of("abc"), "abc");
    assert_eq!(parent_id_of("t1_a_b"), "a_b");
    assert_eq!(parent_id_of(""), "");

    assert_eq!(parent_ref(&rec(json!({"link_id": "t3_x", "parent_id": "t1_y"}))), Some("t3_x"));
    assert_eq!(parent_ref(&rec(json!({"link_id": "", "parent_id": "t3_y"}))), Some("t3_y"));
    // A `t1_` parent is a comment id; it never stands in for the submission.
    assert_eq!(parent_ref(&rec(json!({"link_id": "", "parent_id": "t1_y"}))), None);
    assert_eq!(parent_ref(&rec(json!({"parent_id": "t1_y"}))), None);
    assert_eq!(parent_ref(&rec(json!({"body": "x"}))), None);
}

#[test]
fn keyword_filter_is_case_insensitive_substring() {
    let f = KeywordFilter::new(["Debt", "deficit"]);
    assert_eq!(f.terms(), &["debt".to_string(), "deficit".to_string()]);
    assert!(f.matches_parts(Some("NATIONAL DEBT"), ""));
    assert!(f.matches_parts(None, "we are indebted"));
    assert!(f.matches_parts(Some("Budget"), "Deficits"));
    assert!(!f.matches_parts(Some("De"), "bt"), "title and text are joined by a space");
    assert!(!f.matches_parts(None, "nothing here"));

    let empty = KeywordFilter::new(Vec::<String>::new());
    assert!(!empty.matches_parts(Some("debt"), "debt"));
}

#[test]
fn free_function_filter_agrees_with_the_automaton() {
    let terms = vec!["national debt".to_string()];
    let f = KeywordFilter::new(&terms);
    for (title, text) in [(Some("The National Debt"), ""), (None, "national  debt"), (None, "NATIONAL DEBT!")] {
        let r = if let Some(t) = title {
            rec(json!({"title": t, "selftext": text, "created_utc": 1}))
        } else {
            rec(json!({"body": text, "created_utc": 1}))
        };
        let row = extract(&r, classify(&r), None).unwrap();
        assert_eq!(f.matches(&row), matches(&row, &terms), "{title:?} {text:?}");
    }
}

#[test]
fn process_line_applies_the_cap_after_filtering() {
    let f = KeywordFilter::new(["needle"]);
    let line = json!({"body": "hay hay hay needle", "created_utc": 1, "id": "c"}).to_string();
    match redsift::process_line(&line, Stage::Filter(&f), Some(3)) {
        LineOutcome::Matched(row) => assert_eq!(row.text, "hay..."),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(redsift::process_line("nope", Stage::Filter(&f), None), LineOutcome::Malformed));

    let ids: IdSet = ["p"].into_iter().collect();
    let comment = json!({"body": "x", "link_id": "t3_p"}).to_string();
    assert!(
        matches!(redsift::process_line(&comment, Stage::ResolveComments(&ids), None), LineOutcome::Field(_)),
        "parent resolves, then the missing timestamp is reported"
    );
    let orphan = json!({"body": "x", "link_id": "t3_q"}).to_string();
    assert!(matches!(redsift::process_line(&orphan, Stage::ResolveComments(&ids), None), LineOutcome::Unresolved));
}

#[test]
fn config_normalizes_terms_from_every_source() {
    let dir = tempfile::tempdir().unwrap();
    let terms_file = dir.path().join("terms.txt");
    let mut f = std::fs::File::create(&terms_file).unwrap();
    writeln!(f, "# economics").unwrap();
    writeln!(f, "  Deficit ").unwrap();
    writeln!(f).unwrap();
    writeln!(f, "national debt").unwrap();
    drop(f);

    let cfg = FilterConfig::new(["National Debt", " ", "budget"]).with_terms_file(&terms_file).unwrap();
    assert_eq!(cfg.terms, vec!["budget", "deficit", "national debt"]);
    assert!(FilterConfig::new(["x"]).with_terms_file(&dir.path().join("missing.txt")).is_err());
}

#[test]
fn env_terms_are_merged_and_normalized() {
    std::env::set_var(TERMS_ENV, " Budget ;national debt,, DEFICIT");
    let cfg = FilterConfig::new(["national debt", "inflation"]).with_env_terms();
    std::env::remove_var(TERMS_ENV);

    assert_eq!(cfg.terms, vec!["budget", "deficit", "inflation", "national debt"]);
    // Unset: the list is left alone.
    assert_eq!(FilterConfig::new(["x"]).with_env_terms().terms, vec!["x"]);
}

#[test]
fn window_log_is_floor_log2_clamped() {
    let cfg = FilterConfig::new(["x"]);
    assert_eq!(cfg.window_log_max(), 31);
    assert_eq!(cfg.clone().with_window_limit((1 << 20) + 5).window_log_max(), 20);
    assert_eq!(cfg.clone().with_window_limit(100).window_log_max(), 10);
    assert_eq!(cfg.with_window_limit(u64::MAX).window_log_max(), 31);
}

#[test]
fn id_set_loads_and_answers_membership() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("ids.txt");
    std::fs::write(&p, "a\n b\n\nc").unwrap();
    let ids = IdSet::load(&p).unwrap();
    assert_eq!(ids.len(), 3);
    assert!(ids.contains("b"));
    assert!(!ids.contains(""));
}
