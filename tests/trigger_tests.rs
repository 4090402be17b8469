//! Trigger matrix and censorship on chunked output.

use par_autorun::triggers::{
    NamedRegexSearch, OutputCensor, ReadLogic, TriggerHit, TriggerMatrix, TriggerRow,
};
use parking_lot::Mutex;
use std::sync::Arc;

fn collect(matrix: &mut TriggerMatrix, chunks: &[&str]) -> Vec<(String, Vec<TriggerHit>)> {
    let mut out = Vec::new();
    for chunk in chunks {
        matrix.feed(chunk, |line, hits| out.push((line.to_string(), hits.to_vec())));
    }
    out
}

#[test]
fn test_partial_chunks_join_into_one_line() {
    let mut matrix = TriggerMatrix::new();
    let out = collect(&mut matrix, &["foo", "bar\n"]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, "foobar\n");
    assert!(matrix.pending().is_empty());
}

#[test]
fn test_line_split_across_many_chunks_with_carriage_returns() {
    let mut row = TriggerRow::new("status");
    row.add_search(NamedRegexSearch::new("code", r"status=(\d+)$").with_groups(vec![1]));
    let mut matrix = TriggerMatrix::new();
    matrix.add_row(row);

    let out = collect(&mut matrix, &["sta", "tus=2", "00\r", "\nnext"]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].1.len(), 1);
    assert_eq!(out[0].1[0].value, "200");
    assert_eq!(matrix.pending(), "next");

    let mut flushed = Vec::new();
    assert!(matrix.flush(|line, _| flushed.push(line.to_string())));
    assert_eq!(flushed, vec!["next"]);
    assert!(!matrix.flush(|_, _| {}));
}

#[test]
fn test_row_callback_fires_once_per_line() {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fired);
    let mut row = TriggerRow::new("errors").with_callback(move |value| {
        sink.lock().push(value.to_string());
    });
    row.add_search(NamedRegexSearch::new("err", "error"));
    row.add_search(NamedRegexSearch::new("fatal", "fatal error"));
    let mut matrix = TriggerMatrix::new();
    matrix.add_row(row);

    let out = collect(&mut matrix, &["fatal error here\nall good\n"]);
    assert_eq!(out[0].1.len(), 2, "both searches hit");
    assert!(out[1].1.is_empty());
    assert_eq!(*fired.lock(), vec!["error"]);
}

#[test]
fn test_one_shot_search_in_matrix() {
    let mut row = TriggerRow::new("vars");
    row.add_search(
        NamedRegexSearch::new("x", r"value (\w+)")
            .with_groups(vec![1])
            .with_read_logic(ReadLogic::IgnoreAfterFirstMatch),
    );
    let mut matrix = TriggerMatrix::new();
    matrix.add_row(row);

    let out = collect(
        &mut matrix,
        &["value X\n", "l2\n", "l3\n", "l4\n", "value Y\n"],
    );
    let hits: Vec<&str> = out
        .iter()
        .flat_map(|(_, hits)| hits.iter().map(|h| h.value.as_str()))
        .collect();
    assert_eq!(hits, vec!["X"]);
    assert!(matrix.row("vars").unwrap().searches()[0].ignore);
}

#[test]
fn test_only_last_line_search_skips_buffered_lines() {
    let mut row = TriggerRow::new("prompt");
    row.add_search(NamedRegexSearch::new("p", r"^> $").with_read_logic(ReadLogic::OnlyLastLine));
    let mut matrix = TriggerMatrix::new();
    matrix.add_row(row);

    let out = collect(&mut matrix, &["> \n> \nwork\n> \n"]);
    let hit_lines: Vec<usize> = out
        .iter()
        .enumerate()
        .filter(|(_, (_, hits))| !hits.is_empty())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(hit_lines, vec![3]);
}

#[test]
fn test_censor_block_across_chunks() {
    let mut censor = OutputCensor::new();
    censor.add_censor_line_trigger("password");
    censor.add_censorship_trigger("-----BEGIN");
    censor.add_uncensorship_trigger("-----END");

    let mut printed = Vec::new();
    for chunk in [
        "visible 1\npassword: hunter2\n-----BEG",
        "IN KEY-----\nabc\ndef\n-----END KEY-----\nvis",
        "ible 2\n",
    ] {
        censor.feed(chunk, |line| printed.push(line.to_string()));
    }

    assert_eq!(printed, vec!["visible 1\n", "visible 2\n"]);
    assert_eq!(censor.hidden_lines(), 5);
    assert!(censor.is_output_enabled());
}

#[test]
fn test_clearing_censorship_rows() {
    let mut censor = OutputCensor::new();
    censor.add_censorship_trigger("stop");
    censor.add_censor_line_trigger("x");
    censor.clear_censorship_triggers();
    censor.clear_censor_line_triggers();

    let mut printed = Vec::new();
    censor.feed("stop\nx\n", |line| printed.push(line.to_string()));
    assert_eq!(printed, vec!["stop\n", "x\n"]);
}

#[test]
fn test_invalid_pattern_never_matches() {
    let mut censor = OutputCensor::new();
    censor.add_censor_line_trigger("(unclosed");
    let mut printed = Vec::new();
    censor.feed("(unclosed\n", |line| printed.push(line.to_string()));
    assert_eq!(printed, vec!["(unclosed\n"]);
}
