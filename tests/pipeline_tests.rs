//! End-to-end runs through real shell scripts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use piperow_core::prelude::{Row, RowBatch, Scalar, Schema, TransformConfig};
use piperow_exec::{LaunchedProcess, PipelineError, ProcessLauncher, ProcessOrchestrator, ScriptTransform};

fn transform(script: &str, columns: &[&str]) -> ScriptTransform {
    ScriptTransform::new(
        TransformConfig::new(script),
        Schema::utf8(columns),
        Schema::utf8(columns),
    )
    .unwrap()
}

fn kv_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| Row::from_strs(&[format!("k{i}"), format!("v{i}")]))
        .collect()
}

#[derive(Default)]
struct CountingLauncher {
    calls: AtomicUsize,
}

impl ProcessLauncher for CountingLauncher {
    fn launch(&self, argv: &[String]) -> Result<LaunchedProcess, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ProcessOrchestrator.launch(argv)
    }
}

#[test]
fn cat_echoes_rows_in_order() {
    let t = transform("cat", &["key", "value"]);
    let input = kv_rows(5);
    let mut it = t.execute(input.clone()).unwrap();
    let out: Vec<Row> = it.by_ref().collect::<Result<_, _>>().unwrap();

    assert_eq!(out, input);
    assert!(it.is_finished());
    assert_eq!(it.exit_code(), Some(0));
    assert_eq!(it.records_fed(), Some(5));
    assert_eq!(it.stderr_tail(), Some(""));
}

#[test]
fn script_can_rewrite_records() {
    let t = transform("tr a-z A-Z", &["key", "value"]);
    let out: Vec<Row> = t
        .execute(vec![Row::from_strs(&["ab", "cd"])])
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(out, vec![Row::from_strs(&["AB", "CD"])]);
}

#[test]
fn script_may_emit_more_rows_than_it_reads() {
    let t = transform("cat; printf 'extra\\trow\\n'", &["key", "value"]);
    let out: Vec<Row> = t
        .execute(kv_rows(2))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out[2], Row::from_strs(&["extra", "row"]));
}

#[test]
fn schema_less_output_keeps_the_rest_in_value() {
    let mut config = TransformConfig::new("awk '{ print $1 \"\\tx\\ty\" }'");
    config.output.schema_less = true;
    let t = ScriptTransform::new(config, Schema::utf8(&["a"]), Schema::utf8(&["key", "value"])).unwrap();

    let out: Vec<Row> = t
        .execute(vec![Row::from_strs(&["k"])])
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(out, vec![Row::from_strs(&["k", "x\ty"])]);
}

#[test]
fn nulls_and_numbers_are_stringified_for_the_script() {
    let t = transform("cat", &["a", "b", "c"]);
    let input = vec![Row::new(vec![Scalar::I64(42), Scalar::Null, Scalar::Bool(true)])];
    let out: Vec<Row> = t.execute(input).unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(out, vec![Row::from_strs(&["42", "\\N", "true"])]);
}

#[test]
fn empty_input_never_starts_the_script() {
    let spy = Arc::new(CountingLauncher::default());
    let t = transform("cat", &["a"]).with_launcher(spy.clone());

    let mut it = t.execute(Vec::<Row>::new()).unwrap();
    assert!(!it.has_next().unwrap());
    assert!(it.next().is_none());
    assert_eq!(spy.calls.load(Ordering::SeqCst), 0);

    let out: Vec<Row> = t.execute(kv_rows(1)).unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_input_skips_even_a_broken_shell() {
    let mut config = TransformConfig::new("cat");
    config.shell = vec!["/no/such/interpreter".into()];
    let t = ScriptTransform::new(config, Schema::utf8(&["a"]), Schema::utf8(&["a"])).unwrap();
    assert_eq!(t.execute(Vec::<Row>::new()).unwrap().count(), 0);
}

#[test]
fn large_volumes_do_not_deadlock() {
    // far beyond the pipe buffers in both directions
    let n = 100_000;
    let t = transform("cat", &["key", "value"]);
    let mut count = 0;
    for row in t.execute(kv_rows(n)).unwrap() {
        let row = row.unwrap();
        if count == n - 1 {
            assert_eq!(row, Row::from_strs(&[format!("k{}", n - 1), format!("v{}", n - 1)]));
        }
        count += 1;
    }
    assert_eq!(count, n);
}

#[test]
fn lazy_input_is_pulled_on_the_feeder_thread() {
    let t = transform("cat", &["n"]);
    let input = (0..1000).map(|i| Row::from_strs(&[i.to_string()]));
    let total: usize = t
        .execute(input)
        .unwrap()
        .map(|r| r.unwrap().get(0).and_then(|v| v.as_str()).map_or(0, |s| s.parse::<usize>().unwrap()))
        .sum();
    assert_eq!(total, (0..1000).sum::<usize>());
}

#[test]
fn has_next_is_idempotent() {
    let t = transform("cat", &["key", "value"]);
    let mut it = t.execute(kv_rows(1)).unwrap();
    assert!(it.has_next().unwrap());
    assert!(it.has_next().unwrap());
    assert_eq!(it.next_row().unwrap(), Some(Row::from_strs(&["k0", "v0"])));
    assert!(!it.has_next().unwrap());
    assert!(!it.has_next().unwrap());
    assert_eq!(it.next_row().unwrap(), None);
    assert_eq!(it.rows_read(), 1);
}

#[test]
fn each_execute_runs_a_fresh_child() {
    let t = transform("cat", &["key", "value"]);
    for _ in 0..3 {
        let out: Vec<Row> = t.execute(kv_rows(2)).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(out, kv_rows(2));
    }
}

#[test]
fn eval_batch_collects_into_output_schema() {
    let schema = Schema::utf8(&["key", "value"]);
    let t = ScriptTransform::new(
        TransformConfig::new("cut -f1"),
        schema,
        Schema::utf8(&["key", "value"]),
    )
    .unwrap();
    let batch = RowBatch::from_rows(t.input_schema(), &kv_rows(3)).unwrap();

    let out = t.eval_batch(&batch).unwrap();
    assert_eq!(out.num_rows(), 3);
    assert_eq!(out.columns[0].values[2], Scalar::from("k2"));
    // short rows are padded with nulls
    assert_eq!(out.columns[1].values[0], Scalar::Null);
}
