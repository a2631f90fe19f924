//! Failure propagation, exit status, stderr capture and cancellation.

use std::time::{Duration, Instant};

use piperow_core::prelude::{Row, Schema, TransformConfig};
use piperow_exec::{InputError, PipelineError, ScriptTransform};

fn transform(script: &str) -> ScriptTransform {
    let schema = Schema::utf8(&["line"]);
    ScriptTransform::new(TransformConfig::new(script), schema.clone(), schema).unwrap()
}

/// Enough input that the child cannot have buffered it all before exiting.
fn big_input() -> Vec<Row> {
    let line = "x".repeat(1000);
    (0..10_000).map(|_| Row::from_strs(&[line.as_str()])).collect()
}

#[test]
fn child_exiting_early_surfaces_the_write_failure_once() {
    let t = transform("exit 0");
    let mut it = t.execute(big_input()).unwrap();

    match it.next() {
        Some(Err(PipelineError::Write(_))) => {}
        other => panic!("expected a write failure, got {other:?}"),
    }
    assert!(it.next().is_none());
    assert!(it.next().is_none());
    assert!(!it.has_next().unwrap());
}

#[test]
fn rows_before_the_failure_are_still_delivered() {
    let t = transform("head -n 2");
    let results: Vec<Result<Row, PipelineError>> = t.execute(big_input()).unwrap().collect();

    assert_eq!(results.len(), 3);
    assert!(results[..2].iter().all(|r| r.is_ok()));
    assert!(matches!(results[2], Err(PipelineError::Write(_))));
}

#[test]
fn nonzero_exit_alone_is_not_a_failure() {
    let t = transform("cat > /dev/null; echo 'something broke' >&2; exit 3");
    let mut it = t.execute(vec![Row::from_strs(&["a"])]).unwrap();

    assert!(it.next().is_none());
    assert_eq!(it.exit_code(), Some(3));
    assert_eq!(it.stderr_tail(), Some("something broke"));
}

#[test]
fn stderr_flood_is_drained_and_bounded() {
    let mut config = TransformConfig::new("cat; head -c 200000 /dev/zero | tr '\\0' 'e' >&2; echo done >&2");
    config.stderr_tail_bytes = 64;
    let schema = Schema::utf8(&["line"]);
    let t = ScriptTransform::new(config, schema.clone(), schema).unwrap();

    let mut it = t.execute(vec![Row::from_strs(&["kept"])]).unwrap();
    assert_eq!(it.next_row().unwrap(), Some(Row::from_strs(&["kept"])));
    assert_eq!(it.next_row().unwrap(), None);

    let tail = it.stderr_tail().unwrap();
    assert!(tail.len() <= 64);
    assert!(tail.ends_with("eedone"));
}

#[test]
fn background_job_holding_stderr_does_not_delay_end_of_stream() {
    let t = transform("cat; echo bye >&2; { sleep 4; } >/dev/null </dev/null &");
    let mut it = t.execute(vec![Row::from_strs(&["only"])]).unwrap();

    let started = Instant::now();
    assert_eq!(it.next_row().unwrap(), Some(Row::from_strs(&["only"])));
    assert_eq!(it.next_row().unwrap(), None);
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    assert_eq!(it.exit_code(), Some(0));
    assert_eq!(it.stderr_tail(), Some("bye"));
}

#[test]
fn input_errors_are_reported_after_produced_rows() {
    let t = transform("cat");
    let input: Vec<Result<Row, InputError>> = vec![
        Ok(Row::from_strs(&["one"])),
        Ok(Row::from_strs(&["two"])),
        Err("upstream read failed".into()),
        Ok(Row::from_strs(&["never"])),
    ];
    let results: Vec<_> = t.execute_fallible(input).unwrap().collect();

    let (last, rows) = results.split_last().unwrap();
    assert!(matches!(last, Err(PipelineError::Input(e)) if e.to_string() == "upstream read failed"));
    assert!(rows.len() <= 2);
    assert!(rows.iter().all(|r| r.is_ok()));
}

#[test]
fn missing_interpreter_fails_at_execute() {
    let mut config = TransformConfig::new("cat");
    config.shell = vec!["/no/such/interpreter".into(), "-c".into()];
    let schema = Schema::utf8(&["line"]);
    let t = ScriptTransform::new(config, schema.clone(), schema).unwrap();

    let err = t.execute(vec![Row::from_strs(&["a"])]).err().expect("spawn must fail");
    assert!(matches!(err, PipelineError::Spawn { ref program, .. } if program == "/no/such/interpreter"));
}

#[test]
fn dropping_early_stops_an_endless_pipeline() {
    let t = transform("cat");
    let endless = std::iter::repeat(Row::from_strs(&["again"]));
    let started = Instant::now();
    {
        let mut it = t.execute(endless).unwrap();
        for _ in 0..3 {
            assert_eq!(it.next_row().unwrap(), Some(Row::from_strs(&["again"])));
        }
    }
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[test]
fn killed_child_reports_signal_exit_code() {
    let t = transform("cat > /dev/null; kill -9 $$");
    let mut it = t.execute(vec![Row::from_strs(&["a"])]).unwrap();
    assert!(it.next().is_none());
    assert_eq!(it.exit_code(), Some(128 + 9));
}
