#![forbid(unsafe_code)]

//! End-to-end conformance for the full pipeline: buffer in, report out,
//! checked against fixed expectations and the oracle model.

use mf_conformance::{colliding_keys, dataset, dataset_from_pairs, oracle_fold, oracle_report};
use mf_engine::{EngineError, EngineOptions, aggregate, aggregate_parallel, run};
use mf_report::{ReportOptions, ReportScale};
use mf_table::TableError;

// ---------------------------------------------------------------------------
// Fixed-expectation fixtures
// ---------------------------------------------------------------------------

#[test]
fn e2e_worked_example_report() {
    let buf = dataset(&[
        ("Hamburg", "12.3"),
        ("HafenCity", "-3.5"),
        ("Hamburg", "15.1"),
    ]);
    let outcome = run(&buf, &EngineOptions::default()).expect("run");
    assert_eq!(
        outcome.report,
        "{HafenCity=-35/-35/-35, Hamburg=137/123/151}"
    );
    assert_eq!(outcome.trace.records, 3);
    assert_eq!(outcome.trace.distinct_keys, 2);
}

#[test]
fn e2e_single_record_dataset() {
    let outcome = run(b"Oslo;-0.1\n", &EngineOptions::default()).expect("run");
    assert_eq!(outcome.report, "{Oslo=-1/-1/-1}");
}

#[test]
fn e2e_empty_dataset() {
    let outcome = run(b"", &EngineOptions::default()).expect("run");
    assert_eq!(outcome.report, "{}");
}

#[test]
fn e2e_average_truncates_toward_zero() {
    // sum = -5 tenths over 2 readings: avg must be -2, not -3.
    let buf = dataset(&[("x", "-0.2"), ("x", "-0.3")]);
    let outcome = run(&buf, &EngineOptions::default()).expect("run");
    assert_eq!(outcome.report, "{x=-2/-3/-2}");
}

#[test]
fn e2e_prefix_keys_sort_ascending() {
    let buf = dataset(&[("Romero", "1.0"), ("Rome", "2.0"), ("Rom", "3.0")]);
    let outcome = run(&buf, &EngineOptions::default()).expect("run");
    assert_eq!(
        outcome.report,
        "{Rom=30/30/30, Rome=20/20/20, Romero=10/10/10}"
    );
}

#[test]
fn e2e_decimal_scale_report() {
    let buf = dataset(&[
        ("Hamburg", "12.3"),
        ("HafenCity", "-3.5"),
        ("Hamburg", "15.1"),
    ]);
    let options = EngineOptions {
        report: ReportOptions {
            scale: ReportScale::Decimal,
        },
        ..EngineOptions::default()
    };
    let outcome = run(&buf, &options).expect("run");
    assert_eq!(
        outcome.report,
        "{HafenCity=-3.5/-3.5/-3.5, Hamburg=13.7/12.3/15.1}"
    );
}

// ---------------------------------------------------------------------------
// Probe-path stress
// ---------------------------------------------------------------------------

#[test]
fn e2e_colliding_keys_all_survive_aggregation() {
    // Every key shares one home slot, so each one lands at a different
    // probe distance; all must still be retrievable and reported.
    let capacity = 64;
    let keys = colliding_keys(capacity, 10);
    let pairs: Vec<(String, i64)> = keys
        .iter()
        .enumerate()
        .map(|(position, key)| (key.clone(), position as i64 + 1))
        .collect();
    let buf = dataset_from_pairs(&pairs);

    let table = aggregate(&buf, capacity).expect("aggregate");
    assert_eq!(table.len(), keys.len());
    for (position, key) in keys.iter().enumerate() {
        let stats = table.lookup(key.as_bytes()).expect("collided key present");
        assert_eq!(stats.sum(), position as i64 + 1);
    }
    assert!(table.longest_probe() >= keys.len() - 1);

    let outcome = run(&buf, &EngineOptions::default()).expect("run");
    assert_eq!(outcome.report, oracle_report(&oracle_fold(&pairs)));
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

#[test]
fn e2e_saturated_table_is_reported_not_corrupted() {
    let buf = dataset(&[("a", "1.0"), ("b", "2.0"), ("c", "3.0")]);
    let err = aggregate(&buf, 2).expect_err("third key cannot fit");
    assert!(matches!(
        err,
        EngineError::Table(TableError::Saturated { capacity: 2 })
    ));
}

#[test]
fn e2e_malformed_record_aborts_with_offset() {
    let buf = b"good;1.0\nbroken\ngood;2.0\n";
    let err = run(buf, &EngineOptions::default()).expect_err("malformed");
    let message = err.to_string();
    assert!(message.contains("byte offset 15"), "got: {message}");

    // No partial report: the same input with the bad line removed works.
    let fixed = b"good;1.0\ngood;2.0\n";
    assert!(run(fixed, &EngineOptions::default()).is_ok());
}

#[test]
fn e2e_key_too_long_aborts() {
    let mut buf = vec![b'k'; 101];
    buf.extend_from_slice(b";1.0\n");
    let err = run(&buf, &EngineOptions::default()).expect_err("oversized key");
    assert!(err.to_string().contains("100-byte cap"));
}

#[test]
fn e2e_out_of_range_reading_aborts() {
    let err = run(b"a;100.0\n", &EngineOptions::default()).expect_err("out of range");
    assert!(err.to_string().contains("open interval"));
}

// ---------------------------------------------------------------------------
// Parallel ingestion
// ---------------------------------------------------------------------------

#[test]
fn e2e_parallel_report_matches_serial_and_oracle() {
    let mut pairs = Vec::new();
    for round in 0..200i64 {
        for key in ["Hamburg", "HafenCity", "Oslo", "Rome", "Romero"] {
            pairs.push((key.to_owned(), (round * 7) % 999 - 499));
        }
    }
    let buf = dataset_from_pairs(&pairs);
    let expected = oracle_report(&oracle_fold(&pairs));

    for workers in [1, 2, 4, 7] {
        let options = EngineOptions {
            workers,
            ..EngineOptions::default()
        };
        let outcome = run(&buf, &options).expect("run");
        assert_eq!(outcome.report, expected, "workers={workers}");
        assert_eq!(outcome.trace.records, pairs.len() as u64);
    }
}

#[test]
fn e2e_parallel_worker_failure_aborts_the_run() {
    let mut buf = Vec::new();
    for n in 0..60 {
        buf.extend_from_slice(format!("key{n};1.0\n").as_bytes());
    }
    buf.extend_from_slice(b"tail-without-delimiter\n");
    let err = aggregate_parallel(&buf, 1024, 4).expect_err("late chunk fails");
    assert!(matches!(err, EngineError::Scan(_)));
}

// ---------------------------------------------------------------------------
// Trace artifact
// ---------------------------------------------------------------------------

#[test]
fn e2e_trace_serializes_to_json() {
    let buf = dataset(&[("Hamburg", "12.3"), ("Oslo", "-0.1")]);
    let options = EngineOptions {
        workers: 2,
        ..EngineOptions::default()
    };
    let outcome = run(&buf, &options).expect("run");

    let json = serde_json::to_value(&outcome.trace).expect("serialize");
    assert_eq!(json["workers"], 2);
    assert_eq!(json["records"], 2);
    assert_eq!(json["distinct_keys"], 2);
    assert_eq!(json["table"]["capacity"], 11_000);
}
