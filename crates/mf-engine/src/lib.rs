#![deny(unsafe_code)]

pub mod ingest;

use mf_report::{ReportOptions, render_report};
use mf_scan::{RecordScanner, ScanError, split_records};
use mf_table::{DEFAULT_TABLE_CAPACITY, StationTable, TableError, TableTrace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    pub table_capacity: usize,
    pub workers: usize,
    pub report: ReportOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            table_capacity: DEFAULT_TABLE_CAPACITY,
            workers: 1,
            report: ReportOptions::default(),
        }
    }
}

/// What one engine run did, for the trace surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineTrace {
    pub workers: usize,
    pub chunks: usize,
    pub records: u64,
    pub distinct_keys: usize,
    pub table: TableTrace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOutcome {
    pub report: String,
    pub trace: EngineTrace,
}

/// Single-threaded pipeline: scan the buffer and fold every record into
/// one table. The first malformed record or table fault aborts the run.
pub fn aggregate(buf: &[u8], table_capacity: usize) -> Result<StationTable, EngineError> {
    let mut table = StationTable::with_capacity(table_capacity)?;
    for record in RecordScanner::new(buf) {
        let record = record?;
        table.upsert(record.key, record.value_tenths)?;
    }
    Ok(table)
}

/// Chunked parallel pipeline.
///
/// The buffer splits into record-aligned chunks, one private table per
/// worker, so the parse/aggregate phase shares nothing. Workers join
/// before the sequential merge; any worker error aborts the whole run
/// with that error. Worker visit order does not matter because the
/// per-key combine rule is associative and commutative.
pub fn aggregate_parallel(
    buf: &[u8],
    table_capacity: usize,
    workers: usize,
) -> Result<StationTable, EngineError> {
    if workers <= 1 {
        return aggregate(buf, table_capacity);
    }
    let chunks = split_records(buf, workers);
    if chunks.len() <= 1 {
        return aggregate(buf, table_capacity);
    }

    let results: Vec<Result<StationTable, EngineError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .iter()
            .copied()
            .map(|chunk| scope.spawn(move || aggregate(chunk, table_capacity)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("aggregation worker panicked"))
            .collect()
    });

    let mut merged = StationTable::with_capacity(table_capacity)?;
    for result in results {
        merged.merge_from(&result?)?;
    }
    Ok(merged)
}

/// Full pipeline from byte buffer to rendered report plus trace.
pub fn run(buf: &[u8], options: &EngineOptions) -> Result<EngineOutcome, EngineError> {
    let chunks = if options.workers > 1 {
        split_records(buf, options.workers).len().max(1)
    } else {
        1
    };
    let table = aggregate_parallel(buf, options.table_capacity, options.workers)?;
    let trace = EngineTrace {
        workers: options.workers,
        chunks,
        records: table.total_records(),
        distinct_keys: table.len(),
        table: table.trace(),
    };
    let report = render_report(&table, &options.report);
    Ok(EngineOutcome { report, trace })
}
