use std::path::PathBuf;
use std::process::ExitCode;

use mf_engine::ingest::InputFile;
use mf_engine::{EngineOptions, run};
use mf_report::{ReportOptions, ReportScale};
use mf_table::DEFAULT_TABLE_CAPACITY;

struct CliArgs {
    input: PathBuf,
    workers: usize,
    capacity: usize,
    scale: ReportScale,
    print_trace: bool,
    trace_json: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("mf-aggregate error: {error}");
            ExitCode::from(1)
        }
    }
}

fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let input = InputFile::open(&args.input)?;
    let options = EngineOptions {
        table_capacity: args.capacity,
        workers: args.workers,
        report: ReportOptions { scale: args.scale },
    };
    let outcome = run(input.bytes(), &options)?;

    println!("{}", outcome.report);

    if args.print_trace {
        let trace = &outcome.trace;
        eprintln!(
            "workers={} chunks={} records={} distinct_keys={} longest_probe={}",
            trace.workers, trace.chunks, trace.records, trace.distinct_keys, trace.table.longest_probe
        );
    }
    if let Some(path) = &args.trace_json {
        std::fs::write(path, serde_json::to_vec_pretty(&outcome.trace)?)?;
    }
    Ok(())
}

fn parse_args() -> Result<Option<CliArgs>, Box<dyn std::error::Error>> {
    let mut input: Option<PathBuf> = None;
    let mut workers = 1usize;
    let mut capacity = DEFAULT_TABLE_CAPACITY;
    let mut scale = ReportScale::Tenths;
    let mut print_trace = false;
    let mut trace_json: Option<PathBuf> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--workers" => {
                let value = args.next().ok_or("--workers requires a count or `auto`")?;
                workers = if value == "auto" {
                    std::thread::available_parallelism()
                        .map(std::num::NonZeroUsize::get)
                        .unwrap_or(1)
                } else {
                    value.parse()?
                };
            }
            "--capacity" => {
                let value = args.next().ok_or("--capacity requires a slot count")?;
                capacity = value.parse()?;
            }
            "--decimal" => {
                scale = ReportScale::Decimal;
            }
            "--trace" => {
                print_trace = true;
            }
            "--trace-json" => {
                let value = args.next().ok_or("--trace-json requires a path")?;
                trace_json = Some(PathBuf::from(value));
            }
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            other if input.is_none() && !other.starts_with('-') => {
                input = Some(PathBuf::from(other));
            }
            other => {
                return Err(format!("unknown argument: {other}").into());
            }
        }
    }

    let input = input.ok_or("missing dataset path; try --help")?;
    Ok(Some(CliArgs {
        input,
        workers,
        capacity,
        scale,
        print_trace,
        trace_json,
    }))
}

fn print_help() {
    println!("usage: mf-aggregate <dataset> [options]");
    println!();
    println!("Aggregate `<station>;<reading>` lines into a sorted");
    println!("{{station=avg/min/max, ...}} report.");
    println!();
    println!("options:");
    println!("  --workers <N|auto>   parallel ingestion workers (default 1)");
    println!("  --capacity <N>       table slot count (default {DEFAULT_TABLE_CAPACITY})");
    println!("  --decimal            print true decimal values instead of tenths");
    println!("  --trace              print run statistics to stderr");
    println!("  --trace-json <path>  write run statistics as JSON");
}
