#![forbid(unsafe_code)]

//! Conformance support for the meterfold engine: an independent
//! `BTreeMap`-backed aggregation model, fixture builders, and collision
//! construction for probe-path stress tests. The suites under `tests/`
//! compare the real engine against this oracle.

use std::collections::BTreeMap;

use mf_table::home_slot;
use mf_types::{StationStats, validate_tenths};

/// Build a dataset buffer from `(key, textual value)` lines.
#[must_use]
pub fn dataset(lines: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (key, value) in lines {
        buf.extend_from_slice(key.as_bytes());
        buf.push(b';');
        buf.extend_from_slice(value.as_bytes());
        buf.push(b'\n');
    }
    buf
}

/// Render a tenths value as the textual form the input format carries:
/// one fractional digit, e.g. `123` -> `"12.3"`, `-1` -> `"-0.1"`.
#[must_use]
pub fn decimal_text(tenths: i64) -> String {
    let sign = if tenths < 0 { "-" } else { "" };
    let magnitude = tenths.unsigned_abs();
    format!("{sign}{}.{}", magnitude / 10, magnitude % 10)
}

/// Build a dataset buffer directly from `(key, tenths)` pairs.
pub fn dataset_from_pairs(pairs: &[(String, i64)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (key, tenths) in pairs {
        buf.extend_from_slice(key.as_bytes());
        buf.push(b';');
        buf.extend_from_slice(decimal_text(*tenths).as_bytes());
        buf.push(b'\n');
    }
    buf
}

/// Reference aggregation over a sorted map. `BTreeMap<String, _>` orders
/// keys bytewise, the same total order the engine's report must produce.
pub fn oracle_fold(pairs: &[(String, i64)]) -> BTreeMap<String, StationStats> {
    let mut model: BTreeMap<String, StationStats> = BTreeMap::new();
    for (key, tenths) in pairs {
        let tenths = validate_tenths(*tenths).expect("oracle fixtures stay in the legal domain");
        model
            .entry(key.clone())
            .and_modify(|stats| stats.record(tenths))
            .or_insert_with(|| StationStats::seed(tenths));
    }
    model
}

/// Reference report at the tenths scale, built independently of
/// `mf-report`.
#[must_use]
pub fn oracle_report(model: &BTreeMap<String, StationStats>) -> String {
    let entries: Vec<String> = model
        .iter()
        .map(|(key, stats)| {
            format!(
                "{key}={}/{}/{}",
                stats.mean_tenths(),
                stats.min(),
                stats.max()
            )
        })
        .collect();
    format!("{{{}}}", entries.join(", "))
}

/// Distinct keys that all hash to one home slot in a table of the given
/// capacity, for stressing long probe chains.
#[must_use]
pub fn colliding_keys(capacity: usize, count: usize) -> Vec<String> {
    let mut by_home: Vec<Vec<String>> = vec![Vec::new(); capacity];
    for n in 0..1_000_000u32 {
        let key = format!("station-{n}");
        let home = home_slot(key.as_bytes(), capacity);
        by_home[home].push(key);
        if by_home[home].len() == count {
            return by_home.swap_remove(home);
        }
    }
    panic!("no {count}-way collision found for capacity {capacity}");
}
