#![forbid(unsafe_code)]

use mf_table::StationTable;
use serde::{Deserialize, Serialize};

/// Numeric scale used when rendering report values.
///
/// Readings are aggregated at the ×10 fixed-point scale. `Tenths` prints
/// those integers as-is (the historical output contract); `Decimal`
/// divides by ten at format time and prints one fractional digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportScale {
    #[default]
    Tenths,
    Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportOptions {
    pub scale: ReportScale,
}

/// Render the final report: `{key=avg/min/max, ...}` with keys in
/// ascending byte-lexicographic order, no trailing separator and no
/// trailing newline. An empty table renders `{}`.
///
/// `avg` is the truncating integer mean; keys render as UTF-8 with lossy
/// replacement of invalid sequences.
#[must_use]
pub fn render_report(table: &StationTable, options: &ReportOptions) -> String {
    let view = table.sorted_slots();
    let mut out = String::with_capacity(view.len() * 24 + 2);
    out.push('{');
    for (position, &slot) in view.iter().enumerate() {
        if position > 0 {
            out.push_str(", ");
        }
        let key = table
            .key_at(slot)
            .expect("sorted view references only occupied slots");
        let stats = table
            .stats_at(slot)
            .expect("sorted view references only occupied slots");
        out.push_str(&String::from_utf8_lossy(key));
        out.push('=');
        push_value(&mut out, stats.mean_tenths(), options.scale);
        out.push('/');
        push_value(&mut out, stats.min(), options.scale);
        out.push('/');
        push_value(&mut out, stats.max(), options.scale);
    }
    out.push('}');
    out
}

fn push_value(out: &mut String, tenths: i64, scale: ReportScale) {
    match scale {
        ReportScale::Tenths => out.push_str(&tenths.to_string()),
        ReportScale::Decimal => {
            if tenths < 0 {
                out.push('-');
            }
            let magnitude = tenths.unsigned_abs();
            out.push_str(&(magnitude / 10).to_string());
            out.push('.');
            out.push_str(&(magnitude % 10).to_string());
        }
    }
}
