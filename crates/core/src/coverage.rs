//! Line coverage summary from lcov data

use crate::utils;
use eyre::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Found/hit counters of one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    pub found: u64,
    pub hit: u64,
}

impl std::ops::AddAssign for Counter {
    fn add_assign(&mut self, other: Self) {
        self.found += other.found;
        self.hit += other.hit;
    }
}

/// Counters of one `SF:` ... `end_of_record` block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCoverage {
    pub source: String,
    pub lines: Counter,
    pub functions: Counter,
    pub branches: Counter,
}

/// Parses lcov tracefile records.
///
/// Only the summary counters are read. A counter missing from a record
/// stays zero. Records without a trailing `end_of_record` are kept.
pub fn parse_lcov(input: &str) -> Vec<FileCoverage> {
    let mut records = Vec::new();
    let mut current = FileCoverage::default();
    let mut open = false;

    for line in input.lines().map(str::trim) {
        if line == "end_of_record" {
            records.push(std::mem::take(&mut current));
            open = false;
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let count = || value.trim().parse::<u64>().unwrap_or(0);
        match key {
            "SF" => current.source = value.to_string(),
            "LF" => current.lines.found = count(),
            "LH" => current.lines.hit = count(),
            "FNF" => current.functions.found = count(),
            "FNH" => current.functions.hit = count(),
            "BRF" => current.branches.found = count(),
            "BRH" => current.branches.hit = count(),
            _ => continue,
        }
        open = true;
    }

    if open {
        records.push(current);
    }
    records
}

/// Summary of one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub total: u64,
    pub covered: u64,
    pub skipped: u64,
    /// Percentage rounded to two decimals, `null` when nothing is coverable
    pub pct: Option<f64>,
}

impl From<Counter> for CategorySummary {
    fn from(counter: Counter) -> Self {
        let pct = (counter.found > 0).then(|| {
            let pct = counter.hit as f64 * 100.0 / counter.found as f64;
            (pct * 100.0).round() / 100.0
        });
        Self {
            total: counter.found,
            covered: counter.hit,
            skipped: 0,
            pct,
        }
    }
}

/// Per-category totals, serialized in lines/functions/branches/statements order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub lines: CategorySummary,
    pub functions: CategorySummary,
    pub branches: CategorySummary,
    pub statements: CategorySummary,
}

/// Written as `{"total": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub total: Totals,
}

/// Aggregates counters over every record.
///
/// lcov has no statement counters, statements mirror branches.
pub fn summarize(records: &[FileCoverage]) -> CoverageSummary {
    let mut lines = Counter::default();
    let mut functions = Counter::default();
    let mut branches = Counter::default();
    for record in records {
        lines += record.lines;
        functions += record.functions;
        branches += record.branches;
    }

    CoverageSummary {
        total: Totals {
            lines: lines.into(),
            functions: functions.into(),
            branches: branches.into(),
            statements: branches.into(),
        },
    }
}

/// Reads `lcov_path` and writes the summary JSON to `summary_path`
pub fn write_summary(lcov_path: &Path, summary_path: &Path) -> Result<CoverageSummary> {
    let input = std::fs::read_to_string(lcov_path)
        .with_context(|| format!("Failed to read coverage data: {}", lcov_path.display()))?;
    let records = parse_lcov(&input);
    let summary = summarize(&records);

    let json = utils::to_json_with_indent(&summary, b"  ")?;
    utils::write_creating_dirs(summary_path, &json)?;

    tracing::info!(
        "Summarized coverage of {} files into {}",
        records.len(),
        summary_path.display()
    );
    Ok(summary)
}
