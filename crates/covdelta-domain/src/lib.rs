//! Pure comparison logic for covdelta.
//!
//! This crate compares a current [`CoverageReport`] against an optional base
//! report and produces a [`DiffResult`]: aggregate totals, per-file rows with
//! deltas, and the list of files removed since base. It performs no I/O and
//! takes no clock; the output depends only on its inputs.

use std::collections::BTreeMap;

use covdelta_types::{
    CoverageReport, DiffOptions, DiffResult, FileCoverage, FileDelta, LineRange, SCHEMA_ID,
    Totals,
};

// ============================================================================
// Pure Helpers
// ============================================================================

/// Remove `prefix` from `path` when it is a literal prefix; otherwise return `path`.
///
/// # Examples
///
/// ```
/// use covdelta_domain::strip_prefix;
///
/// assert_eq!(strip_prefix("/workspace/src/a.ts", "/workspace/"), "src/a.ts");
/// assert_eq!(strip_prefix("lib/b.ts", "/workspace/"), "lib/b.ts");
/// ```
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix).unwrap_or(path)
}

/// Round to one decimal place. Negative zero is folded into `0.0`.
pub fn round1(value: f64) -> f64 {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Coverage percentage rounded to one decimal.
///
/// Returns 100.0 when nothing is instrumented (nothing to cover, nothing uncovered).
pub fn percentage(hit: u64, found: u64) -> f64 {
    if found == 0 {
        return 100.0;
    }
    round1(hit as f64 / found as f64 * 100.0)
}

/// Signed difference between two percentages, rounded to one decimal.
pub fn delta(current_pct: f64, base_pct: f64) -> f64 {
    round1(current_pct - base_pct)
}

/// Collapse zero-hit line numbers into inclusive ranges.
pub fn uncovered_ranges(lines: &BTreeMap<u32, u64>) -> Vec<LineRange> {
    let mut ranges: Vec<LineRange> = Vec::new();
    for (&line, _) in lines.iter().filter(|(_, hits)| **hits == 0) {
        match ranges.last_mut() {
            Some(range) if range.end.checked_add(1) == Some(line) => range.end = line,
            _ => ranges.push(LineRange {
                start: line,
                end: line,
            }),
        }
    }
    ranges
}

// ============================================================================
// Per-File Summaries
// ============================================================================

/// Counters of one normalized path.
#[derive(Debug, Clone, Default, PartialEq)]
struct FileSummary {
    lines_found: u64,
    lines_hit: u64,
    functions_found: u64,
    functions_hit: u64,
    branches_found: u64,
    branches_hit: u64,
    line_hits: BTreeMap<u32, u64>,
}

impl FileSummary {
    fn absorb(&mut self, file: &FileCoverage) {
        self.lines_found = self.lines_found.saturating_add(file.lines.found);
        self.lines_hit = self.lines_hit.saturating_add(file.lines.hit);
        self.functions_found = self.functions_found.saturating_add(file.functions.found);
        self.functions_hit = self.functions_hit.saturating_add(file.functions.hit);
        self.branches_found = self.branches_found.saturating_add(file.branches.found);
        self.branches_hit = self.branches_hit.saturating_add(file.branches.hit);
        for detail in &file.lines.details {
            let hits = self.line_hits.entry(detail.line).or_insert(0);
            *hits = (*hits).max(detail.hits);
        }
    }

    fn pct(&self) -> f64 {
        percentage(self.lines_hit, self.lines_found)
    }
}

/// Normalize paths and drop excluded files.
///
/// Records that collapse onto the same path after prefix stripping are summed.
fn summarize<F>(report: &CoverageReport, prefix: &str, include: &F) -> BTreeMap<String, FileSummary>
where
    F: Fn(&str) -> bool,
{
    let mut summaries: BTreeMap<String, FileSummary> = BTreeMap::new();
    for file in report {
        let path = strip_prefix(&file.path, prefix);
        if !include(path) {
            continue;
        }
        summaries.entry(path.to_string()).or_default().absorb(file);
    }
    summaries
}

fn totals(summaries: &BTreeMap<String, FileSummary>) -> Totals {
    let mut totals = Totals {
        files: summaries.len(),
        ..Default::default()
    };
    for summary in summaries.values() {
        totals.lines_found = totals.lines_found.saturating_add(summary.lines_found);
        totals.lines_hit = totals.lines_hit.saturating_add(summary.lines_hit);
        totals.functions_found = totals.functions_found.saturating_add(summary.functions_found);
        totals.functions_hit = totals.functions_hit.saturating_add(summary.functions_hit);
        totals.branches_found = totals.branches_found.saturating_add(summary.branches_found);
        totals.branches_hit = totals.branches_hit.saturating_add(summary.branches_hit);
    }
    totals.lines_pct = percentage(totals.lines_hit, totals.lines_found);
    totals.functions_pct = percentage(totals.functions_hit, totals.functions_found);
    totals.branches_pct = percentage(totals.branches_hit, totals.branches_found);
    totals
}

/// Aggregate totals of a whole report, without prefix stripping or filtering.
pub fn report_totals(report: &CoverageReport) -> Totals {
    totals(&summarize(report, "", &|_: &str| true))
}

// ============================================================================
// Diff
// ============================================================================

/// Compare `current` with an optional `base`.
///
/// Paths are normalized with `options.prefix` on both sides, then joined.
/// Rows are sorted ascending by current percentage, ties broken by path.
pub fn compute_diff(
    current: &CoverageReport,
    base: Option<&CoverageReport>,
    options: &DiffOptions,
) -> DiffResult {
    compute_diff_filtered(current, base, options, |_| true)
}

/// Like [`compute_diff`], keeping only normalized paths accepted by `include`.
pub fn compute_diff_filtered<F>(
    current: &CoverageReport,
    base: Option<&CoverageReport>,
    options: &DiffOptions,
    include: F,
) -> DiffResult
where
    F: Fn(&str) -> bool,
{
    let prefix = options.prefix.as_deref().unwrap_or("");
    let current_files = summarize(current, prefix, &include);
    // A base with no records left is no base at all
    let base_files = base
        .map(|report| summarize(report, prefix, &include))
        .filter(|files| !files.is_empty());

    let current_totals = totals(&current_files);
    let base_totals = base_files.as_ref().map(totals);
    let total_delta = base_totals
        .as_ref()
        .map(|b| delta(current_totals.lines_pct, b.lines_pct));

    let mut files: Vec<FileDelta> = current_files
        .iter()
        .map(|(path, summary)| {
            let current_pct = summary.pct();
            let base_pct = base_files
                .as_ref()
                .and_then(|files| files.get(path))
                .map(FileSummary::pct);
            FileDelta {
                path: path.clone(),
                lines_found: summary.lines_found,
                lines_hit: summary.lines_hit,
                current_pct,
                base_pct,
                delta: base_pct.map(|b| delta(current_pct, b)),
                uncovered: uncovered_ranges(&summary.line_hits),
            }
        })
        .collect();
    sort_rows(&mut files);

    let removed: Vec<String> = base_files
        .as_ref()
        .map(|files| {
            files
                .keys()
                .filter(|path| !current_files.contains_key(*path))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    DiffResult {
        schema: SCHEMA_ID.to_string(),
        options: options.clone(),
        current: current_totals,
        base: base_totals,
        delta: total_delta,
        files,
        removed,
    }
}

/// Sort rows so the worst-covered files come first.
///
/// Order: current percentage (ascending) > path (lexical)
pub fn sort_rows(rows: &mut [FileDelta]) {
    rows.sort_by(|a, b| {
        a.current_pct
            .total_cmp(&b.current_pct)
            .then_with(|| a.path.cmp(&b.path))
    });
}

// ============================================================================
// Tests
// ============================================================================
