//! Core types and DTOs for covdelta.
//!
//! This crate defines the data model shared by every covdelta crate: the
//! parsed LCOV coverage model, the options threaded through to the rendered
//! output, and the structured diff result.

use std::collections::BTreeMap;

use serde::ser::{Serialize as SerializeTrait, Serializer};
use serde::{Deserialize, Serialize};

// ============================================================================
// Schema Constants
// ============================================================================

/// Schema identifier for the covdelta JSON report format.
pub const SCHEMA_ID: &str = "covdelta.report.v1";

// ============================================================================
// Coverage Model
// ============================================================================

/// Execution count for a single instrumented line (`DA:` record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDetail {
    pub line: u32,
    pub hits: u64,
}

/// Line coverage of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCoverage {
    /// Instrumented lines, as stated by `LF:`.
    pub found: u64,
    /// Lines executed at least once, as stated by `LH:`.
    pub hit: u64,
    /// Per-line detail in input order.
    pub details: Vec<LineDetail>,
}

/// A function declared in a record (`FN:`) and its hit count (`FNDA:`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDetail {
    pub name: String,
    /// Declaration line; 0 when the record only carried an `FNDA:` entry.
    pub line: u32,
    pub hits: u64,
}

/// Function coverage of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCoverage {
    pub found: u64,
    pub hit: u64,
    pub details: Vec<FunctionDetail>,
}

/// A single branch outcome (`BRDA:` record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchDetail {
    pub line: u32,
    pub block: u32,
    pub branch: u32,
    /// `None` when the enclosing block was never executed (`-` in LCOV).
    pub taken: Option<u64>,
}

/// Branch coverage of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCoverage {
    pub found: u64,
    pub hit: u64,
    pub details: Vec<BranchDetail>,
}

/// Coverage data for a single source file (one LCOV record).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    /// Path exactly as written in the `SF:` line.
    pub path: String,
    /// Test name from the last `TN:` line before the record, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    pub lines: LineCoverage,
    pub functions: FunctionCoverage,
    pub branches: BranchCoverage,
}

impl FileCoverage {
    /// Create an empty record for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Convenience constructor with only line totals filled in.
    pub fn with_lines(path: impl Into<String>, found: u64, hit: u64) -> Self {
        let mut file = Self::new(path);
        file.lines.found = found;
        file.lines.hit = hit;
        file
    }
}

/// A parsed LCOV tracefile: file records keyed by path, in first-seen order.
///
/// Paths are unique. Once built the report is only handed out by shared
/// reference; there is no API to modify a record in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    files: Vec<FileCoverage>,
    index: BTreeMap<String, usize>,
}

impl CoverageReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Returns the record back if its path is already present.
    pub fn insert(&mut self, file: FileCoverage) -> Result<(), FileCoverage> {
        if self.index.contains_key(&file.path) {
            return Err(file);
        }
        self.index.insert(file.path.clone(), self.files.len());
        self.files.push(file);
        Ok(())
    }

    /// Build a report from records. Returns the first record whose path is
    /// already present.
    pub fn from_files(files: Vec<FileCoverage>) -> Result<Self, FileCoverage> {
        let mut report = Self::new();
        for file in files {
            report.insert(file)?;
        }
        Ok(report)
    }

    pub fn get(&self, path: &str) -> Option<&FileCoverage> {
        self.index.get(path).map(|&i| &self.files[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Records in first-seen order.
    pub fn files(&self) -> &[FileCoverage] {
        &self.files
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileCoverage> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<'a> IntoIterator for &'a CoverageReport {
    type Item = &'a FileCoverage;
    type IntoIter = std::slice::Iter<'a, FileCoverage>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

impl SerializeTrait for CoverageReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.files)
    }
}

// ============================================================================
// Diff Options
// ============================================================================

/// Context threaded through to the rendered report.
///
/// All fields are opaque strings. Only `prefix` is interpreted, and only as a
/// literal prefix to strip from file paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Repository full name (`owner/name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Commit SHA the current report was produced for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Head branch name or ref.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    /// Base branch name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Path prefix to strip so reported paths are repository-relative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

// ============================================================================
// Output Format
// ============================================================================

/// Rendering format for the report body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown, for check-run summaries and PR comments.
    #[default]
    Markdown,
    /// Plain text, for logs.
    Text,
    /// JSON serialization of the diff result.
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        }
    }
}

// ============================================================================
// Diff Result
// ============================================================================

/// Aggregated counters and percentages over a set of files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub files: usize,
    pub lines_found: u64,
    pub lines_hit: u64,
    pub functions_found: u64,
    pub functions_hit: u64,
    pub branches_found: u64,
    pub branches_hit: u64,
    /// Line coverage percentage, one decimal.
    pub lines_pct: f64,
    pub functions_pct: f64,
    pub branches_pct: f64,
}

/// Inclusive range of line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Direction of a per-file or aggregate change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increased,
    Decreased,
    Unchanged,
    /// No base to compare with.
    New,
}

impl Direction {
    /// Classify an optional delta. A delta of exactly zero is unchanged.
    pub fn of(delta: Option<f64>) -> Self {
        match delta {
            None => Direction::New,
            Some(d) if d > 0.0 => Direction::Increased,
            Some(d) if d < 0.0 => Direction::Decreased,
            Some(_) => Direction::Unchanged,
        }
    }
}

/// One row of the per-file table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDelta {
    /// Normalized (prefix-stripped) path.
    pub path: String,
    pub lines_found: u64,
    pub lines_hit: u64,
    pub current_pct: f64,
    /// Absent for files that are new relative to base.
    pub base_pct: Option<f64>,
    /// Absent for files that are new relative to base.
    pub delta: Option<f64>,
    /// Lines with zero hits, collapsed into ranges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncovered: Vec<LineRange>,
}

impl FileDelta {
    pub fn direction(&self) -> Direction {
        Direction::of(self.delta)
    }

    pub fn is_new(&self) -> bool {
        self.base_pct.is_none()
    }
}

/// Structured comparison of a current report against an optional base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub schema: String,
    pub options: DiffOptions,
    pub current: Totals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<Totals>,
    /// Aggregate line coverage delta; absent without a base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    /// Per-file rows, ascending by current percentage then path.
    pub files: Vec<FileDelta>,
    /// Paths present in base but not in current, sorted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
}

impl DiffResult {
    /// True when the current report had no file records at all.
    ///
    /// This is distinct from files with zero instrumented lines.
    pub fn has_no_data(&self) -> bool {
        self.current.files == 0
    }

    pub fn direction(&self) -> Direction {
        Direction::of(self.delta)
    }
}

// ============================================================================
// Tests
// ============================================================================
