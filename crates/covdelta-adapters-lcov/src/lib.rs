//! LCOV tracefile parser for covdelta.
//!
//! This crate turns raw LCOV text into a [`CoverageReport`]: one
//! [`FileCoverage`] per `SF:` record with its line, function and branch
//! counters. Parsing is a single pass over the input with a two-state
//! machine (idle, or inside a record).
//!
//! Structurally invalid input is rejected as a whole with
//! [`LcovError::MalformedReport`]; unrecognized directives are ignored so
//! that newer LCOV extensions keep parsing.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use covdelta_types::{
    BranchDetail, CoverageReport, FileCoverage, FunctionDetail, LineDetail,
};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while parsing LCOV text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LcovError {
    /// The input is not a structurally valid LCOV tracefile.
    #[error("Malformed LCOV report at line {line}: {reason} (got '{content}')")]
    MalformedReport {
        /// 1-based line number of the offending line.
        line: usize,
        /// The raw offending line, trimmed.
        content: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl LcovError {
    /// Line number the error refers to.
    pub fn line(&self) -> usize {
        match self {
            LcovError::MalformedReport { line, .. } => *line,
        }
    }
}

/// Position of the line currently being parsed, for error reporting.
#[derive(Debug, Clone, Copy)]
struct Cursor<'a> {
    number: usize,
    content: &'a str,
}

impl Cursor<'_> {
    fn malformed(&self, reason: impl Into<String>) -> LcovError {
        LcovError::MalformedReport {
            line: self.number,
            content: self.content.to_string(),
            reason: reason.into(),
        }
    }

    fn number<T: FromStr>(&self, field: &str, raw: &str) -> Result<T, LcovError> {
        raw.trim()
            .parse()
            .map_err(|_| self.malformed(format!("invalid {} '{}'", field, raw)))
    }
}

// ============================================================================
// Record Builder
// ============================================================================

/// A record between `SF:` and `end_of_record`, under construction.
#[derive(Debug)]
struct RecordBuilder {
    file: FileCoverage,
    opened_at: usize,
    lines_found: Option<u64>,
    lines_hit: Option<u64>,
    functions_found: Option<u64>,
    functions_hit: Option<u64>,
    branches_found: Option<u64>,
    branches_hit: Option<u64>,
    seen_lines: BTreeSet<u32>,
    seen_branches: BTreeSet<(u32, u32, u32)>,
    /// Function names in `FN:` order with their declared line.
    declared: Vec<(String, u32)>,
    declared_names: BTreeSet<String>,
    /// `FNDA:` hits keyed by name, plus first-seen order.
    function_hits: HashMap<String, u64>,
    hit_order: Vec<String>,
}

impl RecordBuilder {
    fn new(path: &str, test_name: Option<String>, opened_at: usize) -> Self {
        let mut file = FileCoverage::new(path);
        file.test_name = test_name;
        Self {
            file,
            opened_at,
            lines_found: None,
            lines_hit: None,
            functions_found: None,
            functions_hit: None,
            branches_found: None,
            branches_hit: None,
            seen_lines: BTreeSet::new(),
            seen_branches: BTreeSet::new(),
            declared: Vec::new(),
            declared_names: BTreeSet::new(),
            function_hits: HashMap::new(),
            hit_order: Vec::new(),
        }
    }

    /// Apply one data directive. Returns `false` for directives we don't track.
    fn apply(&mut self, directive: &str, value: &str, at: &Cursor<'_>) -> Result<bool, LcovError> {
        match directive {
            "DA" => self.line_data(value, at)?,
            "LF" => self.lines_found = Some(at.number("lines found", value)?),
            "LH" => self.lines_hit = Some(at.number("lines hit", value)?),
            "FN" => self.function(value, at)?,
            "FNDA" => self.function_data(value, at)?,
            "FNF" => self.functions_found = Some(at.number("functions found", value)?),
            "FNH" => self.functions_hit = Some(at.number("functions hit", value)?),
            "BRDA" => self.branch_data(value, at)?,
            "BRF" => self.branches_found = Some(at.number("branches found", value)?),
            "BRH" => self.branches_hit = Some(at.number("branches hit", value)?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn line_data(&mut self, value: &str, at: &Cursor<'_>) -> Result<(), LcovError> {
        // DA:<line>,<hits>[,<checksum>]
        let mut parts = value.split(',');
        let (Some(line), Some(hits)) = (parts.next(), parts.next()) else {
            return Err(at.malformed("expected 'DA:<line>,<hits>'"));
        };
        let line: u32 = at.number("line number", line)?;
        let hits: u64 = at.number("hit count", hits)?;

        if !self.seen_lines.insert(line) {
            return Err(at.malformed(format!("duplicate DA entry for line {}", line)));
        }
        self.file.lines.details.push(LineDetail { line, hits });
        Ok(())
    }

    fn function(&mut self, value: &str, at: &Cursor<'_>) -> Result<(), LcovError> {
        // FN:<line>,<name> or FN:<line>,<end line>,<name>; names may themselves contain commas
        let Some((line, rest)) = value.split_once(',') else {
            return Err(at.malformed("expected 'FN:<line>,<name>'"));
        };
        let line: u32 = at.number("function line", line)?;
        let name = match rest.split_once(',') {
            Some((end, name)) if end.trim().parse::<u32>().is_ok() => name,
            _ => rest,
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(at.malformed("missing function name"));
        }
        if !self.declared_names.insert(name.to_string()) {
            return Err(at.malformed(format!("duplicate FN entry for function '{}'", name)));
        }
        self.declared.push((name.to_string(), line));
        Ok(())
    }

    fn function_data(&mut self, value: &str, at: &Cursor<'_>) -> Result<(), LcovError> {
        // FNDA:<hits>,<name>
        let Some((hits, name)) = value.split_once(',') else {
            return Err(at.malformed("expected 'FNDA:<hits>,<name>'"));
        };
        let hits: u64 = at.number("function hit count", hits)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(at.malformed("missing function name"));
        }
        if self.function_hits.insert(name.to_string(), hits).is_some() {
            return Err(at.malformed(format!("duplicate FNDA entry for function '{}'", name)));
        }
        self.hit_order.push(name.to_string());
        Ok(())
    }

    fn branch_data(&mut self, value: &str, at: &Cursor<'_>) -> Result<(), LcovError> {
        // BRDA:<line>,<block>,<branch>,<taken>
        let parts: Vec<&str> = value.splitn(4, ',').collect();
        let [line, block, branch, taken] = parts.as_slice() else {
            return Err(at.malformed("expected 'BRDA:<line>,<block>,<branch>,<taken>'"));
        };
        let line: u32 = at.number("branch line", line)?;
        let block: u32 = at.number("branch block", block)?;
        let branch: u32 = at.number("branch number", branch)?;
        let taken = match taken.trim() {
            "-" => None,
            raw => Some(at.number::<u64>("branch taken count", raw)?),
        };

        if !self.seen_branches.insert((line, block, branch)) {
            return Err(at.malformed(format!(
                "duplicate BRDA entry for line {}, block {}, branch {}",
                line, block, branch
            )));
        }
        self.file.branches.details.push(BranchDetail {
            line,
            block,
            branch,
            taken,
        });
        Ok(())
    }

    /// Close the record. Totals that were never stated are derived from detail.
    fn finish(mut self) -> FileCoverage {
        let mut functions: Vec<FunctionDetail> = self
            .declared
            .into_iter()
            .map(|(name, line)| {
                let hits = self.function_hits.get(&name).copied().unwrap_or(0);
                FunctionDetail { name, line, hits }
            })
            .collect();
        for name in self.hit_order {
            if !self.declared_names.contains(&name) {
                let hits = self.function_hits.get(&name).copied().unwrap_or(0);
                functions.push(FunctionDetail {
                    name,
                    line: 0,
                    hits,
                });
            }
        }

        let lines = &self.file.lines.details;
        let branches = &self.file.branches.details;
        self.file.lines.found = self.lines_found.unwrap_or(lines.len() as u64);
        self.file.lines.hit = self
            .lines_hit
            .unwrap_or(lines.iter().filter(|d| d.hits > 0).count() as u64);
        self.file.functions.found = self.functions_found.unwrap_or(functions.len() as u64);
        self.file.functions.hit = self
            .functions_hit
            .unwrap_or(functions.iter().filter(|f| f.hits > 0).count() as u64);
        self.file.branches.found = self.branches_found.unwrap_or(branches.len() as u64);
        self.file.branches.hit = self
            .branches_hit
            .unwrap_or(branches.iter().filter(|b| b.taken.unwrap_or(0) > 0).count() as u64);
        self.file.functions.details = functions;
        self.file
    }
}

// ============================================================================
// Parser State Machine
// ============================================================================

#[derive(Debug, Default)]
enum ParserState {
    #[default]
    Idle,
    InRecord(Box<RecordBuilder>),
}

#[derive(Debug, Default)]
struct LcovParser {
    state: ParserState,
    report: CoverageReport,
    test_name: Option<String>,
}

impl LcovParser {
    fn feed(&mut self, cursor: Cursor<'_>) -> Result<(), LcovError> {
        let line = cursor.content;
        if line.is_empty() {
            return Ok(());
        }

        if line == "end_of_record" {
            return match std::mem::take(&mut self.state) {
                ParserState::InRecord(record) => self.commit(*record),
                ParserState::Idle => Err(cursor.malformed("end_of_record without open record")),
            };
        }

        let Some((directive, value)) = line.split_once(':') else {
            // Unknown bare token
            return Ok(());
        };

        match directive {
            "TN" => {
                let name = value.trim();
                self.test_name = (!name.is_empty()).then(|| name.to_string());
                Ok(())
            }
            "SF" => self.open(value.trim(), cursor),
            _ => match &mut self.state {
                ParserState::InRecord(record) => record.apply(directive, value, &cursor).map(|_| ()),
                ParserState::Idle if is_record_directive(directive) => Err(cursor.malformed(
                    format!("{} record without preceding SF record", directive),
                )),
                ParserState::Idle => Ok(()),
            },
        }
    }

    fn open(&mut self, path: &str, cursor: Cursor<'_>) -> Result<(), LcovError> {
        if path.is_empty() {
            return Err(cursor.malformed("empty source file path"));
        }

        // A new SF implicitly closes a record missing its end_of_record
        if let ParserState::InRecord(record) = std::mem::take(&mut self.state) {
            self.commit(*record)?;
        }

        if self.report.contains(path) {
            return Err(cursor.malformed(format!("duplicate record for '{}'", path)));
        }

        self.state = ParserState::InRecord(Box::new(RecordBuilder::new(
            path,
            self.test_name.clone(),
            cursor.number,
        )));
        Ok(())
    }

    fn commit(&mut self, record: RecordBuilder) -> Result<(), LcovError> {
        let opened_at = record.opened_at;
        self.report
            .insert(record.finish())
            .map_err(|dup| LcovError::MalformedReport {
                line: opened_at,
                content: format!("SF:{}", dup.path),
                reason: format!("duplicate record for '{}'", dup.path),
            })
    }

    fn finish(mut self) -> Result<CoverageReport, LcovError> {
        // An unterminated final record is treated as closed
        if let ParserState::InRecord(record) = std::mem::take(&mut self.state) {
            self.commit(*record)?;
        }
        Ok(self.report)
    }
}

/// Directives that are only meaningful inside a record.
fn is_record_directive(directive: &str) -> bool {
    matches!(
        directive,
        "DA" | "LF" | "LH" | "FN" | "FNDA" | "FNF" | "FNH" | "BRDA" | "BRF" | "BRH"
    )
}

// ============================================================================
// LCOV Parsing
// ============================================================================

/// Parse LCOV text into a coverage report.
///
/// Records keep their first-seen order. Any structural problem aborts the
/// parse; no partial report is returned.
///
/// # Examples
///
/// ```
/// use covdelta_adapters_lcov::parse_lcov;
///
/// let lcov = "SF:a.js\nDA:1,1\nDA:2,0\nLF:2\nLH:1\nend_of_record\n";
///
/// let report = parse_lcov(lcov).unwrap();
/// let file = report.get("a.js").unwrap();
/// assert_eq!(file.lines.found, 2);
/// assert_eq!(file.lines.hit, 1);
/// assert_eq!(file.lines.details.len(), 2);
/// ```
pub fn parse_lcov(text: &str) -> Result<CoverageReport, LcovError> {
    let mut parser = LcovParser::default();
    for (index, raw) in text.lines().enumerate() {
        parser.feed(Cursor {
            number: index + 1,
            content: raw.trim(),
        })?;
    }
    parser.finish()
}

// ============================================================================
// Tests
// ============================================================================


// ============================================================================
// Property Tests
// ============================================================================


// ============================================================================
// Integration Tests (with actual fixture files)
// ============================================================================
