//! Application orchestration for covdelta.
//!
//! This crate wires the parser, the differ and the renderers together:
//!
//! 1. Parse the current LCOV report (and the base report, if any)
//! 2. Normalize paths and drop excluded files
//! 3. Compute the per-file and aggregate comparison
//! 4. Render the body and the check-run title
//!
//! # Example
//!
//! ```rust
//! use covdelta_app::{SummaryRequest, summarize};
//!
//! let request = SummaryRequest {
//!     current_text: "SF:a.js\nDA:1,1\nDA:2,0\nend_of_record\n".to_string(),
//!     name: "Coverage".to_string(),
//!     ..Default::default()
//! };
//!
//! let summary = summarize(&request).unwrap();
//! assert!(summary.body.contains("Coverage: 50.0%"));
//! ```

use covdelta_adapters_lcov::{LcovError, parse_lcov};
use covdelta_config::{ConfigError, DEFAULT_NAME, should_include_path, validate_patterns};
use covdelta_domain::compute_diff_filtered;
use covdelta_render::{render, render_markdown, title_icon};
use covdelta_types::{CoverageReport, DiffOptions, DiffResult, OutputFormat};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while producing a summary.
#[derive(Debug, Error)]
pub enum AppError {
    /// The current report could not be parsed.
    #[error("Failed to parse current LCOV report: {0}")]
    CurrentLcov(LcovError),

    /// The base report could not be parsed.
    #[error("Failed to parse base LCOV report: {0}")]
    BaseLcov(LcovError),

    /// An exclude pattern is not a valid glob.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AppError {
    /// The underlying parse error, if this is one.
    pub fn lcov_error(&self) -> Option<&LcovError> {
        match self {
            AppError::CurrentLcov(e) | AppError::BaseLcov(e) => Some(e),
            AppError::Config(_) => None,
        }
    }
}

// ============================================================================
// Request and Result Types
// ============================================================================

/// Input to [`summarize`].
#[derive(Debug, Clone, Default)]
pub struct SummaryRequest {
    /// Contents of the current LCOV report.
    pub current_text: String,
    /// Contents of the base LCOV report, if one was available.
    pub base_text: Option<String>,
    /// Identifiers and prefix for the report.
    pub options: DiffOptions,
    /// Body format.
    pub format: OutputFormat,
    /// Check-run name; empty means the default name.
    pub name: String,
    /// Glob patterns matched against normalized paths.
    pub exclude_patterns: Vec<String>,
}

/// Output of [`summarize`].
#[derive(Debug, Clone)]
pub struct SummaryResult {
    /// The structured comparison.
    pub result: DiffResult,
    /// Rendered body in the requested format.
    pub body: String,
    /// Check-run title, `"<name> <icon>"`.
    pub title: String,
}

// ============================================================================
// Entry Points
// ============================================================================

/// Render a Markdown comparison of two parsed reports.
///
/// This is the pure core: no parsing, no filtering, no I/O.
pub fn diff(current: &CoverageReport, base: Option<&CoverageReport>, options: &DiffOptions) -> String {
    let result = compute_diff_filtered(current, base, options, |_| true);
    render_markdown(&result)
}

/// Parse, compare and render.
///
/// A malformed current or base report aborts the whole summary; the error
/// says which input was at fault. A base with no records is treated as no
/// base.
pub fn summarize(request: &SummaryRequest) -> Result<SummaryResult, AppError> {
    validate_patterns(&request.exclude_patterns)?;

    let current = parse_lcov(&request.current_text).map_err(AppError::CurrentLcov)?;
    let base = request
        .base_text
        .as_deref()
        .map(parse_lcov)
        .transpose()
        .map_err(AppError::BaseLcov)?;

    let exclude = &request.exclude_patterns;
    let result = compute_diff_filtered(&current, base.as_ref(), &request.options, |path| {
        should_include_path(path, exclude)
    });

    let body = render(&result, request.format);
    let title = build_title(&request.name, &result);

    Ok(SummaryResult {
        result,
        body,
        title,
    })
}

/// Build the check-run title from the configured name and the outcome.
pub fn build_title(name: &str, result: &DiffResult) -> String {
    let name = if name.trim().is_empty() {
        DEFAULT_NAME
    } else {
        name
    };
    format!("{} {}", name, title_icon(result))
}

// ============================================================================
// Tests
// ============================================================================
