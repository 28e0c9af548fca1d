//! Rendering utilities for covdelta reports.
//!
//! This crate turns a [`DiffResult`] into a report body:
//! - Markdown for check-run summaries and PR comments
//! - Plain text for CI logs
//! - JSON for machine consumers
//!
//! # Example
//!
//! ```rust
//! use covdelta_render::{render, render_markdown};
//! use covdelta_types::{DiffOptions, DiffResult, OutputFormat, SCHEMA_ID, Totals};
//!
//! let result = DiffResult {
//!     schema: SCHEMA_ID.to_string(),
//!     options: DiffOptions::default(),
//!     current: Totals::default(),
//!     base: None,
//!     delta: None,
//!     files: vec![],
//!     removed: vec![],
//! };
//! assert!(render_markdown(&result).contains("No coverage data"));
//! assert!(render(&result, OutputFormat::Json).contains("covdelta.report.v1"));
//! ```

use covdelta_types::{DiffOptions, DiffResult, Direction, FileDelta, OutputFormat, Totals};

/// Heading used by the markdown and text renderers.
pub const REPORT_HEADING: &str = "Coverage Report";

/// Message rendered instead of a percentage when the current report has no files.
pub const NO_DATA_MESSAGE: &str = "No coverage data found in the current report.";

/// Message rendered when there is no base report to compare against.
pub const NO_BASE_MESSAGE: &str = "No base coverage report: comparison not available.";

/// Returns the symbol shown next to a delta.
///
/// # Examples
///
/// ```rust
/// use covdelta_render::direction_symbol;
/// use covdelta_types::Direction;
///
/// assert_eq!(direction_symbol(Direction::Increased), "\u{25B2}");
/// assert_eq!(direction_symbol(Direction::Decreased), "\u{25BC}");
/// ```
pub fn direction_symbol(direction: Direction) -> &'static str {
    match direction {
        Direction::Increased => "\u{25B2}",
        Direction::Decreased => "\u{25BC}",
        Direction::Unchanged => "\u{25CF}",
        Direction::New => "",
    }
}

/// Returns an emoji summarizing the run, for check-run titles.
///
/// Decreased aggregate coverage warns; a report without data is a skip.
pub fn title_icon(result: &DiffResult) -> &'static str {
    if result.has_no_data() {
        return "\u{23ED}\u{FE0F}";
    }
    match result.direction() {
        Direction::Decreased => "\u{26A0}\u{FE0F}",
        _ => "\u{2705}",
    }
}

/// Format a signed delta: `+1.5%`, `-2.0%`, `±0.0%`.
pub fn format_signed(delta: f64) -> String {
    if delta > 0.0 {
        format!("+{:.1}%", delta)
    } else if delta < 0.0 {
        format!("{:.1}%", delta)
    } else {
        "\u{B1}0.0%".to_string()
    }
}

/// Summary line: `Coverage: X%` or `Coverage: X% (±Y% vs base)`.
pub fn summary_line(result: &DiffResult) -> String {
    match result.delta {
        Some(delta) => format!(
            "Coverage: {:.1}% ({} vs base)",
            result.current.lines_pct,
            format_signed(delta)
        ),
        None => format!("Coverage: {:.1}%", result.current.lines_pct),
    }
}

/// Delta cell: direction symbol plus signed value, or `new file`.
fn format_delta(row: &FileDelta) -> String {
    match row.delta {
        Some(delta) => format!("{} {}", direction_symbol(row.direction()), format_signed(delta)),
        None => "new file".to_string(),
    }
}

fn format_uncovered(row: &FileDelta) -> Option<String> {
    if row.uncovered.is_empty() {
        return None;
    }
    Some(
        row.uncovered
            .iter()
            .map(|range| range.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

fn format_ratio(pct: f64, hit: u64, found: u64) -> String {
    format!("{:.1}% ({}/{})", pct, hit, found)
}

/// Metric rows shared by the markdown and text renderers.
fn metrics(totals: &Totals) -> [(&'static str, String); 3] {
    [
        (
            "Lines",
            format_ratio(totals.lines_pct, totals.lines_hit, totals.lines_found),
        ),
        (
            "Functions",
            format_ratio(totals.functions_pct, totals.functions_hit, totals.functions_found),
        ),
        (
            "Branches",
            format_ratio(totals.branches_pct, totals.branches_hit, totals.branches_found),
        ),
    ]
}

/// Context identifiers, in display order, skipping absent ones.
fn context(options: &DiffOptions) -> Vec<(&'static str, &str)> {
    [
        ("Repository", options.repository.as_deref()),
        ("Commit", options.commit.as_deref()),
        ("Head", options.head.as_deref()),
        ("Base", options.base.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|v| (label, v)))
    .collect()
}

/// Escape characters that would break a markdown table cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

// ============================================================================
// Markdown
// ============================================================================

/// Renders the diff result as Markdown.
///
/// # Example Output
///
/// ```markdown
/// ## Coverage Report
///
/// **Coverage: 63.6% (+18.1% vs base)**
///
/// - **Repository**: octo/repo
/// - **Commit**: `abc123`
///
/// ### Summary
///
/// | Metric | Current | Base |
/// |--------|---------|------|
/// | Lines | 63.6% (7/11) | 45.5% (5/11) |
///
/// ### Files
///
/// | File | Coverage | Base | Change | Uncovered lines |
/// |------|----------|------|--------|-----------------|
/// | src/app.js | 40.0% | 60.0% | ▼ -20.0% | 3-4, 10 |
/// | src/new.js | 100.0% | new | new file | - |
/// ```
pub fn render_markdown(result: &DiffResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("## {}\n\n", REPORT_HEADING));

    if result.has_no_data() {
        output.push_str(NO_DATA_MESSAGE);
        output.push('\n');
        push_markdown_context(&mut output, &result.options);
        return output;
    }

    output.push_str(&format!("**{}**\n", summary_line(result)));
    push_markdown_context(&mut output, &result.options);

    // Summary table
    output.push_str("\n### Summary\n\n");
    let current = metrics(&result.current);
    match &result.base {
        Some(base) => {
            output.push_str("| Metric | Current | Base |\n");
            output.push_str("|--------|---------|------|\n");
            for ((label, cur), (_, base)) in current.iter().zip(metrics(base).iter()) {
                output.push_str(&format!("| {} | {} | {} |\n", label, cur, base));
            }
        }
        None => {
            output.push_str("| Metric | Current |\n");
            output.push_str("|--------|---------|\n");
            for (label, cur) in &current {
                output.push_str(&format!("| {} | {} |\n", label, cur));
            }
        }
    }

    // Files table
    output.push_str("\n### Files\n\n");
    if result.base.is_some() {
        output.push_str("| File | Coverage | Base | Change | Uncovered lines |\n");
        output.push_str("|------|----------|------|--------|-----------------|\n");
        for row in &result.files {
            let base = row
                .base_pct
                .map(|pct| format!("{:.1}%", pct))
                .unwrap_or_else(|| "new".to_string());
            output.push_str(&format!(
                "| {} | {:.1}% | {} | {} | {} |\n",
                escape_cell(&row.path),
                row.current_pct,
                base,
                format_delta(row),
                format_uncovered(row).unwrap_or_else(|| "-".to_string())
            ));
        }
    } else {
        output.push_str("| File | Coverage | Uncovered lines |\n");
        output.push_str("|------|----------|-----------------|\n");
        for row in &result.files {
            output.push_str(&format!(
                "| {} | {:.1}% | {} |\n",
                escape_cell(&row.path),
                row.current_pct,
                format_uncovered(row).unwrap_or_else(|| "-".to_string())
            ));
        }
        output.push_str(&format!("\n_{}_\n", NO_BASE_MESSAGE));
    }

    if !result.removed.is_empty() {
        output.push_str("\n### Removed files\n\n");
        for path in &result.removed {
            output.push_str(&format!("- {}\n", path));
        }
    }

    output
}

fn push_markdown_context(output: &mut String, options: &DiffOptions) {
    let entries = context(options);
    if entries.is_empty() {
        return;
    }
    output.push('\n');
    for (label, value) in entries {
        if label == "Commit" {
            output.push_str(&format!("- **{}**: `{}`\n", label, value));
        } else {
            output.push_str(&format!("- **{}**: {}\n", label, value));
        }
    }
}

// ============================================================================
// Plain Text
// ============================================================================

/// Renders the diff result as plain text for CI logs.
pub fn render_text(result: &DiffResult) -> String {
    let mut output = String::new();

    output.push_str(REPORT_HEADING);
    output.push('\n');

    if result.has_no_data() {
        output.push_str(NO_DATA_MESSAGE);
        output.push('\n');
        push_text_context(&mut output, &result.options);
        return output;
    }

    output.push_str(&summary_line(result));
    output.push('\n');
    if result.base.is_none() {
        output.push_str(NO_BASE_MESSAGE);
        output.push('\n');
    }
    push_text_context(&mut output, &result.options);

    output.push('\n');
    let current = metrics(&result.current);
    match &result.base {
        Some(base) => {
            for ((label, cur), (_, base)) in current.iter().zip(metrics(base).iter()) {
                output.push_str(&format!("{}: {}, base {}\n", label, cur, base));
            }
        }
        None => {
            for (label, cur) in &current {
                output.push_str(&format!("{}: {}\n", label, cur));
            }
        }
    }

    output.push_str("\nFiles:\n");
    for row in &result.files {
        let mut line = format!("  {}: {:.1}%", row.path, row.current_pct);
        match (row.base_pct, result.base.is_some()) {
            (Some(base), _) => line.push_str(&format!(" (base {:.1}%, {})", base, format_delta(row))),
            (None, true) => line.push_str(" (new file)"),
            (None, false) => {}
        }
        if let Some(uncovered) = format_uncovered(row) {
            line.push_str(&format!(", uncovered {}", uncovered));
        }
        output.push_str(&line);
        output.push('\n');
    }

    if !result.removed.is_empty() {
        output.push_str("\nRemoved files:\n");
        for path in &result.removed {
            output.push_str(&format!("  {}\n", path));
        }
    }

    output
}

fn push_text_context(output: &mut String, options: &DiffOptions) {
    for (label, value) in context(options) {
        output.push_str(&format!("{}: {}\n", label, value));
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Renders the diff result as pretty-printed JSON.
pub fn render_json(result: &DiffResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
}

/// Render in the requested format.
pub fn render(result: &DiffResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Markdown => render_markdown(result),
        OutputFormat::Text => render_text(result),
        OutputFormat::Json => render_json(result),
    }
}

// ============================================================================
// Tests
// ============================================================================
