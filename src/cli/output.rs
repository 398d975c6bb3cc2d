use std::path::PathBuf;

use serde::Serialize;

use super::OutputFormat;
use crate::collect::CollectOutcome;
use crate::index::FileIndex;
use crate::model::{ImportError, ImportFix, Report};

/// Format any serializable value as JSON.
pub fn format_json<T: Serialize>(value: &T, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Compact => serde_json::to_string(value).unwrap_or_default(),
        OutputFormat::Json | OutputFormat::Text => {
            serde_json::to_string_pretty(value).unwrap_or_default()
        }
    }
}

/// Render a run: the fix table, unresolved errors, warnings and the summary.
pub fn format_report(report: &Report, format: &OutputFormat) -> String {
    if !matches!(format, OutputFormat::Text) {
        return format_json(report, format);
    }

    let mut output = String::new();
    if !report.fixes.is_empty() {
        let rows: Vec<[String; 5]> = report.fixes.iter().map(fix_row).collect();
        let widths: Vec<usize> = (0..5)
            .map(|i| rows.iter().map(|r| r[i].len()).max().unwrap_or(0))
            .collect();
        output.push_str(&format!(
            "{:<w0$}  {:<w1$}  {:<w2$}  {:>w3$}  {}\n",
            "FILE",
            "IMPORT",
            "HEURISTIC",
            "SCORE",
            "STATUS",
            w0 = widths[0].max(4),
            w1 = widths[1].max(6),
            w2 = widths[2].max(9),
            w3 = widths[3].max(5),
        ));
        for (fix, row) in report.fixes.iter().zip(&rows) {
            output.push_str(&format!(
                "{:<w0$}  {:<w1$}  {:<w2$}  {:>w3$}  {}\n",
                row[0],
                row[1],
                row[2],
                row[3],
                row[4],
                w0 = widths[0].max(4),
                w1 = widths[1].max(6),
                w2 = widths[2].max(9),
                w3 = widths[3].max(5),
            ));
            if let Some(error) = &fix.error {
                output.push_str(&format!("    error: {}\n", error));
            }
        }
    }

    let unresolved: Vec<&ImportError> = report
        .errors
        .iter()
        .filter(|e| !has_fix(&report.fixes, e))
        .collect();
    if !unresolved.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&format!("Unresolved imports ({}):\n", unresolved.len()));
        for error in unresolved {
            output.push_str(&format!("  {}  '{}'", location(error), error.specifier));
            if let Some(suggestion) = &error.suggestion {
                output.push_str(&format!("  (maybe '{}')", suggestion));
            }
            output.push('\n');
        }
    }

    if !report.warnings.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        for warning in &report.warnings {
            output.push_str(&format!("warning: {}\n", warning));
        }
    }

    if !output.is_empty() {
        output.push('\n');
    }
    output.push_str(&format_summary(report));
    output
}

fn fix_row(fix: &ImportFix) -> [String; 5] {
    let change = match &fix.stub_path {
        Some(stub) if fix.is_stub() => format!("{} (stub {})", fix.old_import, stub.display()),
        _ => format!("{} -> {}", fix.old_import, fix.new_import),
    };
    [
        fix.file.display().to_string(),
        change,
        fix.heuristic.to_string(),
        format!("{:.2}", fix.score),
        fix.status.to_string(),
    ]
}

fn has_fix(fixes: &[ImportFix], error: &ImportError) -> bool {
    fixes
        .iter()
        .any(|f| f.file == error.file && f.old_import == error.specifier)
}

fn location(error: &ImportError) -> String {
    match (error.line, error.column) {
        (Some(line), Some(column)) => format!("{}:{}:{}", error.file.display(), line, column),
        (Some(line), None) => format!("{}:{}", error.file.display(), line),
        _ => error.file.display().to_string(),
    }
}

/// One-line summary, e.g. `3 errors: 2 fixed, 0 pending, 1 stubbed, 0 failed, 0 unresolved`.
pub fn format_summary(report: &Report) -> String {
    let s = &report.summary;
    let mut line = format!(
        "{} errors: {} fixed, {} pending, {} stubbed, {} failed, {} unresolved ({}, {}ms)",
        s.total_errors,
        s.fixed,
        s.pending,
        s.stubbed,
        s.failed,
        s.unresolved,
        report.strategy,
        report.duration,
    );
    if !s.by_heuristic.is_empty() {
        let parts: Vec<String> = s
            .by_heuristic
            .iter()
            .map(|(h, n)| format!("{}: {}", h, n))
            .collect();
        line.push_str(&format!("\nBy heuristic: {}", parts.join(", ")));
    }
    line
}

/// Render the output of `scan`.
pub fn format_errors(index: &FileIndex, outcome: &CollectOutcome, format: &OutputFormat) -> String {
    let errors: Vec<ImportError> = outcome
        .errors
        .iter()
        .map(|e| ImportError {
            file: PathBuf::from(index.display_path(&e.file)),
            ..e.clone()
        })
        .collect();

    match format {
        OutputFormat::Json | OutputFormat::Compact => format_json(&errors, format),
        OutputFormat::Text => {
            let mut output = String::new();
            for error in &errors {
                output.push_str(&format!("{}  '{}'", location(error), error.specifier));
                if let Some(message) = &error.error_message {
                    output.push_str(&format!("  {}", message));
                }
                output.push('\n');
            }
            for warning in &outcome.warnings {
                output.push_str(&format!("warning: {}\n", warning));
            }
            output.push_str(&format!(
                "{} unresolved imports ({})",
                errors.len(),
                outcome.strategy
            ));
            output
        }
    }
}
