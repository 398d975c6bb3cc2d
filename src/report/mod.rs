use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FixerError;
use crate::index::FileIndex;
use crate::model::{
    CollectionStrategy, FixStatus, FixerOptions, ImportError, ImportFix, Report, Summary,
};

/// Everything a finished run produced, with absolute paths.
pub struct RunResult {
    pub options: FixerOptions,
    pub strategy: CollectionStrategy,
    /// Every collected error, with suggestions attached where one exists.
    pub errors: Vec<ImportError>,
    pub fixes: Vec<ImportFix>,
    pub warnings: Vec<String>,
    pub duration: Duration,
}

/// Assemble the persisted report: root-relative paths, canonical ordering
/// and the summary counts.
pub fn build_report(index: &FileIndex, run: RunResult) -> Report {
    let total = run.errors.len();

    let applied: HashSet<(&Path, &str)> = run
        .fixes
        .iter()
        .filter(|f| f.applied)
        .map(|f| (f.file.as_path(), f.old_import.as_str()))
        .collect();
    let with_fix: HashSet<(&Path, &str)> = run
        .fixes
        .iter()
        .map(|f| (f.file.as_path(), f.old_import.as_str()))
        .collect();

    let without_any_fix = run
        .errors
        .iter()
        .filter(|e| !with_fix.contains(&(e.file.as_path(), e.specifier.as_str())))
        .count();
    let mut errors: Vec<ImportError> = run
        .errors
        .iter()
        .filter(|e| !applied.contains(&(e.file.as_path(), e.specifier.as_str())))
        .map(|e| relativize_error(index, e))
        .collect();
    errors.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut summary = summarize(&run.fixes);
    summary.total_errors = total;
    summary.unresolved = without_any_fix;

    let mut fixes: Vec<ImportFix> = run.fixes.iter().map(|f| relativize_fix(index, f)).collect();
    fixes.sort_by(|a, b| (&a.file, &a.old_import, a.line).cmp(&(&b.file, &b.old_import, b.line)));

    let fixed_count = fixes.iter().filter(|f| f.applied).count();
    Report {
        timestamp: format_timestamp(),
        options: run.options,
        strategy: run.strategy,
        unresolved_count: errors.len(),
        fixed_count,
        fixes,
        errors,
        duration: run.duration.as_millis() as u64,
        summary,
        warnings: run.warnings,
    }
}

/// Per-status and per-heuristic counts. Stub fixes are counted as
/// `stubbed` whatever their status, unless their write failed.
pub fn summarize(fixes: &[ImportFix]) -> Summary {
    let mut summary = Summary::default();
    for fix in fixes {
        *summary
            .by_heuristic
            .entry(fix.heuristic.as_str().to_string())
            .or_insert(0) += 1;
        match fix.status {
            FixStatus::Failed => summary.failed += 1,
            _ if fix.is_stub() => summary.stubbed += 1,
            FixStatus::Applied => summary.fixed += 1,
            FixStatus::Pending => summary.pending += 1,
        }
    }
    summary
}

/// Persist `report` as pretty-printed JSON, creating parent directories.
pub fn write_report(report: &Report, path: &Path) -> Result<(), FixerError> {
    let to_write_error = |source| FixerError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_write_error)?;
    }
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| to_write_error(std::io::Error::other(e)))?;
    fs::write(path, json + "\n").map_err(to_write_error)
}

fn relativize(index: &FileIndex, path: &Path) -> PathBuf {
    PathBuf::from(index.display_path(path))
}

fn relativize_error(index: &FileIndex, error: &ImportError) -> ImportError {
    ImportError {
        file: relativize(index, &error.file),
        ..error.clone()
    }
}

fn relativize_fix(index: &FileIndex, fix: &ImportFix) -> ImportFix {
    let mut fix = fix.clone();
    fix.file = relativize(index, &fix.file);
    fix.target_path = fix.target_path.as_deref().map(|p| relativize(index, p));
    fix.stub_path = fix.stub_path.as_deref().map(|p| relativize(index, p));
    for alt in &mut fix.alternatives {
        alt.target_path = relativize(index, &alt.target_path);
    }
    fix
}

/// Current time as ISO 8601 UTC.
fn format_timestamp() -> String {
    use chrono::{DateTime, Utc};
    use std::time::SystemTime;

    let datetime: DateTime<Utc> = SystemTime::now().into();
    datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
