use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::FixerConfig;
use crate::error::{CollectionError, FixerError};
use crate::index::FileIndex;
use crate::model::{CollectionStrategy, FixerOptions, ImportError};

pub mod build;
pub mod diagnostics;
pub mod scan;

use build::run_build;
use diagnostics::parse_build_output;
use scan::scan_project;

/// De-duplicated, sorted errors plus how they were obtained.
#[derive(Debug, Clone)]
pub struct CollectOutcome {
    pub errors: Vec<ImportError>,
    pub warnings: Vec<String>,
    pub strategy: CollectionStrategy,
}

/// Gathers unresolved-import records for one run.
///
/// Exactly one strategy runs, in priority order: live build, saved log,
/// static scan. A failed build or unusable log falls back to the static scan
/// unless `build.fallback_to_scan` is off.
pub struct ErrorCollector<'a> {
    index: &'a FileIndex,
    config: &'a FixerConfig,
}

impl<'a> ErrorCollector<'a> {
    pub fn new(index: &'a FileIndex, config: &'a FixerConfig) -> Self {
        Self { index, config }
    }

    pub fn collect(&self, options: &FixerOptions) -> Result<CollectOutcome, FixerError> {
        let attempt = if options.run_vite {
            Some((CollectionStrategy::LiveBuild, self.collect_live()))
        } else {
            options
                .from_build
                .as_deref()
                .map(|log| (CollectionStrategy::SavedLog, self.collect_saved_log(log)))
        };

        let mut warnings = Vec::new();
        match attempt {
            Some((strategy, Ok(records))) => {
                return Ok(self.finish(records, warnings, strategy));
            }
            Some((strategy, Err(e))) => {
                if !self.config.build.fallback_to_scan {
                    return Err(e.into());
                }
                warn!(%strategy, "collection failed, falling back to static scan: {}", e);
                warnings.push(format!("{} failed ({}); used static scan instead", strategy, e));
            }
            None => {}
        }

        let outcome = scan_project(self.index, self.config)
            .map_err(|e| FixerError::config(format!("invalid scan settings: {:#}", e)))?;
        warnings.extend(outcome.warnings);
        Ok(self.finish(outcome.errors, warnings, CollectionStrategy::StaticScan))
    }

    fn collect_live(&self) -> Result<Vec<ImportError>, CollectionError> {
        let build = &self.config.build;
        let output = run_build(
            &build.command,
            self.index.root(),
            Duration::from_secs(build.timeout_secs),
        )?;
        let records = parse_build_output(&output.output, self.index.root());
        info!(
            exit_code = ?output.exit_code,
            records = records.len(),
            "parsed build output"
        );
        if records.is_empty() && !output.success {
            return Err(CollectionError::Unparsable {
                exit_code: output.exit_code,
            });
        }
        Ok(records)
    }

    fn collect_saved_log(&self, log: &Path) -> Result<Vec<ImportError>, CollectionError> {
        let path = if log.is_absolute() {
            log.to_path_buf()
        } else {
            self.index.root().join(log)
        };
        let text = std::fs::read_to_string(&path).map_err(|source| CollectionError::Io {
            path: path.clone(),
            source,
        })?;
        let records = parse_build_output(&text, self.index.root());
        info!(log = %path.display(), records = records.len(), "parsed saved build log");
        if records.is_empty() {
            // Nothing recognisable; let the scan decide
            return Err(CollectionError::Unparsable { exit_code: None });
        }
        Ok(records)
    }

    /// Keep records for indexed files, coalesce (file, specifier) duplicates
    /// keeping the earliest position, and sort canonically.
    fn finish(
        &self,
        records: Vec<ImportError>,
        warnings: Vec<String>,
        strategy: CollectionStrategy,
    ) -> CollectOutcome {
        let mut errors: Vec<ImportError> = records
            .into_iter()
            .filter(|e| !e.specifier.is_empty())
            .filter_map(|mut e| {
                if self.index.contains(&e.file) {
                    return Some(e);
                }
                match e.file.canonicalize() {
                    Ok(canonical) if self.index.contains(&canonical) => {
                        e.file = canonical;
                        Some(e)
                    }
                    _ => {
                        debug!(file = %e.file.display(), specifier = %e.specifier, "dropping record for file outside the index");
                        None
                    }
                }
            })
            .collect();

        // Records with a position sort before records without one
        errors.sort_by(|a, b| {
            (&a.file, &a.specifier, a.line.is_none(), a.line, a.column).cmp(&(
                &b.file,
                &b.specifier,
                b.line.is_none(),
                b.line,
                b.column,
            ))
        });
        errors.dedup_by(|later, earlier| later.file == earlier.file && later.specifier == earlier.specifier);

        info!(%strategy, errors = errors.len(), "collected unresolved imports");
        CollectOutcome {
            errors,
            warnings,
            strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup(files: &[(&str, &str)]) -> (TempDir, FileIndex) {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let index = FileIndex::build(dir.path(), Path::new("src"), &FixerConfig::default()).unwrap();
        (dir, index)
    }

    fn project() -> (TempDir, FileIndex) {
        setup(&[
            ("src/a.ts", "import b from './b';\nimport c from './c';\n"),
            ("src/c.ts", "export default 1;\n"),
        ])
    }

    #[test]
    fn test_static_scan_is_default() {
        let (dir, index) = project();
        let config = FixerConfig::default();
        let outcome = ErrorCollector::new(&index, &config)
            .collect(&FixerOptions::new(dir.path()))
            .unwrap();
        assert_eq!(outcome.strategy, CollectionStrategy::StaticScan);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].specifier, "./b");
    }

    #[test]
    fn test_saved_log_is_parsed_deduplicated_and_filtered() {
        let (dir, index) = project();
        let log = "src/a.ts(1,15): error TS2307: Cannot find module './b'.\n\
                   src/a.ts(1,15): error TS2307: Cannot find module './b'.\n\
                   [vite]: Rollup failed to resolve import \"./b\" from \"src/a.ts\".\n\
                   src/outside.ts(1,1): error TS2307: Cannot find module './x'.\n";
        fs::write(dir.path().join("build.log"), log).unwrap();

        let mut options = FixerOptions::new(dir.path());
        options.from_build = Some("build.log".into());
        let config = FixerConfig::default();
        let outcome = ErrorCollector::new(&index, &config).collect(&options).unwrap();

        assert_eq!(outcome.strategy, CollectionStrategy::SavedLog);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].line, Some(1));
        assert_eq!(outcome.errors[0].column, Some(15));
    }

    #[test]
    fn test_missing_log_falls_back_to_scan() {
        let (dir, index) = project();
        let mut options = FixerOptions::new(dir.path());
        options.from_build = Some("nope.log".into());
        let config = FixerConfig::default();
        let outcome = ErrorCollector::new(&index, &config).collect(&options).unwrap();
        assert_eq!(outcome.strategy, CollectionStrategy::StaticScan);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("saved-log"));
    }

    #[test]
    fn test_missing_log_without_fallback_is_fatal() {
        let (dir, index) = project();
        let mut options = FixerOptions::new(dir.path());
        options.from_build = Some("nope.log".into());
        let mut config = FixerConfig::default();
        config.build.fallback_to_scan = false;
        let result = ErrorCollector::new(&index, &config).collect(&options);
        assert!(matches!(
            result,
            Err(FixerError::Collection(CollectionError::Io { .. }))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_live_build_output_is_parsed() {
        let (dir, index) = project();
        let mut config = FixerConfig::default();
        config.build.command = vec![
            "sh".into(),
            "-c".into(),
            "echo 'src/a.ts:1:15 - error TS2307: Cannot find module '\\''./b'\\''.' 1>&2; exit 2"
                .into(),
        ];
        let mut options = FixerOptions::new(dir.path());
        options.run_vite = true;
        let outcome = ErrorCollector::new(&index, &config).collect(&options).unwrap();
        assert_eq!(outcome.strategy, CollectionStrategy::LiveBuild);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].specifier, "./b");
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_build_without_records_is_unparsable() {
        let (dir, index) = project();
        let mut config = FixerConfig::default();
        config.build.command = vec!["sh".into(), "-c".into(), "echo boom; exit 1".into()];
        config.build.fallback_to_scan = false;
        let mut options = FixerOptions::new(dir.path());
        options.run_vite = true;
        let result = ErrorCollector::new(&index, &config).collect(&options);
        assert!(matches!(
            result,
            Err(FixerError::Collection(CollectionError::Unparsable { exit_code: Some(1) }))
        ));
    }
}
