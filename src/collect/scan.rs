use std::path::Path;

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::FixerConfig;
use crate::index::FileIndex;
use crate::model::{ImportError, Language};
use crate::parser::ParserRegistry;
use crate::resolver::typescript::TypeScriptResolver;
use crate::resolver::{Resolution, Resolver};

/// Matches specifiers that should never be reported.
///
/// Patterns prefixed with `!` are exclusions. A specifier is ignored if it
/// matches any include pattern and no exclude pattern. An empty pattern list
/// ignores nothing.
pub struct SpecifierFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl SpecifierFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut include_builder = GlobSetBuilder::new();
        let mut exclude_builder = GlobSetBuilder::new();

        for pattern in patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                exclude_builder.add(Glob::new(negated)?);
            } else {
                include_builder.add(Glob::new(pattern)?);
            }
        }

        Ok(Self {
            include: include_builder.build()?,
            exclude: exclude_builder.build()?,
        })
    }

    pub fn is_ignored(&self, specifier: &str) -> bool {
        self.include.is_match(specifier) && !self.exclude.is_match(specifier)
    }
}

/// Result of statically scanning every source file in the index.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub errors: Vec<ImportError>,
    /// Files that could not be read or parsed.
    pub warnings: Vec<String>,
    pub files_scanned: usize,
    pub sites_checked: usize,
}

#[derive(Default)]
struct FileScan {
    errors: Vec<ImportError>,
    warning: Option<String>,
    sites: usize,
}

/// Parse every source file in parallel and report specifiers that do not
/// resolve. A file that cannot be read or parsed becomes a warning; the
/// scan carries on with the rest.
pub fn scan_project(index: &FileIndex, config: &FixerConfig) -> Result<ScanOutcome> {
    let filter = SpecifierFilter::new(&config.scan.ignore_specifiers)?;
    let registry = ParserRegistry::with_defaults();
    let resolver = TypeScriptResolver::new(index, &config.resolve);

    let files: Vec<(&Path, Language)> = index.source_files().collect();
    let results: Vec<FileScan> = files
        .par_iter()
        .map(|(path, language)| scan_file(index, path, *language, &registry, &resolver, &filter))
        .collect();

    let mut outcome = ScanOutcome {
        files_scanned: files.len(),
        ..Default::default()
    };
    for result in results {
        outcome.sites_checked += result.sites;
        outcome.errors.extend(result.errors);
        outcome.warnings.extend(result.warning);
    }

    debug!(
        files = outcome.files_scanned,
        sites = outcome.sites_checked,
        errors = outcome.errors.len(),
        "static scan finished"
    );
    Ok(outcome)
}

fn scan_file(
    index: &FileIndex,
    path: &Path,
    language: Language,
    registry: &ParserRegistry,
    resolver: &TypeScriptResolver<'_>,
    filter: &SpecifierFilter,
) -> FileScan {
    let file_label = index.display_path(path);
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            warn!(file = %file_label, "skipping unreadable file: {}", e);
            return FileScan {
                warning: Some(format!("skipped {}: {}", file_label, e)),
                ..Default::default()
            };
        }
    };

    let parsed = match registry.parse(&source, language) {
        Ok(p) => p,
        Err(e) => {
            warn!(file = %file_label, "skipping unparsable file: {:#}", e);
            return FileScan {
                warning: Some(format!("skipped {}: {:#}", file_label, e)),
                ..Default::default()
            };
        }
    };

    let mut scan = FileScan {
        sites: parsed.sites.len(),
        ..Default::default()
    };
    if parsed.has_syntax_errors {
        // tree-sitter recovers; sites outside the broken region are still usable
        warn!(file = %file_label, "file has syntax errors; imports may be incomplete");
        scan.warning = Some(format!("{} has syntax errors; imports may be incomplete", file_label));
    }

    for site in parsed.sites {
        if filter.is_ignored(&site.specifier) {
            continue;
        }
        match resolver.resolve(&site.specifier, path) {
            Resolution::Resolved(_) | Resolution::ResolvedWithCaveat(..) => {}
            Resolution::External(_) => {}
            Resolution::Unresolved(reason) => {
                scan.errors.push(
                    ImportError::new(path.to_path_buf(), site.specifier)
                        .at(site.position.line, site.position.column)
                        .with_message(reason.to_string()),
                );
            }
        }
    }
    scan
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

    #[test]
    fn test_scan_reports_only_unresolved_local_imports() {
        let (_dir, index) = setup(&[
            (
                "src/main.ts",
                "import React from 'react';\nimport { a } from './a';\nimport b from './missing';\nimport 'virtual:pwa';\n",
            ),
            ("src/a.ts", "export const a = 1;\n"),
        ]);
        let outcome = scan_project(&index, &FixerConfig::default()).unwrap();

        assert_eq!(outcome.files_scanned, 2);
        assert_eq!(outcome.errors.len(), 1);
        let err = &outcome.errors[0];
        assert_eq!(err.specifier, "./missing");
        assert_eq!(err.line, Some(3));
        assert_eq!(err.column, Some(15));
        assert!(err.file.ends_with("src/main.ts"));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_ignore_specifiers() {
        let (_dir, index) = setup(&[(
            "src/main.ts",
            "import a from './generated/api';\nimport b from './gone';\n",
        )]);
        let mut config = FixerConfig::default();
        config.scan.ignore_specifiers = vec!["./generated/**".into()];
        let outcome = scan_project(&index, &config).unwrap();
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].specifier, "./gone");
    }

    #[test]
    fn test_syntax_errors_warn_but_still_report() {
        let (_dir, index) = setup(&[(
            "src/bad.ts",
            "import x from './nowhere';\nconst = = ;\n",
        )]);
        let outcome = scan_project(&index, &FixerConfig::default()).unwrap();
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("src/bad.ts"));
    }

    #[test]
    fn test_invalid_ignore_glob_is_error() {
        let (_dir, index) = setup(&[("src/main.ts", "")]);
        let mut config = FixerConfig::default();
        config.scan.ignore_specifiers = vec!["[".into()];
        assert!(scan_project(&index, &config).is_err());
    }

    #[test]
    fn test_specifier_filter_negation() {
        let filter =
            SpecifierFilter::new(&["~icons/**".to_string(), "!~icons/local/**".to_string()])
                .unwrap();
        assert!(filter.is_ignored("~icons/mdi/home"));
        assert!(!filter.is_ignored("~icons/local/logo"));
        assert!(!SpecifierFilter::new(&[]).unwrap().is_ignored("./a"));
    }
}
