use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

use crate::model::Language;

/// A discovered file. Non-source files (styles, images, JSON) are kept so
/// that asset imports can be resolved; only `language.is_some()` files are
/// parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub language: Option<Language>,
}

impl DiscoveredFile {
    pub fn is_source(&self) -> bool {
        self.language.is_some()
    }
}

/// Configuration for file discovery.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    /// Glob patterns to exclude.
    pub exclude: Vec<String>,
    /// Directories left out of the walk entirely.
    pub skip: Vec<PathBuf>,
}

/// Default exclude patterns for dependency, build output and VCS directories.
const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "node_modules/",
    "dist/",
    "build/",
    "coverage/",
    ".git/",
    ".importfix/",
    "*.d.ts",
];

/// Discover files under `dir`, respecting .gitignore. Results are sorted by path.
pub fn discover_files(dir: &Path, config: &DiscoveryConfig) -> Result<Vec<DiscoveredFile>> {
    let mut files = Vec::new();

    let mut builder = WalkBuilder::new(dir);
    builder
        .hidden(false) // don't skip dot-prefixed dirs entirely (let gitignore decide)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false)
        .parents(true);

    let mut overrides = ignore::overrides::OverrideBuilder::new(dir);
    for pattern in DEFAULT_EXCLUDE_PATTERNS {
        overrides
            .add(&format!("!{}", pattern))
            .context("invalid default exclude pattern")?;
    }
    for pattern in &config.exclude {
        overrides
            .add(&format!("!{}", pattern))
            .with_context(|| format!("invalid exclude pattern: {}", pattern))?;
    }
    builder.overrides(overrides.build().context("failed to build overrides")?);
    if !config.skip.is_empty() {
        let skip = config.skip.clone();
        builder.filter_entry(move |entry| !skip.iter().any(|dir| entry.path() == dir));
    }

    for entry in builder.build() {
        let entry = entry.context("error reading directory entry")?;

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        files.push(DiscoveredFile {
            path: path.to_path_buf(),
            language: Language::from_path(path),
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/index.ts"), "export const x = 1;").unwrap();
        fs::write(root.join("src/utils.ts"), "export function helper() {}").unwrap();
        fs::write(root.join("src/styles.css"), "body { color: red; }").unwrap();
        fs::write(root.join("src/app.jsx"), "export default () => <div />;").unwrap();
        fs::write(root.join("src/env.d.ts"), "declare const X: string;").unwrap();

        fs::write(root.join(".gitignore"), "generated/\n*.log\n").unwrap();
        fs::create_dir_all(root.join("src/generated")).unwrap();
        fs::write(root.join("src/generated/api.ts"), "// ignored").unwrap();

        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("node_modules/pkg/index.ts"), "// ignored").unwrap();

        fs::write(root.join("debug.log"), "some log").unwrap();

        dir
    }

    fn paths(files: &[DiscoveredFile]) -> Vec<PathBuf> {
        files.iter().map(|f| f.path.clone()).collect()
    }

    #[test]
    fn test_discovers_source_and_asset_files() {
        let dir = setup_test_project();
        let files = discover_files(dir.path(), &DiscoveryConfig::default()).unwrap();
        let paths = paths(&files);

        assert!(paths.iter().any(|p| p.ends_with("src/index.ts")));
        assert!(paths.iter().any(|p| p.ends_with("src/app.jsx")));
        assert!(paths.iter().any(|p| p.ends_with("src/styles.css")));

        let css = files.iter().find(|f| f.path.ends_with("styles.css")).unwrap();
        assert!(!css.is_source());
        let jsx = files.iter().find(|f| f.path.ends_with("app.jsx")).unwrap();
        assert_eq!(jsx.language, Some(Language::JavaScript));
    }

    #[test]
    fn test_respects_gitignore_and_defaults() {
        let dir = setup_test_project();
        let files = discover_files(dir.path(), &DiscoveryConfig::default()).unwrap();
        let paths = paths(&files);

        assert!(!paths
            .iter()
            .any(|p| p.to_string_lossy().contains("node_modules")));
        assert!(!paths.iter().any(|p| p.to_string_lossy().contains("generated")));
        assert!(!paths.iter().any(|p| p.to_string_lossy().ends_with(".log")));
        assert!(!paths.iter().any(|p| p.ends_with("src/env.d.ts")));
    }

    #[test]
    fn test_exclude_pattern_filters_files() {
        let dir = setup_test_project();
        let config = DiscoveryConfig {
            exclude: vec!["*.jsx".to_string()],
            ..Default::default()
        };
        let files = discover_files(dir.path(), &config).unwrap();
        let paths = paths(&files);

        assert!(!paths.iter().any(|p| p.to_string_lossy().ends_with(".jsx")));
        assert!(paths.iter().any(|p| p.ends_with("src/index.ts")));
    }

    #[test]
    fn test_skipped_directory_is_not_walked() {
        let dir = setup_test_project();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        let config = DiscoveryConfig {
            skip: vec![dir.path().join("src")],
            ..Default::default()
        };
        let files = discover_files(dir.path(), &config).unwrap();
        let paths = paths(&files);

        assert!(paths.iter().any(|p| p.ends_with("package.json")));
        assert!(!paths.iter().any(|p| p.starts_with(dir.path().join("src"))));
    }

    #[test]
    fn test_results_are_sorted_by_path() {
        let dir = setup_test_project();
        let files = discover_files(dir.path(), &DiscoveryConfig::default()).unwrap();
        for window in files.windows(2) {
            assert!(window[0].path <= window[1].path, "files should be sorted by path");
        }
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let files = discover_files(dir.path(), &DiscoveryConfig::default()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_nonexistent_directory_returns_error() {
        let result = discover_files(
            Path::new("/nonexistent/path/that/surely/doesnt/exist"),
            &DiscoveryConfig::default(),
        );
        assert!(result.is_err(), "should error on nonexistent directory");
    }
}
