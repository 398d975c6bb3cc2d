use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Settings read from `importfix.toml`. Every field has a default so an
/// absent or partial file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixerConfig {
    pub build: BuildConfig,
    pub resolve: ResolveConfig,
    pub scan: ScanConfig,
    pub fix: FixConfig,
    /// Extra alias keys mapped to root-relative directories, e.g. `"@" = "src"`.
    /// Overrides entries of the same key found in tsconfig/jsconfig.
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// Fall back to a static scan when the build or log cannot be used.
    pub fallback_to_scan: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: vec!["npx".into(), "vite".into(), "build".into()],
            timeout_secs: 120,
            fallback_to_scan: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Extensions tried, in order, for extension-less specifiers.
    pub extensions: Vec<String>,
    /// Relative specifiers must spell their extension (Node ESM semantics).
    pub require_extensions: bool,
    /// Resolve case-exactly even when the host filesystem is case-insensitive.
    pub strict_case: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            require_extensions: false,
            strict_case: true,
        }
    }
}

/// Matches the resolution order of Vite's `resolve.extensions` plus TypeScript's.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".mts", ".js", ".jsx", ".mjs", ".cjs", ".json",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Globs of files to leave out of the index and the scan.
    pub exclude: Vec<String>,
    /// Globs of specifiers that are never reported (e.g. `virtual:*`).
    pub ignore_specifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    /// Lowest score a candidate needs to be applied automatically.
    pub min_score: f64,
    pub max_alternatives: usize,
    /// Report location, relative to the project root.
    pub report_path: PathBuf,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            min_score: 0.45,
            max_alternatives: 5,
            report_path: PathBuf::from(".importfix/report.json"),
        }
    }
}

/// Default config file names, searched in order.
const CONFIG_FILENAMES: &[&str] = &[".importfix/config.toml", "importfix.toml"];

/// Find the config file for a project.
///
/// An explicit override is used as-is (and must exist); otherwise the
/// default names are searched in the project root.
pub fn find_config_path(project_root: &Path, config_override: Option<&Path>) -> Option<PathBuf> {
    if let Some(override_path) = config_override {
        let path = if override_path.is_absolute() {
            override_path.to_path_buf()
        } else {
            project_root.join(override_path)
        };
        return path.exists().then_some(path);
    }

    CONFIG_FILENAMES
        .iter()
        .map(|name| project_root.join(name))
        .find(|path| path.exists())
}

impl FixerConfig {
    pub fn parse(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse_from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse_from_str(content: &str) -> Result<Self> {
        let config: FixerConfig = toml::from_str(content)?;
        if !(0.0..=1.0).contains(&config.fix.min_score) {
            anyhow::bail!("fix.min_score must be within 0.0..=1.0");
        }
        Ok(config)
    }

    /// Load the project's config, or defaults when none exists.
    pub fn load(project_root: &Path, config_override: Option<&Path>) -> Result<Self> {
        match (find_config_path(project_root, config_override), config_override) {
            (Some(path), _) => Self::parse(&path),
            (None, Some(missing)) => {
                anyhow::bail!("config file not found: {}", missing.display())
            }
            (None, None) => Ok(Self::default()),
        }
    }
}
