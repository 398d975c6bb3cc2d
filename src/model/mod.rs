use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Source languages the scanner and rewriter understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::JavaScript => "javascript",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Byte range inside a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Syntactic form an import site was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Static,
    ReExport,
    Dynamic,
    Require,
    ImportEquals,
}

/// Names an importer pulls from a module, used to shape generated stubs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bindings {
    pub default: bool,
    pub namespace: bool,
    pub named: Vec<String>,
}

impl Bindings {
    pub fn merge(&mut self, other: &Bindings) {
        self.default |= other.default;
        self.namespace |= other.namespace;
        for name in &other.named {
            if !self.named.contains(name) {
                self.named.push(name.clone());
            }
        }
    }
}

/// One string-literal module specifier found in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSite {
    pub specifier: String,
    /// Bytes between the quotes of the literal.
    pub span: Span,
    pub position: Position,
    pub kind: ImportKind,
    pub bindings: Bindings,
}

/// One unresolved specifier occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportError {
    pub file: PathBuf,
    pub specifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Best candidate that scored below the automatic-fix threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ImportError {
    pub fn new(file: PathBuf, specifier: impl Into<String>) -> Self {
        Self {
            file,
            specifier: specifier.into(),
            line: None,
            column: None,
            error_message: None,
            suggestion: None,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Canonical ordering key: file, specifier, then position.
    pub fn sort_key(&self) -> (&Path, &str, Option<usize>, Option<usize>) {
        (&self.file, &self.specifier, self.line, self.column)
    }
}

/// Name of the strategy that produced a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Heuristic {
    Extension,
    CaseVariation,
    FolderFlip,
    Alias,
    Basename,
    Stub,
}

impl Heuristic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Heuristic::Extension => "extension",
            Heuristic::CaseVariation => "case-variation",
            Heuristic::FolderFlip => "folder-flip",
            Heuristic::Alias => "alias",
            Heuristic::Basename => "basename",
            Heuristic::Stub => "stub",
        }
    }
}

impl FromStr for Heuristic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extension" => Ok(Heuristic::Extension),
            "case-variation" => Ok(Heuristic::CaseVariation),
            "folder-flip" => Ok(Heuristic::FolderFlip),
            "alias" => Ok(Heuristic::Alias),
            "basename" => Ok(Heuristic::Basename),
            "stub" => Ok(Heuristic::Stub),
            _ => Err(format!("unknown heuristic: {}", s)),
        }
    }
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A proposed replacement target for one error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixCandidate {
    pub target_path: PathBuf,
    /// Specifier string that would replace the broken one.
    pub specifier: String,
    pub score: f64,
    pub heuristic: Heuristic,
    pub is_alias: bool,
    pub needs_extension: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixStatus {
    /// Written to disk.
    Applied,
    /// Computed but not written (dry-run or report-only).
    Pending,
    /// The write was attempted and failed.
    Failed,
}

impl FixStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixStatus::Applied => "applied",
            FixStatus::Pending => "pending",
            FixStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for FixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A decided, possibly applied, repair.
///
/// `new_import` differs from `old_import` for every fix except stubs
/// (`heuristic == stub`): those leave the import as written and create the
/// module it names at `stub_path` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFix {
    pub file: PathBuf,
    pub old_import: String,
    pub new_import: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub heuristic: Heuristic,
    pub score: f64,
    pub applied: bool,
    pub status: FixStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<PathBuf>,
    /// Module created for a stub fix. Set only when `heuristic == stub`, in
    /// which case `new_import == old_import`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stub_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<FixCandidate>,
}

impl ImportFix {
    /// A pending fix from the top-ranked candidate; the rest become alternatives.
    pub fn from_candidate(
        error: &ImportError,
        chosen: &FixCandidate,
        alternatives: Vec<FixCandidate>,
    ) -> Self {
        Self {
            file: error.file.clone(),
            old_import: error.specifier.clone(),
            new_import: chosen.specifier.clone(),
            line: error.line,
            heuristic: chosen.heuristic,
            score: chosen.score,
            applied: false,
            status: FixStatus::Pending,
            target_path: Some(chosen.target_path.clone()),
            stub_path: None,
            error: None,
            alternatives,
        }
    }

    /// A placeholder module at `stub_path` satisfies the import unchanged,
    /// so this is the one kind of fix with `new_import == old_import`.
    pub fn stub(error: &ImportError, stub_path: PathBuf) -> Self {
        Self {
            file: error.file.clone(),
            old_import: error.specifier.clone(),
            new_import: error.specifier.clone(),
            line: error.line,
            heuristic: Heuristic::Stub,
            score: 0.0,
            applied: false,
            status: FixStatus::Pending,
            target_path: Some(stub_path.clone()),
            stub_path: Some(stub_path),
            error: None,
            alternatives: Vec::new(),
        }
    }

    pub fn is_stub(&self) -> bool {
        self.heuristic == Heuristic::Stub
    }

    pub fn mark_applied(&mut self) {
        self.applied = true;
        self.status = FixStatus::Applied;
        self.error = None;
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.applied = false;
        self.status = FixStatus::Failed;
        self.error = Some(message.into());
    }
}

/// Run configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixerOptions {
    pub root: PathBuf,
    pub src: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_build: Option<PathBuf>,
    pub run_vite: bool,
    pub dry: bool,
    pub apply: bool,
    pub create_stubs: bool,
    pub prefer_alias: bool,
}

impl FixerOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            src: PathBuf::from("src"),
            ..Default::default()
        }
    }

    /// Only `apply` without `dry` touches the filesystem.
    pub fn writes_enabled(&self) -> bool {
        self.apply && !self.dry
    }
}

/// Which acquisition strategy produced the error list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionStrategy {
    LiveBuild,
    SavedLog,
    StaticScan,
}

impl CollectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStrategy::LiveBuild => "live-build",
            CollectionStrategy::SavedLog => "saved-log",
            CollectionStrategy::StaticScan => "static-scan",
        }
    }
}

impl fmt::Display for CollectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate counts shown in the console summary and stored in the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_errors: usize,
    pub fixed: usize,
    pub pending: usize,
    pub stubbed: usize,
    pub failed: usize,
    pub unresolved: usize,
    pub by_heuristic: BTreeMap<String, usize>,
}

/// Persisted record of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub timestamp: String,
    pub options: FixerOptions,
    pub strategy: CollectionStrategy,
    pub fixes: Vec<ImportFix>,
    pub errors: Vec<ImportError>,
    pub unresolved_count: usize,
    pub fixed_count: usize,
    /// Wall-clock run time in milliseconds.
    pub duration: u64,
    pub summary: Summary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
