use std::path::{Path, PathBuf};

pub mod alias;
pub mod tsconfig;
pub mod typescript;

/// Result of resolving an import path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Successfully resolved to an absolute file path.
    Resolved(PathBuf),
    /// Resolved but with a caveat about precision.
    ResolvedWithCaveat(PathBuf, ResolutionCaveat),
    /// The import refers to an external package or a non-file scheme.
    External(String),
    /// Could not resolve the import.
    Unresolved(UnresolvedReason),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            Resolution::Resolved(_) | Resolution::ResolvedWithCaveat(..)
        )
    }

    pub fn resolved_path(&self) -> Option<&Path> {
        match self {
            Resolution::Resolved(p) | Resolution::ResolvedWithCaveat(p, _) => Some(p),
            _ => None,
        }
    }
}

/// Caveats that reduce confidence in a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionCaveat {
    /// Resolved via a configured path alias.
    PathAlias,
    /// Only matched case-insensitively; will break on case-sensitive filesystems.
    CaseMismatch,
}

/// Reasons why an import could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The target file was not found in the index.
    FileNotFound(String),
    /// The file exists but strict ESM resolution needs the extension spelled out.
    MissingExtension(String),
    /// The import syntax is not supported by this resolver.
    UnsupportedSyntax(String),
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::FileNotFound(s) => write!(f, "cannot find module '{}'", s),
            UnresolvedReason::MissingExtension(s) => {
                write!(f, "module '{}' must be imported with its file extension", s)
            }
            UnresolvedReason::UnsupportedSyntax(s) => write!(f, "unsupported import: {}", s),
        }
    }
}

/// Trait for import resolution.
///
/// The resolver takes an import path string (e.g. `"./utils"`, `"@/components/Button"`)
/// and the file containing the import, and resolves it to an actual file path.
pub trait Resolver: Send + Sync {
    /// Resolve an import path to a file.
    ///
    /// - `import_source`: The string literal from the import statement (e.g. `"./utils"`)
    /// - `from_file`: The absolute path of the file containing the import
    fn resolve(&self, import_source: &str, from_file: &Path) -> Resolution;
}
