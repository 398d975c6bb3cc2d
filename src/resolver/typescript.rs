use std::path::{Path, PathBuf};

use crate::config::ResolveConfig;
use crate::index::FileIndex;

use super::alias::join_segments;
use super::{Resolution, ResolutionCaveat, Resolver, UnresolvedReason};

/// Index file names tried, with each extension, when an import points to a directory.
const INDEX_STEM: &str = "index";

/// Script extensions TypeScript maps onto their source counterparts
/// (`./util.js` may be written for `util.ts`).
const SCRIPT_EXTENSION_MAP: &[(&str, &[&str])] = &[
    ("js", &["ts", "tsx"]),
    ("jsx", &["tsx"]),
    ("mjs", &["mts"]),
    ("cjs", &["cts"]),
];

/// Directory Vite serves at `/` without processing.
const PUBLIC_DIR: &str = "public";

/// Schemes and prefixes that never name a project file.
const NON_FILE_PREFIXES: &[&str] = &["node:", "virtual:", "data:", "http://", "https://", "\0"];

/// TypeScript/JavaScript import resolver over a [`FileIndex`].
///
/// Handles:
/// - Relative imports (`./foo`, `../bar`)
/// - Index file resolution (`./services` -> `./services/index.ts`)
/// - Configured path aliases (`@/components/Button`)
/// - Root-absolute imports (`/src/main.ts`, Vite style)
/// - Public assets (`/vite.svg` -> `public/vite.svg`)
/// - Files outside the source directory (`../package.json`)
/// - tsconfig `baseUrl` resolution
/// - External package detection (bare specifiers -> `External`)
///
/// Does NOT handle node_modules resolution, package.json `exports`, or
/// dynamic imports with computed paths.
pub struct TypeScriptResolver<'a> {
    index: &'a FileIndex,
    extensions: Vec<String>,
    require_extensions: bool,
    /// Accept case-insensitive matches when the host filesystem would.
    lenient_case: bool,
}

impl<'a> TypeScriptResolver<'a> {
    pub fn new(index: &'a FileIndex, config: &ResolveConfig) -> Self {
        Self {
            index,
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
            require_extensions: config.require_extensions,
            lenient_case: !config.strict_case && !index.case_sensitive(),
        }
    }

    pub fn index(&self) -> &'a FileIndex {
        self.index
    }

    /// Extensions tried for extension-less specifiers, without the dot.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Resolve `base` to a project file: exact, then with each extension,
    /// then as a directory with an index file.
    pub fn try_with_extensions(&self, base: &Path) -> Option<PathBuf> {
        if self.index.exists(base) {
            return Some(base.to_path_buf());
        }

        for ext in &self.extensions {
            let with_ext = append_extension(base, ext);
            if self.index.exists(&with_ext) {
                return Some(with_ext);
            }
        }

        for ext in &self.extensions {
            let with_index = base.join(format!("{}.{}", INDEX_STEM, ext));
            if self.index.exists(&with_index) {
                return Some(with_index);
            }
        }

        self.try_script_counterpart(base)
    }

    /// `./util.js` -> `./util.ts` the way TypeScript's bundler resolution does.
    fn try_script_counterpart(&self, base: &Path) -> Option<PathBuf> {
        let ext = base.extension()?.to_str()?;
        let (_, sources) = SCRIPT_EXTENSION_MAP.iter().find(|(e, _)| *e == ext)?;
        sources
            .iter()
            .map(|src_ext| base.with_extension(src_ext))
            .find(|candidate| self.index.exists(candidate))
    }

    fn try_strict(&self, base: &Path) -> Option<PathBuf> {
        if self.index.exists(base) {
            return Some(base.to_path_buf());
        }
        self.try_script_counterpart(base)
    }

    fn finish(
        &self,
        import_source: &str,
        base: PathBuf,
        caveat: Option<ResolutionCaveat>,
        implicit: bool,
    ) -> Resolution {
        let found = if implicit {
            self.try_with_extensions(&base)
        } else {
            self.try_strict(&base)
        };

        if let Some(path) = found {
            return match caveat {
                Some(c) => Resolution::ResolvedWithCaveat(path, c),
                None => Resolution::Resolved(path),
            };
        }

        if self.lenient_case {
            if let Some(path) = self.try_ignore_case(&base, implicit) {
                return Resolution::ResolvedWithCaveat(path, ResolutionCaveat::CaseMismatch);
            }
        }

        if !implicit && self.try_with_extensions(&base).is_some() {
            return Resolution::Unresolved(UnresolvedReason::MissingExtension(
                import_source.to_string(),
            ));
        }

        Resolution::Unresolved(UnresolvedReason::FileNotFound(import_source.to_string()))
    }

    fn try_ignore_case(&self, base: &Path, implicit: bool) -> Option<PathBuf> {
        let mut bases = vec![base.to_path_buf()];
        if implicit {
            bases.extend(self.extensions.iter().map(|ext| append_extension(base, ext)));
            bases.extend(
                self.extensions
                    .iter()
                    .map(|ext| base.join(format!("{}.{}", INDEX_STEM, ext))),
            );
        }
        bases
            .iter()
            .find_map(|b| self.index.lookup_ignore_case(b).first().cloned())
    }

    /// Check if an import path looks like a bare specifier (external package).
    fn is_bare_specifier(import_source: &str) -> bool {
        !import_source.starts_with('.') && !import_source.starts_with('/')
    }

    /// Extract the package name from a bare specifier.
    /// e.g. "react" -> "react", "@types/node" -> "@types/node",
    /// "lodash/debounce" -> "lodash"
    fn extract_package_name(import_source: &str) -> &str {
        if import_source.starts_with('@') {
            // Scoped package: @scope/package or @scope/package/subpath
            match import_source.find('/') {
                Some(first_slash) => match import_source[first_slash + 1..].find('/') {
                    Some(second_slash) => &import_source[..first_slash + 1 + second_slash],
                    None => import_source,
                },
                None => import_source,
            }
        } else {
            match import_source.find('/') {
                Some(slash) => &import_source[..slash],
                None => import_source,
            }
        }
    }
}

impl Resolver for TypeScriptResolver<'_> {
    fn resolve(&self, import_source: &str, from_file: &Path) -> Resolution {
        if import_source.is_empty() {
            return Resolution::Unresolved(UnresolvedReason::UnsupportedSyntax(
                "empty import path".to_string(),
            ));
        }

        if import_source.starts_with('#')
            || NON_FILE_PREFIXES.iter().any(|p| import_source.starts_with(p))
        {
            return Resolution::External(import_source.to_string());
        }

        let spec = strip_query(import_source);

        // Relative imports
        if is_relative(spec) {
            let base_dir = match from_file.parent() {
                Some(dir) => dir,
                None => {
                    return Resolution::Unresolved(UnresolvedReason::FileNotFound(format!(
                        "cannot determine parent directory of {}",
                        from_file.display()
                    )))
                }
            };
            let base = join_segments(base_dir, spec);
            return self.finish(import_source, base, None, !self.require_extensions);
        }

        // Configured aliases
        if let Some(base) = self.index.aliases().expand(spec) {
            return self.finish(import_source, base, Some(ResolutionCaveat::PathAlias), true);
        }

        // Root-absolute: project root first (bundler style), then public
        // assets, then the filesystem path
        if let Some(rest) = spec.strip_prefix('/') {
            let in_root = join_segments(self.index.root(), rest);
            if let Some(path) = self.try_with_extensions(&in_root) {
                return Resolution::Resolved(path);
            }
            let in_public = join_segments(&self.index.root().join(PUBLIC_DIR), rest);
            if self.index.exists(&in_public) {
                return Resolution::Resolved(in_public);
            }
            return self.finish(import_source, PathBuf::from(spec), None, true);
        }

        // baseUrl lookups for non-relative paths that exist in the project
        if let Some(base_url) = self.index.base_url() {
            if let Some(path) = self.try_with_extensions(&join_segments(base_url, spec)) {
                return Resolution::Resolved(path);
            }
        }

        if Self::is_bare_specifier(spec) {
            return Resolution::External(Self::extract_package_name(spec).to_string());
        }

        Resolution::Unresolved(UnresolvedReason::UnsupportedSyntax(format!(
            "unrecognized import pattern: {}",
            import_source
        )))
    }
}

pub fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Drop `?query` and `#hash` suffixes (`./logo.svg?url`, `./a.css?inline`).
pub fn strip_query(specifier: &str) -> &str {
    let end = specifier.find(['?', '#']).unwrap_or(specifier.len());
    &specifier[..end]
}

/// `base` with `.ext` appended to the file name (not replacing an existing one).
pub fn append_extension(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}
