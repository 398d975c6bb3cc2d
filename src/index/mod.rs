use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::FixerConfig;
use crate::discovery::{discover_files, DiscoveredFile, DiscoveryConfig};
use crate::error::FixerError;
use crate::model::Language;
use crate::resolver::alias::{join_segments, normalize_path, to_slash, AliasMap};
use crate::resolver::tsconfig::TsConfig;

/// Snapshot of the project's resolvable namespace.
///
/// Built once per run and never mutated afterwards, so it can be shared by
/// reference across worker threads.
#[derive(Debug, Clone)]
pub struct FileIndex {
    root: PathBuf,
    src: PathBuf,
    /// Absolute path -> module id (root-relative, `/`-separated).
    files: BTreeMap<PathBuf, String>,
    /// Files the scanner parses.
    sources: BTreeMap<PathBuf, Language>,
    /// Files under root but outside src (`package.json`, `public/`).
    outside: BTreeSet<PathBuf>,
    /// Directory -> sorted entry names (files and subdirectories).
    directories: BTreeMap<PathBuf, Vec<String>>,
    aliases: AliasMap,
    base_url: Option<PathBuf>,
    /// Lower-cased module name -> files. A module name is the file stem, or
    /// the directory name for `index` files.
    by_name: HashMap<String, Vec<PathBuf>>,
    /// Lower-cased absolute path -> files.
    by_lower_path: HashMap<String, Vec<PathBuf>>,
    case_sensitive: bool,
}

impl FileIndex {
    /// Build the index for `root`/`src`, reading aliases from tsconfig/jsconfig
    /// and the `[aliases]` table of `config`.
    ///
    /// A missing root is a configuration error; a missing or empty `src`
    /// yields an empty index.
    pub fn build(root: &Path, src: &Path, config: &FixerConfig) -> Result<Self, FixerError> {
        let root = root.canonicalize().map_err(|e| {
            FixerError::config(format!("project root {} is not accessible: {}", root.display(), e))
        })?;
        if !root.is_dir() {
            return Err(FixerError::config(format!(
                "project root {} is not a directory",
                root.display()
            )));
        }

        let src_path = normalize_path(&root.join(src));
        if src_path.exists() && !src_path.is_dir() {
            return Err(FixerError::config(format!(
                "source directory {} is not a directory",
                src_path.display()
            )));
        }

        let (src, mut files) = if src_path.is_dir() {
            let src = src_path.canonicalize().map_err(|e| {
                FixerError::config(format!("cannot read {}: {}", src_path.display(), e))
            })?;
            let discovery = DiscoveryConfig {
                exclude: config.scan.exclude.clone(),
                ..Default::default()
            };
            let files = discover_files(&src, &discovery)
                .map_err(|e| FixerError::config(format!("{:#}", e)))?;
            (src, files)
        } else {
            warn!(src = %src_path.display(), "source directory does not exist; index is empty");
            (src_path, Vec::new())
        };

        // The rest of the project: resolvable, never scanned or proposed
        if src != root {
            let discovery = DiscoveryConfig {
                exclude: config.scan.exclude.clone(),
                skip: vec![src.clone()],
            };
            let outside = discover_files(&root, &discovery)
                .map_err(|e| FixerError::config(format!("{:#}", e)))?;
            debug!(files = outside.len(), "indexed files outside the source directory");
            files.extend(outside);
        }

        let (mut aliases, base_url) = match TsConfig::find(&root) {
            Some(Ok(tsconfig)) => (tsconfig.aliases(), tsconfig.base_url),
            Some(Err(e)) => {
                warn!("ignoring unreadable tsconfig: {:#}", e);
                (AliasMap::new(), None)
            }
            None => (AliasMap::new(), None),
        };
        for (key, target) in &config.aliases {
            aliases.insert(key, join_segments(&root, target));
        }

        let case_sensitive = probe_case_sensitive(&root);
        let index = Self::from_files(root, src, files, aliases, base_url, case_sensitive);
        info!(
            files = index.len(),
            sources = index.sources.len(),
            aliases = index.aliases.len(),
            case_sensitive,
            "built file index"
        );
        Ok(index)
    }

    /// Assemble an index from already-discovered files. Files outside `src`
    /// only count for [`FileIndex::exists`].
    pub fn from_files(
        root: PathBuf,
        src: PathBuf,
        files: Vec<DiscoveredFile>,
        aliases: AliasMap,
        base_url: Option<PathBuf>,
        case_sensitive: bool,
    ) -> Self {
        let mut index = FileIndex {
            root,
            src,
            files: BTreeMap::new(),
            sources: BTreeMap::new(),
            outside: BTreeSet::new(),
            directories: BTreeMap::new(),
            aliases,
            base_url,
            by_name: HashMap::new(),
            by_lower_path: HashMap::new(),
            case_sensitive,
        };

        let mut dir_entries: BTreeMap<PathBuf, BTreeSet<String>> = BTreeMap::new();
        dir_entries.entry(index.src.clone()).or_default();

        for file in files {
            let path = normalize_path(&file.path);
            if !path.starts_with(&index.src) {
                index.outside.insert(path);
                continue;
            }
            let module_id = path
                .strip_prefix(&index.root)
                .map(to_slash)
                .unwrap_or_else(|_| path.to_string_lossy().into_owned());

            // Register the file and every ancestor directory up to src
            let mut child = path.as_path();
            while let Some(parent) = child.parent() {
                if let Some(name) = child.file_name() {
                    dir_entries
                        .entry(parent.to_path_buf())
                        .or_default()
                        .insert(name.to_string_lossy().into_owned());
                }
                if parent == index.src || !parent.starts_with(&index.src) {
                    break;
                }
                child = parent;
            }

            if let Some(name) = module_name(&path) {
                index
                    .by_name
                    .entry(name.to_lowercase())
                    .or_default()
                    .push(path.clone());
            }
            index
                .by_lower_path
                .entry(path.to_string_lossy().to_lowercase())
                .or_default()
                .push(path.clone());

            if let Some(language) = file.language {
                index.sources.insert(path.clone(), language);
            }
            index.files.insert(path, module_id);
        }

        for paths in index.by_name.values_mut() {
            paths.sort();
        }
        index.directories = dir_entries
            .into_iter()
            .map(|(dir, names)| (dir, names.into_iter().collect()))
            .collect();

        debug!(directories = index.directories.len(), "indexed directories");
        index
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src(&self) -> &Path {
        &self.src
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Exact (case-sensitive) membership test over the source tree.
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Whether `path` is a known file anywhere in the project. Imports may
    /// reach these files, but fixes only ever target [`FileIndex::contains`].
    pub fn exists(&self, path: &Path) -> bool {
        self.contains(path) || self.outside.contains(path)
    }

    pub fn module_id(&self, path: &Path) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// All indexed files in path order.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Parseable source files in path order.
    pub fn source_files(&self) -> impl Iterator<Item = (&Path, Language)> {
        self.sources.iter().map(|(p, l)| (p.as_path(), *l))
    }

    pub fn language_of(&self, path: &Path) -> Option<Language> {
        self.sources.get(path).copied()
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        self.directories.contains_key(path)
    }

    /// Sorted entry names of an indexed directory.
    pub fn entries(&self, dir: &Path) -> Option<&[String]> {
        self.directories.get(dir).map(Vec::as_slice)
    }

    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    pub fn base_url(&self) -> Option<&Path> {
        self.base_url.as_deref()
    }

    /// Whether the host filesystem distinguishes `a.ts` from `A.ts`.
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Files whose module name equals `name` ignoring case.
    pub fn find_by_name(&self, name: &str) -> &[PathBuf] {
        self.by_name
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Files whose full path equals `path` ignoring case.
    pub fn lookup_ignore_case(&self, path: &Path) -> &[PathBuf] {
        self.by_lower_path
            .get(&path.to_string_lossy().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Root-relative display form of any path.
    pub fn display_path(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) => to_slash(rel),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }
}

/// File stem, or the parent directory name for `index.*` files.
pub fn module_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    if stem == "index" {
        return path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(str::to_string);
    }
    Some(stem.to_string())
}

/// Detect whether the filesystem holding `root` is case-sensitive by looking
/// for the root under a case-swapped name.
fn probe_case_sensitive(root: &Path) -> bool {
    let name = root.file_name().and_then(|n| n.to_str());
    if let Some(name) = name {
        let swapped: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect();
        if swapped != name {
            return !root.with_file_name(swapped).exists();
        }
    }
    cfg!(not(any(target_os = "macos", target_os = "windows")))
}
