use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::index::FileIndex;
use crate::model::{FixCandidate, Heuristic, ImportError};
use crate::resolver::alias::join_segments;
use crate::resolver::typescript::{is_relative, strip_query, TypeScriptResolver};
use crate::rewrite::style::{divergence, ImportStyle, SpecifierBuilder};

pub mod heuristics;

/// Everything a heuristic may consult for one error.
pub struct ResolveContext<'a> {
    pub index: &'a FileIndex,
    pub resolver: &'a TypeScriptResolver<'a>,
    pub error: &'a ImportError,
    /// The broken specifier without `?query`/`#hash`.
    pub specifier: &'a str,
    pub from_dir: &'a Path,
    pub builder: SpecifierBuilder<'a>,
    pub prefer_alias: bool,
}

impl<'a> ResolveContext<'a> {
    pub fn new(
        index: &'a FileIndex,
        resolver: &'a TypeScriptResolver<'a>,
        error: &'a ImportError,
        style: ImportStyle,
        prefer_alias: bool,
    ) -> Self {
        let specifier = strip_query(&error.specifier);
        let from_dir = error.file.parent().unwrap_or(index.root());
        let keep_index = specifier.rsplit('/').next() == Some("index");
        Self {
            index,
            resolver,
            error,
            specifier,
            from_dir,
            builder: SpecifierBuilder::new(index.aliases(), style, resolver.extensions())
                .keep_index(keep_index),
            prefer_alias,
        }
    }

    /// The path the broken specifier points at, if it names a project path
    /// at all (relative, alias-rooted or root-absolute).
    pub fn intended_path(&self) -> Option<PathBuf> {
        let spec = self.specifier;
        if is_relative(spec) {
            return Some(join_segments(self.from_dir, spec));
        }
        if let Some(path) = self.index.aliases().expand(spec) {
            return Some(path);
        }
        spec.strip_prefix('/')
            .map(|rest| join_segments(self.index.root(), rest))
    }

    /// Whether the broken specifier is written against a configured alias.
    pub fn is_alias_specifier(&self) -> bool {
        self.index.aliases().match_specifier(self.specifier).is_some()
    }

    /// Split the specifier into its fixed prefix (`./`, `../../`, `@/`, `/`)
    /// and the path segments that follow.
    pub fn split_specifier(&self) -> (String, Vec<&'a str>) {
        let spec = self.specifier;
        if let Some((alias, rest)) = self.index.aliases().match_specifier(spec) {
            let segments = rest.split('/').filter(|s| !s.is_empty()).collect();
            return (format!("{}/", alias.key), segments);
        }
        if let Some(rest) = spec.strip_prefix('/') {
            return ("/".to_string(), rest.split('/').filter(|s| !s.is_empty()).collect());
        }

        let mut prefix = String::new();
        let mut segments = Vec::new();
        let mut leading = true;
        for segment in spec.split('/') {
            if leading && (segment == "." || segment == "..") {
                prefix.push_str(segment);
                prefix.push('/');
                continue;
            }
            leading = false;
            if !segment.is_empty() {
                segments.push(segment);
            }
        }
        (prefix, segments)
    }

    /// Structural closeness of a candidate directory to the importing file's
    /// directory: `1 / (1 + d)` for `d` diverging segments.
    pub fn proximity(&self, candidate_dir: &Path) -> f64 {
        1.0 / (1.0 + divergence(self.from_dir, candidate_dir) as f64)
    }
}

/// A strategy that proposes replacement targets for a broken specifier.
///
/// Implementations are pure: they read the index and return candidates
/// whose targets exist in it.
pub trait FixHeuristic: Send + Sync {
    fn kind(&self) -> Heuristic;

    fn candidates(&self, ctx: &ResolveContext<'_>) -> Vec<FixCandidate>;
}

/// Runs every registered heuristic and ranks the combined candidates.
pub struct CandidateResolver {
    heuristics: Vec<Box<dyn FixHeuristic>>,
}

impl CandidateResolver {
    pub fn new() -> Self {
        Self {
            heuristics: Vec::new(),
        }
    }

    /// Extension, case-variation, folder-flip, alias and basename heuristics.
    pub fn with_defaults() -> Self {
        let mut resolver = Self::new();
        resolver.register(Box::new(heuristics::ExtensionHeuristic));
        resolver.register(Box::new(heuristics::CaseVariationHeuristic));
        resolver.register(Box::new(heuristics::FolderFlipHeuristic));
        resolver.register(Box::new(heuristics::AliasHeuristic));
        resolver.register(Box::new(heuristics::BasenameHeuristic));
        resolver
    }

    pub fn register(&mut self, heuristic: Box<dyn FixHeuristic>) {
        self.heuristics.push(heuristic);
    }

    /// Ranked candidates for one error, best first. May be empty.
    ///
    /// Candidates whose target is missing from the index, that point back at
    /// the importing file, or that would leave the specifier unchanged are
    /// dropped. Duplicate (target, specifier) pairs keep their best score.
    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> Vec<FixCandidate> {
        let original = ctx.error.specifier.as_str();
        // Re-attach `?raw`, `#x` and friends
        let suffix = &original[ctx.specifier.len()..];

        let mut best: BTreeMap<(PathBuf, String), FixCandidate> = BTreeMap::new();
        for heuristic in &self.heuristics {
            for mut candidate in heuristic.candidates(ctx) {
                candidate.specifier.push_str(suffix);
                if !ctx.index.contains(&candidate.target_path)
                    || candidate.target_path == ctx.error.file
                    || candidate.specifier == original
                {
                    continue;
                }
                trace!(
                    heuristic = %heuristic.kind(),
                    specifier = %candidate.specifier,
                    score = candidate.score,
                    "candidate"
                );
                let key = (candidate.target_path.clone(), candidate.specifier.clone());
                match best.get(&key) {
                    Some(existing) if existing.score >= candidate.score => {}
                    _ => {
                        best.insert(key, candidate);
                    }
                }
            }
        }

        let mut ranked: Vec<FixCandidate> = best.into_values().collect();
        ranked.sort_by(|a, b| compare_candidates(a, b, original, ctx.prefer_alias));
        ranked
    }
}

impl Default for CandidateResolver {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Score descending, then edit distance to the old specifier, then alias
/// form first when preferred, then specifier and target for a total order.
fn compare_candidates(a: &FixCandidate, b: &FixCandidate, original: &str, prefer_alias: bool) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| levenshtein(original, &a.specifier).cmp(&levenshtein(original, &b.specifier)))
        .then_with(|| {
            if prefer_alias {
                b.is_alias.cmp(&a.is_alias)
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| a.specifier.cmp(&b.specifier))
        .then_with(|| a.target_path.cmp(&b.target_path))
}

/// Character-level edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
