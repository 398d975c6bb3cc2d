use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::model::{FixCandidate, Heuristic};
use crate::resolver::alias::join_segments;
use crate::resolver::typescript::{append_extension, is_relative};
use crate::resolver::Resolver;

use super::{FixHeuristic, ResolveContext};

pub const EXTENSION_SCORE: f64 = 0.95;
pub const EXTENSION_SWAP_SCORE: f64 = 0.90;
pub const CASE_VARIATION_SCORE: f64 = 0.90;
pub const ALIAS_SCORE: f64 = 0.80;
pub const FOLDER_FLIP_SCORE: f64 = 0.70;
pub const BASENAME_BASE_SCORE: f64 = 0.35;
pub const BASENAME_PROXIMITY_WEIGHT: f64 = 0.35;
pub const BASENAME_UNIQUE_BONUS: f64 = 0.15;
pub const ALIAS_BONUS: f64 = 0.10;

fn candidate(
    target_path: PathBuf,
    specifier: String,
    score: f64,
    heuristic: Heuristic,
    is_alias: bool,
    needs_extension: bool,
) -> FixCandidate {
    FixCandidate {
        target_path,
        specifier,
        score,
        heuristic,
        is_alias,
        needs_extension,
    }
}

fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

/// `./util` -> `./util.ts`, `./ui` -> `./ui/index.ts`, `./styles.scss` -> `./styles.css`.
pub struct ExtensionHeuristic;

impl FixHeuristic for ExtensionHeuristic {
    fn kind(&self) -> Heuristic {
        Heuristic::Extension
    }

    fn candidates(&self, ctx: &ResolveContext<'_>) -> Vec<FixCandidate> {
        let Some(intended) = ctx.intended_path() else {
            return Vec::new();
        };
        let spec = ctx.specifier.trim_end_matches('/');
        let is_alias = ctx.is_alias_specifier();
        let mut out = Vec::new();

        for ext in ctx.resolver.extensions() {
            let path = append_extension(&intended, ext);
            if ctx.index.contains(&path) {
                let written = ctx.builder.written_extension(ext);
                out.push(candidate(
                    path,
                    format!("{}.{}", spec, written),
                    EXTENSION_SCORE,
                    Heuristic::Extension,
                    is_alias,
                    true,
                ));
            }
        }

        if ctx.index.is_dir(&intended) {
            for ext in ctx.resolver.extensions() {
                let path = intended.join(format!("index.{}", ext));
                if ctx.index.contains(&path) {
                    let written = ctx.builder.written_extension(ext);
                    out.push(candidate(
                        path,
                        format!("{}/index.{}", spec, written),
                        EXTENSION_SCORE,
                        Heuristic::Extension,
                        is_alias,
                        true,
                    ));
                }
            }
        }

        // Wrong extension spelled: swap it for one that exists
        let old_ext = extension_of(&intended);
        if let (Some(stem), Some(parent), false) =
            (intended.file_stem(), intended.parent(), old_ext.is_empty())
        {
            let spec_stem = spec
                .strip_suffix(old_ext)
                .and_then(|s| s.strip_suffix('.'))
                .unwrap_or(spec);
            for name in ctx.index.entries(parent).unwrap_or(&[]) {
                let path = parent.join(name);
                let ext = extension_of(&path);
                if path.file_stem() != Some(stem) || ext == old_ext || !ctx.index.contains(&path) {
                    continue;
                }
                out.push(candidate(
                    path.clone(),
                    format!("{}.{}", spec_stem, ctx.builder.written_extension(ext)),
                    EXTENSION_SWAP_SCORE,
                    Heuristic::Extension,
                    is_alias,
                    true,
                ));
            }
        }

        out
    }
}

/// `./Header` -> `./header` when only the case differs. Works for any segment,
/// not only the last, so `./Components/Nav` finds `components/Nav.tsx`.
pub struct CaseVariationHeuristic;

enum Variant {
    Plain,
    WithExtension,
    Index,
}

impl FixHeuristic for CaseVariationHeuristic {
    fn kind(&self) -> Heuristic {
        Heuristic::CaseVariation
    }

    fn candidates(&self, ctx: &ResolveContext<'_>) -> Vec<FixCandidate> {
        let Some(intended) = ctx.intended_path() else {
            return Vec::new();
        };
        let (prefix, segments) = ctx.split_specifier();
        if segments.is_empty() || segments.iter().any(|s| *s == "." || *s == "..") {
            return Vec::new();
        }

        let mut variants = vec![(intended.clone(), Variant::Plain)];
        for ext in ctx.resolver.extensions() {
            variants.push((append_extension(&intended, ext), Variant::WithExtension));
        }
        for ext in ctx.resolver.extensions() {
            variants.push((intended.join(format!("index.{}", ext)), Variant::Index));
        }

        let is_alias = ctx.is_alias_specifier();
        let mut out = Vec::new();
        for (variant, kind) in &variants {
            for actual in ctx.index.lookup_ignore_case(variant) {
                if actual == variant {
                    continue;
                }
                // The part of the real path the specifier spells
                let spelled = match kind {
                    Variant::Plain => actual.clone(),
                    Variant::WithExtension => actual.with_extension(""),
                    Variant::Index => match actual.parent() {
                        Some(p) => p.to_path_buf(),
                        None => continue,
                    },
                };
                let mut corrected: Vec<String> = spelled
                    .components()
                    .rev()
                    .take(segments.len())
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                if corrected.len() != segments.len() {
                    continue;
                }
                corrected.reverse();

                out.push(candidate(
                    actual.clone(),
                    format!("{}{}", prefix, corrected.join("/")),
                    CASE_VARIATION_SCORE,
                    Heuristic::CaseVariation,
                    is_alias,
                    matches!(kind, Variant::Plain),
                ));
            }
        }
        out
    }
}

/// `./Button/ui` -> `./ui/Button`: adjacent segments swapped by a refactor.
pub struct FolderFlipHeuristic;

impl FixHeuristic for FolderFlipHeuristic {
    fn kind(&self) -> Heuristic {
        Heuristic::FolderFlip
    }

    fn candidates(&self, ctx: &ResolveContext<'_>) -> Vec<FixCandidate> {
        let (prefix, segments) = ctx.split_specifier();
        let is_alias = ctx.is_alias_specifier();
        let mut out = Vec::new();

        for i in 0..segments.len().saturating_sub(1) {
            let (a, b) = (segments[i], segments[i + 1]);
            if a == b || [a, b].iter().any(|s| *s == "." || *s == "..") {
                continue;
            }
            let mut flipped = segments.clone();
            flipped.swap(i, i + 1);
            let spec = format!("{}{}", prefix, flipped.join("/"));

            let resolution = ctx.resolver.resolve(&spec, &ctx.error.file);
            if let Some(target) = resolution.resolved_path() {
                out.push(candidate(
                    target.to_path_buf(),
                    spec,
                    FOLDER_FLIP_SCORE,
                    Heuristic::FolderFlip,
                    is_alias,
                    false,
                ));
            }
        }
        out
    }
}

/// Re-root the specifier's path under each configured alias:
/// a broken alias tries the other aliases, a relative or bare path tries
/// every alias target.
pub struct AliasHeuristic;

impl FixHeuristic for AliasHeuristic {
    fn kind(&self) -> Heuristic {
        Heuristic::Alias
    }

    fn candidates(&self, ctx: &ResolveContext<'_>) -> Vec<FixCandidate> {
        let aliases = ctx.index.aliases();
        if aliases.is_empty() {
            return Vec::new();
        }

        let spec = ctx.specifier;
        let (rest, current_key) = match aliases.match_specifier(spec) {
            Some((alias, rest)) => (rest, Some(alias.key.as_str())),
            None if is_relative(spec) => (strip_parent_segments(spec), None),
            None => (spec.trim_start_matches('/'), None),
        };
        let rest = rest.trim_end_matches('/');
        if rest.is_empty() {
            return Vec::new();
        }

        aliases
            .iter()
            .filter(|alias| Some(alias.key.as_str()) != current_key)
            .filter_map(|alias| {
                let base = join_segments(&alias.target, rest);
                let target = ctx.resolver.try_with_extensions(&base)?;
                Some(candidate(
                    target,
                    format!("{}/{}", alias.key, rest),
                    ALIAS_SCORE,
                    Heuristic::Alias,
                    true,
                    false,
                ))
            })
            .collect()
    }
}

/// `../../x/y` -> `x/y`
fn strip_parent_segments(spec: &str) -> &str {
    let mut rest = spec;
    loop {
        if let Some(r) = rest.strip_prefix("../") {
            rest = r;
        } else if let Some(r) = rest.strip_prefix("./") {
            rest = r;
        } else if rest == "." || rest == ".." {
            return "";
        } else {
            return rest;
        }
    }
}

/// Search the whole index for files with the specifier's module name,
/// scored by how close they sit to the importing file.
pub struct BasenameHeuristic;

impl BasenameHeuristic {
    fn matches(&self, ctx: &ResolveContext<'_>) -> BTreeSet<PathBuf> {
        let mut found = BTreeSet::new();
        let mut segments = ctx.specifier.trim_end_matches('/').rsplit('/');
        let name = match segments.next() {
            Some("index") => segments.next(),
            other => other,
        };
        let Some(name) = name.filter(|n| !n.is_empty() && *n != "." && *n != "..") else {
            return found;
        };

        let implicit = |p: &Path| ctx.builder.is_implicit(extension_of(p));
        // `Button.test` and `api.service` are module names in their own right
        found.extend(ctx.index.find_by_name(name).iter().filter(|p| implicit(p.as_path())).cloned());

        if let Some((stem, ext)) = name.rsplit_once('.') {
            if !stem.is_empty() && !ext.is_empty() {
                let wants_script = ctx.builder.is_implicit(ext);
                found.extend(
                    ctx.index
                        .find_by_name(stem)
                        .iter()
                        .filter(|p| {
                            if wants_script {
                                implicit(p.as_path())
                            } else {
                                extension_of(p.as_path()).eq_ignore_ascii_case(ext)
                            }
                        })
                        .cloned(),
                );
            }
        }
        found
    }
}

impl FixHeuristic for BasenameHeuristic {
    fn kind(&self) -> Heuristic {
        Heuristic::Basename
    }

    fn candidates(&self, ctx: &ResolveContext<'_>) -> Vec<FixCandidate> {
        let found = self.matches(ctx);
        let unique_bonus = if found.len() == 1 {
            BASENAME_UNIQUE_BONUS
        } else {
            0.0
        };
        let alias_bonus = if ctx.prefer_alias || ctx.builder.style().alias_rooted {
            ALIAS_BONUS
        } else {
            0.0
        };

        let mut out = Vec::new();
        for target in found {
            let dir = target.parent().unwrap_or(ctx.index.root());
            let score =
                BASENAME_BASE_SCORE + BASENAME_PROXIMITY_WEIGHT * ctx.proximity(dir) + unique_bonus;
            let needs_extension = !ctx.builder.is_implicit(extension_of(&target));

            if let Some(spec) = ctx.builder.aliased(&target, needs_extension) {
                out.push(candidate(
                    target.clone(),
                    spec,
                    score + alias_bonus,
                    Heuristic::Basename,
                    true,
                    needs_extension,
                ));
            }
            let spec = ctx.builder.relative(ctx.from_dir, &target, needs_extension);
            out.push(candidate(
                target,
                spec,
                score,
                Heuristic::Basename,
                false,
                needs_extension,
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::ResolveContext;
    use crate::config::ResolveConfig;
    use crate::index::tests::memory_index;
    use crate::model::ImportError;
    use crate::resolver::typescript::TypeScriptResolver;
    use crate::rewrite::style::ImportStyle;

    fn run(
        heuristic: &dyn FixHeuristic,
        files: &[&str],
        aliases: &[(&str, &str)],
        from: &str,
        spec: &str,
    ) -> Vec<FixCandidate> {
        let index = memory_index(files, aliases);
        let resolver = TypeScriptResolver::new(&index, &ResolveConfig::default());
        let error = ImportError::new(PathBuf::from("/p").join(from), spec);
        let ctx = ResolveContext::new(&index, &resolver, &error, ImportStyle::default(), false);
        let mut out = heuristic.candidates(&ctx);
        out.sort_by(|a, b| a.specifier.cmp(&b.specifier));
        out
    }

    fn specs(candidates: &[FixCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.specifier.as_str()).collect()
    }

    #[test]
    fn test_extension_appends_known_extension() {
        let out = run(&ExtensionHeuristic, &["src/a.ts", "src/util.ts"], &[], "src/a.ts", "./util");
        assert_eq!(specs(&out), vec!["./util.ts"]);
        assert_eq!(out[0].score, EXTENSION_SCORE);
        assert!(out[0].needs_extension);
        assert_eq!(out[0].target_path, PathBuf::from("/p/src/util.ts"));
    }

    #[test]
    fn test_extension_directory_index_and_swap() {
        let files = ["src/a.ts", "src/ui/index.tsx", "src/styles.css"];
        let out = run(&ExtensionHeuristic, &files, &[], "src/a.ts", "./ui");
        assert_eq!(specs(&out), vec!["./ui/index.tsx"]);

        let out = run(&ExtensionHeuristic, &files, &[], "src/a.ts", "./styles.scss");
        assert_eq!(specs(&out), vec!["./styles.css"]);
        assert_eq!(out[0].score, EXTENSION_SWAP_SCORE);
    }

    #[test]
    fn test_case_variation_fixes_directory_and_file() {
        let out = run(
            &CaseVariationHeuristic,
            &["src/main.ts", "src/components/NavBar.tsx"],
            &[],
            "src/main.ts",
            "./Components/navbar",
        );
        assert_eq!(specs(&out), vec!["./components/NavBar"]);
        assert!(!out[0].needs_extension);
    }

    #[test]
    fn test_case_variation_keeps_alias_prefix() {
        let out = run(
            &CaseVariationHeuristic,
            &["src/main.ts", "src/ui/Button.tsx"],
            &[("@", "src")],
            "src/main.ts",
            "@/ui/button",
        );
        assert_eq!(specs(&out), vec!["@/ui/Button"]);
        assert!(out[0].is_alias);
    }

    #[test]
    fn test_folder_flip() {
        let out = run(
            &FolderFlipHeuristic,
            &["src/main.ts", "src/ui/Button.tsx"],
            &[],
            "src/main.ts",
            "./Button/ui",
        );
        assert_eq!(specs(&out), vec!["./ui/Button"]);
        assert_eq!(out[0].score, FOLDER_FLIP_SCORE);
    }

    #[test]
    fn test_alias_from_relative_and_broken_alias() {
        let files = ["src/pages/Home.tsx", "src/lib/api.ts", "shared/api.ts"];
        let aliases = [("@", "src"), ("~shared", "shared")];

        let out = run(&AliasHeuristic, &files, &aliases, "src/pages/Home.tsx", "../../lib/api");
        assert_eq!(specs(&out), vec!["@/lib/api"]);
        assert!(out[0].is_alias);

        let out = run(&AliasHeuristic, &files, &aliases, "src/pages/Home.tsx", "@/api");
        assert_eq!(specs(&out), vec!["~shared/api"]);
    }

    #[test]
    fn test_basename_scores_by_proximity() {
        let files = [
            "src/features/cart/Cart.tsx",
            "src/features/cart/Price.tsx",
            "src/legacy/old/Price.tsx",
        ];
        let out = run(&BasenameHeuristic, &files, &[], "src/features/cart/Cart.tsx", "../Price");
        assert_eq!(out.len(), 2);
        let near = out.iter().find(|c| c.specifier == "./Price").unwrap();
        let far = out.iter().find(|c| c.specifier == "../../legacy/old/Price").unwrap();
        assert!(near.score > far.score);
        assert_eq!(near.score, BASENAME_BASE_SCORE + BASENAME_PROXIMITY_WEIGHT);
    }

    #[test]
    fn test_basename_asset_matches_same_extension_only() {
        let files = ["src/main.ts", "src/theme/styles.css", "src/theme/styles.ts"];
        let out = run(&BasenameHeuristic, &files, &[], "src/main.ts", "./styles.css");
        assert_eq!(specs(&out), vec!["./theme/styles.css"]);
        assert!(out[0].needs_extension);
    }

    #[test]
    fn test_strip_parent_segments() {
        assert_eq!(strip_parent_segments("../../x/y"), "x/y");
        assert_eq!(strip_parent_segments("./x"), "x");
        assert_eq!(strip_parent_segments(".."), "");
    }
}
