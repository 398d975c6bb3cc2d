use std::path::{Component, Path};

use crate::model::{ImportSite, Language};
use crate::resolver::alias::AliasMap;
use crate::resolver::typescript::{is_relative, strip_query};

const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// How a file writes its local imports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStyle {
    /// Most local specifiers spell a script extension (`./util.js`).
    pub uses_extensions: bool,
    /// A TypeScript file that writes `.js` for its `.ts` siblings (Node ESM).
    pub js_for_ts: bool,
    /// Alias-rooted specifiers outnumber relative ones.
    pub alias_rooted: bool,
}

impl ImportStyle {
    pub fn detect(language: Language, sites: &[ImportSite], aliases: &AliasMap) -> Self {
        let mut with_ext = 0usize;
        let mut without_ext = 0usize;
        let mut js_ext = 0usize;
        let mut ts_ext = 0usize;
        let mut aliased = 0usize;
        let mut relative = 0usize;

        for site in sites {
            let spec = strip_query(&site.specifier);
            if is_relative(spec) {
                relative += 1;
            } else if aliases.match_specifier(spec).is_some() {
                aliased += 1;
            } else {
                continue;
            }

            let last = spec.rsplit('/').next().unwrap_or(spec);
            match last.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() && SCRIPT_EXTENSIONS.contains(&ext) => {
                    with_ext += 1;
                    if ext.starts_with('j') || ext == "mjs" || ext == "cjs" {
                        js_ext += 1;
                    } else {
                        ts_ext += 1;
                    }
                }
                // Assets always carry their extension and say nothing about style
                Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {}
                _ => without_ext += 1,
            }
        }

        Self {
            uses_extensions: with_ext > without_ext,
            js_for_ts: language != Language::JavaScript && js_ext > ts_ext,
            alias_rooted: aliased > relative,
        }
    }
}

/// Renders specifiers for a target file in a given file's style.
pub struct SpecifierBuilder<'a> {
    aliases: &'a AliasMap,
    style: ImportStyle,
    /// Extensions the resolver adds implicitly, without the dot.
    auto_extensions: &'a [String],
    keep_index: bool,
}

impl<'a> SpecifierBuilder<'a> {
    pub fn new(aliases: &'a AliasMap, style: ImportStyle, auto_extensions: &'a [String]) -> Self {
        Self {
            aliases,
            style,
            auto_extensions,
            keep_index: false,
        }
    }

    /// Keep a trailing `/index` when the broken specifier spelled one.
    pub fn keep_index(mut self, keep: bool) -> Self {
        self.keep_index = keep;
        self
    }

    pub fn style(&self) -> ImportStyle {
        self.style
    }

    /// Whether the resolver finds files with this extension without it being written.
    pub fn is_implicit(&self, ext: &str) -> bool {
        self.auto_extensions.iter().any(|e| e == ext)
    }

    /// Extension to write for a target with extension `ext`.
    pub fn written_extension<'e>(&self, ext: &'e str) -> &'e str {
        if !self.style.js_for_ts {
            return ext;
        }
        match ext {
            "ts" | "tsx" => "js",
            "mts" => "mjs",
            "cts" => "cjs",
            other => other,
        }
    }

    /// `./`- or `../`-prefixed specifier from `from_dir` to `target`.
    pub fn relative(&self, from_dir: &Path, target: &Path, needs_extension: bool) -> String {
        self.finish(&relative_path(from_dir, target), target, needs_extension)
    }

    /// Alias-rooted specifier for `target`, if an alias covers it.
    pub fn aliased(&self, target: &Path, needs_extension: bool) -> Option<String> {
        let full = self.aliases.alias_for(target)?;
        Some(self.finish(&full, target, needs_extension))
    }

    /// Apply extension and `/index` conventions to a specifier that spells
    /// `target`'s full file name.
    pub fn finish(&self, full: &str, target: &Path, needs_extension: bool) -> String {
        let ext = target.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext.is_empty() {
            return full.to_string();
        }
        let stem = full
            .strip_suffix(ext)
            .and_then(|s| s.strip_suffix('.'))
            .unwrap_or(full);

        if needs_extension || self.style.uses_extensions || !self.is_implicit(ext) {
            return format!("{}.{}", stem, self.written_extension(ext));
        }

        if !self.keep_index {
            if let Some(dir) = stem.strip_suffix("/index") {
                if !dir.is_empty() {
                    return dir.to_string();
                }
            }
        }
        stem.to_string()
    }
}

/// Relative path from a directory to a file with `/` separators, always
/// starting with `./` or `../`.
pub fn relative_path(from_dir: &Path, target: &Path) -> String {
    let from: Vec<Component> = from_dir.components().collect();
    let to: Vec<Component> = target.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{}", joined)
    }
}

/// Number of directory segments that differ between two directories,
/// counted on both sides of their common prefix.
pub fn divergence(a: &Path, b: &Path) -> usize {
    let a: Vec<Component> = a.components().collect();
    let b: Vec<Component> = b.components().collect();
    let common = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    (a.len() - common) + (b.len() - common)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bindings, ImportKind, Position, Span};
    use std::path::PathBuf;

    fn sites(specs: &[&str]) -> Vec<ImportSite> {
        specs
            .iter()
            .map(|s| ImportSite {
                specifier: s.to_string(),
                span: Span { start: 0, end: 0 },
                position: Position { line: 1, column: 1 },
                kind: ImportKind::Static,
                bindings: Bindings::default(),
            })
            .collect()
    }

    fn aliases() -> AliasMap {
        let mut map = AliasMap::new();
        map.insert("@", PathBuf::from("/p/src"));
        map
    }

    fn exts() -> Vec<String> {
        ["ts", "tsx", "js", "jsx"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_extensionless_relative() {
        let style = ImportStyle::detect(
            Language::TypeScript,
            &sites(&["./a", "../b", "react", "./logo.svg"]),
            &aliases(),
        );
        assert_eq!(style, ImportStyle::default());
    }

    #[test]
    fn test_detect_node_esm_style() {
        let style = ImportStyle::detect(
            Language::TypeScript,
            &sites(&["./a.js", "./b.js", "./c", "node:fs"]),
            &aliases(),
        );
        assert!(style.uses_extensions);
        assert!(style.js_for_ts);
        assert!(!style.alias_rooted);
    }

    #[test]
    fn test_detect_alias_rooted() {
        let style = ImportStyle::detect(
            Language::Tsx,
            &sites(&["@/ui/Button", "@/lib/api", "./local"]),
            &aliases(),
        );
        assert!(style.alias_rooted);
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/p/src/pages"), Path::new("/p/src/ui/Button.tsx")),
            "../ui/Button.tsx"
        );
        assert_eq!(
            relative_path(Path::new("/p/src"), Path::new("/p/src/ui/Button.tsx")),
            "./ui/Button.tsx"
        );
    }

    #[test]
    fn test_builder_drops_implicit_extension_and_index() {
        let aliases = aliases();
        let exts = exts();
        let builder = SpecifierBuilder::new(&aliases, ImportStyle::default(), &exts);
        assert_eq!(
            builder.relative(Path::new("/p/src"), Path::new("/p/src/ui/Button.tsx"), false),
            "./ui/Button"
        );
        assert_eq!(
            builder.relative(Path::new("/p/src"), Path::new("/p/src/ui/index.ts"), false),
            "./ui"
        );
        assert_eq!(
            builder.aliased(Path::new("/p/src/ui/Button.tsx"), false),
            Some("@/ui/Button".to_string())
        );
        assert_eq!(builder.aliased(Path::new("/q/other.ts"), false), None);
    }

    #[test]
    fn test_builder_keeps_extension_when_needed() {
        let aliases = aliases();
        let exts = exts();
        let builder = SpecifierBuilder::new(&aliases, ImportStyle::default(), &exts);
        assert_eq!(
            builder.relative(Path::new("/p/src"), Path::new("/p/src/styles.css"), false),
            "./styles.css"
        );
        assert_eq!(
            builder.relative(Path::new("/p/src"), Path::new("/p/src/util.ts"), true),
            "./util.ts"
        );

        let esm = ImportStyle {
            uses_extensions: true,
            js_for_ts: true,
            alias_rooted: false,
        };
        let builder = SpecifierBuilder::new(&aliases, esm, &exts);
        assert_eq!(
            builder.relative(Path::new("/p/src"), Path::new("/p/src/util.ts"), false),
            "./util.js"
        );
    }

    #[test]
    fn test_builder_keep_index() {
        let aliases = aliases();
        let exts = exts();
        let builder =
            SpecifierBuilder::new(&aliases, ImportStyle::default(), &exts).keep_index(true);
        assert_eq!(
            builder.relative(Path::new("/p/src"), Path::new("/p/src/ui/index.ts"), false),
            "./ui/index"
        );
    }

    #[test]
    fn test_divergence() {
        assert_eq!(divergence(Path::new("/p/src/a"), Path::new("/p/src/a")), 0);
        assert_eq!(divergence(Path::new("/p/src/a"), Path::new("/p/src/b")), 2);
        assert_eq!(divergence(Path::new("/p/src/a/b"), Path::new("/p/src")), 2);
    }
}
