use std::path::{Component, Path, PathBuf};

/// One configured import-root shortcut, e.g. `@` -> `/project/src`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    /// Normalized key without trailing `/` or `/*` (`@`, `@components`, `~`).
    pub key: String,
    pub target: PathBuf,
}

/// Alias table with unique keys, matched longest-prefix first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    entries: Vec<Alias>,
}

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an alias. Keys like `@/*`, `@/` and `@` are equivalent.
    pub fn insert(&mut self, key: &str, target: PathBuf) {
        let key = normalize_key(key);
        if key.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|a| a.key == key) {
            Some(existing) => existing.target = target,
            None => self.entries.push(Alias { key, target }),
        }
        // Longest key first so the most specific alias wins
        self.entries
            .sort_by(|a, b| b.key.len().cmp(&a.key.len()).then_with(|| a.key.cmp(&b.key)));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alias> {
        self.entries.iter()
    }

    /// Find the alias a specifier is written against.
    /// Returns the alias and the remainder after `key/` (empty for an exact match).
    pub fn match_specifier<'s>(&self, specifier: &'s str) -> Option<(&Alias, &'s str)> {
        self.entries.iter().find_map(|alias| {
            if specifier == alias.key {
                return Some((alias, ""));
            }
            specifier
                .strip_prefix(alias.key.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .map(|rest| (alias, rest))
        })
    }

    /// Expand an aliased specifier to an absolute (unverified) path.
    pub fn expand(&self, specifier: &str) -> Option<PathBuf> {
        let (alias, rest) = self.match_specifier(specifier)?;
        Some(join_segments(&alias.target, rest))
    }

    /// Build the alias-rooted form of `path`, using the alias whose target is
    /// the deepest ancestor of it. Returns `key/rel/path` with `/` separators
    /// and the extension left as-is.
    pub fn alias_for(&self, path: &Path) -> Option<String> {
        self.entries
            .iter()
            .filter_map(|alias| {
                let rel = path.strip_prefix(&alias.target).ok()?;
                Some((alias, rel, alias.target.components().count()))
            })
            .max_by(|(a, _, depth_a), (b, _, depth_b)| {
                depth_a
                    .cmp(depth_b)
                    .then_with(|| b.key.len().cmp(&a.key.len()))
            })
            .map(|(alias, rel, _)| {
                let rel = to_slash(rel);
                if rel.is_empty() {
                    alias.key.clone()
                } else {
                    format!("{}/{}", alias.key, rel)
                }
            })
    }
}

fn normalize_key(key: &str) -> String {
    let key = key.strip_suffix('*').unwrap_or(key);
    key.trim_end_matches('/').to_string()
}

/// Append `/`-separated specifier segments to a base path and normalize
/// `.`/`..` so the result matches index keys on every platform.
pub fn join_segments(base: &Path, specifier: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for segment in specifier.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    normalize_path(&path)
}

/// Render a relative path with `/` separators.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize a path by resolving `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                // Only pop if there's a normal component to pop
                if components
                    .last()
                    .is_some_and(|c| matches!(c, Component::Normal(_)))
                {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AliasMap {
        let mut map = AliasMap::new();
        map.insert("@/*", PathBuf::from("/p/src"));
        map.insert("@components/*", PathBuf::from("/p/src/components"));
        map.insert("~", PathBuf::from("/p"));
        map
    }

    #[test]
    fn test_keys_are_normalized_and_unique() {
        let mut map = sample();
        map.insert("@/", PathBuf::from("/p/app"));
        assert_eq!(map.len(), 3);
        assert_eq!(map.expand("@/x"), Some(PathBuf::from("/p/app/x")));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let map = sample();
        let (alias, rest) = map.match_specifier("@components/Button").unwrap();
        assert_eq!(alias.key, "@components");
        assert_eq!(rest, "Button");

        let (alias, rest) = map.match_specifier("@/components/Button").unwrap();
        assert_eq!(alias.key, "@");
        assert_eq!(rest, "components/Button");
    }

    #[test]
    fn test_prefix_must_end_at_segment_boundary() {
        let map = sample();
        assert!(map.match_specifier("@componentsX/Button").is_none());
        assert!(map.match_specifier("react").is_none());
        assert!(map.match_specifier("~").is_some());
    }

    #[test]
    fn test_alias_for_uses_deepest_target() {
        let map = sample();
        assert_eq!(
            map.alias_for(Path::new("/p/src/components/Button.tsx")),
            Some("@components/Button.tsx".to_string())
        );
        assert_eq!(
            map.alias_for(Path::new("/p/src/ui/Button.tsx")),
            Some("@/ui/Button.tsx".to_string())
        );
        assert_eq!(
            map.alias_for(Path::new("/p/scripts/x.ts")),
            Some("~/scripts/x.ts".to_string())
        );
        assert_eq!(map.alias_for(Path::new("/elsewhere/x.ts")), None);
    }

    #[test]
    fn test_join_segments_normalizes() {
        assert_eq!(
            join_segments(Path::new("/p/src/a"), "../b/./c"),
            PathBuf::from("/p/src/b/c")
        );
        assert_eq!(join_segments(Path::new("/p"), ""), PathBuf::from("/p"));
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("a/b/c.ts")), "a/b/c.ts");
        assert_eq!(to_slash(Path::new("../x")), "../x");
    }
}
