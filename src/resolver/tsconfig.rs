use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::alias::{normalize_path, AliasMap};

/// Config files that may carry `compilerOptions.paths`, searched in order.
pub const TSCONFIG_FILENAMES: &[&str] = &["tsconfig.json", "jsconfig.json", "tsconfig.app.json"];

/// Parsed tsconfig.json/jsconfig.json settings relevant to import resolution.
#[derive(Debug, Clone)]
pub struct TsConfig {
    /// The directory containing the config file.
    pub config_dir: PathBuf,
    /// The baseUrl for non-relative module resolution.
    pub base_url: Option<PathBuf>,
    /// Path alias mappings from compilerOptions.paths.
    pub paths: Vec<PathMapping>,
}

/// A single entry of `compilerOptions.paths`.
#[derive(Debug, Clone)]
pub struct PathMapping {
    /// The pattern as written, e.g. `@utils/*`.
    pub pattern: String,
    /// Substitutions resolved to absolute paths with the wildcard removed.
    pub targets: Vec<PathBuf>,
}

impl TsConfig {
    /// Parse a tsconfig.json file for import resolution settings.
    pub fn parse(tsconfig_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(tsconfig_path)
            .with_context(|| format!("failed to read {}", tsconfig_path.display()))?;
        Self::parse_from_str(&content, tsconfig_path)
    }

    /// Parse tsconfig.json content from a string.
    /// `tsconfig_path` is used to resolve relative paths.
    pub fn parse_from_str(content: &str, tsconfig_path: &Path) -> Result<Self> {
        let config_dir = tsconfig_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let json: serde_json::Value = serde_json::from_str(&strip_jsonc(content))
            .with_context(|| format!("invalid JSON in {}", tsconfig_path.display()))?;

        let compiler_options = json.get("compilerOptions");

        let base_url = compiler_options
            .and_then(|co| co.get("baseUrl"))
            .and_then(|v| v.as_str())
            .map(|url| normalize_path(&config_dir.join(url)));

        let paths = Self::parse_paths(compiler_options, &config_dir, base_url.as_deref());

        Ok(TsConfig {
            config_dir,
            base_url,
            paths,
        })
    }

    /// Find and parse the first config file in the project root.
    pub fn find(project_root: &Path) -> Option<Result<Self>> {
        TSCONFIG_FILENAMES
            .iter()
            .map(|name| project_root.join(name))
            .find(|path| path.exists())
            .map(|path| Self::parse(&path))
    }

    fn parse_paths(
        compiler_options: Option<&serde_json::Value>,
        config_dir: &Path,
        base_url: Option<&Path>,
    ) -> Vec<PathMapping> {
        let paths_obj = match compiler_options
            .and_then(|co| co.get("paths"))
            .and_then(|p| p.as_object())
        {
            Some(obj) => obj,
            None => return Vec::new(),
        };

        // The base for path resolution: baseUrl if set, otherwise config_dir
        let resolution_base = base_url.unwrap_or(config_dir);

        paths_obj
            .iter()
            .filter_map(|(pattern, targets)| {
                let targets: Vec<PathBuf> = targets
                    .as_array()?
                    .iter()
                    .filter_map(|t| t.as_str())
                    .map(|target| {
                        let prefix = target.split('*').next().unwrap_or(target);
                        normalize_path(&resolution_base.join(prefix.trim_end_matches('/')))
                    })
                    .collect();
                Some(PathMapping {
                    pattern: pattern.clone(),
                    targets,
                })
            })
            .collect()
    }

    /// Alias table from `paths`; the first substitution of each pattern wins.
    /// Catch-all `*` patterns are left to `baseUrl` resolution.
    pub fn aliases(&self) -> AliasMap {
        let mut map = AliasMap::new();
        for mapping in &self.paths {
            if mapping.pattern.starts_with('*') {
                continue;
            }
            if let Some(target) = mapping.targets.first() {
                map.insert(&mapping.pattern, target.clone());
            }
        }
        map
    }
}

/// Remove `//` and `/* */` comments and trailing commas, which tsconfig
/// files allow but strict JSON does not. String contents are left alone.
fn strip_jsonc(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    remove_trailing_commas(&out)
}

fn remove_trailing_commas(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let chars: Vec<char> = content.chars().collect();
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 1;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }

    out
}
