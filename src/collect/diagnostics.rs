use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::model::ImportError;
use crate::resolver::alias::{join_segments, normalize_path};

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap());

/// Vite / Rollup: `Failed to resolve import "./x" from "src/a.ts"`.
static VITE_RESOLVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:Rollup failed to resolve|Failed to resolve) import ["']([^"']+)["'] from ["']([^"']+)["']"#)
        .unwrap()
});

/// esbuild, location first: `src/a.ts:3:20: error: Could not resolve "./x"`.
static ESBUILD_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(\S+?):(\d+):(\d+): (?:error|ERROR): Could not resolve ["']([^"']+)["']"#)
        .unwrap()
});

/// esbuild, message first: `✘ [ERROR] Could not resolve "./x"`.
static ESBUILD_RESOLVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Could not resolve ["']([^"']+)["']"#).unwrap());

/// esbuild location line following the message: `    src/a.ts:3:20:`.
static ESBUILD_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\S+?):(\d+):(\d+):\s*$").unwrap());

/// webpack header: `ERROR in ./src/index.js 3:0-28`.
static WEBPACK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*ERROR in (\S+)(?:\s+(\d+):(\d+)(?:-\d+)?)?").unwrap()
});

/// webpack body: `Module not found: Error: Can't resolve './x' in '/p/src'`.
static WEBPACK_RESOLVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Module not found: Error: Can't resolve ['"]([^'"]+)['"]"#).unwrap()
});

/// tsc: `src/a.ts(3,20): error TS2307: Cannot find module './x'`.
static TSC_PAREN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(.+?)\((\d+),(\d+)\): error TS(?:2307|2792): Cannot find module ['"]([^'"]+)['"]"#)
        .unwrap()
});

/// tsc --pretty: `src/a.ts:3:20 - error TS2307: Cannot find module './x'`.
static TSC_PRETTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(.+?):(\d+):(\d+) - error TS(?:2307|2792): Cannot find module ['"]([^'"]+)['"]"#)
        .unwrap()
});

/// Previously written error lists: a bare array of errors, or a report
/// object carrying them under `errors`.
#[derive(Deserialize)]
#[serde(untagged)]
enum StructuredLog {
    Errors(Vec<ImportError>),
    Report { errors: Vec<ImportError> },
}

/// A record whose second line has not been seen yet.
enum Pending {
    Esbuild {
        specifier: String,
        message: String,
    },
    Webpack {
        file: String,
        position: Option<(usize, usize)>,
    },
}

/// Parse bundler or compiler output into unresolved-import records.
///
/// Accepts the JSON forms importfix itself writes as well as line-oriented
/// diagnostics from Vite/Rollup, esbuild, webpack and tsc. Relative file
/// names are resolved against `root`. Records are returned in output order;
/// the collector de-duplicates and filters them against the index.
pub fn parse_build_output(text: &str, root: &Path) -> Vec<ImportError> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(log) = serde_json::from_str::<StructuredLog>(trimmed) {
            let errors = match log {
                StructuredLog::Errors(errors) | StructuredLog::Report { errors } => errors,
            };
            return errors
                .into_iter()
                .filter(|e| !e.specifier.is_empty())
                .map(|mut e| {
                    let file = resolve_file(&e.file.to_string_lossy(), root);
                    e.file = file;
                    e
                })
                .collect();
        }
    }

    let clean = strip_ansi(text);
    let mut records = Vec::new();
    let mut pending: Option<Pending> = None;

    for line in clean.lines() {
        if let Some(caps) = TSC_PAREN.captures(line).or_else(|| TSC_PRETTY.captures(line)) {
            records.push(
                record(root, &caps[1], &caps[4], line)
                    .at(parse_num(&caps[2]), parse_num(&caps[3])),
            );
            continue;
        }

        if let Some(caps) = VITE_RESOLVE.captures(line) {
            records.push(record(root, &caps[2], &caps[1], line));
            continue;
        }

        if let Some(caps) = ESBUILD_INLINE.captures(line) {
            records.push(
                record(root, &caps[1], &caps[4], line)
                    .at(parse_num(&caps[2]), parse_num(&caps[3])),
            );
            pending = None;
            continue;
        }

        if let Some(caps) = ESBUILD_RESOLVE.captures(line) {
            pending = Some(Pending::Esbuild {
                specifier: caps[1].to_string(),
                message: line.trim().to_string(),
            });
            continue;
        }

        if let Some(caps) = WEBPACK_HEADER.captures(line) {
            let position = match (caps.get(2), caps.get(3)) {
                // webpack columns are 0-based
                (Some(l), Some(c)) => Some((parse_num(l.as_str()), parse_num(c.as_str()) + 1)),
                _ => None,
            };
            pending = Some(Pending::Webpack {
                file: caps[1].to_string(),
                position,
            });
            continue;
        }

        match pending.take() {
            Some(Pending::Esbuild { specifier, message }) => {
                if let Some(caps) = ESBUILD_LOCATION.captures(line) {
                    records.push(
                        record(root, &caps[1], &specifier, &message)
                            .at(parse_num(&caps[2]), parse_num(&caps[3])),
                    );
                } else {
                    pending = Some(Pending::Esbuild { specifier, message });
                }
            }
            Some(Pending::Webpack { file, position }) => {
                if let Some(caps) = WEBPACK_RESOLVE.captures(line) {
                    let mut rec = record(root, &file, &caps[1], line);
                    if let Some((l, c)) = position {
                        rec = rec.at(l, c);
                    }
                    records.push(rec);
                } else {
                    pending = Some(Pending::Webpack { file, position });
                }
            }
            None => {}
        }
    }

    records
}

pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

fn record(root: &Path, file: &str, specifier: &str, message: &str) -> ImportError {
    ImportError::new(resolve_file(file, root), specifier).with_message(message.trim())
}

/// Absolute path for a file name as printed by a tool. Loader prefixes
/// (`babel-loader!./src/a.js`) and query suffixes are dropped.
fn resolve_file(file: &str, root: &Path) -> PathBuf {
    let file = file.rsplit('!').next().unwrap_or(file);
    let file = file.split('?').next().unwrap_or(file);
    let path = Path::new(file);
    if path.is_absolute() {
        normalize_path(path)
    } else {
        join_segments(root, &file.replace('\\', "/"))
    }
}

fn parse_num(s: &str) -> usize {
    s.parse().unwrap_or(0)
}
