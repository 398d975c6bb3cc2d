use std::path::{Path, PathBuf};

use crate::index::{module_name, FileIndex};
use crate::model::{Bindings, ImportError};
use crate::resolver::alias::join_segments;
use crate::resolver::typescript::{append_extension, is_relative, strip_query};

const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Extensions written verbatim in specifiers; the stub keeps them.
const ASSET_EXTENSIONS: &[&str] = &[
    "css", "scss", "sass", "less", "json", "svg", "png", "jpg", "jpeg", "gif", "webp", "ico",
    "woff", "woff2", "ttf", "html", "md", "txt", "wasm",
];

/// Where a placeholder module for `error` should be created.
///
/// Only specifiers that name a project path (relative, alias-rooted or
/// root-absolute) and land inside the source directory get a stub, so the
/// next scan indexes it. Without an extension in the specifier the stub takes
/// the importing file's extension.
pub fn stub_path(index: &FileIndex, error: &ImportError) -> Option<PathBuf> {
    let spec = strip_query(&error.specifier);
    let from_dir = error.file.parent()?;
    let intended = if is_relative(spec) {
        join_segments(from_dir, spec)
    } else if let Some(path) = index.aliases().expand(spec) {
        path
    } else if let Some(rest) = spec.strip_prefix('/') {
        join_segments(index.root(), rest)
    } else {
        return None;
    };
    if !intended.starts_with(index.src()) || intended == index.src() {
        return None;
    }

    let importer_ext = error
        .file
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| SCRIPT_EXTENSIONS.contains(e))
        .unwrap_or("ts");

    if spec.ends_with('/') || index.is_dir(&intended) {
        return Some(intended.join(format!("index.{}", importer_ext)));
    }

    let name = intended.file_name()?.to_str()?;
    let path = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ASSET_EXTENSIONS.contains(&ext) => intended,
        Some((stem, ext)) if !stem.is_empty() && SCRIPT_EXTENSIONS.contains(&ext) => {
            // `./util.js` from a TypeScript file means `util.ts`
            match (ext, importer_ext.contains("ts")) {
                ("js", true) => intended.with_extension(if importer_ext == "tsx" { "tsx" } else { "ts" }),
                ("jsx", true) => intended.with_extension("tsx"),
                ("mjs", true) => intended.with_extension("mts"),
                ("cjs", true) => intended.with_extension("cts"),
                _ => intended,
            }
        }
        _ => append_extension(&intended, importer_ext),
    };
    Some(path)
}

/// Placeholder content for a stub at `path`, exporting what importers use.
pub fn render_stub(path: &Path, specifier: &str, bindings: &Bindings) -> String {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "css" | "scss" | "sass" | "less" => format!(
            "/* importfix stub for '{}'. Replace with real styles. */\n",
            specifier
        ),
        "json" => "{}\n".to_string(),
        "svg" => "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"1\" height=\"1\"/>\n".to_string(),
        e if SCRIPT_EXTENSIONS.contains(&e) => render_module(path, specifier, bindings, e.contains("ts")),
        _ => String::new(),
    }
}

fn render_module(path: &Path, specifier: &str, bindings: &Bindings, typed: bool) -> String {
    let mut out = format!(
        "// importfix stub for '{}'. Replace with a real implementation.\n",
        specifier
    );

    let mut named: Vec<&str> = bindings
        .named
        .iter()
        .map(String::as_str)
        .filter(|n| is_identifier(n))
        .collect();
    named.sort_unstable();
    named.dedup();

    let annotation = if typed { ": any" } else { "" };
    for name in &named {
        out.push_str(&format!("export const {}{} = undefined;\n", name, annotation));
    }
    if !named.is_empty() {
        out.push('\n');
    }

    let mut default_name = module_name(path)
        .map(|n| to_identifier(&n))
        .unwrap_or_else(|| "Stub".to_string());
    if named.contains(&default_name.as_str()) {
        default_name.push_str("Stub");
    }
    out.push_str(&format!(
        "export default function {}() {{\n  return null;\n}}\n",
        default_name
    ));
    out
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// `not-yet-written` -> `NotYetWritten`
fn to_identifier(name: &str) -> String {
    let mut out = String::new();
    let mut upper = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if upper {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            upper = false;
        } else {
            upper = true;
        }
    }
    match out.chars().next() {
        None => "Stub".to_string(),
        Some(c) if c.is_ascii_digit() => format!("_{}", out),
        Some(_) => out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::memory_index;

    fn path_for(spec: &str, from: &str) -> Option<PathBuf> {
        let index = memory_index(&["src/main.tsx", "src/ui/index.ts"], &[("@", "src")]);
        stub_path(&index, &ImportError::new(PathBuf::from("/p").join(from), spec))
    }

    #[test]
    fn test_stub_path_follows_importer_extension() {
        assert_eq!(
            path_for("./NotYetWritten", "src/main.tsx"),
            Some(PathBuf::from("/p/src/NotYetWritten.tsx"))
        );
        assert_eq!(
            path_for("./helpers", "src/lib.js"),
            Some(PathBuf::from("/p/src/helpers.js"))
        );
        assert_eq!(
            path_for("./util.js", "src/main.tsx"),
            Some(PathBuf::from("/p/src/util.tsx"))
        );
    }

    #[test]
    fn test_stub_path_keeps_asset_extension() {
        assert_eq!(
            path_for("./theme.css?inline", "src/main.tsx"),
            Some(PathBuf::from("/p/src/theme.css"))
        );
    }

    #[test]
    fn test_stub_path_for_alias_and_directories() {
        assert_eq!(
            path_for("@/pages/Admin", "src/main.tsx"),
            Some(PathBuf::from("/p/src/pages/Admin.tsx"))
        );
        assert_eq!(
            path_for("./ui", "src/main.tsx"),
            Some(PathBuf::from("/p/src/ui/index.tsx"))
        );
    }

    #[test]
    fn test_no_stub_outside_src_or_for_packages() {
        assert_eq!(path_for("../../elsewhere", "src/main.tsx"), None);
        assert_eq!(path_for("../lib/NotYetWritten", "src/main.tsx"), None);
        assert_eq!(path_for("/vite.svg", "src/main.tsx"), None);
        assert_eq!(path_for("..", "src/main.tsx"), None);
        assert_eq!(path_for("left-pad", "src/main.tsx"), None);
    }

    #[test]
    fn test_render_module_with_named_exports() {
        let bindings = Bindings {
            default: true,
            namespace: false,
            named: vec!["useThing".into(), "Thing".into(), "not-valid".into()],
        };
        let content = render_stub(Path::new("/p/src/thing.ts"), "./thing", &bindings);
        assert!(content.contains("export const Thing: any = undefined;"));
        assert!(content.contains("export const useThing: any = undefined;"));
        assert!(!content.contains("not-valid"));
        assert!(content.contains("export default function ThingStub() {"));
    }

    #[test]
    fn test_render_plain_js_and_assets() {
        let content = render_stub(
            Path::new("/p/src/not-yet-written.jsx"),
            "./not-yet-written",
            &Bindings::default(),
        );
        assert!(content.contains("export default function NotYetWritten() {"));
        assert!(!content.contains(": any"));

        assert_eq!(render_stub(Path::new("/p/a.json"), "./a.json", &Bindings::default()), "{}\n");
        assert!(render_stub(Path::new("/p/a.css"), "./a.css", &Bindings::default()).starts_with("/*"));
    }

    #[test]
    fn test_to_identifier() {
        assert_eq!(to_identifier("not-yet-written"), "NotYetWritten");
        assert_eq!(to_identifier("404"), "_404");
        assert_eq!(to_identifier("--"), "Stub");
    }
}
