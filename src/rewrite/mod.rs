use std::collections::{BTreeMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::FixerError;
use crate::model::{ImportFix, Language, Span};
use crate::parser::ParserRegistry;

pub mod stub;
pub mod style;

/// Applies decided fixes to source files and creates stub modules.
///
/// Each file is read, re-parsed and written by a single worker, so fixes
/// for the same file never race; distinct files are handled in parallel.
/// With writes disabled (dry-run or report-only) every step except the
/// final write runs and fixes stay `pending`.
pub struct ImportRewriter {
    registry: ParserRegistry,
    write: bool,
}

impl ImportRewriter {
    pub fn new(write: bool) -> Self {
        Self {
            registry: ParserRegistry::with_defaults(),
            write,
        }
    }

    /// Apply `fixes`, creating the stub files in `stubs` (path -> content)
    /// first. Returns the fixes with their final status.
    pub fn apply(&self, fixes: Vec<ImportFix>, stubs: &BTreeMap<PathBuf, String>) -> Vec<ImportFix> {
        let (mut stub_fixes, edit_fixes): (Vec<ImportFix>, Vec<ImportFix>) =
            fixes.into_iter().partition(ImportFix::is_stub);

        self.create_stubs(&mut stub_fixes, stubs);

        let mut by_file: BTreeMap<PathBuf, Vec<ImportFix>> = BTreeMap::new();
        for fix in edit_fixes {
            by_file.entry(fix.file.clone()).or_default().push(fix);
        }
        let mut groups: Vec<(PathBuf, Vec<ImportFix>)> = by_file.into_iter().collect();
        groups
            .par_iter_mut()
            .for_each(|(file, fixes)| self.rewrite_file(file, fixes));

        let mut all = stub_fixes;
        all.extend(groups.into_iter().flat_map(|(_, fixes)| fixes));
        all
    }

    fn create_stubs(&self, fixes: &mut [ImportFix], stubs: &BTreeMap<PathBuf, String>) {
        if !self.write {
            return;
        }
        // Several errors may share a stub; each path is created once
        let mut outcome: BTreeMap<&Path, Result<(), String>> = BTreeMap::new();
        for fix in fixes.iter_mut() {
            let Some(path) = fix.stub_path.as_deref() else {
                continue;
            };
            let result = match (outcome.get(path), stubs.get(path)) {
                (Some(done), _) => done.clone(),
                (None, Some(content)) => {
                    let result = write_new_file(path, content).map_err(|e| e.to_string());
                    if let Some((key, _)) = stubs.get_key_value(path) {
                        outcome.insert(key.as_path(), result.clone());
                    }
                    result
                }
                (None, None) => Err(format!("no stub content planned for {}", path.display())),
            };
            match result {
                Ok(()) => fix.mark_applied(),
                Err(message) => {
                    warn!(stub = %path.display(), "failed to create stub: {}", message);
                    fix.mark_failed(message);
                }
            }
        }
    }

    fn rewrite_file(&self, file: &Path, fixes: &mut [ImportFix]) {
        let fail_all = |fixes: &mut [ImportFix], message: String| {
            warn!(file = %file.display(), "cannot rewrite: {}", message);
            for fix in fixes.iter_mut() {
                fix.mark_failed(message.clone());
            }
        };

        let source = match fs::read_to_string(file) {
            Ok(s) => s,
            Err(e) => return fail_all(fixes, format!("cannot read file: {}", e)),
        };
        let Some(language) = Language::from_path(file) else {
            return fail_all(fixes, "not a JavaScript or TypeScript file".to_string());
        };
        let parsed = match self.registry.parse(&source, language) {
            Ok(p) => p,
            Err(e) => return fail_all(fixes, format!("cannot parse file: {:#}", e)),
        };

        let mut edits: Vec<(Span, usize)> = Vec::new();
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut edited_fixes: Vec<usize> = Vec::new();

        for (i, fix) in fixes.iter_mut().enumerate() {
            // Every site spelling the broken specifier resolves the same way
            let sites: Vec<usize> = parsed
                .sites
                .iter()
                .enumerate()
                .filter(|(idx, site)| site.specifier == fix.old_import && !claimed.contains(idx))
                .map(|(idx, _)| idx)
                .collect();

            if sites.is_empty() {
                if parsed.sites.iter().any(|s| s.specifier == fix.new_import) {
                    debug!(file = %file.display(), new = %fix.new_import, "already rewritten");
                    if self.write {
                        fix.mark_applied();
                    }
                } else {
                    fix.mark_failed(format!("import '{}' not found in file", fix.old_import));
                }
                continue;
            }

            for idx in sites {
                claimed.insert(idx);
                edits.push((parsed.sites[idx].span, i));
            }
            edited_fixes.push(i);
        }

        if !self.write || edits.is_empty() {
            return;
        }

        // Apply from the end of the file so earlier offsets stay valid
        edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
        let mut output = source;
        for (span, i) in &edits {
            output.replace_range(span.start..span.end, &fixes[*i].new_import);
        }

        match atomic_write(file, &output) {
            Ok(()) => {
                info!(file = %file.display(), edits = edits.len(), "rewrote imports");
                for i in edited_fixes {
                    fixes[i].mark_applied();
                }
            }
            Err(source) => {
                let err = FixerError::Write {
                    path: file.to_path_buf(),
                    source,
                };
                warn!("{}", err);
                for i in edited_fixes {
                    fixes[i].mark_failed(err.to_string());
                }
            }
        }
    }
}

/// Temp file next to `path`; unique per process.
fn temp_path_for(path: &Path) -> PathBuf {
    path.with_file_name(format!(
        ".{}.{}.importfix.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id()
    ))
}

/// Replace `path` via a temp file and rename, so a failed write never
/// leaves a half-written source file behind.
fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
    let temp_path = temp_path_for(path);
    fs::write(&temp_path, content)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

/// Create `path` with `content`, making parent directories. An existing
/// file is left untouched and counts as success.
fn write_new_file(path: &Path, content: &str) -> Result<(), FixerError> {
    let to_write_error = |source| FixerError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_write_error)?;
    }
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(content.as_bytes()).map_err(to_write_error)?;
            info!(stub = %path.display(), "created stub module");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(to_write_error(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FixStatus, Heuristic, ImportError};
    use tempfile::TempDir;

    fn fix(file: &Path, old: &str, new: &str) -> ImportFix {
        ImportFix {
            file: file.to_path_buf(),
            old_import: old.to_string(),
            new_import: new.to_string(),
            line: None,
            heuristic: Heuristic::Extension,
            score: 0.95,
            applied: false,
            status: FixStatus::Pending,
            target_path: None,
            stub_path: None,
            error: None,
            alternatives: Vec::new(),
        }
    }

    #[test]
    fn test_rewrite_preserves_everything_but_the_specifier() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        let source = "import def, { x as y } from \"./util\"; // ./util stays\nconst s = './util';\nexport * from './util';\n";
        fs::write(&file, source).unwrap();

        let result = ImportRewriter::new(true).apply(vec![fix(&file, "./util", "./util.ts")], &BTreeMap::new());

        assert_eq!(result[0].status, FixStatus::Applied);
        assert!(result[0].applied);
        let content = fs::read_to_string(&file).unwrap();
        assert_eq!(
            content,
            "import def, { x as y } from \"./util.ts\"; // ./util stays\nconst s = './util';\nexport * from './util.ts';\n"
        );
    }

    #[test]
    fn test_multiple_fixes_in_one_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.tsx");
        fs::write(&file, "import A from './a';\nimport B from '../b';\n").unwrap();

        let result = ImportRewriter::new(true).apply(
            vec![fix(&file, "./a", "./components/A"), fix(&file, "../b", "./B")],
            &BTreeMap::new(),
        );
        assert!(result.iter().all(|f| f.applied));
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "import A from './components/A';\nimport B from './B';\n"
        );
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "import x from './x';\n").unwrap();
        let stub = dir.path().join("stub.ts");
        let stub_fix = ImportFix::stub(&ImportError::new(file.clone(), "./stub"), stub.clone());
        let stubs = BTreeMap::from([(stub.clone(), "export default null;\n".to_string())]);

        let result = ImportRewriter::new(false).apply(vec![fix(&file, "./x", "./x.ts"), stub_fix], &stubs);

        assert!(result.iter().all(|f| f.status == FixStatus::Pending && !f.applied));
        assert_eq!(fs::read_to_string(&file).unwrap(), "import x from './x';\n");
        assert!(!stub.exists());
    }

    #[test]
    fn test_already_applied_fix_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "import x from './x.ts';\n").unwrap();
        let result = ImportRewriter::new(true).apply(vec![fix(&file, "./x", "./x.ts")], &BTreeMap::new());
        assert_eq!(result[0].status, FixStatus::Applied);
        assert_eq!(fs::read_to_string(&file).unwrap(), "import x from './x.ts';\n");
    }

    #[test]
    fn test_missing_file_marks_fix_failed() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("gone.ts");
        let result = ImportRewriter::new(true).apply(vec![fix(&file, "./x", "./y")], &BTreeMap::new());
        assert_eq!(result[0].status, FixStatus::Failed);
        assert!(!result[0].applied);
        assert!(result[0].error.as_deref().unwrap().contains("cannot read"));
    }

    #[test]
    fn test_failed_write_marks_fix_failed_and_other_files_proceed() {
        let dir = TempDir::new().unwrap();
        let blocked = dir.path().join("blocked.ts");
        let open = dir.path().join("open.ts");
        fs::write(&blocked, "import x from './x';\n").unwrap();
        fs::write(&open, "import y from './y';\n").unwrap();
        // A directory where the temp file should go makes the write fail
        fs::create_dir(temp_path_for(&blocked)).unwrap();

        let result = ImportRewriter::new(true).apply(
            vec![fix(&blocked, "./x", "./x.ts"), fix(&open, "./y", "./y.ts")],
            &BTreeMap::new(),
        );

        let failed = result.iter().find(|f| f.file == blocked).unwrap();
        assert_eq!(failed.status, FixStatus::Failed);
        assert!(!failed.applied);
        assert!(failed.error.as_deref().unwrap().contains("failed to write"));
        assert_eq!(fs::read_to_string(&blocked).unwrap(), "import x from './x';\n");

        let done = result.iter().find(|f| f.file == open).unwrap();
        assert_eq!(done.status, FixStatus::Applied);
        assert_eq!(fs::read_to_string(&open).unwrap(), "import y from './y.ts';\n");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "old").unwrap();
        atomic_write(&file, "new").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "new");
        assert!(!temp_path_for(&file).exists());
    }

    #[test]
    fn test_shared_stub_created_once() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.ts");
        let b = dir.path().join("b.ts");
        let stub = dir.path().join("nested/Thing.ts");
        let stubs = BTreeMap::from([(stub.clone(), "export default function Thing() {}\n".to_string())]);
        let fixes = vec![
            ImportFix::stub(&ImportError::new(a, "./nested/Thing"), stub.clone()),
            ImportFix::stub(&ImportError::new(b, "./nested/Thing"), stub.clone()),
        ];

        let result = ImportRewriter::new(true).apply(fixes, &stubs);
        assert!(result.iter().all(|f| f.applied && f.is_stub()));
        assert_eq!(
            fs::read_to_string(&stub).unwrap(),
            "export default function Thing() {}\n"
        );
    }

    #[test]
    fn test_existing_stub_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let stub = dir.path().join("Thing.ts");
        fs::write(&stub, "export const real = 1;\n").unwrap();
        let stubs = BTreeMap::from([(stub.clone(), "stub".to_string())]);
        let fixes = vec![ImportFix::stub(
            &ImportError::new(dir.path().join("a.ts"), "./Thing"),
            stub.clone(),
        )];
        let result = ImportRewriter::new(true).apply(fixes, &stubs);
        assert!(result[0].applied);
        assert_eq!(fs::read_to_string(&stub).unwrap(), "export const real = 1;\n");
    }
}
