//! The whole repair pipeline: index, collect, resolve, rewrite, report.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::candidates::{CandidateResolver, ResolveContext};
use crate::collect::ErrorCollector;
use crate::config::FixerConfig;
use crate::error::FixerError;
use crate::index::FileIndex;
use crate::model::{
    Bindings, FixCandidate, FixerOptions, ImportError, ImportFix, ImportSite, Language, Report,
};
use crate::parser::ParserRegistry;
use crate::report::{build_report, write_report, RunResult};
use crate::resolver::typescript::TypeScriptResolver;
use crate::rewrite::stub::{render_stub, stub_path};
use crate::rewrite::style::ImportStyle;
use crate::rewrite::ImportRewriter;

/// What the candidate search decided for one error.
enum Decision {
    Fix(ImportFix),
    /// No candidate reached the threshold; the best one, if any, is kept as
    /// a suggestion for manual follow-up.
    Unresolved(Option<String>),
}

/// Import sites and detected style of one importing file.
#[derive(Default)]
struct FileAnalysis {
    style: ImportStyle,
    sites: Vec<ImportSite>,
}

/// Run the fixer once and persist its report.
///
/// Only whole-run problems (bad paths, contradictory options, a collection
/// failure with fallback disabled) are returned as errors. Per-file and
/// per-fix failures end up in the report.
pub fn run(options: &FixerOptions, config: &FixerConfig) -> Result<Report, FixerError> {
    let started = Instant::now();
    if options.dry && options.apply {
        return Err(FixerError::config("dry and apply modes are mutually exclusive"));
    }

    let index = FileIndex::build(&options.root, &options.src, config)?;
    let collected = ErrorCollector::new(&index, config).collect(options)?;
    let warnings = collected.warnings;
    let mut errors = collected.errors;

    let registry = ParserRegistry::with_defaults();
    let analyses = analyze_importers(&index, &errors, &registry);

    let resolver = TypeScriptResolver::new(&index, &config.resolve);
    let candidates = CandidateResolver::with_defaults();
    let decisions: Vec<Decision> = errors
        .par_iter()
        .map(|error| {
            let style = analyses
                .get(&error.file)
                .map(|a| a.style)
                .unwrap_or_default();
            let ctx = ResolveContext::new(&index, &resolver, error, style, options.prefer_alias);
            decide(error, candidates.resolve(&ctx), config)
        })
        .collect();

    let mut fixes = Vec::new();
    let mut unresolved = Vec::new();
    for (error, decision) in errors.iter_mut().zip(decisions) {
        match decision {
            Decision::Fix(fix) => fixes.push(fix),
            Decision::Unresolved(suggestion) => {
                error.suggestion = suggestion;
                unresolved.push(error.clone());
            }
        }
    }
    info!(
        errors = errors.len(),
        fixes = fixes.len(),
        unresolved = unresolved.len(),
        "resolved candidates"
    );

    let stubs = if options.create_stubs {
        plan_stubs(&index, &unresolved, &analyses, &mut fixes)
    } else {
        BTreeMap::new()
    };

    let writes = options.writes_enabled();
    if !writes {
        debug!("writes disabled; fixes stay pending");
    }
    let fixes = ImportRewriter::new(writes).apply(fixes, &stubs);

    let report_path = index.root().join(&config.fix.report_path);
    let mut report = build_report(
        &index,
        RunResult {
            options: options.clone(),
            strategy: collected.strategy,
            errors,
            fixes,
            warnings,
            duration: started.elapsed(),
        },
    );
    if let Err(e) = write_report(&report, &report_path) {
        warn!("{}", e);
        report.warnings.push(e.to_string());
    }

    info!(
        fixed = report.fixed_count,
        unresolved = report.unresolved_count,
        duration_ms = report.duration,
        "run finished"
    );
    Ok(report)
}

/// Parse each file that has errors once, for its sites and import style.
fn analyze_importers(
    index: &FileIndex,
    errors: &[ImportError],
    registry: &ParserRegistry,
) -> HashMap<PathBuf, FileAnalysis> {
    let mut files: Vec<&Path> = errors.iter().map(|e| e.file.as_path()).collect();
    files.dedup();

    files
        .par_iter()
        .filter_map(|file| {
            let language = index.language_of(file).or_else(|| Language::from_path(file))?;
            let source = std::fs::read_to_string(file).ok()?;
            let parsed = match registry.parse(&source, language) {
                Ok(p) => p,
                Err(e) => {
                    debug!(file = %file.display(), "cannot detect import style: {:#}", e);
                    return None;
                }
            };
            let style = ImportStyle::detect(language, &parsed.sites, index.aliases());
            Some((
                file.to_path_buf(),
                FileAnalysis {
                    style,
                    sites: parsed.sites,
                },
            ))
        })
        .collect()
}

/// Accept the top candidate when it clears `fix.min_score`; the next ones
/// become alternatives.
fn decide(error: &ImportError, ranked: Vec<FixCandidate>, config: &FixerConfig) -> Decision {
    let mut ranked = ranked.into_iter();
    match ranked.next() {
        Some(top) if top.score >= config.fix.min_score => {
            let alternatives = ranked.take(config.fix.max_alternatives).collect();
            Decision::Fix(ImportFix::from_candidate(error, &top, alternatives))
        }
        Some(top) => {
            debug!(
                specifier = %error.specifier,
                best = %top.specifier,
                score = top.score,
                "best candidate below threshold"
            );
            Decision::Unresolved(Some(top.specifier))
        }
        None => Decision::Unresolved(None),
    }
}

/// Turn unresolved errors into stub fixes and the content of each stub.
/// Bindings of every importer of the same stub are merged.
fn plan_stubs(
    index: &FileIndex,
    unresolved: &[ImportError],
    analyses: &HashMap<PathBuf, FileAnalysis>,
    fixes: &mut Vec<ImportFix>,
) -> BTreeMap<PathBuf, String> {
    let mut planned: BTreeMap<PathBuf, (String, Bindings)> = BTreeMap::new();
    for error in unresolved {
        let Some(path) = stub_path(index, error) else {
            debug!(specifier = %error.specifier, "no stub location for specifier");
            continue;
        };
        let entry = planned
            .entry(path.clone())
            .or_insert_with(|| (error.specifier.clone(), Bindings::default()));
        if let Some(analysis) = analyses.get(&error.file) {
            for site in analysis.sites.iter().filter(|s| s.specifier == error.specifier) {
                entry.1.merge(&site.bindings);
            }
        }
        fixes.push(ImportFix::stub(error, path));
    }

    planned
        .into_iter()
        .map(|(path, (specifier, bindings))| {
            let content = render_stub(&path, &specifier, &bindings);
            (path, content)
        })
        .collect()
}
