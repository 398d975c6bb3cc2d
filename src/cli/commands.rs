use std::path::Path;

use anyhow::Result;

use crate::collect::ErrorCollector;
use crate::config::FixerConfig;
use crate::error::FixerError;
use crate::fixer;
use crate::index::FileIndex;
use crate::model::FixerOptions;

use super::output::{format_errors, format_report};
use super::{OutputFormat, ProjectArgs};

/// Output text plus the process exit code.
pub type CommandOutput = (String, i32);

/// Mode flags of the `fix` subcommand.
#[derive(Debug, Clone, Default)]
pub struct FixFlags {
    pub dry: bool,
    pub apply: bool,
    pub create_stubs: bool,
    pub prefer_alias: bool,
    pub report: Option<std::path::PathBuf>,
}

/// Load the project config; a broken file is a configuration error.
fn load_config(root: &Path, config_override: Option<&Path>) -> Result<FixerConfig> {
    FixerConfig::load(root, config_override)
        .map_err(|e| FixerError::config(format!("{:#}", e)).into())
}

fn options_for(project: &ProjectArgs) -> FixerOptions {
    FixerOptions {
        root: project.root.clone(),
        src: project.src.clone(),
        from_build: project.from_build.clone(),
        run_vite: project.run_vite,
        ..Default::default()
    }
}

/// Run the full pipeline. Exits 1 when errors remain unresolved outside
/// dry-run, so CI can gate on it.
pub fn run_fix(
    project: &ProjectArgs,
    flags: &FixFlags,
    config_override: Option<&Path>,
    format: &OutputFormat,
) -> Result<CommandOutput> {
    let mut config = load_config(&project.root, config_override)?;
    if let Some(report) = &flags.report {
        config.fix.report_path = report.clone();
    }

    let options = FixerOptions {
        dry: flags.dry,
        apply: flags.apply,
        create_stubs: flags.create_stubs,
        prefer_alias: flags.prefer_alias,
        ..options_for(project)
    };
    let report = fixer::run(&options, &config)?;

    let code = if report.unresolved_count > 0 && !options.dry {
        1
    } else {
        0
    };
    Ok((format_report(&report, format), code))
}

/// Collect and list unresolved imports. Exits 1 when any exist.
pub fn run_scan(
    project: &ProjectArgs,
    config_override: Option<&Path>,
    format: &OutputFormat,
) -> Result<CommandOutput> {
    let config = load_config(&project.root, config_override)?;
    let options = options_for(project);

    let index = FileIndex::build(&options.root, &options.src, &config)?;
    let outcome = ErrorCollector::new(&index, &config).collect(&options)?;

    let code = if outcome.errors.is_empty() { 0 } else { 1 };
    Ok((format_errors(&index, &outcome, format), code))
}
