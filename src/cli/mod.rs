use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub mod commands;
pub mod output;

#[derive(Parser)]
#[command(
    name = "importfix",
    version,
    about = "Find and repair broken import specifiers in TypeScript/JavaScript projects"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Path to config file (default: .importfix/config.toml or importfix.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

/// Where to look and how to collect errors; shared by both subcommands.
#[derive(clap::Args, Clone, Debug)]
pub struct ProjectArgs {
    /// Project root
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Source directory, relative to the root
    #[arg(long, default_value = "src")]
    pub src: PathBuf,

    /// Read errors from a saved build log or a previous JSON report
    #[arg(long, value_name = "LOG")]
    pub from_build: Option<PathBuf>,

    /// Run the configured build command and parse its output
    #[arg(long)]
    pub run_vite: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve broken imports and report (or apply) the fixes
    Fix {
        #[command(flatten)]
        project: ProjectArgs,

        /// Compute fixes without writing anything
        #[arg(long, conflicts_with = "apply")]
        dry: bool,

        /// Write fixes to disk
        #[arg(long)]
        apply: bool,

        /// Create placeholder modules for imports nothing can satisfy
        #[arg(long)]
        create_stubs: bool,

        /// Prefer alias-rooted specifiers (e.g. `@/ui/Button`) over relative ones
        #[arg(long)]
        prefer_alias: bool,

        /// Report location, relative to the root
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List unresolved imports without resolving them
    Scan {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Compact,
}
