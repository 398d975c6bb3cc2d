use std::io;
use std::process::ExitCode;

use clap::Parser;

use importfix::cli::commands::{self, FixFlags};
use importfix::cli::{Cli, Commands};
use importfix::error::FixerError;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Fix {
            ref project,
            dry,
            apply,
            create_stubs,
            prefer_alias,
            ref report,
        } => {
            let flags = FixFlags {
                dry,
                apply,
                create_stubs,
                prefer_alias,
                report: report.clone(),
            };
            commands::run_fix(project, &flags, config, &cli.format)
        }
        Commands::Scan { ref project } => commands::run_scan(project, config, &cli.format),
    };

    match result {
        Ok((output, code)) => {
            println!("{}", output);
            ExitCode::from(code as u8)
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            match e.downcast_ref::<FixerError>() {
                Some(FixerError::Configuration(_)) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

/// Log to stderr; `RUST_LOG` wins over `--log-level`.
fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
