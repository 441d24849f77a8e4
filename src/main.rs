use anyhow::{anyhow, Result};
use bookbuild::cli::{parse_args, Action, Cli};
use bookbuild::Orchestrator;
use clap::error::ErrorKind;
use colored::*;
use std::process;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "bookbuild=debug"
    } else if cli.quiet {
        "bookbuild=warn"
    } else {
        "bookbuild=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: &Cli) -> Result<bool> {
    let formats = match cli.action() {
        Action::Help => {
            println!("{}", Cli::help_text());
            return Ok(true);
        }
        Action::CheckDeps => None,
        Action::Build(formats) => Some(formats),
    };

    let orchestrator =
        Orchestrator::load(&cli.root, cli.config.as_deref(), &cli.overrides()).await?;

    match formats {
        None => {
            let report = orchestrator.check().await;
            if cli.json {
                let json = serde_json::to_string_pretty(&report)
                    .map_err(|e| anyhow!("Failed to serialize report: {}", e))?;
                println!("{}", json);
            } else {
                report.print();
            }
            Ok(report.passed())
        }
        Some(formats) => {
            let request = orchestrator.request(formats);
            let summary = orchestrator.build(&request).await?;
            if cli.json {
                let json = serde_json::to_string_pretty(&summary)
                    .map_err(|e| anyhow!("Failed to serialize summary: {}", e))?;
                println!("{}", json);
            } else {
                summary.print();
            }
            Ok(summary.succeeded())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = match parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            // clap renders help and version to stdout
            let _ = e.print();
            process::exit(0);
        }
        Err(e) => {
            let _ = e.print();
            eprintln!();
            eprintln!("{}", Cli::help_text());
            process::exit(1);
        }
    };

    init_logging(&cli);

    match run(&cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("{}", format!("Error: {}", e).red());
            process::exit(1);
        }
    }
}
