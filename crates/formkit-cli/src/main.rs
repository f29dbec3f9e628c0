//! `formkit` binary

use anyhow::{Context, Result};
use formkit_cli::commands::{self, Report, SubmitOptions};
use formkit_cli::{cli, logging};
use std::path::PathBuf;
use std::process::ExitCode;

fn path<'a>(args: &'a clap::ArgMatches, name: &str) -> Result<&'a PathBuf> {
    args.get_one::<PathBuf>(name)
        .with_context(|| format!("missing argument <{name}>"))
}

async fn run(matches: clap::ArgMatches) -> Result<Report> {
    match matches.subcommand() {
        Some(("check", args)) => commands::check(path(args, "config")?),
        Some(("validate", args)) => commands::validate(path(args, "config")?, path(args, "input")?),
        Some(("render", args)) => commands::render(path(args, "config")?),
        Some(("submit", args)) => {
            let options = SubmitOptions {
                user: args.get_one::<String>("user").cloned(),
                anonymous: args.get_flag("anonymous"),
            };
            commands::submit(
                path(args, "config")?,
                path(args, "input")?,
                path(args, "data-dir")?,
                options,
            )
            .await
        }
        Some((other, _)) => anyhow::bail!("unknown command: {other}"),
        None => anyhow::bail!("no command given"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    logging::init(matches.get_flag("verbose"));

    match run(matches).await {
        Ok(report) => {
            match serde_json::to_string_pretty(&report.body) {
                Ok(text) => println!("{text}"),
                Err(e) => tracing::error!("Could not encode output: {}", e),
            }
            if report.ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
