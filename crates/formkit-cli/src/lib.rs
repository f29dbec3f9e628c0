//! formkit command line host
//!
//! Loads a form configuration file and drives it without a UI:
//!
//! ```text
//! formkit check <config>
//! formkit validate <config> <input.json>
//! formkit render <config>
//! formkit submit <config> <input.json> --data-dir <dir> [--user <id>]
//! ```

#![warn(missing_docs)]

pub mod commands;
pub mod input;
pub mod logging;

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

fn config_arg() -> Arg {
    Arg::new("config")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Form configuration (.yaml, .yml or .json)")
}

fn input_arg() -> Arg {
    Arg::new("input")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Input JSON keyed by field name")
}

/// Command line definition
#[must_use]
pub fn cli() -> Command {
    Command::new("formkit")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Declarative forms: validate, render and submit")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging (RUST_LOG overrides)"),
        )
        .subcommand(
            Command::new("check")
                .about("Validate a form configuration")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate an input against a form")
                .arg(config_arg())
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("render")
                .about("Print the view model of a form")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("submit")
                .about("Submit an input to local storage")
                .arg(config_arg())
                .arg(input_arg())
                .arg(
                    Arg::new("data-dir")
                        .long("data-dir")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory receiving blobs/ and documents/"),
                )
                .arg(
                    Arg::new("user")
                        .long("user")
                        .help("Signed-in user id"),
                )
                .arg(
                    Arg::new("anonymous")
                        .long("anonymous")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("user")
                        .help("Submit without a signed-in user"),
                ),
        )
}
