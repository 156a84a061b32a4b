//! The clap front-end.
//!
//! Subcommands are only known after the program is built, and building
//! needs `--cwd`. Global options are therefore read twice: once by a
//! lenient bootstrap parse, then by the full parse with every command
//! registered.

use bob_core::Program;
use clap::{Arg, ArgAction, ArgMatches, Command as ClapCommand};
use std::ffi::OsString;
use std::path::PathBuf;

pub const BIN_NAME: &str = "bob";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalArgs {
    pub cwd: Option<PathBuf>,
    pub debug: bool,
}

/// `bob` with its global options and no subcommands.
pub fn base_command() -> ClapCommand {
    ClapCommand::new(BIN_NAME)
        .about("Plugin-driven project scaffolding")
        .arg(
            Arg::new("cwd")
                .short('c')
                .long("cwd")
                .global(true)
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Directory to run in (default: current directory)"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print debug logs"),
        )
}

/// Read global options without knowing any subcommand. Never fails;
/// anything unparseable falls back to defaults.
pub fn bootstrap(args: &[OsString]) -> GlobalArgs {
    let lenient = base_command()
        .ignore_errors(true)
        .allow_external_subcommands(true)
        .disable_help_flag(true)
        .disable_version_flag(true);
    match lenient.try_get_matches_from(args) {
        Ok(matches) => global_args(&matches),
        Err(_) => GlobalArgs::default(),
    }
}

/// The full CLI with one subcommand per discovered command.
pub fn build_cli(program: &Program) -> ClapCommand {
    let mut cli = base_command()
        .version(program.version())
        .disable_help_subcommand(true);
    for cmd in program.commands() {
        cli = cli.subcommand(
            ClapCommand::new(cmd.name().to_string()).about(cmd.description().to_string()),
        );
    }
    cli
}

/// Partial matches from the bootstrap parse may lack defaults, so nothing
/// here assumes a value is present.
pub fn global_args(matches: &ArgMatches) -> GlobalArgs {
    GlobalArgs {
        cwd: matches.try_get_one::<PathBuf>("cwd").ok().flatten().cloned(),
        debug: matches!(matches.try_get_one::<bool>("debug"), Ok(Some(true))),
    }
}
