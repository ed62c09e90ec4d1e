//! Command-line definition

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use vanity_core::PlaygroundConfig;

pub(crate) fn command() -> Command {
    Command::new("vanity")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect Vanity experiments and assignments")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("root")
                .long("root")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Application root (default: current directory)"),
        )
        .arg(
            Arg::new("env")
                .long("env")
                .global(true)
                .help("Environment selecting the config/redis.yml entry"),
        )
        .arg(
            Arg::new("load-path")
                .long("load-path")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Experiments directory, relative to the root"),
        )
        .arg(
            Arg::new("redis")
                .long("redis")
                .global(true)
                .help("Store endpoint (host:port or redis:// URL)"),
        )
        .arg(
            Arg::new("test")
                .long("test")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Use the in-memory store"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(Command::new("experiments").about("List loaded experiments"))
        .subcommand(Command::new("endpoint").about("Print the resolved store endpoint"))
        .subcommand(
            Command::new("assign")
                .about("Choose an alternative for a visitor")
                .arg(
                    Arg::new("experiment")
                        .long("experiment")
                        .required(true)
                        .help("Experiment id"),
                )
                .arg(
                    Arg::new("identity")
                        .long("identity")
                        .required(true)
                        .help("Visitor identity"),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Print raw per-alternative counts")
                .arg(
                    Arg::new("experiment")
                        .long("experiment")
                        .required(true)
                        .help("Experiment id"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

/// Environment configuration overlaid with command-line flags
pub(crate) fn playground_config(
    matches: &ArgMatches,
    base: PlaygroundConfig,
) -> anyhow::Result<PlaygroundConfig> {
    let mut config = base;
    if let Some(root) = matches.get_one::<PathBuf>("root") {
        config = config.with_root(root);
    }
    if let Some(environment) = matches.get_one::<String>("env") {
        config = config.with_environment(environment);
    }
    if let Some(load_path) = matches.get_one::<PathBuf>("load-path") {
        config = config.with_load_path(load_path);
    }
    if let Some(redis) = matches.get_one::<String>("redis") {
        config = config.with_store(redis.parse()?);
    }
    if matches.get_flag("test") {
        config = config.with_test_mode(true);
    }
    Ok(config)
}
