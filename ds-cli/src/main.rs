use anyhow::{Error, Result};
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use ds::{GetError, Getter, GetterBuilder, ToolCatalog};
use itertools::Itertools;
use log::{debug, error};
use thiserror::Error;

#[derive(Debug, Error)]
enum DsError {
    #[error("{0:}")]
    InvalidArgsError(String),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cmd = cmd();
    let matches = cmd.get_matches();
    let res = init_logger_from_matches(&matches);
    if let Err(e) = res {
        eprintln!("Error creating logger: {e}");
        std::process::exit(126);
    }

    let status = match matches.subcommand() {
        Some(("get", get_matches)) => get(get_matches).await,
        Some((name, _)) => {
            print_err(&DsError::InvalidArgsError(format!("Unknown command: {name}")).into());
            127
        }
        None => {
            print_err(&DsError::InvalidArgsError("You must pass a command.".to_string()).into());
            127
        }
    };
    std::process::exit(status);
}

const MAX_TERM_WIDTH: usize = 100;

fn cmd() -> Command {
    Command::new("ds")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Daniel Michaels")
        .about("A command box for all of my things")
        .subcommand(get_cmd())
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable verbose output."),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debugging output."),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Suppresses most output."),
        )
        .group(ArgGroup::new("log-level").args(["verbose", "debug", "quiet"]))
        .max_term_width(MAX_TERM_WIDTH)
}

fn get_cmd() -> Command {
    Command::new("get")
        .about("Install a tool from its GitHub releases, or list the tools that can be installed.")
        .arg(Arg::new("tool").help(concat!(
            "The tool to install, like k9s. Run `ds get` without a tool to see the list of",
            " supported tools.",
        )))
        .arg(Arg::new("tag").long("tag").short('t').help(concat!(
            "The release tag to install. Defaults to the version pinned for the tool, or the",
            " latest release if it has none.",
        )))
        .arg(
            Arg::new("in")
                .long("in")
                .short('i')
                .help("The directory in which the tool should be placed. Defaults to ~/.ds/bin."),
        )
        .arg(Arg::new("api-base-url").long("api-base-url").help(concat!(
            "The base URL for the GitHub API. This is useful for testing or if you want to",
            " operate against an Enterprise version of GitHub. This should be something like",
            " `https://github.my-corp.example.com/api/v3`.",
        )))
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .action(ArgAction::SetTrue)
                .help("Do not show a progress bar while downloading."),
        )
}

pub(crate) fn init_logger_from_matches(matches: &ArgMatches) -> Result<(), log::SetLoggerError> {
    let level = if matches.get_flag("debug") {
        log::LevelFilter::Debug
    } else if matches.get_flag("verbose") {
        log::LevelFilter::Info
    } else if matches.get_flag("quiet") {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Warn
    };

    ds::init_logger(level)
}

async fn get(matches: &ArgMatches) -> i32 {
    let Some(tool) = matches.get_one::<String>("tool") else {
        if let Err(e) = validate_list_args(matches) {
            print_err(&e);
            return 127;
        }
        print!("{}", tools_table(&ToolCatalog::builtin()));
        return 0;
    };

    match make_getter(matches, tool) {
        Ok(getter) => match getter.install().await {
            Ok(installation) => {
                debug!(
                    "installed {} {} from {}",
                    installation.tool, installation.version, installation.url,
                );
                println!("{}", installation.message);
                0
            }
            Err(e) => {
                print_err(&e);
                1
            }
        },
        Err(e) => {
            print_err(&e);
            build_error_status(&e)
        }
    }
}

// A `GetError` from the builder comes from the local environment, not the arguments.
fn build_error_status(e: &Error) -> i32 {
    if e.downcast_ref::<GetError>().is_some() {
        1
    } else {
        127
    }
}

fn make_getter(matches: &ArgMatches, tool: &str) -> Result<Getter> {
    let mut builder = GetterBuilder::new().tool(tool);
    if let Some(t) = matches.get_one::<String>("tag") {
        builder = builder.version(t);
    }
    if let Some(dir) = matches.get_one::<String>("in") {
        builder = builder.tool_dir(dir);
    }
    if let Some(url) = matches.get_one::<String>("api-base-url") {
        builder = builder.api_base_url(url);
    }
    if matches.get_flag("no-progress") {
        builder = builder.show_progress(false);
    }

    builder.build()
}

fn validate_list_args(matches: &ArgMatches) -> Result<()> {
    for a in &["tag", "in"] {
        if matches.contains_id(a) {
            return Err(DsError::InvalidArgsError(format!(
                "You cannot pass --{a} without the name of a tool to install"
            ))
            .into());
        }
    }
    Ok(())
}

fn tools_table(catalog: &ToolCatalog) -> String {
    let tools = catalog.sorted();
    let width = tools
        .iter()
        .map(|t| t.name.len())
        .chain(std::iter::once("TOOL".len()))
        .max()
        .unwrap_or_default();

    let rows = std::iter::once(format!("{:<width$}  DESCRIPTION", "TOOL"))
        .chain(
            tools
                .iter()
                .map(|t| format!("{:<width$}  {}", t.name, t.description)),
        )
        .join("\n");
    format!(
        "{rows}\n\n{} tools are currently supported.\n",
        catalog.len(),
    )
}

fn print_err(e: &Error) {
    error!("{e}");
    if let Some(de) = e.downcast_ref::<DsError>() {
        match de {
            DsError::InvalidArgsError(_) => {
                println!();
                if let Err(e) = get_cmd().print_help() {
                    eprintln!("Error printing help: {e}");
                }
            }
        }
    }
}
