//! docopts - docopt argument parsing for shell scripts.

use anyhow::{Context, Result};
use clap::Parser;
use docopts::config::{collect_args, split_invocation, Cli, Settings};
use docopts::output::{
    generate_usage_error_string, render, write_script, ExportMode, USAGE_EXIT_STATUS,
};
use docopts::{Docopt, DocoptError};
use log::LevelFilter;
use std::io;
use std::process;

fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> Result<()> {
    let args = collect_args(std::env::args_os().skip(1)).context("invalid docopts invocation")?;
    let (head, argv) = split_invocation(&args).context("invalid docopts invocation")?;

    let cli = Cli::parse_from(std::iter::once("docopts".to_string()).chain(head));
    init_logging(cli.debug);

    let settings =
        Settings::from_cli(cli, io::stdin().lock()).context("invalid docopts invocation")?;
    let docopt = Docopt::new(settings.doc.as_str()).context("invalid doc string")?;

    let script = match docopt.parse(&argv, &settings.parse_settings()) {
        Ok(outcome) => render(&outcome, &settings.mode).context("failed to generate output")?,
        Err(err @ DocoptError::Usage { .. }) => {
            if settings.mode == ExportMode::Json {
                eprintln!("{err}");
                process::exit(USAGE_EXIT_STATUS);
            }
            generate_usage_error_string(&err.to_string())
        }
        Err(err) => return Err(err).context("invalid doc string"),
    };

    if settings.to_file {
        let path = write_script(&script).context("failed to write output file")?;
        println!("{}", path.display());
    } else {
        print!("{script}");
    }

    Ok(())
}
