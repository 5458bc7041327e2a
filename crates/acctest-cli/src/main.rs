//! `acctest` - run resource-lifecycle scenarios against the simulated cloud

mod cli;
mod commands;

use anyhow::Result;
use clap::ArgMatches;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing(matches: &ArgMatches) {
    let default = if matches.get_flag("verbose") { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if matches.get_flag("log-json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli::command().get_matches();
    init_tracing(&matches);

    match matches.subcommand() {
        Some(("run", args)) => {
            let options = cli::RunOptions::from_matches(args)?;
            let passed = commands::run(options).await?;
            Ok(if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Some(("template", args)) => {
            let seed = args.get_one::<u64>("seed").copied().unwrap_or(0);
            print!(
                "{}",
                commands::render_template(seed, args.get_flag("display-name"))?
            );
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}
