//! Command-line definition

use acctest_batch::SCENARIOS;
use acctest_core::{HarnessConfig, ResourceAddress};
use acctest_sim::FaultPlan;
use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::time::Duration;

pub(crate) fn command() -> Command {
    Command::new("acctest")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Resource-lifecycle acceptance harness")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging (RUST_LOG still wins)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Run Batch Application scenarios against the simulated cloud")
                .arg(
                    Arg::new("scenario")
                        .long("scenario")
                        .short('s')
                        .action(ArgAction::Append)
                        .value_parser(SCENARIOS.to_vec())
                        .help("Scenario to run (repeatable, default: all)"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Seed for randomized names (default: random)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .value_parser(value_parser!(PathBuf))
                        .help("Harness configuration TOML"),
                )
                .arg(
                    Arg::new("parallel")
                        .long("parallel")
                        .short('p')
                        .value_parser(value_parser!(usize))
                        .help("Maximum concurrently running scenarios"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                )
                .arg(
                    Arg::new("drop-creates")
                        .long("drop-creates")
                        .action(ArgAction::Append)
                        .help("Resource type whose creates are silently dropped"),
                )
                .arg(
                    Arg::new("leak-deletes")
                        .long("leak-deletes")
                        .action(ArgAction::Append)
                        .help("Resource type whose deletes are acknowledged but ignored"),
                )
                .arg(
                    Arg::new("lagging-reads")
                        .long("lagging-reads")
                        .default_value("0")
                        .value_parser(value_parser!(u32))
                        .help("Reads that miss existing resources"),
                )
                .arg(
                    Arg::new("stale-deleted-reads")
                        .long("stale-deleted-reads")
                        .default_value("0")
                        .value_parser(value_parser!(u32))
                        .help("Reads of leaked resources that report not-found"),
                )
                .arg(
                    Arg::new("transient-reads")
                        .long("transient-reads")
                        .default_value("0")
                        .value_parser(value_parser!(u32))
                        .help("Reads of absent resources that fail with 503"),
                )
                .arg(
                    Arg::new("fail-apply")
                        .long("fail-apply")
                        .value_parser(value_parser!(ResourceAddress))
                        .help("Address whose apply fails (type.label)"),
                )
                .arg(
                    Arg::new("destroy-delay")
                        .long("destroy-delay")
                        .default_value("0")
                        .value_parser(value_parser!(u64))
                        .help("Seconds every destroy takes"),
                ),
        )
        .subcommand(
            Command::new("template")
                .about("Print the Batch Application configuration for a seed")
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("0")
                        .value_parser(value_parser!(u64))
                        .help("Seed for randomized names"),
                )
                .arg(
                    Arg::new("display-name")
                        .long("display-name")
                        .action(ArgAction::SetTrue)
                        .help("Include the update scenario's display_name"),
                ),
        )
}

/// Options for `run`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunOptions {
    pub(crate) scenarios: Vec<String>,
    pub(crate) seed: Option<u64>,
    pub(crate) config: HarnessConfig,
    pub(crate) json: bool,
    pub(crate) faults: FaultPlan,
}

impl RunOptions {
    pub(crate) fn from_matches(args: &ArgMatches) -> Result<Self> {
        let config = match args.get_one::<PathBuf>("config") {
            Some(path) => HarnessConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => HarnessConfig::new(),
        }
        .with_env_overrides()
        .context("applying environment overrides")?;

        let config = match args.get_one::<usize>("parallel") {
            Some(&max) => {
                let config = config.with_max_parallel(max);
                config.validate()?;
                config
            }
            None => config,
        };

        Ok(Self {
            scenarios: strings(args, "scenario"),
            seed: args.get_one::<u64>("seed").copied(),
            config,
            json: args.get_flag("json"),
            faults: faults(args),
        })
    }
}

fn strings(args: &ArgMatches, id: &str) -> Vec<String> {
    args.get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn count(args: &ArgMatches, id: &str) -> u32 {
    args.get_one::<u32>(id).copied().unwrap_or(0)
}

fn faults(args: &ArgMatches) -> FaultPlan {
    let mut plan = FaultPlan::none()
        .lagging_reads(count(args, "lagging-reads"))
        .stale_deleted_reads(count(args, "stale-deleted-reads"))
        .transient_absent_reads(count(args, "transient-reads"))
        .destroy_delay(Duration::from_secs(
            args.get_one::<u64>("destroy-delay").copied().unwrap_or(0),
        ));
    for resource_type in strings(args, "drop-creates") {
        plan = plan.drop_creates(resource_type);
    }
    for resource_type in strings(args, "leak-deletes") {
        plan = plan.leak_deletes(resource_type);
    }
    if let Some(address) = args.get_one::<ResourceAddress>("fail-apply") {
        plan = plan.fail_apply(address.clone());
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run_options(argv: &[&str]) -> Result<RunOptions> {
        let matches = command().try_get_matches_from(argv)?;
        let (_, args) = matches.subcommand().expect("subcommand");
        RunOptions::from_matches(args)
    }

    #[test]
    fn command_is_well_formed() {
        command().debug_assert();
    }

    #[test]
    fn run_defaults_to_every_scenario_without_faults() {
        let options = run_options(&["acctest", "run"]).unwrap();
        assert!(options.scenarios.is_empty());
        assert_eq!(options.seed, None);
        assert!(options.faults.is_empty());
        assert!(!options.json);
    }

    #[test]
    fn fault_flags_build_a_plan() {
        let options = run_options(&[
            "acctest",
            "run",
            "--scenario",
            "basic",
            "--seed",
            "9",
            "--leak-deletes",
            "azurerm_batch_application",
            "--transient-reads",
            "3",
            "--fail-apply",
            "azurerm_batch_account.test",
        ])
        .unwrap();

        assert_eq!(options.scenarios, vec!["basic"]);
        assert_eq!(options.seed, Some(9));
        assert!(options.faults.leak_deletes.contains("azurerm_batch_application"));
        assert_eq!(options.faults.transient_absent_reads, 3);
        assert_eq!(
            options.faults.fail_apply,
            Some(ResourceAddress::new("azurerm_batch_account", "test"))
        );
    }

    #[test]
    fn unknown_scenario_is_rejected() {
        assert!(command()
            .try_get_matches_from(["acctest", "run", "--scenario", "nope"])
            .is_err());
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        assert!(run_options(&["acctest", "run", "--parallel", "0"]).is_err());
    }

    #[test]
    fn config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"max_parallel = 3\nplan_after_apply = false\n")
            .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let options = run_options(&["acctest", "run", "--config", &path]).unwrap();
        assert_eq!(options.config.max_parallel, 3);
        assert!(!options.config.plan_after_apply);
    }
}
