//! Subcommand implementations

use crate::cli::RunOptions;
use acctest_batch::{display_name, schema, template, BatchScenarios, LABEL, RESOURCE_TYPE, SCENARIOS};
use acctest_core::{CancellationToken, HarnessConfig, SuiteReport, SuiteRunner, TestScenario};
use acctest_sim::{SimulatedCloud, SimulatedEngineFactory};
use acctest_template::TestData;
use anyhow::{bail, Result};
use std::sync::Arc;

/// Run the selected scenarios; the report is printed, the result says whether it passed
pub(crate) async fn run(options: RunOptions) -> Result<bool> {
    let cloud = SimulatedCloud::with_faults(options.faults.clone());
    schema::register(&cloud);

    let seed = options.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, faults = !options.faults.is_empty(), "preparing scenarios");

    let builder = BatchScenarios::new(
        Arc::new(cloud.client(RESOURCE_TYPE)),
        options.config.clone(),
    );
    let scenarios = select(&builder, &options.scenarios, seed)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling remaining work");
            interrupt.cancel();
        }
    });

    let factory = Arc::new(SimulatedEngineFactory::new(cloud.clone()));
    let report = SuiteRunner::new(options.config, factory)
        .run(scenarios, cancel)
        .await;

    print_report(&report, options.json)?;
    if !cloud.is_empty() {
        tracing::warn!(remaining = cloud.len(), "simulated cloud not empty after suite");
    }
    Ok(report.passed())
}

fn print_report(report: &SuiteReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report.generate_text());
    }
    Ok(())
}

/// Scenarios by name in the given order, each seeded by its suite position
fn select(builder: &BatchScenarios, names: &[String], seed: u64) -> Result<Vec<TestScenario>> {
    if names.is_empty() {
        return Ok(builder.all(seed));
    }

    let mut selected: Vec<TestScenario> = Vec::with_capacity(names.len());
    for name in names {
        if selected.iter().any(|s| &s.name == name) {
            continue;
        }
        let Some(offset) = SCENARIOS.iter().position(|known| known == name) else {
            bail!("unknown scenario {name:?}; known: {}", SCENARIOS.join(", "));
        };
        let scenario = builder.by_name(name, seed.wrapping_add(offset as u64));
        selected.extend(scenario);
    }
    Ok(selected)
}

/// Configuration text for one seed
pub(crate) fn render_template(seed: u64, with_display_name: bool) -> Result<String> {
    let config = HarnessConfig::new().with_env_overrides()?;
    let data = TestData::from_seed(seed, RESOURCE_TYPE, LABEL, config.locations);
    let extra = if with_display_name {
        format!("display_name = \"{}\"", display_name(&data))
    } else {
        String::new()
    };
    Ok(template(&data, &extra))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> BatchScenarios {
        BatchScenarios::new(
            Arc::new(SimulatedCloud::new().client(RESOURCE_TYPE)),
            HarnessConfig::new(),
        )
    }

    #[test]
    fn empty_selection_runs_everything() {
        let names: Vec<String> = select(&builder(), &[], 1)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, SCENARIOS);
    }

    #[test]
    fn selection_keeps_order_and_drops_duplicates() {
        let wanted = ["update", "basic", "update"].map(String::from);
        let names: Vec<String> = select(&builder(), &wanted, 1)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["update", "basic"]);
    }

    #[test]
    fn selected_scenarios_match_full_suite_seeding() {
        let builder = builder();
        let all = builder.all(5);
        let only_update = select(&builder, &["update".to_string()], 5).unwrap();
        assert_eq!(only_update[0].steps[0].config, all[1].steps[0].config);
    }

    #[test]
    fn unknown_names_are_errors() {
        let err = select(&builder(), &["nope".to_string()], 1).unwrap_err();
        assert!(err.to_string().contains("basic, update"));
    }

    #[test]
    fn template_is_deterministic_per_seed() {
        let a = render_template(11, false).unwrap();
        assert_eq!(a, render_template(11, false).unwrap());
        assert!(a.contains("resource \"azurerm_batch_application\" \"test\""));
        assert!(!a.contains("display_name"));
        assert!(render_template(11, true)
            .unwrap()
            .contains("display_name = \"TestAccDisplayName-"));
    }
}
