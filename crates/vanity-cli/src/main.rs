//! `vanity` - operator CLI for the Vanity playground

mod cli;

use anyhow::Context;
use clap::ArgMatches;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use vanity_config::EndpointOrigin;
use vanity_core::{Playground, PlaygroundConfig};
use vanity_experiment::Identity;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli::command().get_matches();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr);
    if matches.get_flag("log-json") {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = cli::playground_config(&matches, PlaygroundConfig::from_env()?)?;
    tracing::debug!(
        "Root {}, environment {}",
        config.root().display(),
        config.environment
    );
    let playground = Playground::new(config);

    match matches.subcommand() {
        Some(("experiments", _)) => list_experiments(&playground).await,
        Some(("endpoint", _)) => print_endpoint(&playground),
        Some(("assign", args)) => assign(&playground, args).await,
        Some(("report", args)) => report(&playground, args).await,
        _ => Ok(()),
    }
}

async fn list_experiments(playground: &Playground) -> anyhow::Result<()> {
    playground.load_experiments().await?;
    let experiments = playground.experiments();
    if experiments.is_empty() {
        println!("No experiments in {}", playground.load_path().display());
        return Ok(());
    }
    for experiment in experiments {
        let alternatives: Vec<String> = experiment
            .alternatives()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!(
            "{} ({}): {}",
            experiment.id(),
            experiment.experiment().name(),
            alternatives.join(", ")
        );
    }
    Ok(())
}

fn print_endpoint(playground: &Playground) -> anyhow::Result<()> {
    if playground.is_test_mode() {
        println!("memory (test mode)");
        return Ok(());
    }
    let resolved = playground.store_endpoint()?;
    let origin = match &resolved.origin {
        EndpointOrigin::Explicit => "explicit setting".to_string(),
        EndpointOrigin::ConfigFile(path) => path.display().to_string(),
        EndpointOrigin::Default => "default".to_string(),
    };
    println!("{} ({origin})", resolved.endpoint);
    Ok(())
}

async fn assign(playground: &Playground, args: &ArgMatches) -> anyhow::Result<()> {
    playground.load_experiments().await?;
    let id = required(args, "experiment")?;
    let identity = Identity::new(required(args, "identity")?);

    let experiment = playground.experiment(id)?;
    let choice = experiment
        .choose(&identity)
        .await
        .with_context(|| format!("choosing for {identity} in {id}"))?;
    println!(
        "{} (index {}{})",
        choice.alternative(),
        choice.index(),
        if choice.is_fresh() { ", new" } else { "" }
    );
    Ok(())
}

async fn report(playground: &Playground, args: &ArgMatches) -> anyhow::Result<()> {
    playground.load_experiments().await?;
    let id = required(args, "experiment")?;
    let experiment = playground.experiment(id)?;
    let counts = experiment.alternative_counts().await?;

    if args.get_flag("json") {
        let rows: Vec<_> = experiment
            .alternatives()
            .iter()
            .zip(&counts)
            .map(|(alternative, counts)| {
                json!({
                    "alternative": alternative.value(),
                    "participants": counts.participants,
                    "converted": counts.converted,
                    "conversions": counts.conversions,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "experiment": id, "alternatives": rows }))?
        );
    } else {
        println!("{}", experiment.experiment().name());
        for (alternative, counts) in experiment.alternatives().iter().zip(&counts) {
            println!(
                "  {}: {} participants, {} converted, {} conversions",
                alternative, counts.participants, counts.converted, counts.conversions
            );
        }
    }
    Ok(())
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing --{name}"))
}
