//! `approval-desk` command line
//!
//! - `simulate`: concurrent reviewers against a fault-injecting store
//! - `demo`: one batch walked from creation to finalize, printed step by step
//! - `config`: effective engine configuration as TOML

use anyhow::{Context, Result};
use approval_engine::simulation::{self, SimulationConfig};
use approval_engine::{ApprovalEngine, EngineConfig, NewBatch};
use approval_model::{ItemEdit, ItemStatus, LinkToken};
use approval_store::MemoryStore;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("approval-desk")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Batch approval workflow: guest review links and finalize")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration file (TOML)"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run concurrent reviewers against a faulty store")
                .arg(
                    Arg::new("reviewers")
                        .long("reviewers")
                        .default_value("4")
                        .value_parser(value_parser!(u32))
                        .help("Concurrent reviewers sharing one link"),
                )
                .arg(
                    Arg::new("items")
                        .long("items")
                        .default_value("12")
                        .value_parser(value_parser!(u32))
                        .help("Items in the simulated batch"),
                )
                .arg(
                    Arg::new("actions")
                        .long("actions")
                        .default_value("25")
                        .value_parser(value_parser!(u32))
                        .help("Actions per reviewer before finalize"),
                )
                .arg(
                    Arg::new("failure-rate")
                        .long("failure-rate")
                        .default_value("0.1")
                        .value_parser(value_parser!(f64))
                        .help("Probability that a store write fails"),
                )
                .arg(
                    Arg::new("finalize-attempts")
                        .long("finalize-attempts")
                        .default_value("10")
                        .value_parser(value_parser!(u32))
                        .help("Finalize attempts under faults before healing the store"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("demo")
                .about("Create, review and finalize one batch in memory")
                .arg(
                    Arg::new("items")
                        .long("items")
                        .default_value("2")
                        .value_parser(value_parser!(u32))
                        .help("Items in the demo batch"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration"))
}

fn load_config(matches: &ArgMatches) -> Result<EngineConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            EngineConfig::from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))
        }
        None => {
            tracing::debug!("no --config given, using defaults");
            Ok(EngineConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("simulate", args)) => simulate(args, config).await,
        Some(("demo", args)) => demo(args, config).await,
        Some(("config", _)) => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}

async fn simulate(args: &ArgMatches, engine: EngineConfig) -> Result<()> {
    let config = SimulationConfig {
        seed: arg(args, "seed")?,
        reviewers: arg(args, "reviewers")?,
        items: arg(args, "items")?,
        actions_per_reviewer: arg(args, "actions")?,
        write_failure_rate: arg(args, "failure-rate")?,
        max_finalize_attempts: arg(args, "finalize-attempts")?,
        engine,
    };
    anyhow::ensure!(
        (0.0..=1.0).contains(&config.write_failure_rate),
        "--failure-rate must be between 0 and 1"
    );

    let json = args.get_flag("json");
    if !json {
        println!("Running approval simulator...");
        println!("Seed: {}", config.seed);
        println!("Reviewers: {}", config.reviewers);
        println!("Items: {}", config.items);
        println!();
    }

    let report = simulation::run(config).await;
    tracing::info!(
        passed = report.passed(),
        violations = report.violations.len(),
        "simulation finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.generate_text());
    }

    std::process::exit(if report.passed() { 0 } else { 1 });
}

async fn demo(args: &ArgMatches, config: EngineConfig) -> Result<()> {
    let items: u32 = arg(args, "items")?;
    let engine = ApprovalEngine::with_config(Arc::new(MemoryStore::new()), config)?;

    let client = engine
        .intake()
        .register_client("Demo Client", "demo@approval.test")
        .await?;
    let assets = (1..=items).map(|n| format!("asset://demo/{n}")).collect();
    let created = engine
        .intake()
        .create_batch(NewBatch::new(client.id, "Demo batch", assets).with_description("walkthrough"))
        .await?;
    println!(
        "Created batch '{}' with {} items, link token {}",
        created.batch.name,
        created.items.len(),
        created.batch.link_token
    );

    let guest = engine.guest(&created.batch.link_token).await?;
    for (n, item) in created.items.iter().enumerate() {
        let status = if n % 2 == 0 {
            ItemStatus::Approved
        } else {
            ItemStatus::Rejected
        };
        guest
            .apply_item_edit(item.id, &ItemEdit::new().label(format!("REF-{}", n + 1)))
            .await?;
        let updated = guest.apply_item_status(item.id, status).await?;
        println!("  {} -> {}", updated.asset_ref, updated.status);
    }

    let batch = guest.finalize().await?;
    println!("Finalized: batch is {}", batch.status);

    if let Some(first) = created.items.first() {
        match guest.apply_item_status(first.id, ItemStatus::Pending).await {
            Err(err) => println!("Late change refused: {err}"),
            Ok(_) => anyhow::bail!("finalized batch accepted a change"),
        }
    }
    match engine.resolve_link(&LinkToken::new("unknown-token")).await {
        Err(err) => println!("Unknown link: {err}"),
        Ok(_) => anyhow::bail!("unknown link resolved"),
    }

    let summary = engine.batch_summary(batch.id).await?;
    println!(
        "Summary: {} approved, {} rejected, {} pending",
        summary.approved, summary.rejected, summary.pending
    );
    Ok(())
}

fn arg<T: Clone + Send + Sync + 'static>(args: &ArgMatches, name: &str) -> Result<T> {
    args.get_one::<T>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}
