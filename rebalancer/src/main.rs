//! CLI entry point for the tangent rebalancer.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use tangent_rebalancer::broker;
use tangent_rebalancer::config::Config;
use tangent_rebalancer::error::{Error, Result};
use tangent_rebalancer::execution::{self, RunOptions, RunOutcome, StrategySet};

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Maximum-Sharpe portfolio rebalancer")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute target holdings, confirm, and execute rebalance orders
    Run {
        /// Show plan without executing
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt (for automation/cron)
        #[arg(long)]
        force: bool,

        /// Run even when markets are closed
        #[arg(long)]
        no_market_check: bool,
    },

    /// Compute and print the plan without submitting orders
    Plan,

    /// Show current positions
    Positions,

    /// Check broker connection and market hours
    Status,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = dispatch(&config, cli.command) {
        match &e {
            Error::Aborted(msg) => {
                eprintln!("{msg}");
                process::exit(0);
            }
            Error::Interrupted {
                executions, unsent, ..
            } => {
                eprintln!("Error: {e}");
                eprintln!("{} orders were never sent", unsent.len());
                if let Ok(json) = to_json(executions.as_ref()) {
                    println!("{json}");
                }
                process::exit(1);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}

fn dispatch(config: &Config, command: Command) -> Result<()> {
    let broker = broker::connect(config)?;
    let broker = broker.as_ref();
    let strategies = StrategySet::from_config(config);
    let policy = config.capital_policy();
    let caps = config.blend_caps();

    match command {
        Command::Run {
            dry_run,
            force,
            no_market_check,
        } => {
            let mut opts = RunOptions::from_config(config);
            opts.dry_run = dry_run;
            opts.market_check &= !no_market_check;

            let outcome = execution::rebalance_with(broker, &strategies, policy, caps, &opts, |plan| {
                execution::display_plan(plan, policy);
                if force {
                    return Ok(true);
                }
                dialoguer::Confirm::new()
                    .with_prompt("Execute?")
                    .default(false)
                    .interact()
                    .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))
            })?;
            print_outcome(&outcome)
        }
        Command::Plan => {
            let mut opts = RunOptions::from_config(config);
            opts.dry_run = true;
            let plan = execution::plan(broker, &strategies, policy, caps, &opts)?;
            execution::display_plan(&plan, policy);
            println!("{}", to_json(&plan)?);
            Ok(())
        }
        Command::Positions => execution::show_positions(broker),
        Command::Status => execution::check_status(broker),
    }
}

fn print_outcome(outcome: &RunOutcome) -> Result<()> {
    if let RunOutcome::NotRun { reason } = outcome {
        println!("Not run: {reason}");
    }
    println!("{}", to_json(outcome)?);
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
