//! Rebalance CLI: simulate target-weight schedules against a price tape.
//!
//! Commands:
//! - `run`: execute one simulation from a TOML config and save artifacts
//! - `sweep`: run a grid of cost / deployment settings in parallel
//! - `ideal`: frictionless reference returns of the same schedule
//! - `validate`: load inputs and resolve the simulation window without running

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rebalance_runner::export::{export_ideal_csv, export_sweep_csv, write_text};
use rebalance_runner::{
    prepare, run_from_config, run_sweep, RunSummary, RunnerConfig, SweepEntry, SweepGrid,
};

#[derive(Parser)]
#[command(
    name = "rebalance",
    about = "Rebalance simulator: lot-level execution of target-weight schedules"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation and save its artifacts.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Override the output directory from the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the summary as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run a parameter grid over costs and deployment ratio.
    Sweep {
        #[arg(long)]
        config: PathBuf,

        /// Buy cost rates, comma separated. Defaults to the config value.
        #[arg(long, value_delimiter = ',')]
        buy_costs: Vec<f64>,

        /// Sell cost rates, comma separated. Defaults to the config value.
        #[arg(long, value_delimiter = ',')]
        sell_costs: Vec<f64>,

        /// Deployment ratios, comma separated. Defaults to the config value.
        #[arg(long, value_delimiter = ',')]
        trade_ratios: Vec<f64>,

        /// Number of rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Frictionless reference returns of the configured schedule.
    Ideal {
        #[arg(long)]
        config: PathBuf,

        /// Flat cost charged on absolute weight changes.
        #[arg(long, default_value_t = 0.0)]
        cost: f64,
    },
    /// Load inputs and check the simulation can be set up.
    Validate {
        #[arg(long)]
        config: PathBuf,

        /// Check with this start date instead of the config's.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Check with this end date instead of the config's.
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            json,
        } => run_cmd(&config, output_dir.as_deref(), json),
        Commands::Sweep {
            config,
            buy_costs,
            sell_costs,
            trade_ratios,
            top,
        } => sweep_cmd(
            &config,
            SweepGrid {
                buy_costs,
                sell_costs,
                trade_ratios,
            },
            top,
        ),
        Commands::Ideal { config, cost } => ideal_cmd(&config, cost),
        Commands::Validate { config, start, end } => validate_cmd(&config, start, end),
    }
}

fn run_cmd(config: &Path, output_dir: Option<&Path>, json: bool) -> Result<()> {
    let result = run_from_config(config, output_dir)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result.summary)?);
    } else {
        print_summary(&result.summary);
    }
    if let Some(dir) = &result.artifact_dir {
        println!("Artifacts saved to: {}", dir.display());
    }
    Ok(())
}

fn sweep_cmd(config_path: &Path, grid: SweepGrid, top: usize) -> Result<()> {
    let config = RunnerConfig::load(config_path)?;
    let backtest = prepare(&config)?;
    info!(points = grid.size(), "sweep grid");
    let entries = run_sweep(&backtest, &grid)?;

    print_sweep(&entries, top);

    std::fs::create_dir_all(&config.output.dir).with_context(|| {
        format!(
            "failed to create output dir: {}",
            config.output.dir.display()
        )
    })?;
    let path = config.output.dir.join("sweep.csv");
    write_text(&path, &export_sweep_csv(&entries)?)?;
    println!("Sweep saved to: {}", path.display());
    Ok(())
}

fn ideal_cmd(config_path: &Path, cost: f64) -> Result<()> {
    let config = RunnerConfig::load(config_path)?;
    let backtest = prepare(&config)?;
    let ideal = backtest.ideal_world(cost);
    let real = backtest.run();

    println!();
    println!("=== Ideal World ===");
    println!("Sessions:       {}", ideal.dates.len());
    println!("Trading cost:   {:.4}%", cost * 100.0);
    println!(
        "Ideal Return:   {:.2}%",
        (ideal.final_value() - 1.0) * 100.0
    );
    println!("Real Return:    {:.2}%", real.total_return() * 100.0);

    std::fs::create_dir_all(&config.output.dir).with_context(|| {
        format!(
            "failed to create output dir: {}",
            config.output.dir.display()
        )
    })?;
    let path = config.output.dir.join("ideal_world.csv");
    write_text(&path, &export_ideal_csv(&ideal)?)?;
    println!("Series saved to: {}", path.display());
    Ok(())
}

fn validate_cmd(
    config_path: &Path,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<()> {
    let mut config = RunnerConfig::load(config_path)?;
    if start.is_some() {
        config.simulation.start = start;
    }
    if end.is_some() {
        config.simulation.end = end;
    }
    config.validate()?;
    let backtest = prepare(&config)?;

    let universe = backtest.schedule().universe();
    println!("Config OK: {}", config_path.display());
    println!("Run ID:         {}", config.run_id()?);
    println!("Instruments:    {}", universe.len());
    println!(
        "Window:         {} to {} ({} sessions)",
        backtest.start_date(),
        backtest.end_date(),
        backtest.window().len()
    );
    println!("Rebalances:     {}", backtest.rebalance_dates().len());
    println!(
        "Benchmark:      {}",
        if backtest.market().benchmark().is_some() {
            "yes"
        } else {
            "no"
        }
    );
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("=== Rebalance Simulation ===");
    println!("Run ID:         {}", summary.run_id.get(..12).unwrap_or(&summary.run_id));
    println!("Period:         {} to {}", summary.start, summary.end);
    println!(
        "Sessions:       {} ({} rebalances, {} with trades)",
        summary.sessions, summary.rebalances, summary.trading_sessions
    );
    println!();
    println!("--- Performance ---");
    println!("Initial Value:  {:.2}", summary.initial_value);
    println!("Final Value:    {:.2}", summary.final_value);
    println!("Total Return:   {:.2}%", summary.total_return * 100.0);
    if let Some(bench) = summary.benchmark_return {
        println!("Benchmark:      {:.2}%", bench * 100.0);
    }
    println!();
    println!("--- Trading ---");
    println!("Traded Value:   {:.2}", summary.total_trading_value);
    println!("Total Cost:     {:.2}", summary.total_cost);
    println!("Advisories:     {}", summary.advisories);
    println!("Delistings:     {}", summary.delistings);
}

fn print_sweep(entries: &[SweepEntry], top: usize) {
    println!();
    println!(
        "{:<4} {:>10} {:>10} {:>8} {:>16} {:>10} {:>14}",
        "#", "buy_cost", "sell_cost", "ratio", "final_value", "return", "cost"
    );
    println!("{}", "-".repeat(78));
    for (rank, e) in entries.iter().take(top).enumerate() {
        println!(
            "{:<4} {:>10.5} {:>10.5} {:>8.3} {:>16.2} {:>9.2}% {:>14.2}",
            rank + 1,
            e.buy_cost,
            e.sell_cost,
            e.trade_ratio,
            e.final_value,
            e.total_return * 100.0,
            e.total_cost
        );
    }
}
