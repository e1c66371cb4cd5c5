//! Command-line entry point for running simulation sweeps.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use batchsim_batch::{
    ParallelLauncher, ScenarioConfig, StepErrorPolicy, expand_scenario,
};
use batchsim_core::SchedulerRegistry;
use batchsim_report::{Report, ReportOptions};

/// Batchsim - discrete-event HPC batch scheduling simulation
#[derive(Parser)]
#[command(name = "batchsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every instance of a scenario file
    Run {
        /// Scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Directory for per-instance report files (none if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Maximum simulations running at once
        #[arg(short, long)]
        parallel: Option<usize>,

        /// Stream progress to a TCP collector (host:port)
        #[arg(long)]
        progress: Option<String>,

        /// Abort an instance on the first step error instead of continuing
        #[arg(long)]
        fail_fast: bool,

        /// Skip per-job report sections, keep aggregate metrics only
        #[arg(long)]
        summary_only: bool,
    },

    /// List available scheduling policies
    Schedulers,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            out,
            parallel,
            progress,
            fail_fast,
            summary_only,
        } => run_sweep(
            &scenario,
            out.as_deref(),
            parallel,
            progress,
            fail_fast,
            summary_only,
        ),
        Commands::Schedulers => {
            list_schedulers();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

fn run_sweep(
    scenario_path: &std::path::Path,
    out: Option<&std::path::Path>,
    parallel: Option<usize>,
    progress: Option<String>,
    fail_fast: bool,
    summary_only: bool,
) -> anyhow::Result<()> {
    let scenario = ScenarioConfig::from_file(scenario_path)?;
    let instances = expand_scenario(&scenario)?;
    println!(
        "{} scenario {} ({} instances)",
        style("Running").green().bold(),
        style(&scenario.name).cyan(),
        instances.len()
    );

    let mut launcher = ParallelLauncher::new();
    if let Some(parallel) = parallel {
        launcher = launcher.with_max_parallel(parallel);
    }
    if fail_fast {
        launcher = launcher.with_policy(StepErrorPolicy::Abort);
    }
    if let Some(addr) = progress {
        launcher = launcher.with_progress_addr(addr);
    }

    let registry = SchedulerRegistry::with_builtins();
    let outcomes = launcher.launch(&registry, instances)?;

    let options = if summary_only {
        ReportOptions::summary_only()
    } else {
        ReportOptions::default()
    };

    if let Some(out) = out {
        fs::create_dir_all(out)?;
    }
    for (completion, result) in &outcomes {
        let report = Report::build(result, options);
        println!(
            "  sim {:>3}  {:<14} jobs {:>5}  makespan {:>12.2}  util {:>5.1}%  wait {:>10.2}  ({:.2}s)",
            completion.sim_id,
            report.scheduler_name,
            report.num_jobs,
            report.makespan,
            report.utilization * 100.0,
            report.mean_waiting_time,
            completion.real_time,
        );
        if let Some(out) = out {
            let path = out.join(format!(
                "sim{:03}_{}.json",
                completion.sim_id, report.scheduler_name
            ));
            report.write_json(&path)?;
        }
    }

    println!("{} {} instance(s)", style("Finished").green().bold(), outcomes.len());
    Ok(())
}

fn list_schedulers() {
    let registry = SchedulerRegistry::with_builtins();
    for name in registry.names() {
        match registry.resolve(name) {
            Ok(scheduler) => {
                println!("{:<16} {}", style(name).cyan(), scheduler.description());
            }
            Err(_) => println!("{name}"),
        }
    }
}
