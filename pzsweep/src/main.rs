//! pzsweep CLI
//!
//! Sweep a transfer function over its pole/zero/gain corner values and plot
//! the Bode and step responses.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in job
//! pzsweep
//!
//! # Run a job file with pole/zero markers, figures into ./out
//! pzsweep run jobs/bandpass.yaml --annotate --output out
//!
//! # Run a built-in sample and save a JSON report
//! pzsweep run --example third_order_complex --report report.json -d
//!
//! # Validate a job without evaluating it
//! pzsweep check jobs/bandpass.yaml
//!
//! # Write a starter job file
//! pzsweep init my_job.yaml
//! ```
//!
//! Set `RUST_LOG=pzsweep=debug` for per-combination diagnostics.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use pzsweep::{
    config::JobConfig,
    expr::fmt_value,
    parse::parse_expr,
    runner::{self, RunnerConfig, SweepRunner},
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pzsweep")]
#[command(about = "Bode and step-response sweeps over pole/zero corner values")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output JSON report path
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    /// Show detailed per-trace table
    #[arg(long, short = 'd', global = true)]
    detailed: bool,

    /// Skip writing SVG figures
    #[arg(long, global = true)]
    no_plots: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sweep job
    Run {
        /// Path to job YAML (defaults to the built-in job)
        job: Option<PathBuf>,

        /// Run a built-in sample job by name instead
        #[arg(short, long, conflicts_with = "job")]
        example: Option<String>,

        /// Mark pole/zero locations on the magnitude plot
        #[arg(short, long)]
        annotate: bool,

        /// Directory for SVG figures
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a job's expression and limits without evaluating it
    Check {
        /// Path to job YAML
        job: PathBuf,
    },

    /// List built-in sample jobs
    List,

    /// Write a job file to start from
    Init {
        /// Destination path
        #[arg(default_value = "pzsweep.yaml")]
        path: PathBuf,

        /// Built-in sample to write
        #[arg(short, long)]
        example: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Run {
            job,
            example,
            annotate,
            output,
        }) => {
            let job = load_job(job.as_deref(), example.as_deref())?;
            run_sweep(&cli, &job, *annotate, output.clone())?;
        }
        Some(Commands::Check { job }) => {
            check_job(job)?;
        }
        Some(Commands::List) => {
            list_jobs();
        }
        Some(Commands::Init { path, example }) => {
            init_job(path, example.as_deref())?;
        }
        None => {
            run_sweep(&cli, &JobConfig::default_job(), false, None)?;
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the default filter.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pzsweep=warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_job(path: Option<&Path>, example: Option<&str>) -> anyhow::Result<JobConfig> {
    match (path, example) {
        (Some(path), _) => {
            JobConfig::load(path).with_context(|| format!("loading {}", path.display()))
        }
        (None, Some(name)) => JobConfig::builtin_named(name)
            .ok_or_else(|| anyhow::anyhow!("Sample job '{}' not found (see `pzsweep list`)", name)),
        (None, None) => Ok(JobConfig::default_job()),
    }
}

fn print_limits(job: &JobConfig) {
    for (name, spec) in &job.limits {
        let text = serde_yaml::to_string(spec).unwrap_or_default();
        println!("    {} = {}", name.bold(), text.trim().replace('\n', " "));
    }
}

fn run_sweep(
    cli: &Cli,
    job: &JobConfig,
    annotate: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("{} Processing job: {}", "▶".blue(), job.name.bold());
    match parse_expr(&job.expression) {
        Ok(expr) => println!("  H({}) = {}", job.variable, expr),
        Err(_) => println!("  H({}) = {}", job.variable, job.expression),
    }
    print_limits(job);

    let runner = SweepRunner::new(RunnerConfig {
        output_dir: output,
        annotate: annotate.then_some(true),
        render: !cli.no_plots,
    });

    println!("{} Evaluating frequency and step responses...", "▶".blue());
    let report = match runner.run(job) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    report.print_summary();

    if cli.detailed {
        report.print_detailed();
    }

    if let Some(ref path) = cli.report {
        report.save_json(path)?;
        println!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn check_job(path: &Path) -> anyhow::Result<()> {
    println!("{} Checking: {}", "▶".blue(), path.display());

    let job = match JobConfig::load(path) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    match runner::prepare(&job) {
        Ok(prepared) => {
            println!("{} {} is valid", "✓".green(), job.name.bold());
            println!("  H({}) = {}", prepared.bound.var, prepared.bound.expr);
            for p in &prepared.bound.limits.params {
                let values: Vec<String> = p.values.iter().map(|v| fmt_value(*v)).collect();
                println!("    {} = ({})", p.name.bold(), values.join(", "));
            }
            println!("  {} combinations", prepared.combinations());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn list_jobs() {
    println!("{}", "Built-in Sample Jobs".bold());
    println!("{}", "─".repeat(50));

    for job in JobConfig::builtin() {
        let description = job.description.clone().unwrap_or_default();
        println!("\n{} - {}", job.name.bold().blue(), description.dimmed());
        println!("  H({}) = {}", job.variable, job.expression);
        print_limits(&job);
    }
}

fn init_job(path: &Path, example: Option<&str>) -> anyhow::Result<()> {
    let job = load_job(None, example)?;
    job.save(path)?;

    println!("{} Created job file at: {}", "✓".green(), path.display());
    println!("\nEdit the expression and limits, then run `pzsweep run {}`.", path.display());
    Ok(())
}
