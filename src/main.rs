mod config;
mod coverage;
mod diff;
mod jacoco;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use config::{Config, DiffBackend};

const CONFIG_FILE: &str = "covdiff.toml";

#[derive(Parser)]
#[command(name = "covdiff")]
#[command(about = "Coverage gate for the files changed between two branches")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: covdiff.toml, optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check coverage of the changed files against the threshold
    Check {
        /// Base branch ref (default: $GITHUB_BASE_REF)
        #[arg(long)]
        base: Option<String>,

        /// Head branch ref (default: $GITHUB_HEAD_REF)
        #[arg(long)]
        head: Option<String>,

        /// Minimum acceptable average coverage, in percent
        #[arg(long)]
        threshold: Option<f64>,

        /// Path to the JaCoCo XML report
        #[arg(long)]
        report: Option<PathBuf>,

        /// Diff in-process with libgit2 instead of spawning git
        #[arg(long)]
        libgit2: bool,

        /// Print the summary as JSON instead of the workflow output lines
        #[arg(long)]
        json: bool,

        /// Report low coverage without failing the process
        #[arg(long)]
        warn_only: bool,
    },

    /// Print the files changed between the two branches
    Files {
        /// Base branch ref (default: $GITHUB_BASE_REF)
        #[arg(long)]
        base: Option<String>,

        /// Head branch ref (default: $GITHUB_HEAD_REF)
        #[arg(long)]
        head: Option<String>,

        /// Diff in-process with libgit2 instead of spawning git
        #[arg(long)]
        libgit2: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Could not load {}", path.display()))?,
        None => {
            let default = PathBuf::from(CONFIG_FILE);
            if default.exists() {
                Config::load(&default)?
            } else {
                Config::default()
            }
        }
    };

    config.apply_env();

    match cli.command {
        Commands::Check {
            base,
            head,
            threshold,
            report,
            libgit2,
            json,
            warn_only,
        } => {
            if let Some(base) = base {
                config.base = Some(base);
            }
            if let Some(head) = head {
                config.head = Some(head);
            }
            if let Some(threshold) = threshold {
                config.threshold = threshold;
            }
            if let Some(report) = report {
                config.report = Some(report);
            }
            if libgit2 {
                config.diff_backend = DiffBackend::Libgit2;
            }
            if warn_only {
                config.fail_below_threshold = false;
            }
            config.validate()?;

            cmd_check(&config, json)
        }
        Commands::Files { base, head, libgit2 } => {
            if let Some(base) = base {
                config.base = Some(base);
            }
            if let Some(head) = head {
                config.head = Some(head);
            }
            if libgit2 {
                config.diff_backend = DiffBackend::Libgit2;
            }

            cmd_files(&config)
        }
    }
}

fn cmd_check(config: &Config, json: bool) -> Result<()> {
    let (base, head) = config.refs()?;

    let work_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let source = diff::diff_source(config.diff_backend, &work_dir);
    let changed_files = source.changed_files(&base, &head)?;

    let jacoco_report = jacoco::parse_report(&config.report_path())?;
    let summary = coverage::evaluate(&jacoco_report, &changed_files, config);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        report::print_changed_files(&changed_files, &base, &head);
        report::print_summary(&summary);
        report::print_output_lines(&summary, config, &head);
    }

    if config.fail_below_threshold && summary.below_threshold() {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_files(config: &Config) -> Result<()> {
    let (base, head) = config.refs()?;

    let work_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let source = diff::diff_source(config.diff_backend, &work_dir);
    let changed_files = source.changed_files(&base, &head)?;

    report::print_changed_files(&changed_files, &base, &head);

    Ok(())
}
