//! Report emission
//!
//! Prints the human-readable run summary and the `::set-output` lines the
//! CI workflow consumes. Workflow output values must stay on one line, so
//! table rows carry a literal `::newline::` separator the workflow expands
//! when it posts the PR comment.

use chrono::Utc;
use colored::Colorize;

use crate::config::Config;
use crate::coverage::{CoverageSummary, FileCoverage};

pub fn print_changed_files(changed_files: &[String], base: &str, head: &str) {
    println!(
        "\n{} {} file(s) changed on {} since {}",
        "→".blue(),
        changed_files.len(),
        head.cyan(),
        base.cyan()
    );

    for file in changed_files {
        println!("  {} {}", "•".dimmed(), file);
    }
}

pub fn print_summary(summary: &CoverageSummary) {
    println!("\n{}", "─".repeat(50).dimmed());
    println!(
        "  {}  {}",
        "Coverage for changed files".bold(),
        Utc::now()
            .format("%Y-%m-%d %H:%M UTC")
            .to_string()
            .dimmed()
    );
    println!("{}", "─".repeat(50).dimmed());

    for file in &summary.files {
        let status = if file.meets_threshold {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("  {} {:>7.2}%  {}", status, file.percent, file.path);
    }

    for path in &summary.unscored {
        println!(
            "  {} No instruction coverage found for {}",
            "Warning:".yellow(),
            path
        );
    }

    match summary.average {
        Some(average) => {
            println!(
                "\nAverage coverage for changed files: {}",
                format!("{:.2}%", average).bold()
            );

            if average < summary.threshold {
                println!(
                    "{} Coverage for changed files ({:.2}%) is below the threshold of {}%",
                    "ERROR:".red().bold(),
                    average,
                    summary.threshold
                );
            }
        }
        None => {
            println!("\n{} No changed files found.", "!".yellow());
        }
    }
}

pub fn print_output_lines(summary: &CoverageSummary, config: &Config, head: &str) {
    for line in output_lines(summary, config, head) {
        println!("{}", line);
    }
}

/// The three workflow output lines: overall average, matched-file count
/// and the per-file markdown table
pub fn output_lines(summary: &CoverageSummary, config: &Config, head: &str) -> Vec<String> {
    let overall = match summary.average {
        Some(average) => format!("{:.2}%", average),
        None => "n/a".to_string(),
    };

    vec![
        format!("::set-output name=overall::{}", overall),
        format!("::set-output name=changed-files::{}", summary.files.len()),
        format!(
            "::set-output name=file-coverage::{}",
            markdown_table(summary, config, head)
        ),
    ]
}

/// Single-line markdown table body, one row per scored file
pub fn markdown_table(summary: &CoverageSummary, config: &Config, head: &str) -> String {
    summary
        .files
        .iter()
        .map(|file| table_row(file, config, head))
        .collect()
}

fn table_row(file: &FileCoverage, config: &Config, head: &str) -> String {
    let glyph = if file.meets_threshold { "✅" } else { "❌" };

    // Without a repository slug there is nothing to link to
    let name = match &config.repository {
        Some(repo) => format!(
            "[{}](https://github.com/{}/blob/{}/{})",
            file.source_file, repo, head, file.path
        ),
        None => file.path.clone(),
    };

    format!("| {} | {:.2}% | {} |::newline::", name, file.percent, glyph)
}
