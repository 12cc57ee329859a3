//! Join and aggregation
//!
//! Matches report classes against the changed-file set, computes each
//! file's instruction coverage and the arithmetic mean across files. Every
//! scored file weighs equally in the mean regardless of its instruction
//! count.

use serde::Serialize;

use crate::config::Config;
use crate::jacoco::{Class, CounterKind, Report};

/// Coverage computed for one matched class
#[derive(Debug, Clone, Serialize)]
pub struct FileCoverage {
    /// Repository-relative path reconstructed from the report
    pub path: String,
    /// Source file name as it appears in the report
    pub source_file: String,
    /// Instruction coverage in percent
    pub percent: f64,
    /// Whether this file alone meets the threshold
    pub meets_threshold: bool,
}

/// Result of one coverage check run
#[derive(Debug, Default, Serialize)]
pub struct CoverageSummary {
    pub files: Vec<FileCoverage>,
    /// Matched files with no usable instruction counter, excluded from
    /// the mean
    pub unscored: Vec<String>,
    pub threshold: f64,
    /// Mean of the per-file percentages; None when no file matched
    pub average: Option<f64>,
}

impl CoverageSummary {
    pub fn below_threshold(&self) -> bool {
        matches!(self.average, Some(avg) if avg < self.threshold)
    }
}

/// Score every class whose reconstructed path is in the changed-file set
pub fn evaluate(report: &Report, changed_files: &[String], config: &Config) -> CoverageSummary {
    let mut summary = CoverageSummary {
        threshold: config.threshold,
        ..Default::default()
    };

    for package in &report.packages {
        for class in &package.classes {
            if class.source_file_name.is_empty() {
                continue;
            }

            let path = source_path(
                &config.module_path,
                &config.source_root,
                &package.name,
                &class.source_file_name,
            );

            if !changed_files.iter().any(|f| f == &path) {
                continue;
            }

            match instruction_coverage(class) {
                Some(percent) => summary.files.push(FileCoverage {
                    path,
                    source_file: class.source_file_name.clone(),
                    percent,
                    meets_threshold: percent >= config.threshold,
                }),
                None => summary.unscored.push(path),
            }
        }
    }

    if !summary.files.is_empty() {
        let total: f64 = summary.files.iter().map(|f| f.percent).sum();
        summary.average = Some(total / summary.files.len() as f64);
    }

    summary
}

/// Reconstruct the repository-relative path of a class source file
pub fn source_path(module_path: &str, source_root: &str, package: &str, source_file: &str) -> String {
    format!(
        "{}{}{}/{}",
        module_path,
        source_root,
        package.replace('.', "/"),
        source_file
    )
}

/// Instruction coverage of a class in percent, or None when its counters
/// carry no instructions at all
pub fn instruction_coverage(class: &Class) -> Option<f64> {
    let mut missed = 0u64;
    let mut covered = 0u64;

    for counter in &class.counters {
        if counter.kind == CounterKind::Instruction {
            missed += counter.missed;
            covered += counter.covered;
        }
    }

    if missed + covered > 0 {
        Some(covered as f64 / (missed + covered) as f64 * 100.0)
    } else {
        None
    }
}
