//! Sweep report generation and display.
//!
//! # Report Structure
//!
//! - [`SweepReport`] - Top-level report for one job
//!   - [`TraceSummary`] - One entry per parameter combination, in sweep order
//!   - [`ReportSummary`] - Counts of traces and settling outcomes
//!
//! # Example
//!
//! ```rust,ignore
//! use pzsweep::report::SweepReport;
//!
//! let report = SweepReport::new(&job.name, &sweep, &bode, time.as_ref(), warnings, figures);
//!
//! // Print to terminal
//! report.print_summary();
//!
//! // Print per-trace table
//! report.print_detailed();
//!
//! // Save as JSON
//! report.save_json("report.json").unwrap();
//! ```

use crate::bode::BodeResult;
use crate::step::TimeDomainResult;
use crate::sweep::Sweep;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full report of one sweep job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// Timestamp of the run.
    pub timestamp: String,
    pub job: String,
    pub expression: String,
    pub variable: String,
    /// `H(s)/s` as rationalized for the inverse transform, if it succeeded.
    pub step_template: Option<String>,
    /// Swept angular frequency range (rad/s).
    pub frequency_range: (f64, f64),
    /// End of the time axis, if the time domain was evaluated.
    pub time_span: Option<f64>,
    pub traces: Vec<TraceSummary>,
    pub warnings: Vec<String>,
    pub figures: Vec<PathBuf>,
    pub summary: ReportSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub combinations: usize,
    pub settled: usize,
    pub not_settled: usize,
    pub time_domain: bool,
}

/// One combination's key figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSummary {
    pub index: usize,
    pub legend: String,
    pub values: String,
    /// Magnitude at the lowest sampled frequency.
    pub low_frequency_db: f64,
    pub peak_db: f64,
    pub settled: Option<bool>,
    pub tail_ratio: Option<f64>,
    pub step_expression: Option<String>,
}

impl SweepReport {
    pub fn new(
        job: &str,
        sweep: &Sweep,
        bode: &BodeResult,
        time: Option<&TimeDomainResult>,
        warnings: Vec<String>,
        figures: Vec<PathBuf>,
    ) -> Self {
        let traces: Vec<TraceSummary> = sweep
            .combinations
            .iter()
            .zip(&bode.traces)
            .map(|(c, b)| {
                let step = time.and_then(|t| t.traces.iter().find(|tt| tt.index == c.index));
                TraceSummary {
                    index: c.index,
                    legend: c.legend_label(),
                    values: c.value_label(),
                    low_frequency_db: b.low_frequency_db(),
                    peak_db: b.peak_db(),
                    settled: step.map(|s| s.settling.settled),
                    tail_ratio: step.map(|s| s.settling.ratio),
                    step_expression: step.map(|s| s.expression.clone()),
                }
            })
            .collect();

        let settled = traces.iter().filter(|t| t.settled == Some(true)).count();
        let not_settled = traces.iter().filter(|t| t.settled == Some(false)).count();
        let omega = &bode.axis.omega;

        Self {
            timestamp: chrono_lite_timestamp(),
            job: job.to_string(),
            expression: sweep.expr.to_string(),
            variable: sweep.var.clone(),
            step_template: time.map(|t| t.template.clone()),
            frequency_range: (
                omega.first().copied().unwrap_or(0.0),
                omega.last().copied().unwrap_or(0.0),
            ),
            time_span: time.and_then(|t| t.axis.t.last().copied()),
            summary: ReportSummary {
                combinations: traces.len(),
                settled,
                not_settled,
                time_domain: time.is_some(),
            },
            traces,
            warnings,
            figures,
        }
    }

    pub fn unsettled(&self) -> impl Iterator<Item = &TraceSummary> {
        self.traces.iter().filter(|t| t.settled == Some(false))
    }

    /// Save report to JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// Print human-readable summary to terminal.
    pub fn print_summary(&self) {
        use colored::Colorize;

        println!("\n{}", "═".repeat(60).bold());
        println!("{}", " PZSWEEP REPORT ".bold().on_blue());
        println!("{}", "═".repeat(60).bold());

        println!("Job:        {}", self.job.bold());
        println!("Timestamp:  {}", self.timestamp.dimmed());
        println!("H({}) =     {}", self.variable, self.expression);
        if let Some(ref template) = self.step_template {
            println!("H({0})/{0} =   {1}", self.variable, template.dimmed());
        }
        println!(
            "ω range:    {:.1e} .. {:.1e} rad/s",
            self.frequency_range.0, self.frequency_range.1
        );
        if let Some(span) = self.time_span {
            println!("t range:    0 .. {:.3e} s", span);
        }
        println!();

        for trace in &self.traces {
            let status = match trace.settled {
                Some(true) => "✓".green(),
                Some(false) => "⚠".yellow(),
                None => "·".normal(),
            };
            let settling = match (trace.settled, trace.tail_ratio) {
                (Some(true), Some(r)) => format!(" | settled (tail {:.3})", r),
                (Some(false), Some(r)) => format!(" | not settled (tail {:.3})", r),
                _ => String::new(),
            };
            println!(
                "  {} [{}] {} | {} | LF: {:.1}dB | Peak: {:.1}dB{}",
                status,
                trace.index,
                trace.legend.bold(),
                trace.values.dimmed(),
                trace.low_frequency_db,
                trace.peak_db,
                settling
            );
        }

        for warning in &self.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
        if !self.figures.is_empty() {
            println!();
            for figure in &self.figures {
                println!("  {} {}", "▶".blue(), figure.display());
            }
        }

        println!("{}", "─".repeat(60));
        let overall = if !self.summary.time_domain {
            "TIME DOMAIN SKIPPED".yellow().bold()
        } else if self.summary.not_settled == 0 {
            "ALL TRACES SETTLED".green().bold()
        } else {
            format!("{} TRACES DID NOT SETTLE", self.summary.not_settled)
                .yellow()
                .bold()
        };
        println!(
            "{} | {} combinations, {} settled",
            overall, self.summary.combinations, self.summary.settled
        );
        println!("{}\n", "═".repeat(60).bold());
    }

    /// Print per-trace table.
    pub fn print_detailed(&self) {
        use tabled::{Table, Tabled};

        #[derive(Tabled)]
        struct TraceRow {
            #[tabled(rename = "#")]
            index: usize,
            legend: String,
            values: String,
            #[tabled(rename = "LF (dB)")]
            low_db: String,
            #[tabled(rename = "Peak (dB)")]
            peak_db: String,
            #[tabled(rename = "Tail ratio")]
            ratio: String,
            status: String,
        }

        let rows: Vec<TraceRow> = self
            .traces
            .iter()
            .map(|t| TraceRow {
                index: t.index,
                legend: t.legend.clone(),
                values: t.values.clone(),
                low_db: format!("{:.1}", t.low_frequency_db),
                peak_db: format!("{:.1}", t.peak_db),
                ratio: t
                    .tail_ratio
                    .map(|r| format!("{:.3}", r))
                    .unwrap_or_else(|| "-".to_string()),
                status: match t.settled {
                    Some(true) => "SETTLED".to_string(),
                    Some(false) => "NOT SETTLED".to_string(),
                    None => "-".to_string(),
                },
            })
            .collect();

        if !rows.is_empty() {
            let table = Table::new(rows);
            println!("\nTraces:\n{}", table);
        }
        if let Some(first) = self.traces.iter().find(|t| t.step_expression.is_some()) {
            if let Some(ref expr) = first.step_expression {
                println!("\ny(t) for [{}]: {}", first.index, expr);
            }
        }
    }
}

/// Get a simple timestamp without pulling in chrono.
fn chrono_lite_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", duration.as_secs())
}
