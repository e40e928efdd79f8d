//! Job execution and orchestration.
//!
//! [`SweepRunner`] takes a [`JobConfig`] through the whole pipeline:
//!
//! 1. parse the expression, normalize the limits and bind them,
//! 2. process and plot the Bode response,
//! 3. derive the step template, process and plot the time domain,
//! 4. collect everything into a [`SweepReport`].
//!
//! Validation and binding errors abort the job. A failed inverse transform
//! only skips the time domain and is recorded as a warning.
//!
//! ```rust,ignore
//! use pzsweep::{config::JobConfig, runner::{RunnerConfig, SweepRunner}};
//!
//! let runner = SweepRunner::new(RunnerConfig::default());
//! let report = runner.run(&JobConfig::default_job()).unwrap();
//! report.print_summary();
//! ```

use crate::bind::{bind, BindError, BoundExpr};
use crate::config::{ConfigError, JobConfig, Settings};
use crate::limits::{normalize, LimitError};
use crate::parse::{parse_expr, ParseError};
use crate::report::SweepReport;
use crate::session::{SequenceError, Session, SessionError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Invalid expression: {0}")]
    ParseError(#[from] ParseError),
    #[error("Invalid limits: {0}")]
    LimitError(#[from] LimitError),
    #[error("Binding failed: {0}")]
    BindError(#[from] BindError),
    #[error(transparent)]
    SessionError(#[from] SessionError),
    #[error(transparent)]
    ConfigError(#[from] ConfigError),
}

/// Runner configuration. `None` fields defer to the job's own settings.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Overrides `settings.output_dir`.
    pub output_dir: Option<PathBuf>,
    /// Overrides `settings.annotate`.
    pub annotate: Option<bool>,
    /// Write SVG figures.
    pub render: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            annotate: None,
            render: true,
        }
    }
}

/// A job whose expression and limits have been validated.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub name: String,
    pub bound: BoundExpr,
    pub settings: Settings,
}

impl PreparedJob {
    pub fn combinations(&self) -> usize {
        self.bound.limits.combinations()
    }
}

/// Parse, normalize and bind a job without evaluating anything.
pub fn prepare(job: &JobConfig) -> Result<PreparedJob, RunnerError> {
    job.settings.validate()?;
    let expr = parse_expr(&job.expression)?;
    let limits = normalize(&job.limits)?;
    let bound = bind(&expr, &job.variable, &limits)?;
    tracing::info!(
        job = %job.name,
        params = limits.len(),
        combinations = limits.combinations(),
        "prepared job"
    );
    Ok(PreparedJob {
        name: job.name.clone(),
        bound,
        settings: job.settings.clone(),
    })
}

/// Main sweep runner.
pub struct SweepRunner {
    config: RunnerConfig,
}

impl SweepRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    fn effective_settings(&self, settings: &Settings) -> Settings {
        let mut settings = settings.clone();
        if let Some(ref dir) = self.config.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(annotate) = self.config.annotate {
            settings.annotate = annotate;
        }
        settings
    }

    /// Run one job end to end.
    pub fn run(&self, job: &JobConfig) -> Result<SweepReport, RunnerError> {
        let prepared = prepare(job)?;
        let settings = self.effective_settings(&prepared.settings);
        let dir = settings.output_dir.clone();
        let mut session = Session::new(prepared.bound, settings);
        let mut figures = Vec::new();
        let mut warnings = Vec::new();

        session.process_bode()?;
        if self.config.render {
            figures.extend(session.plot_bode(&dir)?);
        }

        match session.process_time_domain().map(|_| ()) {
            Ok(()) => {
                if self.config.render {
                    figures.push(session.plot_time_domain(&dir)?);
                }
            }
            Err(SessionError::Transform(e)) => {
                tracing::warn!(job = %prepared.name, error = %e, "time domain skipped");
                warnings.push(format!("time domain skipped: {}", e));
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(time) = session.time_domain() {
            for trace in time.unsettled() {
                warnings.push(format!(
                    "[{}] {} does not settle (tail ratio {:.3})",
                    trace.index, trace.label, trace.settling.ratio
                ));
            }
        }

        let (Some(sweep), Some(bode)) = (session.sweep(), session.bode()) else {
            return Err(SessionError::from(SequenceError::SweepMissing).into());
        };
        Ok(SweepReport::new(
            &prepared.name,
            sweep,
            bode,
            session.time_domain(),
            warnings,
            figures,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
