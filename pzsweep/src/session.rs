//! Per-run state for one bound transfer function.
//!
//! Each domain moves through `Unprocessed → Processed → Plotted`:
//!
//! ```text
//! process_bode ──► plot_bode
//!      │
//!      └──► process_time_domain ──► plot_time_domain
//! ```
//!
//! The sweep is enumerated by [`Session::process_bode`] and reused by the time
//! domain, so trace `n` refers to the same combination in every figure.

use crate::bind::BoundExpr;
use crate::bode::{self, BodeResult};
use crate::config::Settings;
use crate::expr::EvalError;
use crate::laplace::{StepTemplate, TransformError};
use crate::plot::{self, PlotError};
use crate::step::{self, TimeDomainResult};
use crate::sweep::Sweep;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unprocessed,
    Processed,
    Plotted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Frequency,
    Time,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Frequency => write!(f, "Bode"),
            Domain::Time => write!(f, "time-domain"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SequenceError {
    #[error("{0} response not processed, process it before plotting")]
    NotProcessed(Domain),
    #[error("no sweep available, process the Bode response first")]
    SweepMissing,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("Evaluation failed: {0}")]
    Eval(#[from] EvalError),
    #[error("Time domain unavailable: {0}")]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Plot(#[from] PlotError),
}

pub struct Session {
    bound: BoundExpr,
    settings: Settings,
    sweep: Option<Sweep>,
    bode: Option<BodeResult>,
    bode_phase: Phase,
    time: Option<TimeDomainResult>,
    time_phase: Phase,
}

impl Session {
    pub fn new(bound: BoundExpr, settings: Settings) -> Self {
        Self {
            bound,
            settings,
            sweep: None,
            bode: None,
            bode_phase: Phase::Unprocessed,
            time: None,
            time_phase: Phase::Unprocessed,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sweep(&self) -> Option<&Sweep> {
        self.sweep.as_ref()
    }

    pub fn bode(&self) -> Option<&BodeResult> {
        self.bode.as_ref()
    }

    pub fn time_domain(&self) -> Option<&TimeDomainResult> {
        self.time.as_ref()
    }

    pub fn phase(&self, domain: Domain) -> Phase {
        match domain {
            Domain::Frequency => self.bode_phase,
            Domain::Time => self.time_phase,
        }
    }

    /// Enumerate the sweep and sample every combination's frequency response.
    pub fn process_bode(&mut self) -> Result<&BodeResult, SessionError> {
        let sweep = Sweep::enumerate(&self.bound);
        let result = bode::evaluate(&sweep, &self.settings)?;
        self.sweep = Some(sweep);
        self.time = None;
        self.time_phase = Phase::Unprocessed;
        self.bode_phase = Phase::Processed;
        Ok(self.bode.insert(result))
    }

    pub fn plot_bode(&mut self, dir: &Path) -> Result<Vec<PathBuf>, SessionError> {
        let result = self
            .bode
            .as_ref()
            .ok_or(SequenceError::NotProcessed(Domain::Frequency))?;
        let paths = plot::render_bode(result, dir)?;
        self.bode_phase = Phase::Plotted;
        Ok(paths)
    }

    /// Derive the step template once and sample it for every combination.
    pub fn process_time_domain(&mut self) -> Result<&TimeDomainResult, SessionError> {
        let sweep = self.sweep.as_ref().ok_or(SequenceError::SweepMissing)?;
        let template =
            StepTemplate::derive(&sweep.expr, &sweep.var, self.settings.transform_timeout())?;
        let result = step::evaluate(sweep, &template, &self.settings)?;
        self.time_phase = Phase::Processed;
        Ok(self.time.insert(result))
    }

    pub fn plot_time_domain(&mut self, dir: &Path) -> Result<PathBuf, SessionError> {
        let result = self
            .time
            .as_ref()
            .ok_or(SequenceError::NotProcessed(Domain::Time))?;
        let path = plot::render_step(result, dir)?;
        self.time_phase = Phase::Plotted;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
