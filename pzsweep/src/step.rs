//! Unit-step response of every combination in a sweep, with settling
//! classification.

use crate::config::Settings;
use crate::laplace::{StepTemplate, TransformError};
use crate::sweep::Sweep;
use serde::Serialize;

/// Linearly spaced sample times starting at zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeAxis {
    pub t: Vec<f64>,
}

impl TimeAxis {
    pub fn linspace(end: f64, points: usize) -> Self {
        let t = match points {
            0 => Vec::new(),
            1 => vec![0.0],
            n => (0..n).map(|i| end * i as f64 / (n - 1) as f64).collect(),
        };
        TimeAxis { t }
    }

    /// `[0, time_span_factor · max_magnitude]`.
    pub fn covering(max_magnitude: f64, settings: &Settings) -> Self {
        Self::linspace(settings.time_span_factor * max_magnitude, settings.time_points)
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

/// Outcome of the tail-spread test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Settling {
    pub settled: bool,
    /// `(max - min) / |min|` over the tail.
    pub ratio: f64,
}

/// Classify a window of trailing samples.
///
/// The ratio is `(max - min) / |min|`, not the signed `(max - min) / min`:
/// a tail below zero is judged like its mirror image instead of always
/// passing. A zero minimum only counts as settled when the window is flat.
pub fn classify_tail(tail: &[f64], threshold: f64) -> Settling {
    if tail.is_empty() || tail.iter().any(|v| !v.is_finite()) {
        return Settling {
            settled: false,
            ratio: f64::NAN,
        };
    }
    let max = tail.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = tail.iter().copied().fold(f64::INFINITY, f64::min);
    let spread = max - min;
    if min == 0.0 {
        let ratio = if spread == 0.0 { 0.0 } else { f64::INFINITY };
        return Settling {
            settled: spread == 0.0,
            ratio,
        };
    }
    let ratio = spread / min.abs();
    Settling {
        settled: ratio < threshold,
        ratio,
    }
}

/// Classify the last `tail_fraction` of `samples`.
pub fn settling(samples: &[f64], tail_fraction: f64, threshold: f64) -> Settling {
    let n = ((samples.len() as f64 * tail_fraction).ceil() as usize).clamp(1, samples.len().max(1));
    let start = samples.len().saturating_sub(n);
    classify_tail(&samples[start..], threshold)
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeTrace {
    pub index: usize,
    /// Literal values plus the settling outcome.
    pub label: String,
    pub samples: Vec<f64>,
    pub settling: Settling,
    /// Closed-form response.
    pub expression: String,
    pub impulsive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeDomainResult {
    /// `H(s)/s` before substitution.
    pub template: String,
    pub axis: TimeAxis,
    pub traces: Vec<TimeTrace>,
}

impl TimeDomainResult {
    pub fn unsettled(&self) -> impl Iterator<Item = &TimeTrace> {
        self.traces.iter().filter(|t| !t.settling.settled)
    }
}

/// Step response of every combination, reusing the sweep's enumeration.
pub fn evaluate(
    sweep: &Sweep,
    template: &StepTemplate,
    settings: &Settings,
) -> Result<TimeDomainResult, TransformError> {
    let axis = TimeAxis::covering(sweep.max_magnitude, settings);
    tracing::info!(
        traces = sweep.len(),
        points = axis.len(),
        end = axis.t.last().copied().unwrap_or(0.0),
        "evaluating step response"
    );

    let mut traces = Vec::with_capacity(sweep.len());
    for c in &sweep.combinations {
        let response = template.instantiate(&c.bindings())?;
        let samples = response.sample(&axis.t);
        let settling = settling(&samples, settings.settling_tail, settings.settling_threshold);
        tracing::debug!(
            index = c.index,
            settled = settling.settled,
            ratio = settling.ratio,
            "step response"
        );
        traces.push(TimeTrace {
            index: c.index,
            label: format!("{}, settled={}", c.value_label(), settling.settled),
            samples,
            settling,
            expression: response.to_string(),
            impulsive: response.impulsive,
        });
    }

    Ok(TimeDomainResult {
        template: template.to_string(),
        axis,
        traces,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
