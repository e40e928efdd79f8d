//! Frequency response of every combination in a sweep.
//!
//! Each substituted transfer function is evaluated on the imaginary axis,
//! `s = jω`, over a shared log-spaced axis. Magnitude is reported in dB
//! (`20·log10|H(jω)|`) and phase in degrees within `(-180, 180]`.

use crate::config::Settings;
use crate::expr::{fmt_value, EvalError};
use crate::sweep::{Combination, Sweep};
use num_complex::Complex64;
use serde::Serialize;

/// Log-spaced angular frequencies, ascending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyAxis {
    pub omega: Vec<f64>,
}

impl FrequencyAxis {
    /// `points` samples from `10^lo_exp` to `10^hi_exp`.
    pub fn logspace(lo_exp: f64, hi_exp: f64, points: usize) -> Self {
        let omega = match points {
            0 => Vec::new(),
            1 => vec![10f64.powf(lo_exp)],
            n => {
                let step = (hi_exp - lo_exp) / (n - 1) as f64;
                (0..n).map(|i| 10f64.powf(lo_exp + step * i as f64)).collect()
            }
        };
        FrequencyAxis { omega }
    }

    /// Axis covering every swept value and its reciprocal, widened by the
    /// configured decade margin.
    ///
    /// Poles written as time constants put their corner at `1/value`, other
    /// parameters at `value`, so both ends are included.
    pub fn covering(min_magnitude: f64, max_magnitude: f64, settings: &Settings) -> Self {
        let lo = min_magnitude.min(1.0 / max_magnitude);
        let hi = max_magnitude.max(1.0 / min_magnitude);
        let lo_exp = lo.log10().floor() - settings.decade_margin;
        let hi_exp = hi.log10().ceil() + settings.decade_margin;
        Self::logspace(lo_exp, hi_exp, settings.frequency_points)
    }

    pub fn len(&self) -> usize {
        self.omega.len()
    }

    pub fn is_empty(&self) -> bool {
        self.omega.is_empty()
    }

    /// Index of the sample closest to `w` on a log scale.
    pub fn nearest_index(&self, w: f64) -> usize {
        let target = w.log10();
        self.omega
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (a.log10() - target).abs();
                let db = (b.log10() - target).abs();
                da.total_cmp(&db)
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// Pole/zero marker on a magnitude curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub text: String,
    /// Marker position (rad/s, dB).
    pub x: f64,
    pub y: f64,
    /// Label position.
    pub text_x: f64,
    pub text_y: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BodeTrace {
    pub index: usize,
    pub label: String,
    pub magnitude_db: Vec<f64>,
    pub phase_deg: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl BodeTrace {
    /// Magnitude at the lowest sampled frequency.
    pub fn low_frequency_db(&self) -> f64 {
        self.magnitude_db.first().copied().unwrap_or(f64::NAN)
    }

    pub fn peak_db(&self) -> f64 {
        self.magnitude_db
            .iter()
            .copied()
            .filter(|m| m.is_finite())
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BodeResult {
    pub axis: FrequencyAxis,
    pub traces: Vec<BodeTrace>,
}

/// Vertical offset of annotation text below its marker, in dB.
const ANNOTATION_DROP_DB: f64 = 20.0;
/// Horizontal shift per coinciding earlier annotation, in decades.
const ANNOTATION_SHIFT_DECADES: f64 = 0.5;

/// Corner frequency implied by a parameter: `1/|v|` for poles (`p*`), `|v|` otherwise.
pub fn corner_frequency(name: &str, value: Complex64) -> Option<f64> {
    let m = value.norm();
    let x = if name.starts_with('p') { 1.0 / m } else { m };
    (x.is_finite() && x > 0.0).then_some(x)
}

fn annotate(combination: &Combination, axis: &FrequencyAxis, magnitude_db: &[f64]) -> Vec<Annotation> {
    let mut out: Vec<Annotation> = Vec::new();
    for a in &combination.assignments {
        let Some(x) = corner_frequency(&a.name, a.value) else {
            continue;
        };
        let y = magnitude_db[axis.nearest_index(x)];
        let coincident = out
            .iter()
            .filter(|prev| (prev.x - x).abs() <= 1e-9 * x)
            .count();
        out.push(Annotation {
            text: format!("{} = {}", a.name, fmt_value(a.value)),
            x,
            y,
            text_x: x * 10f64.powf(ANNOTATION_SHIFT_DECADES * coincident as f64),
            text_y: y - ANNOTATION_DROP_DB,
        });
    }
    out
}

/// Sample one combination's frequency response.
pub fn evaluate_combination(
    combination: &Combination,
    var: &str,
    axis: &FrequencyAxis,
    with_annotations: bool,
) -> Result<BodeTrace, EvalError> {
    let mut magnitude_db = Vec::with_capacity(axis.len());
    let mut phase_deg = Vec::with_capacity(axis.len());
    for &w in &axis.omega {
        let h = combination.expr.eval_at(var, Complex64::new(0.0, w))?;
        magnitude_db.push(20.0 * h.norm().log10());
        phase_deg.push(h.arg().to_degrees());
    }
    let annotations = if with_annotations {
        annotate(combination, axis, &magnitude_db)
    } else {
        Vec::new()
    };
    Ok(BodeTrace {
        index: combination.index,
        label: combination.legend_label(),
        magnitude_db,
        phase_deg,
        annotations,
    })
}

/// Frequency response of every combination, in sweep order.
pub fn evaluate(sweep: &Sweep, settings: &Settings) -> Result<BodeResult, EvalError> {
    let axis = FrequencyAxis::covering(sweep.min_magnitude, sweep.max_magnitude, settings);
    tracing::info!(
        traces = sweep.len(),
        points = axis.len(),
        "evaluating frequency response"
    );
    let traces = sweep
        .combinations
        .iter()
        .map(|c| evaluate_combination(c, &sweep.var, &axis, settings.annotate))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(BodeResult { axis, traces })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::bind;
    use crate::limits::{normalize, LimitSpec, LimitTable};
    use crate::parse::parse_expr;

    fn sweep(src: &str, entries: Vec<(&str, LimitSpec)>) -> Sweep {
        let table: LimitTable = entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        let bound = bind(&parse_expr(src).unwrap(), "s", &normalize(&table).unwrap()).unwrap();
        Sweep::enumerate(&bound)
    }

    #[test]
    fn logspace_endpoints() {
        let axis = FrequencyAxis::logspace(0.0, 3.0, 4);
        for (got, want) in axis.omega.iter().zip([1.0, 10.0, 100.0, 1000.0]) {
            assert!((got - want).abs() < 1e-9 * want);
        }
    }

    #[test]
    fn axis_covers_values_and_reciprocals() {
        let axis = FrequencyAxis::covering(1e-6, 3.0, &Settings::default());
        assert!(axis.omega[0] <= 1e-6 / 100.0 * 1.0001);
        assert!(*axis.omega.last().unwrap() >= 1e6 * 100.0 * 0.9999);
        assert_eq!(axis.len(), 1000);
    }

    #[test]
    fn nearest_index_on_log_scale() {
        let axis = FrequencyAxis::logspace(0.0, 2.0, 3);
        assert_eq!(axis.nearest_index(2.0), 0);
        assert_eq!(axis.nearest_index(5.0), 1);
        assert_eq!(axis.nearest_index(1e9), 2);
    }

    #[test]
    fn first_order_corner_is_minus_three_db() {
        let s = sweep("1/(s*p1+1)", vec![("p1", LimitSpec::single(1e-3))]);
        let axis = FrequencyAxis { omega: vec![1.0, 1e3, 1e6] };
        let trace = evaluate_combination(&s.combinations[0], "s", &axis, false).unwrap();
        assert!(trace.magnitude_db[0].abs() < 1e-5);
        assert!((trace.magnitude_db[1] + 3.0103).abs() < 1e-3);
        assert!((trace.phase_deg[1] + 45.0).abs() < 1e-9);
        assert!((trace.magnitude_db[2] + 60.0).abs() < 1e-2);
    }

    #[test]
    fn traces_follow_sweep_order() {
        let s = sweep(
            "z1/(s*p1+1)",
            vec![
                ("p1", LimitSpec::pair(1e-6, 1e-3)),
                ("z1", LimitSpec::pair(1.0, 10.0)),
            ],
        );
        let result = evaluate(&s, &Settings::default()).unwrap();
        let labels: Vec<_> = result.traces.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["p1=min, z1=min", "p1=min, z1=max", "p1=max, z1=min", "p1=max, z1=max"]
        );
        // z1 = 10 → +20 dB at low frequency
        assert!((result.traces[1].low_frequency_db() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn annotations_mark_corners_and_shift_duplicates() {
        let s = sweep(
            "z1/(s*p1+1)",
            vec![("p1", LimitSpec::single(1e-3)), ("z1", LimitSpec::single(1e3))],
        );
        let settings = Settings {
            annotate: true,
            ..Settings::default()
        };
        let result = evaluate(&s, &settings).unwrap();
        let notes = &result.traces[0].annotations;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].text, "p1 = 0.001");
        assert!((notes[0].x - 1e3).abs() < 1e-9);
        assert_eq!(notes[0].text_x, notes[0].x);
        // z1 lands on the same frequency and is pushed half a decade right.
        assert!((notes[1].text_x / notes[1].x - 10f64.sqrt()).abs() < 1e-9);
        assert!((notes[1].text_y - (notes[1].y - 20.0)).abs() < 1e-12);
    }

    #[test]
    fn pole_at_zero_value_is_not_annotated() {
        assert_eq!(corner_frequency("p1", Complex64::new(0.0, 0.0)), None);
        assert_eq!(corner_frequency("z1", Complex64::new(0.0, 2.0)), Some(2.0));
    }
}
