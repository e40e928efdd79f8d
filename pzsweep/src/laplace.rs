//! Unit-step response by inverse Laplace transform.
//!
//! The step response of `H(s)` is `y(t) = L⁻¹{H(s)/s}`. The symbolic part
//! of the work (rationalizing `H(s)/s` in the transform variable) happens once
//! per sweep in [`StepTemplate::derive`], under a wall-clock deadline. Each
//! parameter combination is then handled numerically by
//! [`StepTemplate::instantiate`]:
//!
//! 1. substitute the combination and evaluate the polynomial coefficients,
//! 2. find zeros and poles with their multiplicities, cancel coincident pairs,
//! 3. expand in partial fractions around each distinct pole,
//! 4. return the closed form `Re Σ e^{pt} Σ c_k t^k/k!`.

use crate::expr::{fmt_value, Bindings, EvalError, Expr};
use crate::poly::{cluster_radius, Poly};
use crate::rational::{rationalize, Budget, RationalForm, SymPoly};
use num_complex::Complex64;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Relative distance under which a simple zero cancels a simple pole.
const CANCEL_TOLERANCE: f64 = 1e-7;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("inverse Laplace transform did not finish within {0:?}")]
    Timeout(Duration),
    #[error("expression is not rational in {var}: {detail}")]
    NotRational { var: String, detail: String },
    #[error("denominator is identically zero")]
    DegenerateDenominator,
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// `H(s)/s` as a symbolic rational form, ready for per-combination substitution.
#[derive(Debug, Clone)]
pub struct StepTemplate {
    var: String,
    form: RationalForm,
}

impl StepTemplate {
    /// Rationalize `expr / var` within `timeout`.
    pub fn derive(expr: &Expr, var: &str, timeout: Duration) -> Result<Self, TransformError> {
        let budget = Budget::new(timeout);
        let h = rationalize(expr, var, &budget)?;
        let integrator = RationalForm {
            num: SymPoly::constant(Expr::one()),
            den: SymPoly::variable(),
        };
        let form = h.mul(&integrator, &budget)?;
        if form.den.is_zero() {
            return Err(TransformError::DegenerateDenominator);
        }
        tracing::debug!(var, degree = form.den.degree(), "derived step template");
        Ok(StepTemplate {
            var: var.to_string(),
            form,
        })
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    pub fn form(&self) -> &RationalForm {
        &self.form
    }

    /// Closed-form step response for one parameter combination.
    pub fn instantiate(&self, bindings: &Bindings) -> Result<TimeResponse, TransformError> {
        let (num, den) = self.form.evaluate(bindings)?;
        partial_fractions(&num, &den)
    }
}

impl fmt::Display for StepTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.form.render(&self.var))
    }
}

/// One partial-fraction group: `e^{pole·t} · Σ coeffs[k] · t^k / k!`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    pub pole: Complex64,
    pub coeffs: Vec<Complex64>,
}

/// Time-domain closed form of a step response.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeResponse {
    pub modes: Vec<Mode>,
    /// `H(s)/s` was not strictly proper; its polynomial part only acts at `t = 0`.
    pub impulsive: bool,
}

impl TimeResponse {
    pub fn eval(&self, t: f64) -> f64 {
        let mut total = Complex64::new(0.0, 0.0);
        for mode in &self.modes {
            let mut poly = Complex64::new(0.0, 0.0);
            let mut power = 1.0;
            for (k, &c) in mode.coeffs.iter().enumerate() {
                if k > 0 {
                    power *= t / k as f64;
                }
                poly += c * power;
            }
            total += (mode.pole * t).exp() * poly;
        }
        total.re
    }

    pub fn sample(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.eval(t)).collect()
    }
}

impl fmt::Display for TimeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut terms = Vec::new();
        for mode in &self.modes {
            let mut factorial = 1.0;
            for (k, &c) in mode.coeffs.iter().enumerate() {
                if k > 0 {
                    factorial *= k as f64;
                }
                if c.norm() == 0.0 {
                    continue;
                }
                let mut term = fmt_value(c / factorial);
                match k {
                    0 => {}
                    1 => term.push_str("*t"),
                    _ => term.push_str(&format!("*t^{}", k)),
                }
                if mode.pole.norm() != 0.0 {
                    term.push_str(&format!("*exp({}*t)", fmt_value(mode.pole)));
                }
                terms.push(term);
            }
        }
        if terms.is_empty() {
            write!(f, "0")
        } else {
            write!(f, "{}", terms.join(" + "))
        }
    }
}

// ---------------------------------------------------------------------------
// Partial fractions
// ---------------------------------------------------------------------------

fn near(a: Complex64, b: Complex64, tol: f64) -> bool {
    (a - b).norm() <= tol * a.norm().max(b.norm())
}

/// Inverse transform of `num/den` for `t > 0`.
pub fn partial_fractions(num: &Poly, den: &Poly) -> Result<TimeResponse, TransformError> {
    if den.is_zero() {
        return Err(TransformError::DegenerateDenominator);
    }
    if num.is_zero() {
        return Ok(TimeResponse {
            modes: Vec::new(),
            impulsive: false,
        });
    }

    let gain = num.lead() / den.lead();
    let mut zeros = num.multiple_roots();
    let mut clusters = den.multiple_roots();

    // Cancel coincident pole/zero pairs, up to the smaller multiplicity.
    for (z, zm) in zeros.iter_mut() {
        for (p, pm) in clusters.iter_mut() {
            let tol = CANCEL_TOLERANCE.max(cluster_radius((*zm).max(*pm)));
            if *zm > 0 && *pm > 0 && near(*z, *p, tol) {
                let k = (*zm).min(*pm);
                *zm -= k;
                *pm -= k;
            }
        }
    }
    zeros.retain(|&(_, m)| m > 0);
    clusters.retain(|&(_, m)| m > 0);

    let zero_count: usize = zeros.iter().map(|&(_, m)| m).sum();
    let pole_count: usize = clusters.iter().map(|&(_, m)| m).sum();
    let impulsive = zero_count >= pole_count;
    let zeros: Vec<Complex64> = zeros
        .iter()
        .flat_map(|&(z, m)| std::iter::repeat(z).take(m))
        .collect();

    let numerator = Poly::from_roots(&zeros).mul(&Poly::constant(gain));
    let mut modes = Vec::with_capacity(clusters.len());
    for (i, &(pole, multiplicity)) in clusters.iter().enumerate() {
        // Remaining denominator: every other cluster at its multiplicity.
        let others: Vec<Complex64> = clusters
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .flat_map(|(_, &(q, m))| std::iter::repeat(q).take(m))
            .collect();
        let rest = Poly::from_roots(&others);

        // Taylor series of numerator/rest around the pole.
        let n = numerator.taylor_at(pole, multiplicity);
        let q = rest.taylor_at(pole, multiplicity);
        let mut g: Vec<Complex64> = Vec::with_capacity(multiplicity);
        for j in 0..multiplicity {
            let mut acc = n[j];
            for k in 1..=j {
                acc -= q[k] * g[j - k];
            }
            g.push(acc / q[0]);
        }
        let coeffs = (0..multiplicity).map(|k| g[multiplicity - 1 - k]).collect();
        modes.push(Mode { pole, coeffs });
    }

    Ok(TimeResponse { modes, impulsive })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
