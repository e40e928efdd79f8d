//! Integration tests for the inverse-Laplace step response and settling.


use pzsweep::expr::Bindings;
use pzsweep::laplace::{StepTemplate, TransformError};
use pzsweep::limits::LimitSpec;
use pzsweep::parse::parse_expr;
use pzsweep::step::{self, settling};
use std::time::Duration;
use sweep_fixtures::*;

fn derive(src: &str) -> Result<StepTemplate, TransformError> {
    StepTemplate::derive(&parse_expr(src).unwrap(), "s", Duration::from_secs(5))
}

// ---------------------------------------------------------------------------
// Closed form against direct evaluation
// ---------------------------------------------------------------------------

#[test]
fn lowpass_step_matches_closed_form() {
    let s = lowpass_sweep();
    let template = derive("z1/(s*p1+1)").unwrap();
    let result = step::evaluate(&s, &template, &quick_settings()).unwrap();
    assert_eq!(result.traces.len(), s.len());

    for (c, trace) in s.combinations.iter().zip(&result.traces) {
        assert_eq!(c.index, trace.index);
        let b = c.bindings();
        let tau = b["p1"].re;
        let gain = b["z1"].re;
        for (&t, &y) in result.axis.t.iter().zip(&trace.samples).step_by(37) {
            let expected = gain * (1.0 - (-t / tau).exp());
            assert!(
                (y - expected).abs() < 1e-6 * gain,
                "{} at t={t}: {y} vs {expected}",
                trace.label
            );
        }
    }
}

#[test]
fn final_value_equals_dc_gain() {
    // Stable H: y(∞) = H(0)
    let template = derive("(s + 3)/((s+1)*(s+2)^2)").unwrap();
    let r = template.instantiate(&Bindings::new()).unwrap();
    assert!((r.eval(40.0) - 0.75).abs() < 1e-6, "{}", r.eval(40.0));
    assert!(r.eval(0.0).abs() < 1e-6, "{}", r.eval(0.0));
}

/// Step response of `n` identical first-order stages with time constant `tau`.
fn cascade_step(n: usize, tau: f64, t: f64) -> f64 {
    let x = t / tau;
    let mut term = 1.0;
    let mut sum = 0.0;
    for k in 0..n {
        if k > 0 {
            term *= x / k as f64;
        }
        sum += term;
    }
    1.0 - (-x).exp() * sum
}

#[test]
fn third_order_with_repeated_pole() {
    // 1/(s+1)^3: y = 1 - e^{-t}(1 + t + t²/2)
    let r = derive("1/(s+1)^3").unwrap().instantiate(&Bindings::new()).unwrap();
    for t in [0.5_f64, 1.0, 2.0, 4.0] {
        let expected = 1.0 - (-t).exp() * (1.0 + t + t * t / 2.0);
        assert!((r.eval(t) - expected).abs() < 1e-8, "t={t}: {}", r.eval(t));
    }
}

#[test]
fn fifth_order_repeated_pole_matches_closed_form() {
    let r = derive("1/(s+1)^5").unwrap().instantiate(&Bindings::new()).unwrap();
    assert_eq!(r.modes.len(), 2, "{r:?}");
    for t in [0.5_f64, 1.0, 2.0, 5.0, 10.0, 20.0] {
        let expected = cascade_step(5, 1.0, t);
        assert!((r.eval(t) - expected).abs() < 1e-8, "t={t}: {} vs {expected}", r.eval(t));
    }
}

#[test]
fn four_rc_stages_settle_to_unity() {
    let s = sweep_of("1/(s*p1+1)^4", vec![("p1", LimitSpec::single(1e-3))]);
    let template = derive("1/(s*p1+1)^4").unwrap();
    let r = template.instantiate(&s.combinations[0].bindings()).unwrap();
    for x in [0.5_f64, 1.0, 3.0, 8.0] {
        let t = x * 1e-3;
        let expected = cascade_step(4, 1e-3, t);
        assert!((r.eval(t) - expected).abs() < 1e-8, "t={t}: {} vs {expected}", r.eval(t));
    }
    assert!((r.eval(3e-3) - 0.3528).abs() < 1e-4, "{}", r.eval(3e-3));

    // Axis ends at 10·max|p1| = 10 ms = 10 tau.
    let result = step::evaluate(&s, &template, &quick_settings()).unwrap();
    let trace = &result.traces[0];
    assert!(trace.settling.settled, "ratio {}", trace.settling.ratio);
    assert!(trace.label.ends_with("settled=true"), "{}", trace.label);
    let last = *trace.samples.last().unwrap();
    assert!((last - cascade_step(4, 1e-3, 1e-2)).abs() < 1e-8, "final sample {last}");
}

// ---------------------------------------------------------------------------
// Settling
// ---------------------------------------------------------------------------

#[test]
fn settling_threshold_boundaries() {
    let mut settled = vec![1.0; 90];
    settled.extend([1.0, 1.05, 1.15, 1.1, 1.0, 1.02, 1.08, 1.12, 1.0, 1.01]);
    let s = settling(&settled, 0.1, 0.2);
    assert!(s.settled);
    assert!(close(s.ratio, 0.15, 1e-9));

    let mut ringing = vec![1.0; 90];
    ringing.extend([1.0, 1.25, 1.0, 1.2, 1.1, 1.0, 1.05, 1.1, 1.0, 1.0]);
    let s = settling(&ringing, 0.1, 0.2);
    assert!(!s.settled);
    assert!(close(s.ratio, 0.25, 1e-9));
}

#[test]
fn growing_response_is_reported_unsettled() {
    // Time axis ends at 10·max|value| = 10 s, well past tau = 1 s.
    let s = sweep_of("1/(s*p1+1)", vec![("p1", LimitSpec::single(1.0))]);
    let template = derive("1/(s*p1+1)").unwrap();
    let result = step::evaluate(&s, &template, &quick_settings()).unwrap();
    assert!(result.traces[0].settling.settled);
    assert!(result.traces[0].label.ends_with("settled=true"));
    assert_eq!(result.unsettled().count(), 0);

    // Right-half-plane pole: y = e^t - 1 keeps growing over the tail.
    let s = sweep_of("1/(s*p1-1)", vec![("p1", LimitSpec::single(1.0))]);
    let template = derive("1/(s*p1-1)").unwrap();
    let result = step::evaluate(&s, &template, &quick_settings()).unwrap();
    let trace = &result.traces[0];
    assert!(!trace.settling.settled, "ratio {}", trace.settling.ratio);
    assert!(trace.settling.ratio > 1.0);
    assert!(trace.label.ends_with("settled=false"), "{}", trace.label);
    assert_eq!(result.unsettled().count(), 1);
}

// ---------------------------------------------------------------------------
// Transform failures
// ---------------------------------------------------------------------------

#[test]
fn transcendental_transfer_function_is_reported() {
    let err = derive("exp(-s*p1)/(s*p2+1)").unwrap_err();
    assert!(matches!(err, TransformError::NotRational { .. }), "{err}");
}

#[test]
fn zero_budget_times_out() {
    let expr = parse_expr("1/(p1*s**3+p2*s**2+p3*s+p4)").unwrap();
    let err = StepTemplate::derive(&expr, "s", Duration::ZERO).unwrap_err();
    assert!(matches!(err, TransformError::Timeout(_)), "{err}");
}
