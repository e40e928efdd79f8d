//! Rationalization of an expression in one variable.
//!
//! Rewrites an [`Expr`] as `N(s)/D(s)` where both polynomials have
//! coefficients that are themselves expressions of the remaining symbols.
//! Substituting a parameter combination then reduces the form to two numeric
//! [`Poly`]s without re-walking the original tree.

use crate::expr::{Bindings, EvalError, Expr};
use crate::laplace::TransformError;
use crate::poly::Poly;
use std::time::{Duration, Instant};

/// Largest integer exponent expanded symbolically.
pub const MAX_EXPONENT: u32 = 64;

/// Cooperative wall-clock deadline for symbolic work.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    limit: Duration,
}

impl Budget {
    pub fn new(limit: Duration) -> Self {
        Budget {
            started: Instant::now(),
            limit,
        }
    }

    pub fn check(&self) -> Result<(), TransformError> {
        if self.started.elapsed() >= self.limit {
            Err(TransformError::Timeout(self.limit))
        } else {
            Ok(())
        }
    }
}

/// Polynomial in the transform variable with symbolic coefficients (ascending).
#[derive(Debug, Clone, PartialEq)]
pub struct SymPoly(pub Vec<Expr>);

impl SymPoly {
    pub fn constant(c: Expr) -> Self {
        SymPoly(vec![c]).trimmed()
    }

    pub fn variable() -> Self {
        SymPoly(vec![Expr::zero(), Expr::one()])
    }

    fn trimmed(mut self) -> Self {
        while self.0.len() > 1 && self.0.last().is_some_and(Expr::is_zero) {
            self.0.pop();
        }
        if self.0.is_empty() {
            self.0.push(Expr::zero());
        }
        self
    }

    pub fn degree(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(Expr::is_zero)
    }

    fn add(&self, other: &SymPoly) -> SymPoly {
        let n = self.0.len().max(other.0.len());
        let coeffs = (0..n)
            .map(|k| {
                let a = self.0.get(k).cloned().unwrap_or_else(Expr::zero);
                let b = other.0.get(k).cloned().unwrap_or_else(Expr::zero);
                a + b
            })
            .collect();
        SymPoly(coeffs).trimmed()
    }

    fn negate(&self) -> SymPoly {
        SymPoly(self.0.iter().cloned().map(Expr::negate).collect())
    }

    fn mul(&self, other: &SymPoly, budget: &Budget) -> Result<SymPoly, TransformError> {
        let mut out = vec![Expr::zero(); self.0.len() + other.0.len() - 1];
        for (i, a) in self.0.iter().enumerate() {
            budget.check()?;
            if a.is_zero() {
                continue;
            }
            for (j, b) in other.0.iter().enumerate() {
                let term = Expr::product(a.clone(), b.clone());
                let slot = std::mem::replace(&mut out[i + j], Expr::zero());
                out[i + j] = slot + term;
            }
        }
        Ok(SymPoly(out).trimmed())
    }

    /// Evaluate every coefficient under `bindings`.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<Poly, EvalError> {
        let coeffs = self
            .0
            .iter()
            .map(|c| c.eval(bindings))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Poly::new(coeffs))
    }

    /// Render with `var` as the indeterminate, highest power first.
    pub fn render(&self, var: &str) -> String {
        let terms: Vec<String> = self
            .0
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, c)| !c.is_zero())
            .map(|(k, c)| {
                let coeff = match c {
                    Expr::Add(..) | Expr::Sub(..) => format!("({})", c),
                    _ => c.to_string(),
                };
                match (k, c.is_one()) {
                    (0, _) => coeff,
                    (1, true) => var.to_string(),
                    (1, false) => format!("{}*{}", coeff, var),
                    (_, true) => format!("{}^{}", var, k),
                    (_, false) => format!("{}*{}^{}", coeff, var, k),
                }
            })
            .collect();
        if terms.is_empty() {
            "0".to_string()
        } else {
            terms.join(" + ")
        }
    }
}

/// `num(s) / den(s)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RationalForm {
    pub num: SymPoly,
    pub den: SymPoly,
}

impl RationalForm {
    fn constant(c: Expr) -> Self {
        RationalForm {
            num: SymPoly::constant(c),
            den: SymPoly::constant(Expr::one()),
        }
    }

    fn add(&self, other: &RationalForm, budget: &Budget) -> Result<RationalForm, TransformError> {
        if self.den == other.den {
            return Ok(RationalForm {
                num: self.num.add(&other.num),
                den: self.den.clone(),
            });
        }
        Ok(RationalForm {
            num: self
                .num
                .mul(&other.den, budget)?
                .add(&other.num.mul(&self.den, budget)?),
            den: self.den.mul(&other.den, budget)?,
        })
    }

    fn negate(&self) -> RationalForm {
        RationalForm {
            num: self.num.negate(),
            den: self.den.clone(),
        }
    }

    pub fn mul(&self, other: &RationalForm, budget: &Budget) -> Result<RationalForm, TransformError> {
        Ok(RationalForm {
            num: self.num.mul(&other.num, budget)?,
            den: self.den.mul(&other.den, budget)?,
        })
    }

    fn recip(&self) -> RationalForm {
        RationalForm {
            num: self.den.clone(),
            den: self.num.clone(),
        }
    }

    fn powi(&self, exp: u32, budget: &Budget) -> Result<RationalForm, TransformError> {
        let mut result = RationalForm::constant(Expr::one());
        let mut base = self.clone();
        let mut e = exp;
        while e > 0 {
            if e & 1 == 1 {
                result = result.mul(&base, budget)?;
            }
            e >>= 1;
            if e > 0 {
                base = base.mul(&base, budget)?;
            }
        }
        Ok(result)
    }

    /// Substitute and evaluate both polynomials.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<(Poly, Poly), EvalError> {
        Ok((self.num.evaluate(bindings)?, self.den.evaluate(bindings)?))
    }

    pub fn render(&self, var: &str) -> String {
        format!("({}) / ({})", self.num.render(var), self.den.render(var))
    }
}

/// Rewrite `expr` as a ratio of polynomials in `var`.
pub fn rationalize(expr: &Expr, var: &str, budget: &Budget) -> Result<RationalForm, TransformError> {
    budget.check()?;
    if !expr.contains(var) {
        return Ok(RationalForm::constant(expr.clone()));
    }
    let not_rational = |detail: String| TransformError::NotRational {
        var: var.to_string(),
        detail,
    };
    match expr {
        Expr::Sym(_) => Ok(RationalForm {
            num: SymPoly::variable(),
            den: SymPoly::constant(Expr::one()),
        }),
        Expr::Neg(a) => Ok(rationalize(a, var, budget)?.negate()),
        Expr::Add(a, b) => rationalize(a, var, budget)?.add(&rationalize(b, var, budget)?, budget),
        Expr::Sub(a, b) => {
            rationalize(a, var, budget)?.add(&rationalize(b, var, budget)?.negate(), budget)
        }
        Expr::Mul(a, b) => rationalize(a, var, budget)?.mul(&rationalize(b, var, budget)?, budget),
        Expr::Div(a, b) => {
            let denominator = rationalize(b, var, budget)?;
            if denominator.num.is_zero() {
                return Err(TransformError::DegenerateDenominator);
            }
            rationalize(a, var, budget)?.mul(&denominator.recip(), budget)
        }
        Expr::Pow(base, exponent) => {
            if exponent.contains(var) {
                return Err(not_rational(format!("exponent '{}' depends on {}", exponent, var)));
            }
            let n = exponent
                .eval(&Bindings::new())
                .ok()
                .filter(|z| z.im == 0.0 && z.re.fract() == 0.0 && z.re.abs() <= MAX_EXPONENT as f64)
                .map(|z| z.re as i64)
                .ok_or_else(|| {
                    not_rational(format!("exponent '{}' is not a small integer", exponent))
                })?;
            let form = rationalize(base, var, budget)?;
            let form = if n < 0 { form.recip() } else { form };
            form.powi(n.unsigned_abs() as u32, budget)
        }
        Expr::Call(func, arg) => Err(not_rational(format!(
            "{}({}) is transcendental in {}",
            func.name(),
            arg,
            var
        ))),
        Expr::Num(_) => Ok(RationalForm::constant(expr.clone())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_expr;
    use num_complex::Complex64;

    fn budget() -> Budget {
        Budget::new(Duration::from_secs(5))
    }

    fn bindings(pairs: &[(&str, f64)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Complex64::new(*v, 0.0)))
            .collect()
    }

    /// N(x)/D(x) must equal the expression itself at a few probe points.
    fn assert_equivalent(src: &str, b: &Bindings) {
        let e = parse_expr(src).unwrap().subs(b);
        let form = rationalize(&e, "s", &budget()).unwrap();
        let (n, d) = form.evaluate(b).unwrap();
        for probe in [Complex64::new(0.3, 1.7), Complex64::new(-2.0, 0.5), Complex64::new(0.0, 10.0)] {
            let direct = e.eval_at("s", probe).unwrap();
            let via = n.eval(probe) / d.eval(probe);
            assert!(
                (direct - via).norm() <= 1e-9 * direct.norm().max(1.0),
                "{src}: {direct} vs {via}"
            );
        }
    }

    #[test]
    fn first_order_lowpass() {
        let e = parse_expr("z1/(s*p1+1)").unwrap();
        let form = rationalize(&e, "s", &budget()).unwrap();
        assert_eq!(form.num.degree(), 0);
        assert_eq!(form.den.degree(), 1);
        assert_eq!(form.den.render("s"), "p1*s + 1");
    }

    #[test]
    fn nested_fractions_are_equivalent() {
        let b = bindings(&[("p1", 1e3), ("p2", 10.0), ("z1", 2.0)]);
        assert_equivalent("z1*((p1/p2)*s)/(s**2+((p1*s)/p2)+p1**2)", &b);
        assert_equivalent("1/(1 + 1/(s + 1/s))", &b);
        assert_equivalent("(s+1)^-2 * (s - p2)", &b);
        assert_equivalent("-(s^3 - 2)/(s*(s+z1))", &b);
    }

    #[test]
    fn symbolic_coefficients_survive() {
        let e = parse_expr("1/(p1*s**3+p2*s**2+p3*s+p4)").unwrap();
        let form = rationalize(&e, "s", &budget()).unwrap();
        assert_eq!(form.den.degree(), 3);
        assert_eq!(form.den.0[3], Expr::sym("p1"));
    }

    #[test]
    fn transcendental_is_not_rational() {
        let e = parse_expr("exp(-s*p1)/(s+1)").unwrap();
        let err = rationalize(&e, "s", &budget()).unwrap_err();
        assert!(matches!(err, TransformError::NotRational { .. }));
    }

    #[test]
    fn fractional_exponent_is_not_rational() {
        let e = parse_expr("s^0.5").unwrap();
        assert!(rationalize(&e, "s", &budget()).is_err());
        let e = parse_expr("s^p1").unwrap();
        assert!(rationalize(&e, "s", &budget()).is_err());
    }

    #[test]
    fn expired_budget_times_out() {
        let b = Budget::new(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        let e = parse_expr("1/(s+1)").unwrap();
        assert!(matches!(rationalize(&e, "s", &b), Err(TransformError::Timeout(_))));
    }
}
