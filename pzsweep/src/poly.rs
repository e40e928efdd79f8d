//! Dense complex polynomials and their roots.
//!
//! Coefficients are stored in ascending order: `c[0] + c[1]·x + c[2]·x² ...`.

use num_complex::Complex64;
use std::fmt;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

const MAX_ITERATIONS: usize = 2000;
const ROOT_TOLERANCE: f64 = 1e-14;
/// An m-fold root comes back from iteration spread over less than
/// `ROOT_SPREAD^(1/m)` of its magnitude.
const ROOT_SPREAD: f64 = 1e6 * f64::EPSILON;

/// Relative radius within which `multiplicity` computed roots are taken as one root.
pub fn cluster_radius(multiplicity: usize) -> f64 {
    ROOT_SPREAD.powf(1.0 / multiplicity.max(1) as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Poly {
    coeffs: Vec<Complex64>,
}

impl Poly {
    /// Build from ascending coefficients; exact trailing zeros are trimmed.
    pub fn new(mut coeffs: Vec<Complex64>) -> Self {
        while coeffs.len() > 1 && coeffs.last() == Some(&ZERO) {
            coeffs.pop();
        }
        if coeffs.is_empty() {
            coeffs.push(ZERO);
        }
        Poly { coeffs }
    }

    pub fn constant(c: Complex64) -> Self {
        Poly::new(vec![c])
    }

    /// Monic polynomial with the given roots.
    pub fn from_roots(roots: &[Complex64]) -> Self {
        roots.iter().fold(Poly::constant(ONE), |acc, &r| {
            acc.mul(&Poly::new(vec![-r, ONE]))
        })
    }

    pub fn coeffs(&self) -> &[Complex64] {
        &self.coeffs
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.len() == 1 && self.coeffs[0] == ZERO
    }

    /// Leading coefficient.
    pub fn lead(&self) -> Complex64 {
        self.coeffs[self.coeffs.len() - 1]
    }

    /// Horner evaluation.
    pub fn eval(&self, x: Complex64) -> Complex64 {
        self.coeffs.iter().rev().fold(ZERO, |acc, &c| acc * x + c)
    }

    pub fn mul(&self, other: &Poly) -> Poly {
        let mut out = vec![ZERO; self.coeffs.len() + other.coeffs.len() - 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            for (j, &b) in other.coeffs.iter().enumerate() {
                out[i + j] += a * b;
            }
        }
        Poly::new(out)
    }

    pub fn derivative(&self) -> Poly {
        if self.coeffs.len() == 1 {
            return Poly::constant(ZERO);
        }
        Poly::new(
            self.coeffs
                .iter()
                .enumerate()
                .skip(1)
                .map(|(k, &c)| c * k as f64)
                .collect(),
        )
    }

    /// Divide by `(x - r)` via synthetic division, dropping the remainder.
    pub fn deflate(&self, r: Complex64) -> Poly {
        let n = self.degree();
        if n == 0 {
            return self.clone();
        }
        let mut quotient = vec![ZERO; n];
        let mut carry = ZERO;
        for k in (1..=n).rev() {
            carry = carry * r + self.coeffs[k];
            quotient[k - 1] = carry;
        }
        Poly::new(quotient)
    }

    /// First `n` Taylor coefficients of the polynomial around `p`,
    /// i.e. the coefficients of `P(p + u)` in powers of `u`.
    pub fn taylor_at(&self, p: Complex64, n: usize) -> Vec<Complex64> {
        let mut work = self.coeffs.clone();
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            if work.is_empty() {
                out.push(ZERO);
                continue;
            }
            // One synthetic-division pass yields the remainder P(p) and the quotient.
            let mut carry = ZERO;
            let mut quotient = vec![ZERO; work.len().saturating_sub(1)];
            for k in (0..work.len()).rev() {
                carry = carry * p + work[k];
                if k > 0 {
                    quotient[k - 1] = carry;
                }
            }
            out.push(carry);
            work = quotient;
        }
        out
    }

    /// All complex roots, with multiplicity.
    pub fn roots(&self) -> Vec<Complex64> {
        if self.is_zero() {
            return Vec::new();
        }
        let mut roots = Vec::with_capacity(self.degree());

        // Exact zero roots.
        let lowest = self.coeffs.iter().position(|&c| c != ZERO).unwrap_or(0);
        roots.extend(std::iter::repeat(ZERO).take(lowest));
        let reduced = Poly::new(self.coeffs[lowest..].to_vec());

        match reduced.degree() {
            0 => {}
            1 => roots.push(-reduced.coeffs[0] / reduced.coeffs[1]),
            2 => roots.extend(quadratic_roots(
                reduced.coeffs[2],
                reduced.coeffs[1],
                reduced.coeffs[0],
            )),
            _ => roots.extend(reduced.durand_kerner()),
        }
        roots
    }

    /// Distinct roots with their multiplicities.
    ///
    /// Computed roots are grouped greedily, largest group first, where a group
    /// of `m` must lie within [`cluster_radius`]`(m)` of its centroid. Each
    /// centre is then polished as a simple root of the `(m-1)`th derivative.
    pub fn multiple_roots(&self) -> Vec<(Complex64, usize)> {
        let mut rest = self.roots();
        let mut out = Vec::new();
        while !rest.is_empty() {
            let group = (0..rest.len())
                .map(|seed| group_around(&rest, seed))
                .max_by_key(Vec::len)
                .unwrap_or_default();
            if group.is_empty() {
                break;
            }
            let members: Vec<Complex64> = group.iter().map(|&i| rest[i]).collect();
            let m = members.len();
            out.push((self.polish_multiple(centroid(&members), m), m));
            let mut drop = group;
            drop.sort_unstable_by(|a, b| b.cmp(a));
            for i in drop {
                rest.swap_remove(i);
            }
        }
        out
    }

    fn polish_multiple(&self, centre: Complex64, multiplicity: usize) -> Complex64 {
        let mut q = self.clone();
        for _ in 1..multiplicity {
            q = q.derivative();
        }
        let dq = q.derivative();
        if dq.is_zero() {
            return centre;
        }
        newton_polish(&q, &dq, centre)
    }

    fn durand_kerner(&self) -> Vec<Complex64> {
        let n = self.degree();
        let lead = self.lead();
        let monic: Vec<Complex64> = self.coeffs.iter().map(|&c| c / lead).collect();
        let monic = Poly::new(monic);

        // Fujiwara bound on root magnitudes.
        let radius = (0..n)
            .map(|k| {
                let c = monic.coeffs[k].norm();
                let c = if k == 0 { c / 2.0 } else { c };
                c.powf(1.0 / (n - k) as f64)
            })
            .fold(0.0_f64, f64::max)
            * 2.0;
        let radius = if radius > 0.0 { radius } else { 1.0 };

        let seed = Complex64::from_polar(1.0, 0.4);
        let mut z: Vec<Complex64> = (0..n)
            .map(|k| radius * seed.powu(k as u32 + 1) * Complex64::from_polar(1.0, 0.1 * k as f64))
            .collect();

        for _ in 0..MAX_ITERATIONS {
            let mut moved = 0.0_f64;
            for i in 0..n {
                let mut denom = ONE;
                for j in 0..n {
                    if i != j {
                        denom *= z[i] - z[j];
                    }
                }
                if denom == ZERO {
                    denom = Complex64::new(ROOT_TOLERANCE, ROOT_TOLERANCE);
                }
                let step = monic.eval(z[i]) / denom;
                z[i] -= step;
                moved = moved.max(step.norm() / z[i].norm().max(f64::MIN_POSITIVE));
            }
            if moved < ROOT_TOLERANCE {
                break;
            }
        }

        let derivative = monic.derivative();
        z.into_iter().map(|r| newton_polish(&monic, &derivative, r)).collect()
    }
}

fn centroid(points: &[Complex64]) -> Complex64 {
    points.iter().sum::<Complex64>() / points.len().max(1) as f64
}

/// Largest set of roots nearest to `roots[seed]` that is tight enough to be
/// one repeated root. Always contains `seed`.
fn group_around(roots: &[Complex64], seed: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..roots.len()).collect();
    order.sort_by(|&a, &b| {
        let da = (roots[a] - roots[seed]).norm();
        let db = (roots[b] - roots[seed]).norm();
        da.total_cmp(&db).then((a != seed).cmp(&(b != seed)))
    });
    for m in (2..=order.len()).rev() {
        let members: Vec<Complex64> = order[..m].iter().map(|&i| roots[i]).collect();
        let centre = centroid(&members);
        let spread = members
            .iter()
            .map(|r| (r - centre).norm())
            .fold(0.0_f64, f64::max);
        if spread <= cluster_radius(m) * centre.norm() {
            return order[..m].to_vec();
        }
    }
    vec![seed]
}

/// Roots of `a·x² + b·x + c`, avoiding cancellation.
fn quadratic_roots(a: Complex64, b: Complex64, c: Complex64) -> [Complex64; 2] {
    let disc = (b * b - 4.0 * a * c).sqrt();
    // Pick the sign that adds magnitudes.
    let q = if (b.conj() * disc).re >= 0.0 {
        -0.5 * (b + disc)
    } else {
        -0.5 * (b - disc)
    };
    if q == ZERO {
        return [ZERO, ZERO];
    }
    [q / a, c / q]
}

fn newton_polish(p: &Poly, dp: &Poly, mut r: Complex64) -> Complex64 {
    for _ in 0..3 {
        let d = dp.eval(r);
        if d == ZERO {
            break;
        }
        let step = p.eval(r) / d;
        if !step.re.is_finite() || !step.im.is_finite() {
            break;
        }
        let candidate = r - step;
        if p.eval(candidate).norm() > p.eval(r).norm() {
            break;
        }
        r = candidate;
    }
    r
}

impl fmt::Display for Poly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self
            .coeffs
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, &c)| c != ZERO)
            .map(|(k, &c)| match k {
                0 => crate::expr::fmt_value(c),
                1 => format!("{}·s", crate::expr::fmt_value(c)),
                _ => format!("{}·s^{}", crate::expr::fmt_value(c), k),
            })
            .collect();
        if terms.is_empty() {
            write!(f, "0")
        } else {
            write!(f, "{}", terms.join(" + "))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn contains_root(roots: &[Complex64], expected: Complex64, tol: f64) -> bool {
        roots
            .iter()
            .any(|r| (r - expected).norm() <= tol * expected.norm().max(1.0))
    }

    #[test]
    fn trims_trailing_zeros() {
        let p = Poly::new(vec![c(1.0, 0.0), c(2.0, 0.0), c(0.0, 0.0)]);
        assert_eq!(p.degree(), 1);
        assert!(Poly::new(vec![]).is_zero());
    }

    #[test]
    fn eval_and_mul() {
        // (x + 1)(x - 2) = x² - x - 2
        let p = Poly::new(vec![c(1.0, 0.0), c(1.0, 0.0)]).mul(&Poly::new(vec![c(-2.0, 0.0), c(1.0, 0.0)]));
        assert_eq!(p.coeffs(), &[c(-2.0, 0.0), c(-1.0, 0.0), c(1.0, 0.0)]);
        assert_eq!(p.eval(c(3.0, 0.0)), c(4.0, 0.0));
    }

    #[test]
    fn deflate_removes_root() {
        let p = Poly::from_roots(&[c(1.0, 0.0), c(-3.0, 0.0), c(0.5, 2.0)]);
        let q = p.deflate(c(-3.0, 0.0));
        assert_eq!(q.degree(), 2);
        assert!(q.eval(c(1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn taylor_coefficients() {
        // x³ around 1: 1 + 3u + 3u² + u³
        let p = Poly::new(vec![c(0.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(1.0, 0.0)]);
        let t = p.taylor_at(c(1.0, 0.0), 5);
        let expected = [1.0, 3.0, 3.0, 1.0, 0.0];
        for (got, want) in t.iter().zip(expected) {
            assert!((got - c(want, 0.0)).norm() < 1e-12, "{got} vs {want}");
        }
    }

    #[test]
    fn linear_and_zero_roots() {
        // 2x² + 4x = 2x(x + 2)
        let p = Poly::new(vec![c(0.0, 0.0), c(4.0, 0.0), c(2.0, 0.0)]);
        let r = p.roots();
        assert_eq!(r.len(), 2);
        assert!(contains_root(&r, c(0.0, 0.0), 1e-12));
        assert!(contains_root(&r, c(-2.0, 0.0), 1e-12));
    }

    #[test]
    fn quadratic_complex_pair() {
        // s² + 2s + 5 → -1 ± 2j
        let p = Poly::new(vec![c(5.0, 0.0), c(2.0, 0.0), c(1.0, 0.0)]);
        let r = p.roots();
        assert!(contains_root(&r, c(-1.0, 2.0), 1e-12));
        assert!(contains_root(&r, c(-1.0, -2.0), 1e-12));
    }

    #[test]
    fn quadratic_widely_separated_roots() {
        let p = Poly::from_roots(&[c(-1e-6, 0.0), c(-1e6, 0.0)]);
        let r = p.roots();
        assert!(contains_root(&r, c(-1e-6, 0.0), 1e-9));
        assert!(contains_root(&r, c(-1e6, 0.0), 1e-9));
    }

    #[test]
    fn cubic_with_complex_coefficients() {
        let expected = [c(-1.0, 0.0), c(-0.5, 3.0), c(2.0, -1.0)];
        let p = Poly::from_roots(&expected).mul(&Poly::constant(c(0.3, 1.0)));
        let r = p.roots();
        assert_eq!(r.len(), 3);
        for e in expected {
            assert!(contains_root(&r, e, 1e-9), "missing root {e} in {r:?}");
        }
    }

    #[test]
    fn multiple_roots_group_high_multiplicity() {
        for n in 2..=6 {
            let p = Poly::from_roots(&vec![c(-1.0, 0.0); n]);
            let groups = p.multiple_roots();
            assert_eq!(groups.len(), 1, "n={n}: {groups:?}");
            assert_eq!(groups[0].1, n);
            assert!((groups[0].0 - c(-1.0, 0.0)).norm() < 1e-9, "n={n}: {}", groups[0].0);
        }
    }

    #[test]
    fn multiple_roots_keep_close_distinct_roots_apart() {
        // s·(s + 1e3)^4·(s + 1.1e3)
        let mut roots = vec![c(0.0, 0.0), c(-1.1e3, 0.0)];
        roots.extend(vec![c(-1e3, 0.0); 4]);
        let p = Poly::from_roots(&roots).mul(&Poly::constant(c(1e-12, 0.0)));
        let mut groups = p.multiple_roots();
        groups.sort_by_key(|g| g.1);
        let counts: Vec<usize> = groups.iter().map(|g| g.1).collect();
        assert_eq!(counts, vec![1, 1, 4], "{groups:?}");
        assert!((groups[2].0 - c(-1e3, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn quintic_spread_over_decades() {
        let expected = [
            c(-1.0, 0.0),
            c(-10.0, 0.0),
            c(-100.0, 0.0),
            c(-1000.0, 5.0),
            c(-1000.0, -5.0),
        ];
        let r = Poly::from_roots(&expected).roots();
        for e in expected {
            assert!(contains_root(&r, e, 1e-6), "missing root {e} in {r:?}");
        }
    }
}
