//! Symbolic expression trees for transfer functions.
//!
//! An [`Expr`] is a small algebraic tree over complex constants, named
//! symbols (the transform variable and the swept parameters), the four
//! arithmetic operators, powers and a handful of elementary functions.
//! It supports exactly what the sweep needs:
//!
//! - [`Expr::free_symbols`] for binding parameters to the expression
//! - [`Expr::subs`] for substituting a parameter combination
//! - [`Expr::eval_with`] for numeric evaluation (e.g. at `s = jω`)
//! - `Display` for echoing expressions back to the user
//!
//! Trees built by the parser mirror the source text. Trees built through the
//! smart constructors ([`Expr::sum`], [`Expr::product`], ...) fold constants
//! and drop identities, which keeps substituted expressions and symbolic
//! polynomial coefficients small.

use num_complex::Complex64;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

/// Parameter name → literal value.
pub type Bindings = HashMap<String, Complex64>;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("symbol '{0}' has no value")]
    Unbound(String),
}

/// Elementary functions accepted in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
    Sqrt,
    Exp,
    Ln,
}

impl Func {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sqrt" => Some(Func::Sqrt),
            "exp" => Some(Func::Exp),
            "ln" | "log" => Some(Func::Ln),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Func::Sqrt => "sqrt",
            Func::Exp => "exp",
            Func::Ln => "ln",
        }
    }

    fn apply(self, z: Complex64) -> Complex64 {
        match self {
            Func::Sqrt => z.sqrt(),
            Func::Exp => z.exp(),
            Func::Ln => z.ln(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(Complex64),
    Sym(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Expr {
    pub fn real(value: f64) -> Self {
        Expr::Num(Complex64::new(value, 0.0))
    }

    pub fn num(value: Complex64) -> Self {
        Expr::Num(value)
    }

    pub fn sym(name: impl Into<String>) -> Self {
        Expr::Sym(name.into())
    }

    pub fn zero() -> Self {
        Expr::Num(ZERO)
    }

    pub fn one() -> Self {
        Expr::Num(ONE)
    }

    /// The literal value if this node is a constant.
    pub fn as_num(&self) -> Option<Complex64> {
        match self {
            Expr::Num(z) => Some(*z),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_num() == Some(ZERO)
    }

    pub fn is_one(&self) -> bool {
        self.as_num() == Some(ONE)
    }

    /// `a + b`, folding constants and additive zeros.
    pub fn sum(a: Expr, b: Expr) -> Expr {
        if let (Some(x), Some(y)) = (a.as_num(), b.as_num()) {
            return Expr::Num(x + y);
        }
        if a.is_zero() {
            return b;
        }
        if b.is_zero() {
            return a;
        }
        Expr::Add(Box::new(a), Box::new(b))
    }

    /// `a - b`, folding constants and additive zeros.
    pub fn difference(a: Expr, b: Expr) -> Expr {
        if let (Some(x), Some(y)) = (a.as_num(), b.as_num()) {
            return Expr::Num(x - y);
        }
        if b.is_zero() {
            return a;
        }
        if a.is_zero() {
            return Expr::negate(b);
        }
        Expr::Sub(Box::new(a), Box::new(b))
    }

    /// `a * b`, folding constants, zeros and ones.
    pub fn product(a: Expr, b: Expr) -> Expr {
        if let (Some(x), Some(y)) = (a.as_num(), b.as_num()) {
            return Expr::Num(x * y);
        }
        if a.is_zero() || b.is_zero() {
            return Expr::zero();
        }
        if a.is_one() {
            return b;
        }
        if b.is_one() {
            return a;
        }
        Expr::Mul(Box::new(a), Box::new(b))
    }

    /// `a / b`, folding constants and unit divisors.
    pub fn quotient(a: Expr, b: Expr) -> Expr {
        if let (Some(x), Some(y)) = (a.as_num(), b.as_num()) {
            if y != ZERO {
                return Expr::Num(x / y);
            }
        }
        if b.is_one() {
            return a;
        }
        if a.is_zero() && !b.is_zero() {
            return Expr::zero();
        }
        Expr::Div(Box::new(a), Box::new(b))
    }

    /// `a ^ b`, folding constants and trivial exponents.
    pub fn power(a: Expr, b: Expr) -> Expr {
        if let (Some(x), Some(y)) = (a.as_num(), b.as_num()) {
            return Expr::Num(complex_pow(x, y));
        }
        if b.is_zero() {
            return Expr::one();
        }
        if b.is_one() {
            return a;
        }
        Expr::Pow(Box::new(a), Box::new(b))
    }

    pub fn negate(a: Expr) -> Expr {
        match a {
            Expr::Num(z) => Expr::Num(-z),
            Expr::Neg(inner) => *inner,
            other => Expr::Neg(Box::new(other)),
        }
    }

    pub fn call(func: Func, arg: Expr) -> Expr {
        match arg.as_num() {
            Some(z) => Expr::Num(func.apply(z)),
            None => Expr::Call(func, Box::new(arg)),
        }
    }
}

/// Complex power that stays exact for small integer exponents.
fn complex_pow(base: Complex64, exp: Complex64) -> Complex64 {
    if exp.im == 0.0 && exp.re.fract() == 0.0 && exp.re.abs() <= i32::MAX as f64 {
        base.powi(exp.re as i32)
    } else {
        base.powc(exp)
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::sum(self, rhs)
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::difference(self, rhs)
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::product(self, rhs)
    }
}

impl std::ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::quotient(self, rhs)
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::negate(self)
    }
}

// ---------------------------------------------------------------------------
// Inspection, substitution, evaluation
// ---------------------------------------------------------------------------

impl Expr {
    /// All symbol names occurring in the tree.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Sym(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(a) | Expr::Call(_, a) => a.collect_symbols(out),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    /// Whether `name` occurs anywhere in the tree.
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Expr::Num(_) => false,
            Expr::Sym(s) => s == name,
            Expr::Neg(a) | Expr::Call(_, a) => a.contains(name),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => a.contains(name) || b.contains(name),
        }
    }

    /// Replace every bound symbol by its value and fold what becomes constant.
    ///
    /// Symbols without a binding (normally the transform variable) stay.
    pub fn subs(&self, bindings: &Bindings) -> Expr {
        match self {
            Expr::Num(z) => Expr::Num(*z),
            Expr::Sym(name) => match bindings.get(name) {
                Some(z) => Expr::Num(*z),
                None => Expr::Sym(name.clone()),
            },
            Expr::Neg(a) => Expr::negate(a.subs(bindings)),
            Expr::Add(a, b) => Expr::sum(a.subs(bindings), b.subs(bindings)),
            Expr::Sub(a, b) => Expr::difference(a.subs(bindings), b.subs(bindings)),
            Expr::Mul(a, b) => Expr::product(a.subs(bindings), b.subs(bindings)),
            Expr::Div(a, b) => Expr::quotient(a.subs(bindings), b.subs(bindings)),
            Expr::Pow(a, b) => Expr::power(a.subs(bindings), b.subs(bindings)),
            Expr::Call(f, a) => Expr::call(*f, a.subs(bindings)),
        }
    }

    /// Evaluate with every symbol resolved through `lookup`.
    ///
    /// Division by zero follows IEEE semantics (infinite or NaN result);
    /// only missing symbols are errors.
    pub fn eval_with<F>(&self, lookup: &F) -> Result<Complex64, EvalError>
    where
        F: Fn(&str) -> Option<Complex64>,
    {
        Ok(match self {
            Expr::Num(z) => *z,
            Expr::Sym(name) => lookup(name).ok_or_else(|| EvalError::Unbound(name.clone()))?,
            Expr::Neg(a) => -a.eval_with(lookup)?,
            Expr::Add(a, b) => a.eval_with(lookup)? + b.eval_with(lookup)?,
            Expr::Sub(a, b) => a.eval_with(lookup)? - b.eval_with(lookup)?,
            Expr::Mul(a, b) => a.eval_with(lookup)? * b.eval_with(lookup)?,
            Expr::Div(a, b) => a.eval_with(lookup)? / b.eval_with(lookup)?,
            Expr::Pow(a, b) => complex_pow(a.eval_with(lookup)?, b.eval_with(lookup)?),
            Expr::Call(f, a) => f.apply(a.eval_with(lookup)?),
        })
    }

    pub fn eval(&self, bindings: &Bindings) -> Result<Complex64, EvalError> {
        self.eval_with(&|name: &str| bindings.get(name).copied())
    }

    /// Evaluate an expression in the single variable `var` at `z`.
    pub fn eval_at(&self, var: &str, z: Complex64) -> Result<Complex64, EvalError> {
        self.eval_with(&|name: &str| (name == var).then_some(z))
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Format a literal value compactly: `1000`, `1e-6`, `(10000+2j)`.
pub fn fmt_value(z: Complex64) -> String {
    if z.im == 0.0 {
        fmt_real(z.re)
    } else if z.re == 0.0 {
        format!("{}j", fmt_real(z.im))
    } else {
        let sign = if z.im < 0.0 { '-' } else { '+' };
        format!("({}{}{}j)", fmt_real(z.re), sign, fmt_real(z.im.abs()))
    }
}

fn fmt_real(x: f64) -> String {
    let a = x.abs();
    if a != 0.0 && (a >= 1e5 || a < 1e-3) {
        format!("{:e}", x)
    } else if x.fract() == 0.0 {
        format!("{}", x as i64)
    } else {
        let s = format!("{:.6}", x);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

impl Expr {
    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(..) | Expr::Sub(..) => 1,
            Expr::Mul(..) | Expr::Div(..) => 2,
            Expr::Neg(_) => 3,
            Expr::Num(z) if z.im == 0.0 && z.re < 0.0 => 3,
            Expr::Pow(..) => 4,
            _ => 5,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, min_prec: u8) -> fmt::Result {
        if self.precedence() < min_prec {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(z) => write!(f, "{}", fmt_value(*z)),
            Expr::Sym(name) => write!(f, "{}", name),
            Expr::Neg(a) => {
                write!(f, "-")?;
                a.fmt_child(f, 4)
            }
            Expr::Add(a, b) => {
                a.fmt_child(f, 1)?;
                write!(f, " + ")?;
                b.fmt_child(f, 2)
            }
            Expr::Sub(a, b) => {
                a.fmt_child(f, 1)?;
                write!(f, " - ")?;
                b.fmt_child(f, 2)
            }
            Expr::Mul(a, b) => {
                a.fmt_child(f, 2)?;
                write!(f, "*")?;
                b.fmt_child(f, 3)
            }
            Expr::Div(a, b) => {
                a.fmt_child(f, 2)?;
                write!(f, "/")?;
                b.fmt_child(f, 4)
            }
            Expr::Pow(a, b) => {
                a.fmt_child(f, 5)?;
                write!(f, "^")?;
                b.fmt_child(f, 3)
            }
            Expr::Call(func, a) => write!(f, "{}({})", func.name(), a),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lowpass() -> Expr {
        // z1 / (s*p1 + 1)
        Expr::Div(
            Box::new(Expr::sym("z1")),
            Box::new(Expr::Add(
                Box::new(Expr::Mul(Box::new(Expr::sym("s")), Box::new(Expr::sym("p1")))),
                Box::new(Expr::real(1.0)),
            )),
        )
    }

    #[test]
    fn free_symbols_are_sorted_and_unique() {
        let e = lowpass() * Expr::sym("p1");
        let syms: Vec<_> = e.free_symbols().into_iter().collect();
        assert_eq!(syms, vec!["p1", "s", "z1"]);
    }

    #[test]
    fn subs_folds_to_single_variable() {
        let mut b = Bindings::new();
        b.insert("z1".into(), Complex64::new(2.0, 0.0));
        b.insert("p1".into(), Complex64::new(1e-3, 0.0));
        let e = lowpass().subs(&b);
        assert_eq!(e.free_symbols().into_iter().collect::<Vec<_>>(), vec!["s"]);

        // |H(j·1000)| = 2 / |1 + j| = sqrt(2)
        let h = e.eval_at("s", Complex64::new(0.0, 1000.0)).unwrap();
        assert!((h.norm() - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn eval_reports_unbound_symbol() {
        let err = lowpass().eval(&Bindings::new()).unwrap_err();
        assert!(matches!(err, EvalError::Unbound(_)));
    }

    #[test]
    fn smart_constructors_drop_identities() {
        let x = Expr::sym("x");
        assert_eq!(Expr::sum(Expr::zero(), x.clone()), x);
        assert_eq!(Expr::product(Expr::one(), x.clone()), x);
        assert!(Expr::product(Expr::zero(), x.clone()).is_zero());
        assert_eq!(Expr::power(x.clone(), Expr::one()), x);
        assert_eq!(Expr::negate(Expr::negate(x.clone())), x);
        assert_eq!(Expr::real(2.0) * Expr::real(3.0), Expr::real(6.0));
    }

    #[test]
    fn integer_powers_stay_exact() {
        let z = complex_pow(Complex64::new(0.0, 1.0), Complex64::new(2.0, 0.0));
        assert_eq!(z, Complex64::new(-1.0, 0.0));
    }

    #[test]
    fn display_uses_minimal_parentheses() {
        assert_eq!(lowpass().to_string(), "z1/(s*p1 + 1)");
        let e = Expr::Sub(
            Box::new(Expr::sym("a")),
            Box::new(Expr::Add(Box::new(Expr::sym("b")), Box::new(Expr::sym("c")))),
        );
        assert_eq!(e.to_string(), "a - (b + c)");
    }

    #[test]
    fn values_format_compactly() {
        assert_eq!(fmt_value(Complex64::new(1e6, 0.0)), "1e6");
        assert_eq!(fmt_value(Complex64::new(1e-6, 0.0)), "1e-6");
        assert_eq!(fmt_value(Complex64::new(3.0, 0.0)), "3");
        assert_eq!(fmt_value(Complex64::new(0.25, 0.0)), "0.25");
        assert_eq!(fmt_value(Complex64::new(1.0, -2.0)), "(1-2j)");
    }
}
