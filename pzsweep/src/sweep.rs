//! Enumeration of parameter combinations.
//!
//! The sweep is the Cartesian product of every parameter's corner values,
//! in lexicographic order with the **last** declared parameter varying
//! fastest. For `p1: (a, b)` and `z1: (x, y, z)` the order is
//!
//! ```text
//! (a, x) (a, y) (a, z) (b, x) (b, y) (b, z)
//! ```
//!
//! Every combination carries its literal values, their `min`/`typ`/`max`
//! tags, and the transfer function with the values substituted. A [`Sweep`]
//! is built once and shared read-only by the frequency and time evaluators,
//! so trace `n` is the same combination in both domains.

use crate::bind::BoundExpr;
use crate::expr::{fmt_value, Bindings, Expr};
use crate::limits::Arity;
use num_complex::Complex64;
use serde::Serialize;
use std::fmt;

/// Position of a value within its parameter's limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Min,
    Typ,
    Max,
}

impl Tag {
    pub fn from_position(arity: Arity, index: usize) -> Tag {
        match (arity, index) {
            (Arity::One, _) => Tag::Typ,
            (Arity::Two, 0) => Tag::Min,
            (Arity::Two, _) => Tag::Max,
            (Arity::Three, 0) => Tag::Min,
            (Arity::Three, 1) => Tag::Typ,
            (Arity::Three, _) => Tag::Max,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Min => "min",
            Tag::Typ => "typ",
            Tag::Max => "max",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index tuples over `0..sizes[i]`, last dimension fastest.
#[derive(Debug, Clone)]
pub struct Odometer {
    sizes: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl Odometer {
    pub fn new(sizes: Vec<usize>) -> Self {
        let next = if sizes.iter().any(|&s| s == 0) {
            None
        } else {
            Some(vec![0; sizes.len()])
        };
        Odometer { sizes, next }
    }
}

impl Iterator for Odometer {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        let mut advanced = current.clone();
        for dim in (0..self.sizes.len()).rev() {
            advanced[dim] += 1;
            if advanced[dim] < self.sizes[dim] {
                self.next = Some(advanced);
                return Some(current);
            }
            advanced[dim] = 0;
        }
        Some(current)
    }
}

/// One parameter's value within a combination.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Complex64,
    pub tag: Tag,
}

#[derive(Debug, Clone)]
pub struct Combination {
    /// Position in enumeration order.
    pub index: usize,
    /// Chosen value index per parameter.
    pub indices: Vec<usize>,
    pub assignments: Vec<Assignment>,
    /// Transfer function with this combination substituted.
    pub expr: Expr,
}

impl Combination {
    /// `p1=min, z1=typ`
    pub fn legend_label(&self) -> String {
        if self.assignments.is_empty() {
            return "nominal".to_string();
        }
        self.assignments
            .iter()
            .map(|a| format!("{}={}", a.name, a.tag))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `p1=1e-6, z1=2`
    pub fn value_label(&self) -> String {
        if self.assignments.is_empty() {
            return "nominal".to_string();
        }
        self.assignments
            .iter()
            .map(|a| format!("{}={}", a.name, fmt_value(a.value)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn bindings(&self) -> Bindings {
        self.assignments
            .iter()
            .map(|a| (a.name.clone(), a.value))
            .collect()
    }
}

/// All combinations of a bound expression, plus magnitude bounds of the
/// swept values.
#[derive(Debug, Clone)]
pub struct Sweep {
    pub var: String,
    pub expr: Expr,
    pub combinations: Vec<Combination>,
    /// Smallest nonzero `|value|` across the sweep.
    pub min_magnitude: f64,
    /// Largest `|value|` across the sweep.
    pub max_magnitude: f64,
}

impl Sweep {
    pub fn enumerate(bound: &BoundExpr) -> Sweep {
        let params = &bound.limits.params;
        let sizes = params.iter().map(|p| p.arity.len()).collect();

        let mut min_magnitude = f64::INFINITY;
        let mut max_magnitude = 0.0_f64;
        let mut combinations = Vec::with_capacity(bound.limits.combinations());

        for (index, indices) in Odometer::new(sizes).enumerate() {
            let assignments: Vec<Assignment> = params
                .iter()
                .zip(&indices)
                .map(|(p, &i)| Assignment {
                    name: p.name.clone(),
                    value: p.values[i],
                    tag: Tag::from_position(p.arity, i),
                })
                .collect();

            for a in &assignments {
                let m = a.value.norm();
                max_magnitude = max_magnitude.max(m);
                if m > 0.0 {
                    min_magnitude = min_magnitude.min(m);
                }
            }

            let mut combination = Combination {
                index,
                indices,
                assignments,
                expr: Expr::zero(),
            };
            combination.expr = bound.expr.subs(&combination.bindings());
            tracing::debug!(
                index,
                legend = %combination.legend_label(),
                expr = %combination.expr,
                "enumerated combination"
            );
            combinations.push(combination);
        }

        if max_magnitude == 0.0 {
            max_magnitude = 1.0;
        }
        if !min_magnitude.is_finite() {
            min_magnitude = max_magnitude;
        }

        Sweep {
            var: bound.var.clone(),
            expr: bound.expr.clone(),
            combinations,
            min_magnitude,
            max_magnitude,
        }
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
