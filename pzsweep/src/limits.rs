//! Limit tables: per-parameter corner values.
//!
//! Each parameter is given as a single typical value, a `(min, max)` pair or a
//! `(min, typ, max)` triple. Values may be plain numbers or strings in the
//! expression literal grammar (`"4.7k"`, `"1/1e6"`, `"10e3+2j"`).
//!
//! [`normalize`] validates a table and stores every entry as a tuple, so the
//! sweep only ever deals with one shape.

use crate::parse::{parse_value, ParseError};
use indexmap::IndexMap;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LimitError {
    #[error("limits for '{name}' must be ascending by magnitude, got {values:?}")]
    NotAscending { name: String, values: Vec<f64> },
    #[error("limits for '{name}' must have 1 to 3 values, got {len}")]
    BadLength { name: String, len: usize },
    #[error("limit value for '{name}' is not numeric: {source}")]
    NotNumeric {
        name: String,
        #[source]
        source: ParseError,
    },
}

/// One literal limit value as written in a job file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn to_complex(&self) -> Result<Complex64, ParseError> {
        match self {
            Scalar::Number(x) if x.is_finite() => Ok(Complex64::new(*x, 0.0)),
            Scalar::Number(x) => Err(ParseError::NotFinite(x.to_string())),
            Scalar::Text(s) => parse_value(s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Number(x)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

/// A parameter's limits before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LimitSpec {
    Single(Scalar),
    Tuple(Vec<Scalar>),
}

impl LimitSpec {
    pub fn single(v: impl Into<Scalar>) -> Self {
        LimitSpec::Single(v.into())
    }

    pub fn pair(min: impl Into<Scalar>, max: impl Into<Scalar>) -> Self {
        LimitSpec::Tuple(vec![min.into(), max.into()])
    }

    pub fn triple(min: impl Into<Scalar>, typ: impl Into<Scalar>, max: impl Into<Scalar>) -> Self {
        LimitSpec::Tuple(vec![min.into(), typ.into(), max.into()])
    }
}

/// Ordered parameter name → limits, as declared.
pub type LimitTable = IndexMap<String, LimitSpec>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arity {
    One,
    Two,
    Three,
}

impl Arity {
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            1 => Some(Arity::One),
            2 => Some(Arity::Two),
            3 => Some(Arity::Three),
            _ => None,
        }
    }

    pub fn len(self) -> usize {
        match self {
            Arity::One => 1,
            Arity::Two => 2,
            Arity::Three => 3,
        }
    }
}

/// A validated parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub values: Vec<Complex64>,
    pub arity: Arity,
}

/// Validated limits in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedLimits {
    pub params: Vec<Parameter>,
}

impl NormalizedLimits {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Total number of combinations.
    pub fn combinations(&self) -> usize {
        self.params.iter().map(|p| p.arity.len()).product()
    }
}

/// Validate a limit table.
pub fn normalize(table: &LimitTable) -> Result<NormalizedLimits, LimitError> {
    let mut params = Vec::with_capacity(table.len());
    for (name, spec) in table {
        let raw: Vec<&Scalar> = match spec {
            LimitSpec::Single(v) => vec![v],
            LimitSpec::Tuple(vs) => vs.iter().collect(),
        };
        let arity = Arity::from_len(raw.len()).ok_or_else(|| LimitError::BadLength {
            name: name.clone(),
            len: raw.len(),
        })?;
        let values = raw
            .into_iter()
            .map(|s| {
                s.to_complex().map_err(|source| LimitError::NotNumeric {
                    name: name.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if values.windows(2).any(|w| w[0].norm() > w[1].norm()) {
            return Err(LimitError::NotAscending {
                name: name.clone(),
                values: values.iter().map(|v| v.norm()).collect(),
            });
        }
        params.push(Parameter {
            name: name.clone(),
            values,
            arity,
        });
    }
    Ok(NormalizedLimits { params })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
