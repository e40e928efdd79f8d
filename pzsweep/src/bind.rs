//! Binding declared parameters to the free symbols of an expression.

use crate::expr::Expr;
use crate::limits::NormalizedLimits;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindError {
    #[error("parameters not found in the expression: {}", missing.join(", "))]
    Mismatch { missing: Vec<String> },
    #[error("'{0}' is the transform variable and cannot be swept")]
    ReservedName(String),
    #[error("symbols without limits: {}", unbound.join(", "))]
    Unbound { unbound: Vec<String> },
}

/// A transfer function whose parameters all have limits.
#[derive(Debug, Clone)]
pub struct BoundExpr {
    pub expr: Expr,
    pub var: String,
    pub limits: NormalizedLimits,
}

/// Check that every declared parameter appears in `expr` and that every
/// other symbol is the transform variable.
pub fn bind(expr: &Expr, var: &str, limits: &NormalizedLimits) -> Result<BoundExpr, BindError> {
    if limits.names().any(|n| n == var) {
        return Err(BindError::ReservedName(var.to_string()));
    }
    let symbols = expr.free_symbols();

    let missing: Vec<String> = limits
        .names()
        .filter(|n| !symbols.contains(*n))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(BindError::Mismatch { missing });
    }

    let unbound: Vec<String> = symbols
        .iter()
        .filter(|s| s.as_str() != var && !limits.names().any(|n| n == s.as_str()))
        .cloned()
        .collect();
    if !unbound.is_empty() {
        return Err(BindError::Unbound { unbound });
    }

    Ok(BoundExpr {
        expr: expr.clone(),
        var: var.to_string(),
        limits: limits.clone(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
