//! # pzsweep
//!
//! Bode and unit-step response sweeps of a symbolic transfer function whose
//! poles, zeros and gains each take a few corner values.
//!
//! ```text
//! limits ──normalize──► parameters ──bind──► H(s) ──enumerate──► sweep
//!                                                                 │
//!                             ┌───────────────────────────────────┤
//!                             ▼                                   ▼
//!                       bode::evaluate                 StepTemplate::derive
//!                             │                                   │
//!                             ▼                                   ▼
//!                    magnitude / phase SVG               step::evaluate ──► SVG
//! ```
//!
//! ## Library Usage
//!
//! ```rust
//! use pzsweep::bind::bind;
//! use pzsweep::config::Settings;
//! use pzsweep::limits::{normalize, LimitSpec, LimitTable};
//! use pzsweep::parse::parse_expr;
//! use pzsweep::sweep::Sweep;
//! use pzsweep::bode;
//!
//! let h = parse_expr("z1/(s*p1 + 1)").unwrap();
//! let mut table = LimitTable::new();
//! table.insert("p1".into(), LimitSpec::triple(1e-6, 1e-3, 1e-1));
//! table.insert("z1".into(), LimitSpec::triple(1.0, 2.0, 3.0));
//!
//! let limits = normalize(&table).unwrap();
//! let bound = bind(&h, "s", &limits).unwrap();
//! let sweep = Sweep::enumerate(&bound);
//! assert_eq!(sweep.len(), 9);
//!
//! let result = bode::evaluate(&sweep, &Settings::default()).unwrap();
//! assert_eq!(result.traces[1].label, "p1=min, z1=typ");
//! ```
//!
//! For whole jobs (YAML in, figures and report out) see [`runner`].

// ============================================================================
// Symbolic core
// ============================================================================

pub mod expr;
pub mod parse;
pub mod poly;
pub mod rational;
pub mod laplace;

// ============================================================================
// Sweep pipeline
// ============================================================================

pub mod limits;
pub mod bind;
pub mod sweep;
pub mod bode;
pub mod step;
pub mod session;
pub mod plot;

// ============================================================================
// Jobs and reporting
// ============================================================================

pub mod config;
pub mod report;
pub mod runner;

pub use config::{JobConfig, Settings};
pub use expr::Expr;
pub use report::SweepReport;
pub use runner::{RunnerConfig, SweepRunner};
