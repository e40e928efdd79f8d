//! YAML job files.
//!
//! A job names a transfer function, its transform variable, the limits of
//! every swept parameter and optional tuning settings.
//!
//! # Job Structure
//!
//! ```yaml
//! name: "single pole low pass, gain sweep"
//! expression: "z1 / (s*p1 + 1)"
//! variable: s            # optional, defaults to s
//! limits:
//!   p1: [1e-6, 1e-3, 1e-1]
//!   z1: [1, 2, 3]
//! settings:              # every field optional
//!   annotate: true
//!   frequency_points: 1000
//!   decade_margin: 2
//!   time_points: 1000
//!   time_span_factor: 10
//!   settling_threshold: 0.2
//!   settling_tail: 0.1
//!   transform_timeout_secs: 20
//!   output_dir: plots/lowpass
//! ```
//!
//! Limit values are numbers or strings in the expression literal grammar,
//! e.g. `"1/10e3+1j"` or `"4.7k"`.
//!
//! # Programmatic Usage
//!
//! ```rust
//! use pzsweep::config::JobConfig;
//!
//! // let job = JobConfig::load("jobs/lowpass.yaml").unwrap();
//! let job = JobConfig::default_job();
//! assert_eq!(job.variable, "s");
//! ```

use crate::limits::{LimitSpec, LimitTable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read job file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("Invalid setting '{field}': {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

/// One sweep job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Transfer function source text.
    pub expression: String,
    /// Transform variable.
    #[serde(default = "default_variable")]
    pub variable: String,
    pub limits: LimitTable,
    #[serde(default)]
    pub settings: Settings,
}

fn default_variable() -> String { "s".to_string() }

/// Tunables for evaluation and output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Mark pole/zero locations on the magnitude plot.
    #[serde(default)]
    pub annotate: bool,
    #[serde(default = "default_frequency_points")]
    pub frequency_points: usize,
    /// Decades added on both sides of the swept magnitudes.
    #[serde(default = "default_decade_margin")]
    pub decade_margin: f64,
    #[serde(default = "default_time_points")]
    pub time_points: usize,
    /// Time axis ends at `time_span_factor · max |value|`.
    #[serde(default = "default_time_span_factor")]
    pub time_span_factor: f64,
    #[serde(default = "default_settling_threshold")]
    pub settling_threshold: f64,
    /// Fraction of trailing samples checked for settling.
    #[serde(default = "default_settling_tail")]
    pub settling_tail: f64,
    #[serde(default = "default_transform_timeout_secs")]
    pub transform_timeout_secs: f64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_frequency_points() -> usize { 1000 }
fn default_decade_margin() -> f64 { 2.0 }
fn default_time_points() -> usize { 1000 }
fn default_time_span_factor() -> f64 { 10.0 }
fn default_settling_threshold() -> f64 { 0.2 }
fn default_settling_tail() -> f64 { 0.1 }
fn default_transform_timeout_secs() -> f64 { 20.0 }
fn default_output_dir() -> PathBuf { PathBuf::from("plots") }

impl Default for Settings {
    fn default() -> Self {
        Self {
            annotate: false,
            frequency_points: default_frequency_points(),
            decade_margin: default_decade_margin(),
            time_points: default_time_points(),
            time_span_factor: default_time_span_factor(),
            settling_threshold: default_settling_threshold(),
            settling_tail: default_settling_tail(),
            transform_timeout_secs: default_transform_timeout_secs(),
            output_dir: default_output_dir(),
        }
    }
}

impl Settings {
    pub fn transform_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.transform_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::InvalidSetting {
                field,
                reason: reason.into(),
            })
        }
        if self.frequency_points < 2 {
            return invalid("frequency_points", "need at least 2 samples");
        }
        if self.time_points < 2 {
            return invalid("time_points", "need at least 2 samples");
        }
        if !(self.decade_margin.is_finite() && self.decade_margin >= 0.0) {
            return invalid("decade_margin", "must be a non-negative number");
        }
        if !(self.time_span_factor.is_finite() && self.time_span_factor > 0.0) {
            return invalid("time_span_factor", "must be positive");
        }
        if !(self.settling_threshold.is_finite() && self.settling_threshold > 0.0) {
            return invalid("settling_threshold", "must be positive");
        }
        if !(self.settling_tail > 0.0 && self.settling_tail <= 1.0) {
            return invalid("settling_tail", "must be in (0, 1]");
        }
        if !(self.transform_timeout_secs.is_finite() && self.transform_timeout_secs > 0.0) {
            return invalid("transform_timeout_secs", "must be a positive number of seconds");
        }
        Ok(())
    }
}

impl JobConfig {
    /// Load and validate a job from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let job: Self = serde_yaml::from_str(contents)?;
        job.settings.validate()?;
        Ok(job)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// The job run when no job file is given.
    pub fn default_job() -> Self {
        Self {
            name: "lowpass_gain_sweep".to_string(),
            description: Some("Single-pole low-pass, pole and gain at min/typ/max".to_string()),
            expression: "z1/(s*p1+1)".to_string(),
            variable: default_variable(),
            limits: limits(vec![
                ("p1", LimitSpec::triple("1/1e6", "1/1e3", "1/1e1")),
                ("z1", LimitSpec::triple(1.0, 2.0, 3.0)),
            ]),
            settings: Settings {
                annotate: true,
                ..Settings::default()
            },
        }
    }

    /// Built-in sample jobs.
    pub fn builtin() -> Vec<Self> {
        vec![
            Self::default_job(),
            Self {
                name: "single_pole".to_string(),
                description: Some("Fixed single-pole low-pass".to_string()),
                expression: "1/(s*p1+1)".to_string(),
                variable: default_variable(),
                limits: limits(vec![("p1", LimitSpec::single("1/1e3"))]),
                settings: Settings::default(),
            },
            Self {
                name: "normalized_lowpass".to_string(),
                description: Some("Low-pass written with its corner as 1/p1".to_string()),
                expression: "1/p1/(s+1/p1)".to_string(),
                variable: default_variable(),
                limits: limits(vec![("p1", LimitSpec::single(1e6))]),
                settings: Settings::default(),
            },
            Self {
                name: "bandpass".to_string(),
                description: Some("Second-order band-pass, gain sweep".to_string()),
                expression: "z1*((p1/p2)*s)/(s**2+((p1*s)/p2)+p1**2)".to_string(),
                variable: default_variable(),
                limits: limits(vec![
                    ("p1", LimitSpec::Tuple(vec![1e3.into()])),
                    ("p2", LimitSpec::single(10.0)),
                    ("z1", LimitSpec::pair(1.0, 1000.0)),
                ]),
                settings: Settings::default(),
            },
            Self {
                name: "third_order_complex".to_string(),
                description: Some("Third-order denominator with complex coefficients".to_string()),
                expression: "1/(p1*s**3+p2*s**2+p3*s+p4)".to_string(),
                variable: default_variable(),
                limits: limits(vec![
                    ("p1", LimitSpec::single("1/10e3+1j")),
                    ("p2", LimitSpec::triple("1/1e6", "1/1e3", "1/1e1")),
                    ("p3", LimitSpec::triple("1+1j", 2.0, 3.0)),
                    ("p4", LimitSpec::triple(1.0, 2.0, 3.0)),
                ]),
                settings: Settings::default(),
            },
        ]
    }

    pub fn builtin_named(name: &str) -> Option<Self> {
        Self::builtin().into_iter().find(|j| j.name == name)
    }
}

fn limits(entries: Vec<(&str, LimitSpec)>) -> LimitTable {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Scalar;

    #[test]
    fn minimal_job_gets_defaults() {
        let job = JobConfig::from_yaml("name: t\nexpression: 1/(s+p1)\nlimits:\n  p1: 2\n").unwrap();
        assert_eq!(job.variable, "s");
        assert_eq!(job.settings, Settings::default());
        assert_eq!(job.settings.transform_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn partial_settings_merge_with_defaults() {
        let yaml = "name: t\nexpression: 1/(s+p1)\nlimits:\n  p1: [1, 2]\nsettings:\n  annotate: true\n  time_points: 50\n";
        let job = JobConfig::from_yaml(yaml).unwrap();
        assert!(job.settings.annotate);
        assert_eq!(job.settings.time_points, 50);
        assert_eq!(job.settings.frequency_points, 1000);
    }

    #[test]
    fn limits_keep_file_order() {
        let yaml = "name: t\nexpression: z9*p1/(s+p1)\nlimits:\n  z9: 1\n  p1: ['1/1e3', 2]\n";
        let job = JobConfig::from_yaml(yaml).unwrap();
        let names: Vec<_> = job.limits.keys().cloned().collect();
        assert_eq!(names, vec!["z9", "p1"]);
        match &job.limits["p1"] {
            LimitSpec::Tuple(v) => assert_eq!(v[0], Scalar::Text("1/1e3".into())),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_settings_rejected() {
        let yaml = "name: t\nexpression: 1/(s+p1)\nlimits:\n  p1: 1\nsettings:\n  settling_tail: 1.5\n";
        let err = JobConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { field: "settling_tail", .. }));
    }

    #[test]
    fn yaml_round_trip_of_default_job() {
        let job = JobConfig::default_job();
        let back = JobConfig::from_yaml(&job.to_yaml().unwrap()).unwrap();
        assert_eq!(back.expression, job.expression);
        assert_eq!(back.limits, job.limits);
        assert_eq!(back.settings, job.settings);
    }

    #[test]
    fn builtin_jobs_are_valid() {
        for job in JobConfig::builtin() {
            job.settings.validate().unwrap();
            assert!(!job.limits.is_empty(), "{}", job.name);
        }
        assert!(JobConfig::builtin_named("bandpass").is_some());
    }
}
