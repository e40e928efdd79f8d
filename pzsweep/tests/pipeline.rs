//! End-to-end runs: YAML job in, SVG figures and JSON report out.

use pzsweep::config::JobConfig;
use pzsweep::plot::{MAGNITUDE_FILE, PHASE_FILE, STEP_FILE};
use pzsweep::runner::{RunnerConfig, RunnerError, SweepRunner};
use pzsweep::session::{Domain, Phase, Session, SessionError};
use std::path::Path;

const LOWPASS_JOB: &str = r#"
name: lowpass
expression: "z1/(s*p1 + 1)"
limits:
  p1: ["1/1e6", "1/1e3", "1/1e1"]
  z1: [1, 2, 3]
settings:
  annotate: true
  frequency_points: 120
  time_points: 200
"#;

fn runner_into(dir: &Path) -> SweepRunner {
    SweepRunner::new(RunnerConfig {
        output_dir: Some(dir.to_path_buf()),
        ..RunnerConfig::default()
    })
}

// ---------------------------------------------------------------------------
// Full runs
// ---------------------------------------------------------------------------

#[test]
fn lowpass_job_writes_three_figures_and_report() {
    let tmp = tempfile::tempdir().unwrap();
    let job = JobConfig::from_yaml(LOWPASS_JOB).unwrap();
    let report = runner_into(tmp.path()).run(&job).unwrap();

    assert_eq!(report.summary.combinations, 9);
    assert!(report.summary.time_domain);
    assert_eq!(report.summary.settled, 9, "warnings: {:?}", report.warnings);
    assert_eq!(report.traces[1].legend, "p1=min, z1=typ");

    for name in [MAGNITUDE_FILE, PHASE_FILE, STEP_FILE] {
        let path = tmp.path().join(name);
        assert!(report.figures.contains(&path), "{} not reported", name);
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg") || svg.contains("<svg"), "{} is not SVG", name);
    }
    let magnitude = std::fs::read_to_string(tmp.path().join(MAGNITUDE_FILE)).unwrap();
    assert!(magnitude.contains("p1=min, z1=typ"));
    let step = std::fs::read_to_string(tmp.path().join(STEP_FILE)).unwrap();
    assert!(step.contains("settled=true"));

    let json_path = tmp.path().join("report").join("sweep.json");
    report.save_json(&json_path).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(value["job"], "lowpass");
    assert_eq!(value["traces"].as_array().map(Vec::len), Some(9));
}

#[test]
fn transcendental_job_still_plots_bode() {
    let tmp = tempfile::tempdir().unwrap();
    let job = JobConfig::from_yaml(
        r#"
name: delay
expression: "exp(-s*p1)/(s*p2 + 1)"
limits:
  p1: 1e-3
  p2: [1e-3, 1e-2]
settings:
  frequency_points: 80
"#,
    )
    .unwrap();
    let report = runner_into(tmp.path()).run(&job).unwrap();

    assert!(!report.summary.time_domain);
    assert!(report.warnings.iter().any(|w| w.starts_with("time domain skipped")));
    assert!(tmp.path().join(MAGNITUDE_FILE).exists());
    assert!(!tmp.path().join(STEP_FILE).exists());
}

#[test]
fn invalid_job_fails_before_any_output() {
    let tmp = tempfile::tempdir().unwrap();
    let job = JobConfig::from_yaml(
        r#"
name: bad
expression: "z1/(s*p1 + 1)"
limits:
  p1: [3, 1, 2]
  z1: 1
"#,
    )
    .unwrap();
    let err = runner_into(tmp.path()).run(&job).unwrap_err();
    assert!(matches!(err, RunnerError::LimitError(_)), "{err}");
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

// ---------------------------------------------------------------------------
// Session ordering
// ---------------------------------------------------------------------------

#[test]
fn plotting_requires_processing() {
    let tmp = tempfile::tempdir().unwrap();
    let job = JobConfig::from_yaml(LOWPASS_JOB).unwrap();
    let prepared = pzsweep::runner::prepare(&job).unwrap();
    let mut session = Session::new(prepared.bound, prepared.settings);

    let err = session.plot_bode(tmp.path()).unwrap_err();
    assert!(matches!(err, SessionError::Sequence(_)), "{err}");
    let err = session.plot_time_domain(tmp.path()).unwrap_err();
    assert!(matches!(err, SessionError::Sequence(_)), "{err}");

    session.process_bode().unwrap();
    assert_eq!(session.phase(Domain::Frequency), Phase::Processed);
    session.plot_bode(tmp.path()).unwrap();
    assert_eq!(session.phase(Domain::Frequency), Phase::Plotted);
    assert_eq!(session.phase(Domain::Time), Phase::Unprocessed);
}

// ---------------------------------------------------------------------------
// Job files
// ---------------------------------------------------------------------------

#[test]
fn job_round_trips_through_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("job.yaml");
    let job = JobConfig::default_job();
    job.save(&path).unwrap();
    let loaded = JobConfig::load(&path).unwrap();
    assert_eq!(loaded.name, job.name);
    assert_eq!(loaded.expression, job.expression);
    assert_eq!(loaded.settings, job.settings);
    assert_eq!(
        loaded.limits.keys().collect::<Vec<_>>(),
        job.limits.keys().collect::<Vec<_>>()
    );
}

#[test]
fn shipped_job_files_are_valid() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("jobs");
    let mut seen = 0;
    for entry in std::fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let job = JobConfig::load(&path).unwrap();
        let prepared = pzsweep::runner::prepare(&job);
        assert!(prepared.is_ok(), "{}: {:?}", path.display(), prepared.err());
        seen += 1;
    }
    assert!(seen >= 3, "only {seen} job files");
}
