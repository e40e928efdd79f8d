//! SVG figures for Bode and step-response results.
//!
//! Three files are written into the job's output directory:
//!
//! - `bode_magnitude.svg`: magnitude (dB) against ω, log-x, optional pole/zero markers
//! - `bode_phase.svg`: phase (degrees) against ω, log-x
//! - `step_response.svg`: unit-step response against time
//!
//! Log-x axes are drawn as `log10(ω)` on a linear coordinate with decade tick
//! labels, so every figure uses the same chart type.

use crate::bode::{Annotation, BodeResult};
use crate::step::TimeDomainResult;
use plotters::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MAGNITUDE_FILE: &str = "bode_magnitude.svg";
pub const PHASE_FILE: &str = "bode_phase.svg";
pub const STEP_FILE: &str = "step_response.svg";

const SIZE: (u32, u32) = (1500, 800);

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Failed to prepare output directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to draw figure: {0}")]
    Draw(String),
}

fn draw_err<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError::Draw(e.to_string())
}

struct Figure<'a> {
    caption: &'a str,
    x_desc: &'a str,
    y_desc: &'a str,
    log_x: bool,
}

struct Curve<'a> {
    label: &'a str,
    points: Vec<(f64, f64)>,
}

fn log_tick(x: &f64) -> String {
    format!("{:.0e}", 10f64.powf(*x))
}

/// Finite bounds of all points, padded by 5%.
fn bounds(curves: &[Curve<'_>], notes: &[(usize, Annotation)]) -> (Range<f64>, Range<f64>) {
    let points = curves
        .iter()
        .flat_map(|c| c.points.iter().copied())
        .chain(notes.iter().flat_map(|(_, n)| [(n.x, n.y), (n.text_x, n.text_y)]));
    let (mut x0, mut x1, mut y0, mut y1) = (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
    for (x, y) in points {
        x0 = x0.min(x);
        x1 = x1.max(x);
        y0 = y0.min(y);
        y1 = y1.max(y);
    }
    if !(x0.is_finite() && x1.is_finite()) {
        (x0, x1) = (0.0, 1.0);
    }
    if !(y0.is_finite() && y1.is_finite()) {
        (y0, y1) = (-1.0, 1.0);
    }
    if x1 <= x0 {
        x1 = x0 + 1.0;
    }
    let pad = if y1 > y0 { 0.05 * (y1 - y0) } else { 1.0 };
    (x0..x1, (y0 - pad)..(y1 + pad))
}

fn finite_points(xs: &[f64], ys: &[f64]) -> Vec<(f64, f64)> {
    xs.iter()
        .copied()
        .zip(ys.iter().copied())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect()
}

fn draw_figure(
    path: &Path,
    figure: &Figure<'_>,
    curves: &[Curve<'_>],
    notes: &[(usize, Annotation)],
) -> Result<(), PlotError> {
    let (x_range, y_range) = bounds(curves, notes);
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(figure.caption, ("sans-serif", 26))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)
        .map_err(draw_err)?;

    let mut mesh = chart.configure_mesh();
    mesh.x_desc(figure.x_desc).y_desc(figure.y_desc);
    if figure.log_x {
        mesh.x_label_formatter(&log_tick);
    }
    mesh.draw().map_err(draw_err)?;

    for (i, curve) in curves.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(curve.points.iter().copied(), color.stroke_width(2)))
            .map_err(draw_err)?
            .label(curve.label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    for (i, note) in notes {
        let color = Palette99::pick(*i).to_rgba();
        chart
            .draw_series(std::iter::once(Circle::new((note.x, note.y), 4, color.filled())))
            .map_err(draw_err)?;
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(note.x, note.y), (note.text_x, note.text_y)],
                color,
            )))
            .map_err(draw_err)?;
        chart
            .draw_series(std::iter::once(Text::new(
                note.text.clone(),
                (note.text_x, note.text_y),
                ("sans-serif", 14.0),
            )))
            .map_err(draw_err)?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(draw_err)?;

    root.present().map_err(draw_err)?;
    Ok(())
}

/// Write the magnitude and phase figures. Returns the written paths.
pub fn render_bode(result: &BodeResult, dir: &Path) -> Result<Vec<PathBuf>, PlotError> {
    std::fs::create_dir_all(dir)?;
    let log_w: Vec<f64> = result.axis.omega.iter().map(|w| w.log10()).collect();

    let magnitude: Vec<Curve<'_>> = result
        .traces
        .iter()
        .map(|t| Curve {
            label: &t.label,
            points: finite_points(&log_w, &t.magnitude_db),
        })
        .collect();
    let notes: Vec<(usize, Annotation)> = result
        .traces
        .iter()
        .enumerate()
        .flat_map(|(i, t)| {
            t.annotations.iter().map(move |a| {
                (
                    i,
                    Annotation {
                        x: a.x.log10(),
                        text_x: a.text_x.log10(),
                        ..a.clone()
                    },
                )
            })
        })
        .filter(|(_, a)| a.y.is_finite())
        .collect();
    let magnitude_path = dir.join(MAGNITUDE_FILE);
    draw_figure(
        &magnitude_path,
        &Figure {
            caption: "Bode magnitude",
            x_desc: "ω (rad/s)",
            y_desc: "Magnitude (dB)",
            log_x: true,
        },
        &magnitude,
        &notes,
    )?;

    let phase: Vec<Curve<'_>> = result
        .traces
        .iter()
        .map(|t| Curve {
            label: &t.label,
            points: finite_points(&log_w, &t.phase_deg),
        })
        .collect();
    let phase_path = dir.join(PHASE_FILE);
    draw_figure(
        &phase_path,
        &Figure {
            caption: "Bode phase",
            x_desc: "ω (rad/s)",
            y_desc: "Phase (degrees)",
            log_x: true,
        },
        &phase,
        &[],
    )?;

    tracing::info!(dir = %dir.display(), "wrote Bode figures");
    Ok(vec![magnitude_path, phase_path])
}

/// Write the step-response figure.
pub fn render_step(result: &TimeDomainResult, dir: &Path) -> Result<PathBuf, PlotError> {
    std::fs::create_dir_all(dir)?;
    let curves: Vec<Curve<'_>> = result
        .traces
        .iter()
        .map(|t| Curve {
            label: &t.label,
            points: finite_points(&result.axis.t, &t.samples),
        })
        .collect();
    let path = dir.join(STEP_FILE);
    draw_figure(
        &path,
        &Figure {
            caption: "Unit step response",
            x_desc: "t (s)",
            y_desc: "y(t)",
            log_x: false,
        },
        &curves,
        &[],
    )?;
    tracing::info!(path = %path.display(), "wrote step response figure");
    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bode::{BodeTrace, FrequencyAxis};

    #[test]
    fn bounds_ignore_non_finite_and_pad() {
        let curves = [Curve {
            label: "a",
            points: finite_points(&[0.0, 1.0, 2.0], &[f64::NEG_INFINITY, -10.0, 10.0]),
        }];
        let (x, y) = bounds(&curves, &[]);
        assert_eq!(x, 1.0..2.0);
        assert!((y.start + 11.0).abs() < 1e-12);
        assert!((y.end - 11.0).abs() < 1e-12);
    }

    #[test]
    fn empty_figure_has_default_bounds() {
        let (x, y) = bounds(&[], &[]);
        assert_eq!(x, 0.0..1.0);
        assert!(y.start < y.end);
    }

    #[test]
    fn log_ticks_read_as_decades() {
        assert_eq!(log_tick(&3.0), "1e3");
        assert_eq!(log_tick(&-2.0), "1e-2");
    }

    #[test]
    fn bode_files_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let axis = FrequencyAxis::logspace(0.0, 2.0, 5);
        let result = BodeResult {
            traces: vec![BodeTrace {
                index: 0,
                label: "p1=typ".into(),
                magnitude_db: vec![0.0, -1.0, -3.0, -10.0, -20.0],
                phase_deg: vec![0.0, -10.0, -45.0, -80.0, -89.0],
                annotations: vec![Annotation {
                    text: "p1 = 0.1".into(),
                    x: 10.0,
                    y: -3.0,
                    text_x: 10.0,
                    text_y: -23.0,
                }],
            }],
            axis,
        };
        let paths = render_bode(&result, dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        for p in paths {
            let svg = std::fs::read_to_string(&p).unwrap();
            assert!(svg.contains("<svg"), "{}", p.display());
        }
    }
}
