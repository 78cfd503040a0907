//! Timing point reports
//!
//! Two renderings of the same data: a fixed-width text table and pretty
//! JSON. The average section (mean BPM over the timing points and the seed
//! tempo) is only present when requested.

use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::AudioError;
use crate::grid::TimingPoint;

const RULE_WIDTH: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportBeat {
    pub time: f64,
    pub bpm: f64,
}

/// JSON shape of a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingReport {
    pub beats: Vec<ReportBeat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_bpm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo_seed: Option<f64>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Mean BPM over the timing points (`None` when there are none)
pub fn average_bpm(points: &[TimingPoint]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    Some(points.iter().map(|p| p.bpm).sum::<f64>() / points.len() as f64)
}

impl TimingReport {
    /// Times rounded to 4 decimals, BPMs to 2
    pub fn new(points: &[TimingPoint], show_average: bool, tempo_seed: f64) -> Self {
        let average = if show_average { average_bpm(points) } else { None };
        Self {
            beats: points
                .iter()
                .map(|p| ReportBeat {
                    time: round_to(p.time, 4),
                    bpm: round_to(p.bpm, 2),
                })
                .collect(),
            average_bpm: average.map(|avg| round_to(avg, 2)),
            tempo_seed: average.map(|_| round_to(tempo_seed, 2)),
        }
    }
}

pub fn format_text(points: &[TimingPoint], show_average: bool, tempo_seed: f64) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let mut lines = vec!["Time (s)     |  BPM".to_string(), rule.clone()];
    for point in points {
        lines.push(format!("{:.3}s     |  {:.2}", point.time, point.bpm));
    }
    if show_average {
        if let Some(avg) = average_bpm(points) {
            lines.push(rule);
            lines.push(format!("Average BPM (timing points): {:.2}", avg));
            lines.push(format!("Initial tempo seed: {:.2}", tempo_seed));
        }
    }
    lines.join("\n")
}

pub fn format_json(
    points: &[TimingPoint],
    show_average: bool,
    tempo_seed: f64,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&TimingReport::new(points, show_average, tempo_seed))
}

/// Render in the requested format
pub fn render(
    points: &[TimingPoint],
    format: ReportFormat,
    show_average: bool,
    tempo_seed: f64,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(format_text(points, show_average, tempo_seed)),
        ReportFormat::Json => format_json(points, show_average, tempo_seed),
    }
}

/// Write a rendered report to a file
pub fn write_report<P: AsRef<Path>>(path: P, contents: &str) -> Result<(), AudioError> {
    fs::write(path.as_ref(), contents).map_err(|err| AudioError::WriteFailed {
        path: path.as_ref().display().to_string(),
        reason: err.to_string(),
    })
}
