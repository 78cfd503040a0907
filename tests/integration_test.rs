// Integration tests for the timing pipeline
//
// End-to-end scenarios over synthetic onset streams (grid core only) and
// rendered click tracks (full analysis front end).

use beatgrid_timing::audio::{render_click_track, ClickPattern};
use beatgrid_timing::config::{AppConfig, GapRejectPolicy, TimingConfig};
use beatgrid_timing::grid::{generate_timing_points, OnsetSet, TimingPoint};
use beatgrid_timing::testing::synthetic::{
    drop_onsets, jitter, shifted_onsets, steady_onsets, tempo_change_onsets,
};
use beatgrid_timing::analyze_samples;

fn assert_well_formed(points: &[TimingPoint], config: &TimingConfig) {
    assert!(!points.is_empty(), "the seed point is always emitted");
    let min_gap = config.min_gap_ms / 1000.0;
    for pair in points.windows(2) {
        assert!(pair[1].time > pair[0].time, "points must be strictly increasing: {:?}", pair);
        assert!(
            pair[1].time - pair[0].time >= min_gap - 1e-9,
            "points closer than min gap: {:?}",
            pair
        );
    }
    assert!(points.len() <= config.max_points);
    assert!(points.iter().all(|p| p.bpm.is_finite() && p.bpm > 0.0));
}

#[test]
fn test_perfect_grid_yields_single_point() {
    let config = TimingConfig::default();
    let onsets = OnsetSet::new(steady_onsets(120.0, 0.0, 21));

    let result = generate_timing_points(&onsets, 120.0, 0.0, 10.0, &config).unwrap();

    assert_eq!(result.points, vec![TimingPoint { time: 0.0, bpm: 120.0 }]);
    assert_eq!(result.stats.drift_points, 0);
    assert_eq!(result.stats.jump_points, 0);
}

#[test]
fn test_slow_tempo_drift_emits_one_drift_point() {
    // 120 BPM until 10s, then 120.5 BPM
    let config = TimingConfig {
        persist: 4,
        min_matches: 10,
        ..TimingConfig::default()
    };
    let onsets = OnsetSet::new(tempo_change_onsets(120.0, 120.5, 10.0, 40.0));

    let result = generate_timing_points(&onsets, 120.0, 0.0, 40.0, &config).unwrap();
    let points = &result.points;

    assert_well_formed(points, &config);
    assert_eq!(points.len(), 2, "got {:?}", points);
    assert_eq!(points[0], TimingPoint { time: 0.0, bpm: 120.0 });
    assert!(points[1].time > 10.0 && points[1].time < 20.0);
    assert!(points[1].bpm > 120.2 && points[1].bpm < 120.6, "bpm {}", points[1].bpm);
    assert_eq!(result.stats.drift_points, 1);
    assert_eq!(result.stats.jump_points, 0);
}

#[test]
fn test_slow_tempo_drift_with_defaults_stays_close_to_new_tempo() {
    let config = TimingConfig::default();
    let onsets = OnsetSet::new(tempo_change_onsets(120.0, 120.5, 10.0, 40.0));

    let result = generate_timing_points(&onsets, 120.0, 0.0, 40.0, &config).unwrap();

    assert_well_formed(&result.points, &config);
    assert!(result.points.len() >= 2);
    assert!(result.points[1..].iter().all(|p| p.time > 10.0));
    assert!((result.final_bpm - 120.5).abs() < 0.2, "final bpm {}", result.final_bpm);
}

#[test]
fn test_phase_shift_emits_jump_at_constant_tempo() {
    // Every beat from 5s on lands 30ms late
    let config = TimingConfig {
        decision_window: 12,
        min_matches: 10,
        persist: 4,
        drift_slope_ms_per_beat: 6.0,
        ..TimingConfig::default()
    };
    let onsets = OnsetSet::new(shifted_onsets(120.0, 0.03, 10, 60));

    let result = generate_timing_points(&onsets, 120.0, 0.0, 30.0, &config).unwrap();
    let points = &result.points;

    assert_well_formed(points, &config);
    assert_eq!(points.len(), 2, "got {:?}", points);
    assert!((points[1].time - 10.03).abs() < 1e-9);
    assert_eq!(points[1].bpm, 120.0);
    assert_eq!(result.stats.jump_points, 1);
}

#[test]
fn test_large_tempo_change_is_followed() {
    let config = TimingConfig {
        match_window_ms: 240.0,
        decision_window: 8,
        min_matches: 8,
        persist: 3,
        ..TimingConfig::default()
    };
    let onsets = OnsetSet::new(tempo_change_onsets(120.0, 130.0, 10.0, 30.0));

    let result = generate_timing_points(&onsets, 120.0, 0.0, 30.0, &config).unwrap();

    assert_well_formed(&result.points, &config);
    assert!(result.points.len() >= 2);
    assert!(result.points[1..].iter().all(|p| p.time > 10.0));
    let last = result.points.last().unwrap();
    assert!((last.bpm - 130.0).abs() < 0.5, "last point {:?}", last);
}

#[test]
fn test_abrupt_tempo_change_outside_match_window_is_not_followed() {
    // 120 -> 130 BPM at 10s: the error grows ~38ms per beat, so the 40ms
    // window loses the new onsets before min_matches evidence accumulates
    let config = TimingConfig {
        persist: 8,
        min_matches: 14,
        drift_slope_ms_per_beat: 1.2,
        ..TimingConfig::default()
    };
    let onsets = OnsetSet::new(tempo_change_onsets(120.0, 130.0, 10.0, 40.0));

    let result = generate_timing_points(&onsets, 120.0, 0.0, 40.0, &config).unwrap();

    assert_eq!(result.points, vec![TimingPoint { time: 0.0, bpm: 120.0 }]);
    assert_eq!(result.stats.drift_points, 0);
    assert_eq!(result.stats.jump_points, 0);
    assert_eq!(result.final_bpm, 120.0);
}

#[test]
fn test_phase_step_with_default_thresholds_reads_as_drift_pair() {
    // +30ms from 5s on: the step sits inside the regression window, so the
    // slope crosses the drift threshold before the median offset can
    // persist as a jump. The tempo is bent away and then restored.
    let config = TimingConfig {
        offset_threshold_ms: 18.0,
        persist: 8,
        ..TimingConfig::default()
    };
    let onsets = OnsetSet::new(shifted_onsets(120.0, 0.03, 10, 60));

    let result = generate_timing_points(&onsets, 120.0, 0.0, 30.0, &config).unwrap();
    let points = &result.points;

    assert_well_formed(points, &config);
    assert_eq!(points.len(), 3, "got {:?}", points);
    assert!((points[1].time - 10.03).abs() < 1e-9);
    assert!((points[1].bpm - 119.488).abs() < 1e-3, "bpm {}", points[1].bpm);
    assert!((points[2].time - 20.5546).abs() < 1e-3, "time {}", points[2].time);
    assert!((points[2].bpm - 120.0).abs() < 1e-6, "bpm {}", points[2].bpm);
    assert_eq!(result.stats.drift_points, 2);
    assert_eq!(result.stats.jump_points, 0);
}

#[test]
fn test_no_onsets_returns_seed() {
    let config = TimingConfig::default();
    let result = generate_timing_points(&OnsetSet::default(), 128.0, 0.75, 60.0, &config).unwrap();

    assert_eq!(result.points, vec![TimingPoint { time: 0.75, bpm: 128.0 }]);
    assert_eq!(result.stats.beats_matched, 0);
}

#[test]
fn test_noisy_steady_track_stays_sparse() {
    let config = TimingConfig::default();
    let base = steady_onsets(120.0, 0.0, 120);
    let noisy = drop_onsets(&jitter(&base, 0.004, 11), 0.85, 5);

    let result =
        generate_timing_points(&OnsetSet::new(noisy), 120.0, 0.0, 60.0, &config).unwrap();

    assert_well_formed(&result.points, &config);
    assert_eq!(result.points.len(), 1, "got {:?}", result.points);
}

#[test]
fn test_gap_policies_both_respect_min_gap() {
    let onsets = OnsetSet::new(tempo_change_onsets(120.0, 121.0, 5.0, 60.0));
    for policy in [GapRejectPolicy::Retain, GapRejectPolicy::Reset] {
        let config = TimingConfig {
            min_gap_ms: 8_000.0,
            persist: 4,
            min_matches: 10,
            gap_reject_policy: policy,
            ..TimingConfig::default()
        };
        let result = generate_timing_points(&onsets, 120.0, 0.0, 60.0, &config).unwrap();
        assert_well_formed(&result.points, &config);
    }
}

#[test]
fn test_results_are_deterministic() {
    let config = TimingConfig::default();
    let onsets = OnsetSet::new(jitter(&tempo_change_onsets(120.0, 121.0, 8.0, 45.0), 0.003, 9));

    let a = generate_timing_points(&onsets, 120.0, 0.0, 45.0, &config).unwrap();
    let b = generate_timing_points(&onsets, 120.0, 0.0, 45.0, &config).unwrap();

    assert_eq!(a.points, b.points);
    assert_eq!(a.stats, b.stats);
}

#[test]
fn test_click_track_analysis_recovers_tempo() {
    let mut config = AppConfig::default();
    config.tempo.bpm_hint = Some(120.0);
    let sample_rate = config.audio.target_sample_rate;
    let samples = render_click_track(&ClickPattern::steady(120.0), 8.0, sample_rate);

    let report = analyze_samples(&samples, sample_rate, &config).unwrap();

    assert!(report.onsets.len() >= 14, "{} onsets", report.onsets.len());
    assert!((report.tempo.bpm - 120.0).abs() < 3.0, "tempo {}", report.tempo.bpm);
    assert!(!report.tempo.fallback);
    assert!((report.duration - 8.0).abs() < 1e-3);

    let points = &report.timing.points;
    assert_well_formed(points, &config.timing);
    assert!((points[0].bpm - 120.0).abs() < 3.0);
    assert!(points[0].time >= 0.0 && points[0].time < 1.0);
}

#[test]
fn test_percussive_analysis_on_click_track() {
    let mut config = AppConfig::default();
    config.tempo.bpm_hint = Some(120.0);
    config.onset_detection.percussive = true;
    let sample_rate = config.audio.target_sample_rate;
    let samples = render_click_track(&ClickPattern::steady(120.0), 6.0, sample_rate);

    let report = analyze_samples(&samples, sample_rate, &config).unwrap();

    assert!(!report.onsets.is_empty());
    assert_well_formed(&report.timing.points, &config.timing);
}
