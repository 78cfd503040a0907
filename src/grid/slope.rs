//! Robust slope of timing error versus beat index
//!
//! Both axes are centred on their medians rather than their means, so a few
//! outlying errors (or gaps left by unmatched beats) pull the centre less.
//! The slope itself is the least-squares ratio on the centred values:
//!
//! slope = Σ(x₀·y₀) / Σ(x₀²)
//!
//! Units follow the inputs: seconds of error per beat.

use crate::stats::median;

/// Fewer samples than this always yield a slope of 0
pub const MIN_SLOPE_SAMPLES: usize = 6;

/// Denominators at or below this are treated as degenerate
const DEGENERATE_DENOMINATOR: f64 = 1e-12;

/// Slope of `errors` against `beat_indices` (seconds per beat)
///
/// Returns 0.0 when fewer than [`MIN_SLOPE_SAMPLES`] pairs are given, when
/// the slices differ in length, or when every beat index is the same.
pub fn robust_slope(beat_indices: &[f64], errors: &[f64]) -> f64 {
    if beat_indices.len() != errors.len() || beat_indices.len() < MIN_SLOPE_SAMPLES {
        return 0.0;
    }

    let x_median = median(beat_indices);
    let y_median = median(errors);

    let (numerator, denominator) = beat_indices.iter().zip(errors.iter()).fold(
        (0.0, 0.0),
        |(num, den), (&x, &y)| {
            let x0 = x - x_median;
            let y0 = y - y_median;
            (num + x0 * y0, den + x0 * x0)
        },
    );

    if denominator <= DEGENERATE_DENOMINATOR {
        return 0.0;
    }
    numerator / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(a: f64, b: f64, indices: &[f64]) -> Vec<f64> {
        indices.iter().map(|&i| a + b * i).collect()
    }

    #[test]
    fn test_exact_for_linear_errors() {
        let indices: Vec<f64> = (10..34).map(f64::from).collect();
        for &(a, b) in &[(0.0, 0.002), (0.025, -0.0015), (-0.3, 0.0), (1.0, 0.01)] {
            let slope = robust_slope(&indices, &linear(a, b, &indices));
            assert!(
                (slope - b).abs() < 1e-12,
                "expected slope {} (offset {}), got {}",
                b,
                a,
                slope
            );
        }
    }

    #[test]
    fn test_exact_with_gaps_in_indices() {
        // Unmatched beats leave holes in the index sequence
        let indices = [3.0, 4.0, 7.0, 8.0, 9.0, 15.0, 16.0];
        let slope = robust_slope(&indices, &linear(0.01, -0.0007, &indices));
        assert!((slope + 0.0007).abs() < 1e-12);
    }

    #[test]
    fn test_requires_six_samples() {
        let indices = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(robust_slope(&indices, &linear(0.0, 0.01, &indices)), 0.0);

        let indices = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((robust_slope(&indices, &linear(0.0, 0.01, &indices)) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_indices_yield_zero() {
        let indices = [5.0; 8];
        let errors = [0.0, 0.01, 0.02, 0.03, 0.04, 0.05, 0.06, 0.07];
        assert_eq!(robust_slope(&indices, &errors), 0.0);
    }

    #[test]
    fn test_mismatched_lengths_yield_zero() {
        assert_eq!(robust_slope(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0], &[0.0; 5]), 0.0);
    }
}
