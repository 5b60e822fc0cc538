//! # Sample Statistics
//!
//! Humans are noisy. Machines are not. The regularity score turns the
//! coefficient of variation of a sample window into a `[0, 1]` suspicion
//! value:
//!
//! ```text
//! regularity = exp(-k * cv)
//! ```
//!
//! A constant sequence has `cv = 0` and scores 1.0. A uniform random
//! sequence has `cv ≈ 0.58` and scores ≈ 0.05 with the default `k`.

/// Sharpness `k` of the regularity curve.
pub const REGULARITY_SHARPNESS: f64 = 5.0;

/// Values closer to zero than this are treated as zero.
const EPSILON: f64 = 1e-9;

/// Arithmetic mean. Zero for an empty slice.
#[must_use]
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Population variance. Zero for fewer than two samples.
#[must_use]
pub fn variance(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let m = mean(samples);
    samples.iter().map(|s| (s - m) * (s - m)).sum::<f64>() / samples.len() as f64
}

/// Population standard deviation.
#[must_use]
pub fn std_dev(samples: &[f64]) -> f64 {
    variance(samples).sqrt()
}

/// Standard deviation relative to the mean magnitude.
///
/// A zero-mean sequence is either perfectly flat (`0.0`) or unbounded
/// (`f64::INFINITY`).
#[must_use]
pub fn coefficient_of_variation(samples: &[f64]) -> f64 {
    let sd = std_dev(samples);
    let m = mean(samples).abs();
    if m < EPSILON {
        return if sd < EPSILON { 0.0 } else { f64::INFINITY };
    }
    sd / m
}

/// Consistency of a sample window in `[0, 1]`; 1.0 is perfectly regular.
///
/// Fewer than two samples carry no evidence and score 0.0.
#[must_use]
pub fn regularity_score(samples: &[f64]) -> f64 {
    if samples.len() < 2 || samples.iter().any(|s| !s.is_finite()) {
        return 0.0;
    }
    let cv = coefficient_of_variation(samples);
    if cv.is_infinite() {
        return 0.0;
    }
    (-REGULARITY_SHARPNESS * cv).exp().clamp(0.0, 1.0)
}

/// Normalized autocorrelation at `lag`, in `[-1, 1]`.
///
/// Zero when the series is flat or too short for the lag.
#[must_use]
pub fn autocorrelation(samples: &[f64], lag: usize) -> f64 {
    if lag == 0 || samples.len() <= lag + 1 {
        return 0.0;
    }
    let m = mean(samples);
    let denom: f64 = samples.iter().map(|s| (s - m) * (s - m)).sum();
    if denom < EPSILON {
        return 0.0;
    }
    let num: f64 = samples
        .iter()
        .zip(&samples[lag..])
        .map(|(a, b)| (a - m) * (b - m))
        .sum();
    (num / denom).clamp(-1.0, 1.0)
}

/// Strongest positive autocorrelation over `min_lag..=max_lag`.
///
/// Returns `(lag, value)`, or `None` if no lag fits the series.
#[must_use]
pub fn peak_autocorrelation(samples: &[f64], min_lag: usize, max_lag: usize) -> Option<(usize, f64)> {
    (min_lag.max(1)..=max_lag)
        .filter(|lag| samples.len() > lag + 1)
        .map(|lag| (lag, autocorrelation(samples, lag)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Number of sign flips, ignoring values within `dead_zone` of zero.
#[must_use]
pub fn sign_changes(samples: &[f64], dead_zone: f64) -> usize {
    let mut changes = 0;
    let mut last_sign = 0.0_f64;
    for &s in samples {
        if s.abs() <= dead_zone {
            continue;
        }
        let sign = s.signum();
        if last_sign != 0.0 && sign != last_sign {
            changes += 1;
        }
        last_sign = sign;
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_mean_and_variance() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&samples), 5.0);
        assert_eq!(variance(&samples), 4.0);
        assert_eq!(std_dev(&samples), 2.0);
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(mean(&[] as &[f64]), 0.0);
        assert_eq!(variance(&[3.0]), 0.0);
        assert_eq!(regularity_score(&[] as &[f64]), 0.0);
        assert_eq!(regularity_score(&[1.0]), 0.0);
    }

    #[test]
    fn test_constant_sequence_is_perfectly_regular() {
        assert_eq!(regularity_score(&[100.0; 20]), 1.0);
        assert_eq!(regularity_score(&[-0.25; 5]), 1.0);
        assert_eq!(regularity_score(&[0.0; 8]), 1.0);
    }

    #[test]
    fn test_zero_mean_noise_scores_zero() {
        assert_eq!(regularity_score(&[1.0, -1.0, 1.0, -1.0]), 0.0);
    }

    #[test]
    fn test_random_sequence_scores_low() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for _ in 0..50 {
            let samples: Vec<f64> = (0..40).map(|_| rng.gen_range(0.0..200.0)).collect();
            let score = regularity_score(&samples);
            assert!(score < 0.2, "score {score}");
        }
    }

    #[test]
    fn test_regularity_decreases_with_noise() {
        let tight: Vec<f64> = (0..20).map(|i| 100.0 + f64::from(i % 2)).collect();
        let loose: Vec<f64> = (0..20).map(|i| 100.0 + 30.0 * f64::from(i % 2)).collect();
        assert!(regularity_score(&tight) > regularity_score(&loose));
    }

    #[test]
    fn test_autocorrelation_of_oscillation() {
        let wave: Vec<f64> = (0..24).map(|i| (f64::from(i) * std::f64::consts::PI / 3.0).sin()).collect();
        let (lag, value) = peak_autocorrelation(&wave, 2, 10).unwrap();
        assert_eq!(lag, 6);
        assert!(value > 0.6, "value {value}");
        assert_eq!(autocorrelation(&[1.0; 10], 2), 0.0);
    }

    #[test]
    fn test_sign_changes() {
        assert_eq!(sign_changes(&[0.1, -0.1, 0.1, -0.1], 0.01), 3);
        assert_eq!(sign_changes(&[0.1, 0.0, 0.1, 0.001], 0.01), 0);
    }
}
