//! # Packet Timing Detector
//!
//! A client sends one movement message per tick. Over a window of arrival
//! intervals:
//!
//! | Check    | Fires when                                          |
//! |----------|-----------------------------------------------------|
//! | speedup  | mean interval is short enough to run the game fast  |
//! | slowdown | mean interval is long while the server is healthy   |
//! | pacing   | interval spread is below any real network's jitter  |
//!
//! Each check has its own debounce. Intervals are clamped so one long stall
//! cannot dominate the mean, and a stall followed by a catch-up burst
//! averages back to the nominal rate.

use serde::{Deserialize, Serialize};
use warden_physics::{mean, std_dev};

use super::components::{Debounce, DebounceConfig, SampleWindow};
use super::{Detector, DetectorContext, DetectorId, Finding};
use crate::error::{ConfigError, ConfigResult, DetectorError};
use crate::violation::DetectorSettings;

/// Packet timing detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketTimingConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation for the speedup check.
    pub speedup: DebounceConfig,
    /// Escalation for the slowdown check.
    pub slowdown: DebounceConfig,
    /// Escalation for the pacing check.
    pub pacing: DebounceConfig,
    /// Intervals kept.
    pub window: usize,
    /// Intervals required before judging.
    pub min_samples: usize,
    /// Nominal interval between movement messages.
    pub expected_interval_ms: f64,
    /// Rate above nominal, as a ratio, that counts as speedup.
    pub speedup_ratio: f64,
    /// Rate below nominal, as a ratio, that counts as slowdown.
    pub slowdown_ratio: f64,
    /// Server TPS at or above which slowdown is the client's doing.
    pub healthy_tps: f64,
    /// Interval spread below which pacing is machine-perfect.
    pub min_std_dev_ms: f64,
    /// Clamp for a single interval.
    pub max_interval_ms: u64,
}

impl Default for PacketTimingConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::default(),
            speedup: DebounceConfig::new(3, 5.0),
            slowdown: DebounceConfig::new(3, 5.0),
            pacing: DebounceConfig::new(3, 5.0),
            window: 40,
            min_samples: 20,
            expected_interval_ms: warden_shared::TICK_INTERVAL_MS,
            speedup_ratio: 1.1,
            slowdown_ratio: 0.8,
            healthy_tps: warden_shared::HEALTHY_TPS,
            min_std_dev_ms: 0.5,
            max_interval_ms: 1_000,
        }
    }
}

impl PacketTimingConfig {
    pub(crate) fn validate(&self) -> ConfigResult<()> {
        self.speedup.validate()?;
        self.slowdown.validate()?;
        self.pacing.validate()?;
        if self.min_samples < 2 || self.min_samples > self.window {
            return Err(ConfigError::out_of_range(
                "min_samples",
                format!("must be in [2, window], got {} with window {}", self.min_samples, self.window),
            ));
        }
        if !(self.expected_interval_ms > 0.0) {
            return Err(ConfigError::out_of_range("expected_interval_ms", "must be positive"));
        }
        if !(self.speedup_ratio > 1.0) {
            return Err(ConfigError::out_of_range(
                "speedup_ratio",
                format!("must exceed 1, got {}", self.speedup_ratio),
            ));
        }
        if !(self.slowdown_ratio > 0.0 && self.slowdown_ratio < 1.0) {
            return Err(ConfigError::out_of_range(
                "slowdown_ratio",
                format!("must be in (0, 1), got {}", self.slowdown_ratio),
            ));
        }
        Ok(())
    }
}

/// Movement packet cadence.
#[derive(Debug)]
pub struct PacketTimingDetector {
    config: PacketTimingConfig,
    intervals: SampleWindow<f64>,
    speedup: Debounce,
    slowdown: Debounce,
    pacing: Debounce,
}

impl PacketTimingDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &PacketTimingConfig) -> Self {
        Self {
            config: config.clone(),
            intervals: SampleWindow::new(config.window),
            speedup: Debounce::new(config.speedup),
            slowdown: Debounce::new(config.slowdown),
            pacing: Debounce::new(config.pacing),
        }
    }
}

impl Detector for PacketTimingDetector {
    fn id(&self) -> DetectorId {
        DetectorId::PacketTiming
    }

    fn observe(&mut self, ctx: &DetectorContext<'_>) -> Result<Option<Finding>, DetectorError> {
        let obs = ctx.obs();
        if !obs.kind.is_movement_class() {
            return Ok(None);
        }
        if ctx.is_exempt() {
            self.reset();
            return Ok(None);
        }
        let Some(last) = ctx.motion.last_movement_ms else {
            return Ok(None);
        };

        let interval = obs.timestamp_ms.saturating_sub(last).min(self.config.max_interval_ms);
        self.intervals.push(interval as f64);
        if self.intervals.len() < self.config.min_samples {
            return Ok(None);
        }

        let samples = self.intervals.to_vec();
        let avg = mean(&samples);
        let spread = std_dev(&samples);
        let expected = self.config.expected_interval_ms;
        let scale = ctx.tolerance.scale();
        let speedup_limit = expected / (1.0 + (self.config.speedup_ratio - 1.0) * scale);
        let slowdown_limit = expected / self.config.slowdown_ratio;
        let server_healthy = obs.server_tps >= self.config.healthy_tps;

        let mut evidence = Vec::new();
        if self.speedup.observe(avg < speedup_limit).is_some() {
            evidence.push(format!("speedup: mean {avg:.1}ms < {speedup_limit:.1}ms"));
        }
        if self
            .slowdown
            .observe(server_healthy && avg > slowdown_limit)
            .is_some()
        {
            evidence.push(format!(
                "slowdown: mean {avg:.1}ms > {slowdown_limit:.1}ms at {:.1} tps",
                obs.server_tps
            ));
        }
        if self.pacing.observe(spread < self.config.min_std_dev_ms).is_some() {
            evidence.push(format!("pacing: σ={spread:.3}ms"));
        }

        if evidence.is_empty() {
            return Ok(None);
        }
        let severity = self.config.settings.weight * evidence.len() as f64;
        Ok(Some(ctx.finding(DetectorId::PacketTiming, severity, evidence.join("; "))))
    }

    fn reset(&mut self) {
        self.intervals.clear();
        self.speedup.reset();
        self.slowdown.reset();
        self.pacing.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::Harness;
    use crate::observation::{Observation, ObservationKind};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Feeds `count` flying packets spaced `interval ± jitter` ms apart.
    fn stream(interval: u64, jitter: u64, tps: f64, count: u64) -> Vec<Finding> {
        let mut rng = StdRng::seed_from_u64(interval * 31 + jitter);
        let mut harness = Harness::new();
        let mut detector = PacketTimingDetector::new(&PacketTimingConfig::default());
        let mut t = 10_000;
        (0..count)
            .filter_map(|seq| {
                t += interval - jitter + rng.gen_range(0..=jitter * 2);
                let obs = Observation::builder(seq, t)
                    .kind(ObservationKind::Flying)
                    .server_tps(tps)
                    .build();
                harness.feed(&mut detector, obs)
            })
            .collect()
    }

    #[test]
    fn test_jittered_nominal_rate_is_clean() {
        assert!(stream(50, 5, 20.0, 200).is_empty());
    }

    #[test]
    fn test_fast_stream_flags_speedup() {
        let findings = stream(40, 5, 20.0, 200);
        assert!(findings.iter().any(|f| f.evidence.contains("speedup")));
    }

    #[test]
    fn test_slow_stream_flags_only_on_healthy_server() {
        let healthy = stream(80, 5, 20.0, 200);
        assert!(healthy.iter().any(|f| f.evidence.contains("slowdown")));
        assert!(stream(80, 5, 15.0, 200).is_empty());
    }

    #[test]
    fn test_perfect_pacing_flags() {
        let findings = stream(50, 0, 20.0, 100);
        assert!(!findings.is_empty());
        assert!(findings.iter().all(|f| f.evidence.contains("pacing")));
    }

    #[test]
    fn test_stall_then_burst_averages_out() {
        let mut harness = Harness::new();
        let mut detector = PacketTimingDetector::new(&PacketTimingConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        let mut t = 10_000;
        let mut seq = 0;
        let mut findings = 0;
        for round in 0..10 {
            for i in 0..20 {
                // One 500 ms stall per round, then ten packets in a burst.
                t += match (round, i) {
                    (_, 0) => 500,
                    (_, 1..=10) => rng.gen_range(1..=3),
                    _ => rng.gen_range(45..=55),
                };
                seq += 1;
                let obs = Observation::builder(seq, t).kind(ObservationKind::Flying).build();
                findings += usize::from(harness.feed(&mut detector, obs).is_some());
            }
        }
        assert_eq!(findings, 0);
    }
}
