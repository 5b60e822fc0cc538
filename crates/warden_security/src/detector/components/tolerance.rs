//! # Tolerance Scaling
//!
//! One multiplier per observation, widening every detector's acceptance
//! band under high ping, server lag, or shortly after an exemption ended:
//!
//! ```text
//! scale = 1
//!       + ping_weight * min(ping, ping_cap) / 1000
//!       + tps_weight  * max(0, 1 - tps / nominal_tps)
//!       + recent_cause_bonus   (if an exemption ended recently)
//! ```

use serde::{Deserialize, Serialize};
use warden_shared::TICK_RATE;

/// Tolerance tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Scale gained per 1000 ms of ping.
    pub ping_weight: f64,
    /// Ping above this no longer widens tolerance.
    pub ping_cap_ms: f64,
    /// Scale gained at zero TPS.
    pub tps_weight: f64,
    /// Scale gained when an exemption ended recently.
    pub recent_cause_bonus: f64,
    /// How long after an exemption the bonus applies.
    pub recent_cause_window_ms: u64,
    /// EWMA smoothing factor for ping.
    pub ping_smoothing: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            ping_weight: 0.5,
            ping_cap_ms: 1_000.0,
            tps_weight: 1.0,
            recent_cause_bonus: 0.5,
            recent_cause_window_ms: 2_000,
            ping_smoothing: 0.2,
        }
    }
}

/// Tolerance in effect for one observation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerance {
    scale: f64,
}

impl Tolerance {
    /// No widening.
    pub const STRICT: Self = Self { scale: 1.0 };

    /// Computes the scale from current network and server conditions.
    #[must_use]
    pub fn compute(config: &ToleranceConfig, ping_ms: f64, server_tps: f64, recent_cause: bool) -> Self {
        let ping = if ping_ms.is_finite() {
            ping_ms.clamp(0.0, config.ping_cap_ms)
        } else {
            0.0
        };
        let tps = if server_tps.is_finite() {
            server_tps.clamp(0.0, TICK_RATE)
        } else {
            TICK_RATE
        };

        let mut scale = 1.0;
        scale += config.ping_weight * ping / 1_000.0;
        scale += config.tps_weight * (1.0 - tps / TICK_RATE).max(0.0);
        if recent_cause {
            scale += config.recent_cause_bonus;
        }
        Self { scale }
    }

    /// The multiplier, always at least 1.0.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Widens `base` by the scale.
    #[must_use]
    pub fn apply(&self, base: f64) -> f64 {
        base * self.scale
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::STRICT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ideal_conditions_are_strict() {
        let t = Tolerance::compute(&ToleranceConfig::default(), 0.0, 20.0, false);
        assert_eq!(t.scale(), 1.0);
    }

    #[test]
    fn test_ping_lag_and_recent_cause_widen() {
        let config = ToleranceConfig::default();
        let base = Tolerance::compute(&config, 0.0, 20.0, false).scale();
        let ping = Tolerance::compute(&config, 200.0, 20.0, false).scale();
        let lag = Tolerance::compute(&config, 0.0, 10.0, false).scale();
        let recent = Tolerance::compute(&config, 0.0, 20.0, true).scale();
        assert!((ping - 1.1).abs() < 1e-12);
        assert!((lag - 1.5).abs() < 1e-12);
        assert!(recent > base);
    }

    #[test]
    fn test_ping_is_capped() {
        let config = ToleranceConfig::default();
        let a = Tolerance::compute(&config, 1_000.0, 20.0, false);
        let b = Tolerance::compute(&config, 60_000.0, 20.0, false);
        assert_eq!(a, b);
        let nan = Tolerance::compute(&config, f64::NAN, f64::NAN, false);
        assert_eq!(nan.scale(), 1.0);
    }
}
