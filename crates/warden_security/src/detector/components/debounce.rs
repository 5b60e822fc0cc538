//! # Debounce Buffer
//!
//! Single-tick anomalies are ignored. A detector reports each tick as
//! exceeding or clean; the buffer escalates only once the exceedances are
//! both consecutive enough and accumulated enough:
//!
//! ```text
//! exceed:  consecutive += 1; buffer += increment
//!          escalate when consecutive >= min_consecutive && buffer >= threshold
//!          on escalate: buffer *= retain_ratio
//! clean:   consecutive = 0; buffer = max(0, buffer - decay)
//! ```
//!
//! Keeping part of the buffer after escalation means a following borderline
//! tick cannot flag immediately, while a sustained cheat re-flags quickly.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Debounce tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Consecutive exceedances required before escalating.
    pub min_consecutive: u32,
    /// Buffer value required before escalating.
    pub threshold: f64,
    /// Buffer gain per exceedance.
    pub increment: f64,
    /// Buffer loss per clean tick.
    pub decay: f64,
    /// Fraction of the buffer kept after escalating.
    pub retain_ratio: f64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            min_consecutive: 3,
            threshold: 5.0,
            increment: 1.0,
            decay: 0.25,
            retain_ratio: 0.5,
        }
    }
}

impl DebounceConfig {
    /// Shorthand for the two knobs that differ between detectors.
    #[must_use]
    pub fn new(min_consecutive: u32, threshold: f64) -> Self {
        Self {
            min_consecutive,
            threshold,
            ..Self::default()
        }
    }

    /// Checks ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::OutOfRange`] naming the first out-of-range field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_consecutive == 0 {
            return Err(ConfigError::out_of_range("debounce.min_consecutive", "must be at least 1"));
        }
        if !(self.threshold > 0.0) {
            return Err(ConfigError::out_of_range(
                "debounce.threshold",
                format!("must be positive, got {}", self.threshold),
            ));
        }
        if !(self.increment > 0.0) {
            return Err(ConfigError::out_of_range(
                "debounce.increment",
                format!("must be positive, got {}", self.increment),
            ));
        }
        if !(self.decay >= 0.0) {
            return Err(ConfigError::out_of_range(
                "debounce.decay",
                format!("must be non-negative, got {}", self.decay),
            ));
        }
        if !(0.0..1.0).contains(&self.retain_ratio) {
            return Err(ConfigError::out_of_range(
                "debounce.retain_ratio",
                format!("must be in [0, 1), got {}", self.retain_ratio),
            ));
        }
        Ok(())
    }
}

/// Consecutive counter plus leaky buffer.
#[derive(Clone, Debug)]
pub struct Debounce {
    config: DebounceConfig,
    buffer: f64,
    consecutive: u32,
}

impl Debounce {
    /// Fresh buffer.
    #[must_use]
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            buffer: 0.0,
            consecutive: 0,
        }
    }

    /// Records an exceeding tick. Returns the buffer value if it escalated.
    pub fn exceed(&mut self) -> Option<f64> {
        self.consecutive = self.consecutive.saturating_add(1);
        self.buffer += self.config.increment;
        if self.consecutive >= self.config.min_consecutive && self.buffer >= self.config.threshold {
            let escalated = self.buffer;
            self.buffer *= self.config.retain_ratio;
            return Some(escalated);
        }
        None
    }

    /// Records a clean tick.
    pub fn clean(&mut self) {
        self.consecutive = 0;
        self.buffer = (self.buffer - self.config.decay).max(0.0);
    }

    /// Records a tick, exceeding when `exceeded` is true.
    pub fn observe(&mut self, exceeded: bool) -> Option<f64> {
        if exceeded {
            self.exceed()
        } else {
            self.clean();
            None
        }
    }

    /// Forgets everything.
    pub fn reset(&mut self) {
        self.buffer = 0.0;
        self.consecutive = 0;
    }

    /// Current buffer value.
    #[must_use]
    pub fn buffer(&self) -> f64 {
        self.buffer
    }

    /// Current run of consecutive exceedances.
    #[must_use]
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tick_ignored() {
        let mut debounce = Debounce::new(DebounceConfig::new(3, 2.0));
        assert_eq!(debounce.exceed(), None);
        debounce.clean();
        assert_eq!(debounce.exceed(), None);
        debounce.clean();
        assert_eq!(debounce.consecutive(), 0);
    }

    #[test]
    fn test_escalates_after_consecutive_and_threshold() {
        let mut debounce = Debounce::new(DebounceConfig::new(3, 12.0));
        let fired: Vec<usize> = (1..=20)
            .filter(|_| debounce.exceed().is_some())
            .collect();
        // First at 12 exceedances, then every 6 (retain 0.5).
        assert_eq!(fired.first(), Some(&12));
        assert_eq!(fired.get(1), Some(&18));
    }

    #[test]
    fn test_retained_buffer_blocks_immediate_reflag() {
        let mut debounce = Debounce::new(DebounceConfig::new(1, 4.0));
        for _ in 0..3 {
            assert!(debounce.exceed().is_none());
        }
        assert_eq!(debounce.exceed(), Some(4.0));
        assert!(debounce.buffer() > 0.0);
        assert!(debounce.exceed().is_none());
    }

    #[test]
    fn test_buffer_never_negative() {
        let mut debounce = Debounce::new(DebounceConfig::new(1, 5.0));
        debounce.exceed();
        for _ in 0..50 {
            debounce.clean();
        }
        assert_eq!(debounce.buffer(), 0.0);
    }

    #[test]
    fn test_validate() {
        assert!(DebounceConfig::default().validate().is_ok());
        assert!(matches!(
            DebounceConfig::new(0, 1.0).validate(),
            Err(ConfigError::OutOfRange { field: "debounce.min_consecutive", .. })
        ));
        let bad = DebounceConfig {
            retain_ratio: 1.0,
            ..DebounceConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
