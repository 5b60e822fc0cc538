//! # Gravity Detector
//!
//! Predicts each airborne tick's vertical delta from the previous one and
//! flags deltas gravity cannot explain:
//!
//! | Heuristic              | Signal                                         |
//! |------------------------|------------------------------------------------|
//! | hover                  | `dy ≈ 0` where a fall was predicted            |
//! | insufficient fall      | `dy` above the prediction                      |
//! | upward acceleration    | rising again after the apex                    |
//! | terminal velocity      | falling faster than terminal velocity          |
//! | jump height            | take-off faster than the jump velocity         |
//!
//! With `shared_buffer` the heuristics feed one debounce, so alternating
//! between them does not dodge escalation.

use serde::{Deserialize, Serialize};
use warden_shared::SurfaceKind;

use super::{grounded, should_stand_down};
use crate::detector::components::{Debounce, DebounceConfig};
use crate::detector::{Detector, DetectorContext, DetectorId, Finding};
use crate::error::DetectorError;
use crate::violation::DetectorSettings;

/// Gravity detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravityConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation settings.
    pub debounce: DebounceConfig,
    /// Allowed deviation from the prediction, blocks per tick.
    pub tolerance: f64,
    /// `|dy|` at or below this counts as hovering.
    pub hover_epsilon: f64,
    /// One buffer for every heuristic instead of one each.
    pub shared_buffer: bool,
    /// Ticks skipped after leaving an unmodeled state.
    pub recovery_ticks: u32,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::default(),
            debounce: DebounceConfig::new(3, 12.0),
            tolerance: 0.005,
            hover_epsilon: 0.005,
            shared_buffer: true,
            recovery_ticks: 5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Anomaly {
    Hover,
    InsufficientFall,
    UpwardAcceleration,
    TerminalVelocity,
    JumpHeight,
}

impl Anomaly {
    const COUNT: usize = 5;

    const fn index(self) -> usize {
        match self {
            Self::Hover => 0,
            Self::InsufficientFall => 1,
            Self::UpwardAcceleration => 2,
            Self::TerminalVelocity => 3,
            Self::JumpHeight => 4,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Hover => "hover",
            Self::InsufficientFall => "insufficient fall",
            Self::UpwardAcceleration => "upward acceleration",
            Self::TerminalVelocity => "beyond terminal velocity",
            Self::JumpHeight => "jump too high",
        }
    }
}

/// Vertical motion vs. gravity prediction.
#[derive(Debug)]
pub struct GravityDetector {
    config: GravityConfig,
    buffers: Vec<Debounce>,
    recovery: u32,
}

impl GravityDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &GravityConfig) -> Self {
        let count = if config.shared_buffer { 1 } else { Anomaly::COUNT };
        Self {
            config: config.clone(),
            buffers: vec![Debounce::new(config.debounce); count],
            recovery: 0,
        }
    }

    fn slot(&self, anomaly: Anomaly) -> usize {
        if self.config.shared_buffer {
            0
        } else {
            anomaly.index()
        }
    }

    fn clean_all(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clean();
        }
    }

    fn classify(&self, ctx: &DetectorContext<'_>) -> Option<(Anomaly, f64, f64)> {
        let obs = ctx.obs();
        let model = &ctx.physics.gravity;
        let dy = obs.delta.y;
        let tolerance = ctx.tolerance.apply(self.config.tolerance);

        let was_grounded = grounded(
            ctx.motion.last_client_on_ground,
            ctx.motion.last_server_on_ground,
        );
        if was_grounded {
            let max_jump = model.jump_velocity(obs.effects.jump_level());
            return (dy > max_jump + tolerance).then_some((Anomaly::JumpHeight, dy, max_jump));
        }

        if dy < -model.terminal_velocity - tolerance {
            return Some((Anomaly::TerminalVelocity, dy, -model.terminal_velocity));
        }

        let last_dy = ctx.motion.last_delta.y;
        let predicted =
            model.predict_next_vertical_position(last_dy, false, obs.effects.slow_falling);
        if dy - predicted <= tolerance {
            return None;
        }
        let anomaly = if dy.abs() <= self.config.hover_epsilon {
            Anomaly::Hover
        } else if last_dy <= 0.0 && dy > 0.0 {
            Anomaly::UpwardAcceleration
        } else {
            Anomaly::InsufficientFall
        };
        Some((anomaly, dy, predicted))
    }
}

impl Detector for GravityDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Gravity
    }

    fn observe(&mut self, ctx: &DetectorContext<'_>) -> Result<Option<Finding>, DetectorError> {
        let obs = ctx.obs();
        if !obs.kind.has_position() {
            return Ok(None);
        }
        ctx.require_finite_motion()?;

        let bouncy = matches!(
            obs.environment.surface,
            Some(SurfaceKind::Slime | SurfaceKind::Honey)
        );
        if should_stand_down(ctx) || bouncy {
            self.reset();
            self.recovery = self.config.recovery_ticks;
            return Ok(None);
        }
        if self.recovery > 0 {
            self.recovery -= 1;
            return Ok(None);
        }
        if ctx.motion.movement_ticks == 0 || grounded(obs.client_on_ground, obs.server_on_ground) {
            self.clean_all();
            return Ok(None);
        }

        let Some((anomaly, dy, expected)) = self.classify(ctx) else {
            self.clean_all();
            return Ok(None);
        };

        let slot = self.slot(anomaly);
        for (i, buffer) in self.buffers.iter_mut().enumerate() {
            if i != slot {
                buffer.clean();
            }
        }
        let Some(buffer) = self.buffers[slot].exceed() else {
            return Ok(None);
        };

        Ok(Some(ctx.finding(
            DetectorId::Gravity,
            self.config.settings.weight,
            format!(
                "{}: dy={dy:.4} expected={expected:.4} buffer={buffer:.1}",
                anomaly.label()
            ),
        )))
    }

    fn reset(&mut self) {
        for buffer in &mut self.buffers {
            buffer.reset();
        }
        self.recovery = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::Harness;
    use crate::exemption::ExemptionReason;
    use crate::observation::{Observation, ObservationKind};
    use warden_physics::GravityModel;
    use warden_shared::Vec3;

    fn airborne(seq: u64, y: f64, dy: f64) -> Observation {
        Observation::builder(seq, seq * 50)
            .moved(Vec3::new(0.0, y - dy, 0.0), Vec3::new(0.0, y, 0.0))
            .on_ground(false)
            .build()
    }

    #[test]
    fn test_hover_flags_on_thirteenth_tick() {
        let mut harness = Harness::new();
        let mut detector = GravityDetector::new(&GravityConfig::default());
        let flagged: Vec<u64> = (1..=20)
            .filter(|&seq| harness.feed(&mut detector, airborne(seq, 70.0, 0.0)).is_some())
            .collect();
        assert_eq!(flagged.first(), Some(&13));
    }

    #[test]
    fn test_legit_jump_arc_is_clean() {
        let mut harness = Harness::new();
        let mut detector = GravityDetector::new(&GravityConfig::default());
        let model = GravityModel::default();

        let mut y = 64.0;
        harness.feed(&mut detector, Observation::builder(1, 50).at(Vec3::new(0.0, y, 0.0)).build());

        let mut dy = model.jump_velocity(0);
        for seq in 2..40 {
            y += dy;
            let obs = airborne(seq, y, dy);
            assert!(harness.feed(&mut detector, obs).is_none(), "tick {seq} dy {dy}");
            dy = model.predict_next_vertical_position(dy, false, false);
        }
    }

    #[test]
    fn test_flying_packets_mid_arc_keep_velocity() {
        let mut harness = Harness::new();
        let mut detector = GravityDetector::new(&GravityConfig::default());
        let model = GravityModel::default();

        let mut y = 64.0;
        harness.feed(&mut detector, Observation::builder(1, 50).at(Vec3::new(0.0, y, 0.0)).build());

        let mut dy = model.jump_velocity(0);
        for seq in 2..40 {
            y += dy;
            assert!(harness.feed(&mut detector, airborne(seq, y, dy)).is_none(), "tick {seq}");
            let flying = Observation::builder(seq, seq * 50 + 25)
                .kind(ObservationKind::Flying)
                .on_ground(false)
                .build();
            assert!(harness.feed(&mut detector, flying).is_none(), "flying after {seq}");
            assert!((harness.motion.last_delta.y - dy).abs() < 1e-12);
            dy = model.predict_next_vertical_position(dy, false, false);
        }
    }

    #[test]
    fn test_exemption_resets_buffer() {
        let mut harness = Harness::new();
        let mut detector = GravityDetector::new(&GravityConfig::default());
        for seq in 1..=10 {
            harness.feed(&mut detector, airborne(seq, 70.0, 0.0));
        }
        harness.exemptions.mark(ExemptionReason::Velocity, 500, 100);
        assert!(harness.feed(&mut detector, airborne(11, 70.0, 0.0)).is_none());
        assert_eq!(detector.buffers[0].buffer(), 0.0);
    }

    #[test]
    fn test_super_jump_flags() {
        let mut harness = Harness::new();
        let config = GravityConfig {
            debounce: DebounceConfig::new(1, 1.0),
            ..GravityConfig::default()
        };
        let mut detector = GravityDetector::new(&config);
        harness.feed(&mut detector, Observation::builder(1, 50).at(Vec3::new(0.0, 64.0, 0.0)).build());
        let finding = harness.feed(&mut detector, airborne(2, 65.0, 1.0)).unwrap();
        assert!(finding.evidence.starts_with("jump too high"));
    }

    #[test]
    fn test_independent_buffers() {
        let config = GravityConfig {
            shared_buffer: false,
            ..GravityConfig::default()
        };
        let detector = GravityDetector::new(&config);
        assert_eq!(detector.buffers.len(), Anomaly::COUNT);
        assert_eq!(detector.slot(Anomaly::TerminalVelocity), 3);
    }

    #[test]
    fn test_rejects_nan() {
        let mut harness = Harness::new();
        let mut detector = GravityDetector::new(&GravityConfig::default());
        harness.feed(&mut detector, airborne(1, 70.0, 0.0));
        let bad = airborne(2, f64::NAN, 0.0);
        let source = std::sync::Arc::new(bad);
        let ctx = DetectorContext {
            player: warden_shared::PlayerId(1),
            source: &source,
            motion: &harness.motion,
            combat: &harness.combat,
            exemptions: &harness.exemptions,
            environment: &harness.world,
            tolerance: harness.tolerance,
            physics: &harness.physics,
        };
        assert!(matches!(
            detector.observe(&ctx),
            Err(DetectorError::MalformedObservation(_))
        ));
    }
}
