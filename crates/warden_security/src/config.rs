//! # Engine Configuration
//!
//! Every field has a default, so an empty TOML document is a valid config.
//!
//! ```toml
//! workers = 8
//!
//! [exemptions]
//! join_ms = 5000
//!
//! [detectors.gravity]
//! max_violation = 15.0
//! shared_buffer = false
//!
//! [detectors.attack_pattern.debounce]
//! min_consecutive = 4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use warden_physics::{GravityModel, SpeedModel};

use crate::detector::combat::{
    AttackPatternConfig, AttackRateConfig, DeadActionConfig, SprintHitConfig, SwingTimingConfig,
};
use crate::detector::components::ToleranceConfig;
use crate::detector::movement::{
    AirStrafeConfig, GravityConfig, GroundSpoofConfig, KeepSprintConfig, PhaseConfig, SpeedConfig,
    TrajectoryConfig,
};
use crate::detector::packet_timing::PacketTimingConfig;
use crate::detector::{DetectorId, PhysicsModels};
use crate::error::{ConfigError, ConfigResult};
use crate::exemption::ExemptionReason;
use crate::violation::DetectorSettings;

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads in the observation pool.
    pub workers: usize,
    /// Per-worker job queue capacity.
    pub queue_capacity: usize,
    /// Outbox channel capacity.
    pub outbox_capacity: usize,
    /// How long a leave is remembered for the rejoin guard.
    pub tombstone_ttl_ms: u64,
    /// Default exemption durations.
    pub exemptions: ExemptionDurations,
    /// Tolerance scaling.
    pub tolerance: ToleranceConfig,
    /// Vertical motion model.
    pub gravity_model: GravityModel,
    /// Horizontal speed model.
    pub speed_model: SpeedModel,
    /// Per-detector settings.
    pub detectors: DetectorsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 4_096,
            outbox_capacity: 8_192,
            tombstone_ttl_ms: 30_000,
            exemptions: ExemptionDurations::default(),
            tolerance: ToleranceConfig::default(),
            gravity_model: GravityModel::default(),
            speed_model: SpeedModel::default(),
            detectors: DetectorsConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Parse failure or out-of-range values.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// I/O failure, parse failure or out-of-range values.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks every range constraint.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending field, or
    /// [`ConfigError::Detector`] for a detector setting.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 || self.outbox_capacity == 0 {
            return Err(ConfigError::Invalid("queue capacities must be at least 1".into()));
        }
        let t = &self.tolerance;
        if !(t.ping_weight >= 0.0 && t.tps_weight >= 0.0 && t.recent_cause_bonus >= 0.0) {
            return Err(ConfigError::Invalid("tolerance weights must be non-negative".into()));
        }
        if !(t.ping_smoothing > 0.0 && t.ping_smoothing <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "tolerance.ping_smoothing must be in (0, 1], got {}",
                t.ping_smoothing
            )));
        }
        if !(self.gravity_model.drag > 0.0 && self.gravity_model.drag <= 1.0) {
            return Err(ConfigError::Invalid("gravity_model.drag must be in (0, 1]".into()));
        }
        if !(self.gravity_model.terminal_velocity > 0.0) {
            return Err(ConfigError::Invalid(
                "gravity_model.terminal_velocity must be positive".into(),
            ));
        }
        if !(self.speed_model.hard_cap > 0.0 && self.speed_model.safety_margin >= 1.0) {
            return Err(ConfigError::Invalid(
                "speed_model.hard_cap must be positive and safety_margin at least 1".into(),
            ));
        }
        self.detectors.validate()
    }

    /// Physics models handed to detectors.
    #[must_use]
    pub fn physics(&self) -> PhysicsModels {
        PhysicsModels {
            gravity: self.gravity_model,
            speed: self.speed_model,
        }
    }
}

/// Exemption durations used when the engine marks exemptions itself, and
/// when a trace names a reason without a duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExemptionDurations {
    /// After join.
    pub join_ms: u64,
    /// After respawn.
    pub respawn_ms: u64,
    /// After a server teleport.
    pub teleport_ms: u64,
    /// After damage.
    pub damage_ms: u64,
    /// After server-applied velocity.
    pub velocity_ms: u64,
    /// After a nearby terrain change.
    pub terrain_ms: u64,
}

impl Default for ExemptionDurations {
    fn default() -> Self {
        Self {
            join_ms: 3_000,
            respawn_ms: 3_000,
            teleport_ms: 1_000,
            damage_ms: 500,
            velocity_ms: 1_500,
            terrain_ms: 1_000,
        }
    }
}

impl ExemptionDurations {
    /// Default duration for `reason`.
    #[must_use]
    pub const fn duration_for(&self, reason: ExemptionReason) -> u64 {
        match reason {
            ExemptionReason::Join => self.join_ms,
            ExemptionReason::Respawn => self.respawn_ms,
            ExemptionReason::Teleport => self.teleport_ms,
            ExemptionReason::Damage => self.damage_ms,
            ExemptionReason::Velocity => self.velocity_ms,
            ExemptionReason::Terrain => self.terrain_ms,
        }
    }
}

/// Settings of every detector.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorsConfig {
    /// Gravity detector.
    pub gravity: GravityConfig,
    /// Speed detector.
    pub speed: SpeedConfig,
    /// Trajectory detector.
    pub trajectory: TrajectoryConfig,
    /// Phase detector.
    pub phase: PhaseConfig,
    /// Ground spoof detector.
    pub ground_spoof: GroundSpoofConfig,
    /// Air strafe detector.
    pub air_strafe: AirStrafeConfig,
    /// Keep sprint detector.
    pub keep_sprint: KeepSprintConfig,
    /// Swing timing detector.
    pub swing_timing: SwingTimingConfig,
    /// Attack rate detector.
    pub attack_rate: AttackRateConfig,
    /// Attack pattern detector.
    pub attack_pattern: AttackPatternConfig,
    /// Dead action detector.
    pub dead_action: DeadActionConfig,
    /// Sprint hit detector.
    pub sprint_hit: SprintHitConfig,
    /// Packet timing detector.
    pub packet_timing: PacketTimingConfig,
}

impl DetectorsConfig {
    /// Accumulation settings of `id`.
    #[must_use]
    pub fn settings(&self, id: DetectorId) -> &DetectorSettings {
        match id {
            DetectorId::Gravity => &self.gravity.settings,
            DetectorId::Speed => &self.speed.settings,
            DetectorId::Trajectory => &self.trajectory.settings,
            DetectorId::Phase => &self.phase.settings,
            DetectorId::GroundSpoof => &self.ground_spoof.settings,
            DetectorId::AirStrafe => &self.air_strafe.settings,
            DetectorId::KeepSprint => &self.keep_sprint.settings,
            DetectorId::SwingTiming => &self.swing_timing.settings,
            DetectorId::AttackRate => &self.attack_rate.settings,
            DetectorId::AttackPattern => &self.attack_pattern.settings,
            DetectorId::DeadAction => &self.dead_action.settings,
            DetectorId::SprintHit => &self.sprint_hit.settings,
            DetectorId::PacketTiming => &self.packet_timing.settings,
        }
    }

    /// Mutable accumulation settings of `id`.
    pub fn settings_mut(&mut self, id: DetectorId) -> &mut DetectorSettings {
        match id {
            DetectorId::Gravity => &mut self.gravity.settings,
            DetectorId::Speed => &mut self.speed.settings,
            DetectorId::Trajectory => &mut self.trajectory.settings,
            DetectorId::Phase => &mut self.phase.settings,
            DetectorId::GroundSpoof => &mut self.ground_spoof.settings,
            DetectorId::AirStrafe => &mut self.air_strafe.settings,
            DetectorId::KeepSprint => &mut self.keep_sprint.settings,
            DetectorId::SwingTiming => &mut self.swing_timing.settings,
            DetectorId::AttackRate => &mut self.attack_rate.settings,
            DetectorId::AttackPattern => &mut self.attack_pattern.settings,
            DetectorId::DeadAction => &mut self.dead_action.settings,
            DetectorId::SprintHit => &mut self.sprint_hit.settings,
            DetectorId::PacketTiming => &mut self.packet_timing.settings,
        }
    }

    /// Disables every detector not in `keep`.
    pub fn enable_only(&mut self, keep: &[DetectorId]) {
        for id in DetectorId::ALL {
            self.settings_mut(id).enabled = keep.contains(&id);
        }
    }

    /// Checks every detector's ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Detector`] wrapping the first out-of-range setting.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |id: DetectorId, source: ConfigError| ConfigError::Detector {
            detector: id.name(),
            source: Box::new(source),
        };
        for id in DetectorId::ALL {
            self.settings(id).validate().map_err(|m| invalid(id, m))?;
        }
        self.gravity.debounce.validate().map_err(|m| invalid(DetectorId::Gravity, m))?;
        self.speed.validate().map_err(|m| invalid(DetectorId::Speed, m))?;
        self.trajectory.validate().map_err(|m| invalid(DetectorId::Trajectory, m))?;
        self.phase.validate().map_err(|m| invalid(DetectorId::Phase, m))?;
        self.ground_spoof.debounce.validate().map_err(|m| invalid(DetectorId::GroundSpoof, m))?;
        self.air_strafe.debounce.validate().map_err(|m| invalid(DetectorId::AirStrafe, m))?;
        self.keep_sprint.debounce.validate().map_err(|m| invalid(DetectorId::KeepSprint, m))?;
        self.swing_timing.debounce.validate().map_err(|m| invalid(DetectorId::SwingTiming, m))?;
        self.attack_rate.validate().map_err(|m| invalid(DetectorId::AttackRate, m))?;
        self.attack_pattern.validate().map_err(|m| invalid(DetectorId::AttackPattern, m))?;
        self.dead_action.debounce.validate().map_err(|m| invalid(DetectorId::DeadAction, m))?;
        self.sprint_hit.debounce.validate().map_err(|m| invalid(DetectorId::SprintHit, m))?;
        self.packet_timing.validate().map_err(|m| invalid(DetectorId::PacketTiming, m))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            workers = 2

            [exemptions]
            join_ms = 100

            [detectors.gravity]
            max_violation = 20.0
            shared_buffer = false

            [detectors.gravity.debounce]
            min_consecutive = 4

            [detectors.speed]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.exemptions.join_ms, 100);
        assert_eq!(config.exemptions.respawn_ms, 3_000);
        assert_eq!(config.detectors.gravity.settings.max_violation, 20.0);
        assert!(!config.detectors.gravity.shared_buffer);
        assert_eq!(config.detectors.gravity.debounce.min_consecutive, 4);
        assert!(!config.detectors.settings(DetectorId::Speed).enabled);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_toml_str("workers = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_toml_str("[detectors.phase]\nretain_ratio = 1.5").unwrap_err();
        assert!(err.to_string().contains("phase"));
        match err {
            ConfigError::Detector { detector, source } => {
                assert_eq!(detector, "phase");
                assert!(matches!(*source, ConfigError::OutOfRange { field: "retain_ratio", .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = EngineConfig::from_toml_str("[detectors.phase.debounce]\nmin_consecutive = 0").unwrap_err();
        assert!(err.to_string().contains("debounce.min_consecutive"));

        assert!(matches!(
            EngineConfig::from_toml_str("workers = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/nonexistent/warden.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_enable_only() {
        let mut detectors = DetectorsConfig::default();
        detectors.enable_only(&[DetectorId::Gravity]);
        assert!(detectors.settings(DetectorId::Gravity).enabled);
        assert!(!detectors.settings(DetectorId::PacketTiming).enabled);
    }
}
