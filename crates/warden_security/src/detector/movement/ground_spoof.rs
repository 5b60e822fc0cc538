//! # Ground Spoof Detector
//!
//! Clients that claim to stand on ground while falling avoid fall damage and
//! reset their jump state. The claim is compared with the server's ground
//! state; when the observation source does not supply one, the feet are
//! probed against the environment oracle.
//!
//! A divergence is forgiven when solid geometry sits just beside or below
//! the feet: block edges and partial blocks make the two computations
//! legitimately disagree there.

use serde::{Deserialize, Serialize};
use warden_shared::Vec3;

use super::should_stand_down;
use crate::detector::components::{Debounce, DebounceConfig};
use crate::detector::{Detector, DetectorContext, DetectorId, Finding};
use crate::environment::EnvironmentOracle;
use crate::error::DetectorError;
use crate::violation::DetectorSettings;

/// Half the width of a player's bounding box.
const HALF_WIDTH: f64 = 0.3;

/// Ground spoof detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundSpoofConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation settings.
    pub debounce: DebounceConfig,
    /// How far below the feet counts as contact.
    pub probe_depth: f64,
    /// Extra horizontal reach when looking for explaining geometry.
    pub nearby_horizontal: f64,
    /// Extra depth when looking for explaining geometry.
    pub nearby_vertical: f64,
}

impl Default for GroundSpoofConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::default(),
            debounce: DebounceConfig::new(3, 5.0),
            probe_depth: 0.05,
            nearby_horizontal: 0.3,
            nearby_vertical: 0.6,
        }
    }
}

/// Client ground claim vs. server ground state.
#[derive(Debug)]
pub struct GroundSpoofDetector {
    config: GroundSpoofConfig,
    debounce: Debounce,
}

fn any_solid_under(oracle: &dyn EnvironmentOracle, feet: Vec3, reach: f64, depth: f64) -> bool {
    let offsets = [-reach, 0.0, reach];
    offsets.iter().any(|&dx| {
        offsets
            .iter()
            .any(|&dz| !oracle.is_passable(Vec3::new(feet.x + dx, feet.y - depth, feet.z + dz)))
    })
}

impl GroundSpoofDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &GroundSpoofConfig) -> Self {
        Self {
            config: config.clone(),
            debounce: Debounce::new(config.debounce),
        }
    }

    fn server_ground(&self, oracle: &dyn EnvironmentOracle, feet: Vec3) -> bool {
        any_solid_under(oracle, feet, HALF_WIDTH, self.config.probe_depth)
    }

    fn explained_by_nearby(&self, oracle: &dyn EnvironmentOracle, feet: Vec3) -> bool {
        let reach = HALF_WIDTH + self.config.nearby_horizontal;
        let deepest = self.config.probe_depth + self.config.nearby_vertical;
        [self.config.probe_depth, deepest * 0.5, deepest]
            .into_iter()
            .any(|depth| any_solid_under(oracle, feet, reach, depth))
    }
}

impl Detector for GroundSpoofDetector {
    fn id(&self) -> DetectorId {
        DetectorId::GroundSpoof
    }

    fn observe(&mut self, ctx: &DetectorContext<'_>) -> Result<Option<Finding>, DetectorError> {
        let obs = ctx.obs();
        if !obs.kind.has_position() {
            return Ok(None);
        }
        ctx.require_finite_motion()?;
        if should_stand_down(ctx) {
            self.reset();
            return Ok(None);
        }
        if !obs.client_on_ground {
            self.debounce.clean();
            return Ok(None);
        }

        let feet = obs.position;
        let server = obs
            .server_on_ground
            .unwrap_or_else(|| self.server_ground(ctx.environment, feet));
        if server || self.explained_by_nearby(ctx.environment, feet) {
            self.debounce.clean();
            return Ok(None);
        }

        let Some(buffer) = self.debounce.exceed() else {
            return Ok(None);
        };
        Ok(Some(ctx.finding(
            DetectorId::GroundSpoof,
            self.config.settings.weight,
            format!(
                "claimed ground at y={:.3} dy={:.4} with no support buffer={buffer:.1}",
                feet.y, obs.delta.y
            ),
        )))
    }

    fn reset(&mut self) {
        self.debounce.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::Harness;
    use crate::observation::Observation;
    use warden_shared::{BlockClass, BlockPos};

    fn claim_ground(harness: &mut Harness, detector: &mut GroundSpoofDetector, seq: u64, pos: Vec3) -> Option<Finding> {
        let obs = Observation::builder(seq, seq * 50).at(pos).on_ground(true).build();
        harness.feed(detector, obs)
    }

    #[test]
    fn test_standing_on_floor_is_clean() {
        let mut harness = Harness::new();
        let mut detector = GroundSpoofDetector::new(&GroundSpoofConfig::default());
        for seq in 0..30 {
            assert!(claim_ground(&mut harness, &mut detector, seq, Vec3::new(0.5, 64.0, 0.5)).is_none());
        }
    }

    #[test]
    fn test_mid_air_ground_claim_flags() {
        let mut harness = Harness::new();
        let mut detector = GroundSpoofDetector::new(&GroundSpoofConfig::default());
        let flagged: Vec<u64> = (1..=10)
            .filter(|&seq| {
                let pos = Vec3::new(0.5, 80.0 - seq as f64 * 0.5, 0.5);
                claim_ground(&mut harness, &mut detector, seq, pos).is_some()
            })
            .collect();
        assert_eq!(flagged.first(), Some(&5));
    }

    #[test]
    fn test_server_flag_wins_over_probe() {
        let mut harness = Harness::new();
        let mut detector = GroundSpoofDetector::new(&GroundSpoofConfig::default());
        for seq in 0..10 {
            let obs = Observation::builder(seq, seq * 50)
                .at(Vec3::new(0.5, 90.0, 0.5))
                .on_ground(true)
                .server_on_ground(true)
                .build();
            assert!(harness.feed(&mut detector, obs).is_none());
        }
    }

    #[test]
    fn test_block_edge_is_forgiven() {
        let mut harness = Harness::new();
        harness.world = crate::environment::VoxelGrid::new();
        harness.world.set(BlockPos::new(1, 69, 0), BlockClass::Solid);
        let mut detector = GroundSpoofDetector::new(&GroundSpoofConfig::default());
        // Feet hang just past the block edge.
        for seq in 0..10 {
            assert!(claim_ground(&mut harness, &mut detector, seq, Vec3::new(0.55, 70.0, 0.5)).is_none());
        }
    }
}
