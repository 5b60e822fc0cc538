//! # Movement Detectors
//!
//! All movement detectors share one shape:
//!
//! 1. Exempt or in an unmodeled environment → reset rolling state, skip.
//! 2. Derive a signal from the observation and motion history.
//! 3. Compare it against a tolerance-scaled threshold.
//! 4. Feed the result to a [`Debounce`](super::components::Debounce).
//! 5. Emit a finding when the debounce escalates.

mod air_strafe;
mod gravity;
mod ground_spoof;
mod keep_sprint;
mod phase;
mod speed;
mod trajectory;

pub use air_strafe::{AirStrafeConfig, AirStrafeDetector};
pub use gravity::{GravityConfig, GravityDetector};
pub use ground_spoof::{GroundSpoofConfig, GroundSpoofDetector};
pub use keep_sprint::{KeepSprintConfig, KeepSprintDetector};
pub use phase::{PhaseConfig, PhaseDetector};
pub use speed::{SpeedConfig, SpeedDetector};
pub use trajectory::{TrajectoryConfig, TrajectoryDetector};

use super::DetectorContext;

/// Ground state agreed by client and server. Without a server opinion the
/// client claim stands.
pub(crate) fn grounded(client: bool, server: Option<bool>) -> bool {
    client && server.unwrap_or(true)
}

/// Whether movement checks must stand down for this observation.
pub(crate) fn should_stand_down(ctx: &DetectorContext<'_>) -> bool {
    let obs = ctx.obs();
    ctx.is_exempt()
        || obs.environment.is_excluded()
        || ctx.motion.last_environment.is_excluded()
        || obs.effects.levitation.is_some()
}
