//! # Combat Detectors
//!
//! Every combat check reads the explicit combat fields on the player's
//! [`CombatLog`](crate::player::CombatLog): last swing, last attack, alive
//! state and transition times. None of them keep a private copy.

mod attack_pattern;
mod attack_rate;
mod dead_action;
mod sprint_hit;
mod swing_timing;

pub use attack_pattern::{AttackPatternConfig, AttackPatternDetector};
pub use attack_rate::{AttackRateConfig, AttackRateDetector};
pub use dead_action::{DeadActionConfig, DeadActionDetector};
pub use sprint_hit::{SprintHitConfig, SprintHitDetector};
pub use swing_timing::{SwingTimingConfig, SwingTimingDetector};
