//! # Exemption Windows
//!
//! Time-bounded suppression of detection after legitimate causes of
//! abnormal motion. Windows are checked lazily against the observation
//! timestamp; nothing expires in the background.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Why a player is temporarily exempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionReason {
    /// Server-initiated teleport.
    Teleport,
    /// Took damage (knockback).
    Damage,
    /// Server-applied velocity (explosions, launch pads).
    Velocity,
    /// Terrain changed around the player.
    Terrain,
    /// Just joined.
    Join,
    /// Just respawned.
    Respawn,
}

impl std::fmt::Display for ExemptionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Teleport => "teleport",
            Self::Damage => "damage",
            Self::Velocity => "velocity",
            Self::Terrain => "terrain",
            Self::Join => "join",
            Self::Respawn => "respawn",
        };
        f.write_str(name)
    }
}

/// Expired windows older than this are forgotten.
const RETENTION_MS: u64 = 60_000;

/// Per-player exemption expiry times.
#[derive(Clone, Debug, Default)]
pub struct ExemptionWindows {
    expiries: HashMap<ExemptionReason, u64>,
}

impl ExemptionWindows {
    /// No exemptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exempts until `now_ms + duration_ms`. A mark only ever extends an
    /// existing window for the same reason.
    pub fn mark(&mut self, reason: ExemptionReason, now_ms: u64, duration_ms: u64) {
        let expiry = now_ms.saturating_add(duration_ms);
        self.expiries
            .entry(reason)
            .and_modify(|e| *e = (*e).max(expiry))
            .or_insert(expiry);
        self.expiries
            .retain(|_, e| e.saturating_add(RETENTION_MS) > now_ms);
    }

    /// Whether any window is active at `now_ms`.
    #[must_use]
    pub fn is_exempt(&self, now_ms: u64) -> bool {
        self.expiries.values().any(|&e| e > now_ms)
    }

    /// Whether a window for any of `reasons` is active at `now_ms`.
    #[must_use]
    pub fn is_exempt_for(&self, now_ms: u64, reasons: &[ExemptionReason]) -> bool {
        reasons
            .iter()
            .any(|r| self.expiries.get(r).is_some_and(|&e| e > now_ms))
    }

    /// Whether any window was active within the last `within_ms`.
    #[must_use]
    pub fn recently_exempt(&self, now_ms: u64, within_ms: u64) -> bool {
        self.expiries
            .values()
            .any(|&e| e.saturating_add(within_ms) > now_ms)
    }

    /// Remaining time for `reason`, if active.
    #[must_use]
    pub fn remaining(&self, reason: ExemptionReason, now_ms: u64) -> Option<u64> {
        self.expiries
            .get(&reason)
            .filter(|&&e| e > now_ms)
            .map(|&e| e - now_ms)
    }
}
