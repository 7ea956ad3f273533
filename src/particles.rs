//! Particle-flow visual scaling.
//!
//! The renderer spawns particles along three paths of the carbon diagram
//! (atmosphere → plants, plants → soil, soil → atmosphere). Spawn
//! probabilities and durations are derived from a [`CarbonFlow`] and scaled
//! by a [`ParticleFlowConfig`].

use crate::model::CarbonFlow;
use serde::{Deserialize, Serialize};

/// Tunable multipliers for the particle visuals.
///
/// Values are not clamped; a caller may set them outside the sampling ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticleFlowConfig {
    /// Atmosphere → plants probability multiplier.
    pub ap_scale: f64,
    /// Plants → soil probability multiplier.
    pub ps_scale: f64,
    /// Soil → atmosphere probability multiplier.
    pub sa_scale: f64,
    /// Particle speed multiplier (higher is faster).
    pub duration_scale: f64,
}

impl Default for ParticleFlowConfig {
    fn default() -> Self {
        Self {
            ap_scale: 1.0,
            ps_scale: 1.0,
            sa_scale: 1.0,
            duration_scale: 1.0,
        }
    }
}

impl ParticleFlowConfig {
    pub fn is_finite(&self) -> bool {
        [
            self.ap_scale,
            self.ps_scale,
            self.sa_scale,
            self.duration_scale,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Per-tick spawn probabilities, each in `[0, 1]` for non-negative inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnRates {
    pub atm_plants: f64,
    pub plants_soil: f64,
    pub soil_atm: f64,
}

impl SpawnRates {
    pub fn new(flow: &CarbonFlow, cfg: &ParticleFlowConfig) -> Self {
        Self {
            atm_plants: (flow.absorbed / 22.0 * cfg.ap_scale).min(1.0),
            plants_soil: (flow.emitted / 28.0 * cfg.ps_scale).min(1.0),
            soil_atm: (flow.emitted / 55.0 * cfg.sa_scale).min(1.0),
        }
    }

    pub fn total(&self) -> f64 {
        self.atm_plants + self.plants_soil + self.soil_atm
    }
}

/// Particle travel times in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleDurations {
    pub atm_plants: f64,
    pub plants_soil: f64,
    pub soil_atm: f64,
}

impl ParticleDurations {
    pub fn new(flow: &CarbonFlow, cfg: &ParticleFlowConfig) -> Self {
        let scale = cfg.duration_scale;
        Self {
            atm_plants: (1700.0 / scale - flow.absorbed * 3.0).max(400.0),
            plants_soil: (1100.0 / scale - flow.emitted * 2.0).max(300.0),
            soil_atm: (2400.0 / scale - flow.emitted * 1.2).max(700.0),
        }
    }
}
