//! Scenario presets shared by the simulation and the tuner.

use crate::model::EnvironmentalParameters;
use clap::ValueEnum;

/// A named fixed environmental state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioPreset {
    pub key: Scenario,
    pub name: &'static str,
    pub co2: f64,
    pub temp: f64,
    pub light: f64,
    pub storms: bool,
    pub pollution: bool,
}

impl ScenarioPreset {
    /// Model parameters of this preset. A storm counts as one stress event.
    pub fn params(&self) -> EnvironmentalParameters {
        EnvironmentalParameters {
            co2: self.co2,
            temp: self.temp,
            light: self.light,
            stress_events: u32::from(self.storms),
            pollution: self.pollution,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    Pre,
    Present,
    High,
    Recover,
}

impl Scenario {
    pub fn preset(self) -> &'static ScenarioPreset {
        let idx = match self {
            Scenario::Pre => 0,
            Scenario::Present => 1,
            Scenario::High => 2,
            Scenario::Recover => 3,
        };
        &SCENARIO_PRESETS[idx]
    }
}

/// The four canonical scenarios, in evaluation order.
pub static SCENARIO_PRESETS: [ScenarioPreset; 4] = [
    ScenarioPreset {
        key: Scenario::Pre,
        name: "pre-industrial",
        co2: 280.0,
        temp: 14.0,
        light: 70.0,
        storms: false,
        pollution: false,
    },
    ScenarioPreset {
        key: Scenario::Present,
        name: "present-day",
        co2: 420.0,
        temp: 25.0,
        light: 80.0,
        storms: false,
        pollution: false,
    },
    ScenarioPreset {
        key: Scenario::High,
        name: "high-emissions",
        co2: 950.0,
        temp: 36.0,
        light: 95.0,
        storms: true,
        pollution: true,
    },
    ScenarioPreset {
        key: Scenario::Recover,
        name: "recovery",
        co2: 360.0,
        temp: 22.0,
        light: 85.0,
        storms: false,
        pollution: false,
    },
];
