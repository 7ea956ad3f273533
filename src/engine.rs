use crate::config::SimulationConfig;
use crate::model::{DerivedMetrics, EnvironmentalParameters, global_balance_index};
use crate::particles::{ParticleDurations, ParticleFlowConfig, SpawnRates};
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result};
use rmp_serde::encode;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

const MIN_BIOMASS: f64 = 2.0;
const MAX_BIOMASS: f64 = 300.0;
/// Fraction of the net carbon flow turned into biomass per tick.
const GROWTH_FRACTION: f64 = 0.02;
/// Balance index below which biomass decays.
const DECAY_THRESHOLD: u8 = 30;
const DECAY_FACTOR: f64 = 0.998;

const CO2_PULSE: f64 = 120.0;
const CO2_CAP: f64 = 2000.0;
const MAX_OXYGEN_METER: f64 = 140.0;

/// Display category of the balance index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthBand {
    Healthy,
    Strained,
    Critical,
}

impl HealthBand {
    pub fn from_index(index: u8) -> Self {
        if index > 65 {
            HealthBand::Healthy
        } else if index > 35 {
            HealthBand::Strained
        } else {
            HealthBand::Critical
        }
    }
}

/// Values handed to the renderer each tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualSignals {
    /// Plant growth scale in `[0, 1]`.
    pub growth: f64,
    /// Oxygen meter reading in `[0, 140]`.
    pub oxygen_meter: f64,
    pub health: HealthBand,
    pub spawn_rates: SpawnRates,
    pub durations: ParticleDurations,
}

/// Record of the simulation at a single tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub tick: usize,
    pub params: EnvironmentalParameters,
    /// Biomass at the start of the tick.
    pub biomass: f64,
    /// Metrics at the start of the tick, with the balance index taken after decay.
    pub metrics: DerivedMetrics,
    pub signals: VisualSignals,
}

/// Tick-loop simulation of one plant population.
///
/// Owns the biomass, which is the only state carried between ticks.
pub struct Engine {
    cfg: SimulationConfig,
    params: EnvironmentalParameters,
    particles: ParticleFlowConfig,
    biomass: f64,
    tick: usize,
}

impl Engine {
    pub fn new(
        cfg: SimulationConfig,
        params: EnvironmentalParameters,
        particles: ParticleFlowConfig,
    ) -> Self {
        let biomass = cfg.initial_biomass.clamp(MIN_BIOMASS, MAX_BIOMASS);
        Self {
            cfg,
            params,
            particles,
            biomass,
            tick: 0,
        }
    }

    pub fn biomass(&self) -> f64 {
        self.biomass
    }

    pub fn params(&self) -> &EnvironmentalParameters {
        &self.params
    }

    /// Add a capped CO₂ pulse to the current parameters.
    pub fn pulse_co2(&mut self) {
        self.params = self.params.with_co2_pulse(CO2_PULSE, CO2_CAP);
    }

    /// Advance one tick and return its record.
    pub fn perform_tick(&mut self) -> Record {
        let params = self.params;
        let biomass = self.biomass;

        let metrics = DerivedMetrics::compute(&params, biomass);
        let rate = metrics.photosynthesis_rate;
        let flow = metrics.carbon_flow;

        // A weak ecosystem loses biomass before the index is reported.
        if metrics.global_balance_index < DECAY_THRESHOLD {
            self.biomass *= DECAY_FACTOR;
        }
        let index = global_balance_index(&params, self.biomass);

        let signals = VisualSignals {
            growth: (rate * self.biomass / 100.0).clamp(0.0, 1.0),
            oxygen_meter: metrics.oxygen_output.round().clamp(0.0, MAX_OXYGEN_METER),
            health: HealthBand::from_index(index),
            spawn_rates: SpawnRates::new(&flow, &self.particles),
            durations: ParticleDurations::new(&flow, &self.particles),
        };

        self.biomass += (flow.absorbed - flow.emitted) * GROWTH_FRACTION;
        self.biomass = self.biomass.clamp(MIN_BIOMASS, MAX_BIOMASS);

        let record = Record {
            tick: self.tick,
            params,
            biomass,
            metrics: DerivedMetrics {
                global_balance_index: index,
                ..metrics
            },
            signals,
        };
        self.tick += 1;
        record
    }

    /// Perform the simulation and save records to a binary file.
    ///
    /// Returns summary statistics of the balance index over all ticks.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<AccumulatorReport> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let n_ticks = self.cfg.ticks;
        let n_saves = n_ticks.div_ceil(self.cfg.ticks_per_save);
        let log_every = (n_saves / 10).max(1);
        let mut index_acc = Accumulator::new();

        for i_tick in 0..n_ticks {
            let record = self.perform_scheduled_tick(i_tick);
            index_acc.add(record.metrics.global_balance_index as f64);

            if i_tick % self.cfg.ticks_per_save == 0 {
                encode::write(&mut writer, &record).context("failed to serialize record")?;

                let i_save = i_tick / self.cfg.ticks_per_save;
                if (i_save + 1) % log_every == 0 || i_save + 1 == n_saves {
                    let progress = 100.0 * (i_tick + 1) as f64 / n_ticks as f64;
                    log::info!("completed {progress:06.2}%");
                }
            }
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(index_acc.report())
    }

    /// Perform the simulation without saving records.
    pub fn perform_summary(&mut self) -> AccumulatorReport {
        let mut index_acc = Accumulator::new();
        for i_tick in 0..self.cfg.ticks {
            let record = self.perform_scheduled_tick(i_tick);
            index_acc.add(record.metrics.global_balance_index as f64);
        }
        index_acc.report()
    }

    fn perform_scheduled_tick(&mut self, i_tick: usize) -> Record {
        let period = self.cfg.co2_pulse_period;
        if period > 0 && i_tick > 0 && i_tick % period == 0 {
            self.pulse_co2();
            log::debug!("co2 pulse at tick {i_tick}, co2 = {}", self.params.co2);
        }
        self.perform_tick()
    }
}
