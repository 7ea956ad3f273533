use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Run configuration, loaded from a TOML file.
///
/// Every section and field is optional and falls back to its default.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tuner: TunerConfig,
    pub simulation: SimulationConfig,
}

/// Parameter search settings.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TunerConfig {
    /// Number of candidates evaluated.
    pub trials: usize,
    /// Number of candidates between progress reports.
    pub trials_per_batch: usize,
    /// Number of parallel workers.
    pub workers: usize,
    /// Fixed seed, drawn at random when absent.
    pub seed: Option<u64>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            trials: 8000,
            trials_per_batch: 1000,
            workers: 1,
            seed: None,
        }
    }
}

/// Tick-loop simulation settings.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of ticks simulated.
    pub ticks: usize,
    /// Number of ticks between saved records.
    pub ticks_per_save: usize,
    /// Biomass at the first tick.
    pub initial_biomass: f64,
    /// Ticks between CO₂ pulses, `0` disables them.
    pub co2_pulse_period: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: 400,
            ticks_per_save: 1,
            initial_biomass: 50.0,
            co2_pulse_period: 0,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file and validate it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;
        config.validate().context("failed to validate config")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let tuner = &self.tuner;
        check_num(tuner.trials, 0..=10_000_000).context("invalid number of trials")?;
        check_num(tuner.trials_per_batch, 1..=1_000_000)
            .context("invalid number of trials per batch")?;
        check_num(tuner.workers, 1..=256).context("invalid number of workers")?;

        let sim = &self.simulation;
        check_num(sim.ticks, 1..=10_000_000).context("invalid number of ticks")?;
        check_num(sim.ticks_per_save, 1..=100_000).context("invalid number of ticks per save")?;
        check_num(sim.initial_biomass, 2.0..=300.0).context("invalid initial biomass")?;
        check_num(sim.co2_pulse_period, 0..=10_000_000).context("invalid co2 pulse period")?;

        Ok(())
    }
}

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
