use crate::config::{Config, SimulationConfig};
use crate::engine::Engine;
use crate::model::DerivedMetrics;
use crate::particles::{ParticleFlowConfig, SpawnRates};
use crate::presets::{SCENARIO_PRESETS, Scenario};
use crate::report::{self, TuningReport};
use crate::tuner::{SamplingRanges, Tuner};
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct Manager {
    work_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        let work_dir = work_dir.as_ref().to_path_buf();
        fs::create_dir_all(&work_dir).with_context(|| format!("failed to create {work_dir:?}"))?;

        let config_file = work_dir.join("config.toml");
        let cfg = if config_file.exists() {
            Config::from_file(&config_file).context("failed to construct cfg")?
        } else {
            log::info!("no {config_file:?}, using defaults");
            Config::default()
        };
        log::info!("{cfg:#?}");

        Ok(Self { work_dir, cfg })
    }

    /// Run the parameter search and save the ranked configs.
    pub fn tune(&self, trials: Option<usize>) -> Result<()> {
        let mut check = self.cfg.clone();
        if let Some(trials) = trials {
            check.tuner.trials = trials;
        }
        check.validate().context("invalid tuner settings")?;

        let tuner_cfg = &check.tuner;
        let tuner = Tuner {
            trials: tuner_cfg.trials,
            trials_per_batch: tuner_cfg.trials_per_batch,
            workers: tuner_cfg.workers,
            seed: tuner_cfg.seed.unwrap_or_else(rand::random),
            ranges: SamplingRanges::default(),
        };

        let outcome = tuner.run().context("failed to run search")?;

        let Some(report) = TuningReport::from_outcome(&outcome) else {
            log::warn!("no candidate evaluated, nothing written");
            return Ok(());
        };

        let report_file = self.report_file();
        report
            .save(&report_file)
            .with_context(|| format!("failed to save {report_file:?}"))?;
        log::info!("wrote {report_file:?}");
        report.log_summary();

        Ok(())
    }

    pub fn list(&self) -> Result<()> {
        let report = self.load_report()?;
        report.log_summary();
        Ok(())
    }

    /// Make the `index`-th ranked config (1-based) the active one.
    pub fn apply(&self, index: usize) -> Result<()> {
        let report = self.load_report()?;
        let chosen = report.select(index).context("failed to select config")?;

        let active_file = self.active_file();
        report::save_active_config(&active_file, &chosen.cfg)
            .with_context(|| format!("failed to save {active_file:?}"))?;
        log::info!("wrote top-{index} config to {active_file:?}");

        Ok(())
    }

    /// Simulate `scenario` and save a new trajectory file.
    pub fn simulate(&self, scenario: Scenario, ticks: Option<usize>) -> Result<()> {
        let sim_cfg = self.simulation_cfg(ticks)?;

        let particles = self.particle_config()?;
        let preset = scenario.preset();
        log::info!(
            "simulating {} ({:?}) with {particles:?}",
            preset.name,
            preset.key
        );

        let file_idx = self
            .count_trajectory_files()
            .context("failed to count trajectory files")?;
        let trajectory_file = self.trajectory_file(file_idx);

        let mut engine = Engine::new(sim_cfg, preset.params(), particles);
        let summary = engine
            .perform_simulation(&trajectory_file)
            .context("failed to perform simulation")?;
        log::info!("wrote {trajectory_file:?}");
        log::info!(
            "balance index mean = {:.2}, std dev = {:.2} over {} ticks",
            summary.mean,
            summary.std_dev,
            summary.n_vals
        );
        log::info!(
            "final biomass = {:.2}, final co2 = {}",
            engine.biomass(),
            engine.params().co2
        );

        Ok(())
    }

    /// Simulate every scenario with the same config and log their summaries.
    pub fn compare(&self, ticks: Option<usize>) -> Result<()> {
        let sim_cfg = self.simulation_cfg(ticks)?;
        let particles = self.particle_config()?;
        log::info!("comparing scenarios with {particles:?}");

        for preset in &SCENARIO_PRESETS {
            let params = preset.params();
            let flow = DerivedMetrics::compute(&params, sim_cfg.initial_biomass).carbon_flow;
            let spawn = SpawnRates::new(&flow, &particles).total();

            let mut engine = Engine::new(sim_cfg.clone(), params, particles);
            let summary = engine.perform_summary();
            log::info!(
                "{:<16} index mean = {:.2}, std dev = {:.2}, final biomass = {:.2}, spawn = {:.3}",
                preset.name,
                summary.mean,
                summary.std_dev,
                engine.biomass(),
                spawn
            );
        }

        Ok(())
    }

    /// Remove all generated files, keeping the config.
    pub fn clean(&self) -> Result<()> {
        let mut files = self.trajectory_files()?;
        files.push(self.report_file());
        files.push(self.active_file());

        for file in files.into_iter().filter(|f| f.exists()) {
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            log::info!("removed {file:?}");
        }

        Ok(())
    }

    fn load_report(&self) -> Result<TuningReport> {
        let report_file = self.report_file();
        TuningReport::from_file(&report_file)
            .with_context(|| format!("failed to load {report_file:?}"))
    }

    fn simulation_cfg(&self, ticks: Option<usize>) -> Result<SimulationConfig> {
        let mut check = self.cfg.clone();
        if let Some(ticks) = ticks {
            check.simulation.ticks = ticks;
        }
        check.validate().context("invalid simulation settings")?;
        Ok(check.simulation)
    }

    /// Applied config, or the best of a warm-up search when none was applied.
    fn particle_config(&self) -> Result<ParticleFlowConfig> {
        let active_file = self.active_file();
        if active_file.exists() {
            return report::load_active_config(&active_file)
                .with_context(|| format!("failed to load {active_file:?}"));
        }

        log::info!("no {active_file:?}, running warm-up search");
        let tuner_cfg = &self.cfg.tuner;
        let tuner = Tuner::warm_up(
            tuner_cfg.trials_per_batch,
            tuner_cfg.workers,
            tuner_cfg.seed.unwrap_or_else(rand::random),
        );
        let outcome = tuner.run().context("failed to run warm-up search")?;
        Ok(match outcome.best {
            Some(best) => best.cfg,
            None => {
                log::warn!("warm-up evaluated nothing, using default particle config");
                ParticleFlowConfig::default()
            }
        })
    }

    fn trajectory_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.work_dir.join("trajectory-*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let files = glob(pattern)
            .context("failed to glob trajectory files")?
            .filter_map(Result::ok)
            .collect();
        Ok(files)
    }

    fn count_trajectory_files(&self) -> Result<usize> {
        Ok(self.trajectory_files()?.len())
    }

    fn trajectory_file(&self, file_idx: usize) -> PathBuf {
        self.work_dir
            .join(format!("trajectory-{file_idx:04}.msgpack"))
    }

    fn report_file(&self) -> PathBuf {
        self.work_dir.join("best_particle_configs.json")
    }

    fn active_file(&self) -> PathBuf {
        self.work_dir.join("active_particle_config.json")
    }
}
