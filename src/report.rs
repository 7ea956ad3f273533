use crate::particles::ParticleFlowConfig;
use crate::tuner::{ScoredCandidate, SearchOutcome};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    time::SystemTime,
};

/// Ranked tuning results persisted for later selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningReport {
    /// RFC 3339 UTC timestamp.
    pub generated_at: String,
    /// Best candidates by descending score.
    pub top3: Vec<ScoredCandidate>,
}

impl TuningReport {
    /// Build a report from a search outcome, `None` if nothing was found.
    pub fn from_outcome(outcome: &SearchOutcome) -> Option<Self> {
        if outcome.top.is_empty() {
            return None;
        }
        Some(Self {
            generated_at: humantime::format_rfc3339_millis(SystemTime::now()).to_string(),
            top3: outcome.top.clone(),
        })
    }

    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        write_json(file, self)
    }

    /// Load and validate a report.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let report: TuningReport = read_json(file)?;
        report
            .validate()
            .with_context(|| format!("invalid report {file:?}"))?;
        Ok(report)
    }

    fn validate(&self) -> Result<()> {
        if self.top3.is_empty() {
            bail!("report has no ranked configs");
        }
        for (idx, cand) in self.top3.iter().enumerate() {
            if !cand.cfg.is_finite() || !cand.score.is_finite() {
                bail!("entry {} has non-finite values", idx + 1);
            }
        }
        Ok(())
    }

    /// Entry at 1-based `index`.
    pub fn select(&self, index: usize) -> Result<&ScoredCandidate> {
        let n_entries = self.top3.len();
        if index == 0 || index > n_entries {
            bail!("index must be in the range 1..={n_entries}, but is {index}");
        }
        Ok(&self.top3[index - 1])
    }

    pub fn log_summary(&self) {
        log::info!("configs generated at {}", self.generated_at);
        for (idx, cand) in self.top3.iter().enumerate() {
            let cfg = &cand.cfg;
            log::info!(
                "{}: score={:.3} ap={} ps={} sa={} dur={}",
                idx + 1,
                cand.score,
                cfg.ap_scale,
                cfg.ps_scale,
                cfg.sa_scale,
                cfg.duration_scale
            );
        }
    }
}

/// Save the config used by the renderer.
pub fn save_active_config<P: AsRef<Path>>(file: P, cfg: &ParticleFlowConfig) -> Result<()> {
    write_json(file, cfg)
}

/// Load the config used by the renderer.
pub fn load_active_config<P: AsRef<Path>>(file: P) -> Result<ParticleFlowConfig> {
    let file = file.as_ref();
    let cfg: ParticleFlowConfig = read_json(file)?;
    if !cfg.is_finite() {
        bail!("config in {file:?} has non-finite values");
    }
    Ok(cfg)
}

fn write_json<P: AsRef<Path>, T: Serialize>(file: P, value: &T) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).context("failed to serialize json")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

fn read_json<P: AsRef<Path>, T: for<'de> Deserialize<'de>>(file: P) -> Result<T> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let reader = BufReader::new(file);
    let value = serde_json::from_reader(reader).context("failed to deserialize json")?;
    Ok(value)
}
