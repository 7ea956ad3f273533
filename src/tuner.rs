//! Randomized search for particle-flow visual parameters.
//!
//! Candidates are scored by how well the resulting spawn activity separates
//! the scenario presets while staying in a usable range.

use crate::model::{carbon_flow, photosynthesis_rate};
use crate::particles::{ParticleFlowConfig, SpawnRates};
use crate::presets::{SCENARIO_PRESETS, ScenarioPreset};
use crate::stats::{compute_mean, compute_std_dev};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Biomass at which candidates are evaluated.
const REFERENCE_BIOMASS: f64 = 50.0;

/// Target mean spawn activity.
const TARGET_MEAN: f64 = 0.85;
/// Mean spawn activity above which visuals saturate.
const SATURATION_MEAN: f64 = 1.25;
const SATURATION_WEIGHT: f64 = 1.5;

/// Number of ranked candidates kept by a search.
pub const TOP_K: usize = 3;

/// Trials of the quick search run when no config has been chosen yet.
pub const WARMUP_TRIALS: usize = 600;

/// Sampling range of every tunable dimension.
#[derive(Debug, Clone)]
pub struct SamplingRanges {
    pub ap_scale: RangeInclusive<f64>,
    pub ps_scale: RangeInclusive<f64>,
    pub sa_scale: RangeInclusive<f64>,
    pub duration_scale: RangeInclusive<f64>,
}

impl Default for SamplingRanges {
    fn default() -> Self {
        Self {
            ap_scale: 0.4..=2.0,
            ps_scale: 0.4..=1.6,
            sa_scale: 0.4..=1.4,
            duration_scale: 0.6..=1.6,
        }
    }
}

/// Draws candidate configurations from a caller-supplied random source.
#[derive(Debug, Clone)]
pub struct CandidateSampler {
    ap_dist: Uniform<f64>,
    ps_dist: Uniform<f64>,
    sa_dist: Uniform<f64>,
    dur_dist: Uniform<f64>,
}

impl CandidateSampler {
    pub fn new(ranges: &SamplingRanges) -> Result<Self> {
        let uniform = |range: &RangeInclusive<f64>| {
            Uniform::new(*range.start(), *range.end())
                .with_context(|| format!("invalid sampling range {range:?}"))
        };
        Ok(Self {
            ap_dist: uniform(&ranges.ap_scale)?,
            ps_dist: uniform(&ranges.ps_scale)?,
            sa_dist: uniform(&ranges.sa_scale)?,
            dur_dist: uniform(&ranges.duration_scale)?,
        })
    }

    /// Draw one candidate, each dimension rounded to 3 decimals.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParticleFlowConfig {
        ParticleFlowConfig {
            ap_scale: round_3(self.ap_dist.sample(rng)),
            ps_scale: round_3(self.ps_dist.sample(rng)),
            sa_scale: round_3(self.sa_dist.sample(rng)),
            duration_scale: round_3(self.dur_dist.sample(rng)),
        }
    }

    /// Endless candidate stream driven by `rng`.
    pub fn iter<R: Rng>(&self, mut rng: R) -> impl Iterator<Item = ParticleFlowConfig> {
        std::iter::repeat_with(move || self.sample(&mut rng))
    }
}

fn round_3(val: f64) -> f64 {
    (val * 1000.0).round() / 1000.0
}

/// A configuration paired with its fitness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub cfg: ParticleFlowConfig,
    pub score: f64,
}

/// Fitness of `cfg` over the given scenarios.
///
/// Rewards spread of the total spawn rate across scenarios, penalizes
/// distance from the target mean and, more heavily, saturation.
pub fn score_config_with(cfg: &ParticleFlowConfig, presets: &[ScenarioPreset]) -> f64 {
    let rates: Vec<f64> = presets
        .iter()
        .map(|preset| {
            let rate = photosynthesis_rate(&preset.params());
            let flow = carbon_flow(rate, REFERENCE_BIOMASS);
            SpawnRates::new(&flow, cfg).total()
        })
        .collect();

    let mean = compute_mean(&rates);
    let std_dev = compute_std_dev(&rates);

    let mean_penalty = (mean - TARGET_MEAN).abs();
    let saturation_penalty = (mean - SATURATION_MEAN).max(0.0);

    std_dev - mean_penalty - SATURATION_WEIGHT * saturation_penalty
}

/// Fitness of `cfg` over the canonical scenario presets.
pub fn score_config(cfg: &ParticleFlowConfig) -> f64 {
    score_config_with(cfg, &SCENARIO_PRESETS)
}

/// Result of a search run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchOutcome {
    /// Best candidate seen, `None` when no trial ran.
    pub best: Option<ScoredCandidate>,
    /// Up to [`TOP_K`] candidates by descending score, earlier first on ties.
    pub top: Vec<ScoredCandidate>,
    /// Number of candidates evaluated.
    pub n_trials: usize,
}

impl SearchOutcome {
    fn record(&mut self, cand: ScoredCandidate) {
        self.n_trials += 1;

        // Strict comparison keeps the first of equal scores.
        if self.best.is_none_or(|best| cand.score > best.score) {
            self.best = Some(cand);
        }

        // Insert after every entry scoring at least as high.
        let pos = self.top.partition_point(|kept| kept.score >= cand.score);
        if pos < TOP_K {
            self.top.insert(pos, cand);
            self.top.truncate(TOP_K);
        }
    }

    /// Combine two outcomes, treating `self` as the earlier one.
    pub fn merge(mut self, other: SearchOutcome) -> SearchOutcome {
        self.n_trials += other.n_trials;

        if let Some(cand) = other.best {
            if self.best.is_none_or(|best| cand.score > best.score) {
                self.best = Some(cand);
            }
        }

        self.top.extend(other.top);
        // Stable sort keeps earlier entries first on ties.
        self.top.sort_by(|a, b| b.score.total_cmp(&a.score));
        self.top.truncate(TOP_K);

        self
    }
}

/// Search settings.
#[derive(Debug, Clone)]
pub struct Tuner {
    pub trials: usize,
    pub trials_per_batch: usize,
    pub workers: usize,
    pub seed: u64,
    pub ranges: SamplingRanges,
}

impl Tuner {
    /// Quick search over the default ranges, used before any config is chosen.
    pub fn warm_up(trials_per_batch: usize, workers: usize, seed: u64) -> Self {
        Self {
            trials: WARMUP_TRIALS,
            trials_per_batch,
            workers,
            seed,
            ranges: SamplingRanges::default(),
        }
    }

    /// Evaluate the first `self.trials` candidates of `candidates` in order.
    ///
    /// Progress is logged after every `trials_per_batch` candidates.
    pub fn search<I>(&self, candidates: I) -> SearchOutcome
    where
        I: IntoIterator<Item = ParticleFlowConfig>,
    {
        let mut outcome = SearchOutcome::default();
        let trials = self.trials;
        let batch = self.trials_per_batch.max(1);

        for cfg in candidates.into_iter().take(trials) {
            let score = score_config(&cfg);
            outcome.record(ScoredCandidate { cfg, score });

            if outcome.n_trials % batch == 0 || outcome.n_trials == trials {
                let progress = 100.0 * outcome.n_trials as f64 / trials as f64;
                log::info!("completed {progress:06.2}%");
            }
        }

        outcome
    }

    /// Run the randomized search across `workers` seeded streams.
    pub fn run(&self) -> Result<SearchOutcome> {
        let sampler = CandidateSampler::new(&self.ranges).context("failed to build sampler")?;

        let workers = self.workers.max(1);
        let base = self.trials / workers;
        let extra = self.trials % workers;

        log::info!(
            "searching {} trials on {workers} worker(s) with seed {}",
            self.trials,
            self.seed
        );

        let outcome = (0..workers)
            .into_par_iter()
            .map(|i_worker| {
                let worker = Tuner {
                    trials: base + usize::from(i_worker < extra),
                    ..self.clone()
                };

                let mut rng = ChaCha12Rng::seed_from_u64(self.seed);
                rng.set_stream(i_worker as u64);

                let outcome = worker.search(sampler.iter(rng));
                log::debug!("worker {i_worker} finished {} trials", outcome.n_trials);
                outcome
            })
            .reduce(SearchOutcome::default, SearchOutcome::merge);

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(ap: f64, ps: f64, sa: f64, dur: f64) -> ParticleFlowConfig {
        ParticleFlowConfig {
            ap_scale: ap,
            ps_scale: ps,
            sa_scale: sa,
            duration_scale: dur,
        }
    }

    fn tuner(trials: usize, workers: usize, seed: u64) -> Tuner {
        Tuner {
            trials,
            trials_per_batch: 100,
            workers,
            seed,
            ranges: SamplingRanges::default(),
        }
    }

    #[test]
    fn samples_stay_in_range_and_rounded() {
        let ranges = SamplingRanges::default();
        let sampler = CandidateSampler::new(&ranges).unwrap();
        let rng = ChaCha12Rng::seed_from_u64(7);

        for c in sampler.iter(rng).take(2000) {
            assert!(ranges.ap_scale.contains(&c.ap_scale));
            assert!(ranges.ps_scale.contains(&c.ps_scale));
            assert!(ranges.sa_scale.contains(&c.sa_scale));
            assert!(ranges.duration_scale.contains(&c.duration_scale));
            for v in [c.ap_scale, c.ps_scale, c.sa_scale, c.duration_scale] {
                assert_eq!(round_3(v), v);
            }
        }
    }

    #[test]
    fn sampler_stream_outlives_its_scope() {
        let sampler = CandidateSampler::new(&SamplingRanges::default()).unwrap();
        let stream = {
            let rng = ChaCha12Rng::seed_from_u64(5);
            sampler.iter(rng)
        };
        let first: Vec<_> = stream.take(4).collect();
        let again: Vec<_> = sampler.iter(ChaCha12Rng::seed_from_u64(5)).take(4).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn warm_up_picks_a_sampled_config() {
        let outcome = Tuner::warm_up(200, 2, 17).run().unwrap();
        assert_eq!(outcome.n_trials, WARMUP_TRIALS);

        let best = outcome.best.unwrap().cfg;
        let ranges = SamplingRanges::default();
        assert!(ranges.ap_scale.contains(&best.ap_scale));
        assert!(ranges.ps_scale.contains(&best.ps_scale));
        assert!(ranges.sa_scale.contains(&best.sa_scale));
        assert!(ranges.duration_scale.contains(&best.duration_scale));
        assert_ne!(best, ParticleFlowConfig::default());
    }

    #[test]
    fn short_candidate_lists_end_the_search() {
        let list = vec![cfg(1.0, 1.0, 1.0, 1.0); 2];
        assert_eq!(tuner(5, 1, 1).search(list).n_trials, 2);
    }

    #[test]
    fn score_is_deterministic() {
        let c = cfg(1.137, 0.802, 0.951, 1.2);
        assert_eq!(score_config(&c).to_bits(), score_config(&c).to_bits());
    }

    #[test]
    fn score_ignores_duration_scale() {
        assert_eq!(
            score_config(&cfg(1.0, 1.0, 1.0, 0.6)),
            score_config(&cfg(1.0, 1.0, 1.0, 1.6))
        );
    }

    #[test]
    fn degenerate_scenario_sets_have_no_spread() {
        let c = cfg(1.0, 1.0, 1.0, 1.0);
        // With no scenarios the mean is zero, so only the mean penalty remains.
        assert!((score_config_with(&c, &[]) + TARGET_MEAN).abs() < 1e-12);

        let single = &SCENARIO_PRESETS[..1];
        let rate = photosynthesis_rate(&single[0].params());
        let total = SpawnRates::new(&carbon_flow(rate, REFERENCE_BIOMASS), &c).total();
        let expected = -(total - TARGET_MEAN).abs() - 1.5 * (total - SATURATION_MEAN).max(0.0);
        assert_eq!(score_config_with(&c, single), expected);
    }

    #[test]
    fn saturated_candidates_score_lower() {
        let moderate = score_config(&cfg(1.2, 1.0, 1.0, 1.0));
        let saturated = score_config(&cfg(2.0, 1.6, 1.4, 1.0));
        assert!(saturated < moderate);
    }

    #[test]
    fn zero_trials_yield_nothing() {
        let outcome = tuner(0, 1, 1).search(vec![cfg(1.0, 1.0, 1.0, 1.0)]);
        assert_eq!(outcome.best, None);
        assert!(outcome.top.is_empty());
        assert_eq!(outcome.n_trials, 0);

        let outcome = tuner(0, 4, 1).run().unwrap();
        assert_eq!(outcome.best, None);
        assert!(outcome.top.is_empty());
    }

    #[test]
    fn single_trial_is_best() {
        let c = cfg(0.9, 1.1, 0.7, 1.3);
        let outcome = tuner(1, 1, 1).search(vec![c]);

        let best = outcome.best.unwrap();
        assert_eq!(best.cfg, c);
        assert_eq!(best.score, score_config(&c));
        assert_eq!(outcome.top, vec![best]);
    }

    #[test]
    fn ties_keep_first_seen() {
        // Duration does not affect the score, so these all tie.
        let tied = [
            cfg(1.0, 1.0, 1.0, 0.7),
            cfg(1.0, 1.0, 1.0, 0.8),
            cfg(1.0, 1.0, 1.0, 0.9),
            cfg(1.0, 1.0, 1.0, 1.0),
        ];
        let outcome = tuner(4, 1, 1).search(tied);

        assert_eq!(outcome.best.unwrap().cfg.duration_scale, 0.7);
        let durations: Vec<_> = outcome.top.iter().map(|c| c.cfg.duration_scale).collect();
        assert_eq!(durations, vec![0.7, 0.8, 0.9]);
    }

    #[test]
    fn top_is_sorted_and_led_by_best() {
        let sampler = CandidateSampler::new(&SamplingRanges::default()).unwrap();
        let candidates: Vec<_> = sampler
            .iter(ChaCha12Rng::seed_from_u64(11))
            .take(500)
            .collect();

        let outcome = tuner(500, 1, 11).search(candidates.clone());
        assert_eq!(outcome.n_trials, 500);
        assert_eq!(outcome.top.len(), TOP_K);
        assert_eq!(outcome.top[0], outcome.best.unwrap());
        assert!(outcome.top.windows(2).all(|w| w[0].score >= w[1].score));

        let max = candidates
            .iter()
            .map(score_config)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(outcome.best.unwrap().score, max);
    }

    #[test]
    fn search_takes_only_requested_trials() {
        let list = vec![cfg(1.0, 1.0, 1.0, 1.0); 10];
        assert_eq!(tuner(3, 1, 1).search(list).n_trials, 3);
    }

    #[test]
    fn merge_matches_sequential_selection() {
        let sampler = CandidateSampler::new(&SamplingRanges::default()).unwrap();
        let candidates: Vec<_> = sampler
            .iter(ChaCha12Rng::seed_from_u64(3))
            .take(300)
            .collect();
        let whole = tuner(300, 1, 3).search(candidates.clone());
        let left = tuner(120, 1, 3).search(candidates[..120].to_vec());
        let right = tuner(180, 1, 3).search(candidates[120..].to_vec());

        assert_eq!(left.merge(right), whole);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let a = tuner(900, 3, 42).run().unwrap();
        let b = tuner(900, 3, 42).run().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_trials, 900);
        assert_eq!(a.top.len(), TOP_K);

        let c = tuner(900, 3, 43).run().unwrap();
        assert_ne!(a.top, c.top);
    }
}
