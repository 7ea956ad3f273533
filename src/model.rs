//! Carbon cycle model.
//!
//! Pure functions mapping environmental parameters (and biomass) to derived
//! ecological quantities. Out-of-range inputs are never rejected, outputs are
//! clamped where a range is documented.

use serde::{Deserialize, Serialize};

/// Optimum growth temperature (°C).
const TEMP_OPT: f64 = 25.0;
/// Width of the temperature response (°C).
const TEMP_SIGMA: f64 = 10.0;
/// Half-saturation CO₂ concentration (ppm).
const CO2_HALF_SAT: f64 = 600.0;

/// Efficiency kept per stress event.
const STRESS_DISCOUNT: f64 = 0.85;
/// Efficiency kept under pollution.
const POLLUTION_DISCOUNT: f64 = 0.7;
const MAX_RATE: f64 = 2.0;

/// Environmental inputs of the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalParameters {
    /// Atmospheric CO₂ concentration (ppm).
    pub co2: f64,
    /// Air temperature (°C).
    pub temp: f64,
    /// Light intensity (percent, nominally `0..=100`).
    pub light: f64,
    /// Number of acute stress events (storms).
    pub stress_events: u32,
    /// Whether pollution is present.
    pub pollution: bool,
}

impl EnvironmentalParameters {
    /// Return a copy with a CO₂ pulse of `pulse` ppm applied, capped at `cap`.
    pub fn with_co2_pulse(self, pulse: f64, cap: f64) -> Self {
        Self {
            co2: (self.co2 + pulse).min(cap),
            ..self
        }
    }
}

/// Carbon exchanged by the plants per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarbonFlow {
    /// Carbon sequestered through photosynthesis.
    pub absorbed: f64,
    /// Carbon released through respiration and decay.
    pub emitted: f64,
}

/// All quantities derived from one parameter set and biomass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub photosynthesis_rate: f64,
    pub oxygen_output: f64,
    pub carbon_flow: CarbonFlow,
    pub global_balance_index: u8,
}

impl DerivedMetrics {
    pub fn compute(params: &EnvironmentalParameters, biomass: f64) -> Self {
        let rate = photosynthesis_rate(params);
        Self {
            photosynthesis_rate: rate,
            oxygen_output: oxygen_output(rate, biomass),
            carbon_flow: carbon_flow(rate, biomass),
            global_balance_index: global_balance_index(params, biomass),
        }
    }
}

/// Gaussian temperature response centered at the optimum, in `[0, 1]`.
pub fn temperature_factor(temp: f64) -> f64 {
    let f = (-(temp - TEMP_OPT).powi(2) / (2.0 * TEMP_SIGMA * TEMP_SIGMA)).exp();
    f.clamp(0.0, 1.0)
}

/// Saturating CO₂ response, in `[0, 1]`.
pub fn co2_factor(co2: f64) -> f64 {
    (co2 / (co2 + CO2_HALF_SAT)).clamp(0.0, 1.0)
}

/// Linear light response with slight super-saturation, in `[0, 1.2]`.
pub fn light_factor(light: f64) -> f64 {
    (light / 100.0).clamp(0.0, 1.2)
}

/// Photosynthesis rate per unit biomass, in `[0, 2]`.
pub fn photosynthesis_rate(params: &EnvironmentalParameters) -> f64 {
    let mut rate =
        temperature_factor(params.temp) * co2_factor(params.co2) * light_factor(params.light);

    if params.stress_events > 0 {
        rate *= STRESS_DISCOUNT.powf(params.stress_events as f64);
    }
    if params.pollution {
        rate *= POLLUTION_DISCOUNT;
    }

    // Clamp last.
    rate.clamp(0.0, MAX_RATE)
}

/// Oxygen produced per tick. Not clamped.
pub fn oxygen_output(rate: f64, biomass: f64) -> f64 {
    rate * biomass * 1.2
}

/// Carbon absorbed and emitted per tick.
///
/// Emission is a fixed fraction of biomass, independent of the rate.
pub fn carbon_flow(rate: f64, biomass: f64) -> CarbonFlow {
    CarbonFlow {
        absorbed: rate * biomass * 0.9,
        emitted: biomass * 0.05,
    }
}

/// Unrounded and unclamped global balance index.
///
/// The CO₂ burden term goes negative above 2000 ppm and is left that way.
pub fn raw_balance_index(params: &EnvironmentalParameters, biomass: f64) -> f64 {
    let rate = photosynthesis_rate(params);
    let biomass_factor = (biomass / 100.0).clamp(0.0, 1.0);

    let mut index = rate * 60.0 + biomass_factor * 30.0 + (1.0 - params.co2 / 2000.0) * 10.0;

    if params.pollution {
        index -= 8.0;
    }
    index -= 4.0 * params.stress_events as f64;

    index
}

/// Composite ecosystem health score in `[0, 100]`.
pub fn global_balance_index(params: &EnvironmentalParameters, biomass: f64) -> u8 {
    raw_balance_index(params, biomass).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(co2: f64, temp: f64, light: f64) -> EnvironmentalParameters {
        EnvironmentalParameters {
            co2,
            temp,
            light,
            stress_events: 0,
            pollution: false,
        }
    }

    #[test]
    fn temperature_factor_peaks_at_optimum_and_is_symmetric() {
        assert_eq!(temperature_factor(25.0), 1.0);
        for d in [0.5, 3.0, 10.0, 42.0, 1e3] {
            let hi = temperature_factor(25.0 + d);
            let lo = temperature_factor(25.0 - d);
            assert_eq!(hi, lo, "asymmetric at delta {d}");
            assert!((0.0..=1.0).contains(&hi));
            assert!(hi < 1.0);
        }
    }

    #[test]
    fn co2_factor_saturates() {
        assert_eq!(co2_factor(0.0), 0.0);
        assert_eq!(co2_factor(600.0), 0.5);

        let mut prev = 0.0;
        for co2 in (0..=100_000).step_by(250) {
            let f = co2_factor(co2 as f64);
            assert!(f >= prev);
            assert!(f <= 1.0);
            prev = f;
        }
    }

    #[test]
    fn light_factor_caps_super_saturation() {
        assert_eq!(light_factor(50.0), 0.5);
        assert_eq!(light_factor(110.0), 1.1);
        assert_eq!(light_factor(400.0), 1.2);
        assert_eq!(light_factor(-20.0), 0.0);
    }

    #[test]
    fn rate_without_penalties_is_product_of_factors() {
        let p = params(420.0, 19.0, 80.0);
        let expected = temperature_factor(19.0) * co2_factor(420.0) * light_factor(80.0);
        assert_eq!(photosynthesis_rate(&p), expected);
    }

    #[test]
    fn rate_applies_stress_and_pollution_discounts() {
        let base = params(420.0, 25.0, 80.0);
        let clean = photosynthesis_rate(&base);

        let stressed = EnvironmentalParameters {
            stress_events: 2,
            pollution: true,
            ..base
        };
        let expected = clean * 0.85 * 0.85 * 0.7;
        assert!((photosynthesis_rate(&stressed) - expected).abs() < 1e-12);
    }

    #[test]
    fn rate_stays_in_range_for_odd_inputs() {
        let cases = [
            params(0.0, -40.0, 0.0),
            params(1e9, 25.0, 1e6),
            params(-100.0, 25.0, 80.0),
            params(420.0, 25.0, -50.0),
            params(1e12, 1e12, 1e12),
        ];
        for p in cases {
            let rate = photosynthesis_rate(&p);
            assert!((0.0..=2.0).contains(&rate), "rate {rate} for {p:?}");
        }
    }

    #[test]
    fn emission_is_independent_of_rate() {
        let a = carbon_flow(0.0, 80.0);
        let b = carbon_flow(0.9, 80.0);
        assert_eq!(a.emitted, b.emitted);
        assert!((a.emitted - 4.0).abs() < 1e-12);
        assert_eq!(a.absorbed, 0.0);
        assert!((b.absorbed - 64.8).abs() < 1e-12);
        assert!((oxygen_output(0.5, 50.0) - 30.0).abs() < 1e-12);
    }

    #[test]
    fn balance_index_drops_by_four_per_stress_event() {
        // Zero light keeps the rate at zero, so only the flat penalty changes.
        let base = params(400.0, 25.0, 0.0);
        let stressed = EnvironmentalParameters {
            stress_events: 1,
            ..base
        };
        let diff = raw_balance_index(&base, 80.0) - raw_balance_index(&stressed, 80.0);
        assert!((diff - 4.0).abs() < 1e-12);
    }

    #[test]
    fn balance_index_is_clamped() {
        let collapse = EnvironmentalParameters {
            co2: 20_000.0,
            temp: -30.0,
            light: 0.0,
            stress_events: 10,
            pollution: true,
        };
        assert!(raw_balance_index(&collapse, 0.0) < 0.0);
        assert_eq!(global_balance_index(&collapse, 0.0), 0);

        let lush = params(600.0, 25.0, 100.0);
        assert!(global_balance_index(&lush, 300.0) <= 100);
    }

    #[test]
    fn co2_burden_is_not_floored() {
        let a = params(2000.0, 25.0, 0.0);
        let b = params(4000.0, 25.0, 0.0);
        let diff = raw_balance_index(&a, 100.0) - raw_balance_index(&b, 100.0);
        assert!((diff - 10.0).abs() < 1e-12);
    }

    #[test]
    fn co2_pulse_is_capped() {
        let p = params(1950.0, 25.0, 80.0).with_co2_pulse(120.0, 2000.0);
        assert_eq!(p.co2, 2000.0);
        let q = params(400.0, 25.0, 80.0).with_co2_pulse(120.0, 2000.0);
        assert_eq!(q.co2, 520.0);
    }

    #[test]
    fn derived_metrics_are_consistent() {
        let p = params(420.0, 25.0, 80.0);
        let m = DerivedMetrics::compute(&p, 50.0);
        assert_eq!(m.photosynthesis_rate, photosynthesis_rate(&p));
        assert_eq!(m.carbon_flow, carbon_flow(m.photosynthesis_rate, 50.0));
        assert_eq!(m.global_balance_index, global_balance_index(&p, 50.0));
    }
}
