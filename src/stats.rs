use serde::{Deserialize, Serialize};

/// Streaming mean and population standard deviation (Welford).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: self.mean,
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / self.n_vals as f64).sqrt()
            } else {
                0.0
            },
        }
    }
}

/// Arithmetic mean, `0` for an empty slice.
pub fn compute_mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return 0.0;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

/// Population standard deviation, `0` for fewer than two values.
pub fn compute_std_dev(vals: &[f64]) -> f64 {
    let n_vals = vals.len();
    if n_vals < 2 {
        return 0.0;
    }
    let mean = compute_mean(vals);
    let var = vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / n_vals as f64;
    var.sqrt()
}
