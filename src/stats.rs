use serde::{Deserialize, Serialize};

/// Running mean and variance (Welford's algorithm).
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance, or `None` with fewer than two values.
    pub fn variance(&self) -> Option<f64> {
        (self.n_vals > 1).then(|| self.diff_2_sum / (self.n_vals as f64 - 1.0))
    }

    /// Standard error of the mean, or `None` with fewer than two values.
    pub fn sem(&self) -> Option<f64> {
        self.variance().map(|var| (var / self.n_vals as f64).sqrt())
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: self.variance().map_or(f64::NAN, f64::sqrt),
            sem: self.sem().unwrap_or(f64::NAN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn accumulator_matches_direct_formulas() {
        let vals = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut acc = Accumulator::new();
        vals.iter().for_each(|&val| acc.add(val));
        assert_approx_eq!(acc.mean(), 5.0);
        assert_approx_eq!(acc.variance().unwrap(), 32.0 / 7.0);
        assert_approx_eq!(acc.sem().unwrap(), (32.0 / 7.0 / 8.0f64).sqrt());
    }

    #[test]
    fn accumulator_needs_two_values_for_spread() {
        let mut acc = Accumulator::new();
        acc.add(3.0);
        assert_eq!(acc.variance(), None);
        assert!(acc.report().std_dev.is_nan());
    }
}
