use crate::utils::geo_mean;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_distr::{Exp, Gamma, LogNormal, Normal, Poisson, Triangular, Uniform};
use serde::{Deserialize, Serialize};

/// Distribution of a non-negative stochastic quantity, as written in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dist {
    Constant { value: f64 },
    Uniform { min: f64, max: f64 },
    Normal { mean: f64, std_dev: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Exponential { mean: f64 },
    Gamma { shape: f64, scale: f64 },
    Poisson { mean: f64 },
    Triangular { min: f64, max: f64, mode: f64 },
}

impl Dist {
    pub fn constant(value: f64) -> Self {
        Dist::Constant { value }
    }

    /// Build the sampler for this distribution, validating its parameters.
    pub fn compile(&self) -> Result<Sampler> {
        let sampler = match *self {
            Dist::Constant { value } => {
                if !value.is_finite() || value < 0.0 {
                    bail!("constant must be finite and non-negative, but is {value}");
                }
                Sampler::Constant(value)
            }
            Dist::Uniform { min, max } => {
                Sampler::Uniform(Uniform::new_inclusive(min, max).context("invalid uniform")?)
            }
            Dist::Normal { mean, std_dev } => {
                Sampler::Normal(Normal::new(mean, std_dev).context("invalid normal")?)
            }
            Dist::LogNormal { mu, sigma } => {
                Sampler::LogNormal(LogNormal::new(mu, sigma).context("invalid log-normal")?)
            }
            Dist::Exponential { mean } => {
                if mean <= 0.0 {
                    Sampler::Constant(0.0)
                } else {
                    Sampler::Exponential(Exp::new(1.0 / mean).context("invalid exponential")?)
                }
            }
            Dist::Gamma { shape, scale } => {
                Sampler::Gamma(Gamma::new(shape, scale).context("invalid gamma")?)
            }
            Dist::Poisson { mean } => {
                if mean <= 0.0 {
                    Sampler::Constant(0.0)
                } else {
                    Sampler::Poisson(Poisson::new(mean).context("invalid poisson")?)
                }
            }
            Dist::Triangular { min, max, mode } => Sampler::Triangular(
                Triangular::new(min, max, mode).context("invalid triangular")?,
            ),
        };
        Ok(sampler)
    }
}

/// Compiled form of a [`Dist`].
#[derive(Debug, Clone)]
pub enum Sampler {
    Constant(f64),
    Uniform(Uniform<f64>),
    Normal(Normal<f64>),
    LogNormal(LogNormal<f64>),
    Exponential(Exp<f64>),
    Gamma(Gamma<f64>),
    Poisson(Poisson<f64>),
    Triangular(Triangular<f64>),
}

impl Sampler {
    /// Draw a value, clamped to be non-negative.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let val = match self {
            Sampler::Constant(val) => *val,
            Sampler::Uniform(dist) => dist.sample(rng),
            Sampler::Normal(dist) => dist.sample(rng),
            Sampler::LogNormal(dist) => dist.sample(rng),
            Sampler::Exponential(dist) => dist.sample(rng),
            Sampler::Gamma(dist) => dist.sample(rng),
            Sampler::Poisson(dist) => dist.sample(rng),
            Sampler::Triangular(dist) => dist.sample(rng),
        };
        val.max(0.0)
    }

    /// Draw a value rounded to the nearest count.
    pub fn sample_count<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.sample(rng).round() as usize
    }

    /// Geometric mean of one draw from each of two samplers.
    pub fn sample_geo<R: Rng + ?Sized>(a: &Sampler, b: &Sampler, rng: &mut R) -> f64 {
        let val_a = a.sample(rng);
        let val_b = b.sample(rng);
        geo_mean(val_a, val_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn constant_and_geo_mean() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let a = Dist::constant(4.0).compile().unwrap();
        let b = Dist::constant(9.0).compile().unwrap();
        assert_eq!(a.sample(&mut rng), 4.0);
        assert_approx_eq!(Sampler::sample_geo(&a, &b, &mut rng), 6.0);
    }

    #[test]
    fn draws_are_never_negative() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let dist = Dist::Normal {
            mean: 0.0,
            std_dev: 10.0,
        }
        .compile()
        .unwrap();
        assert!((0..1000).all(|_| dist.sample(&mut rng) >= 0.0));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(Dist::Uniform { min: 2.0, max: 1.0 }.compile().is_err());
        assert!(Dist::constant(-1.0).compile().is_err());
        assert!(
            Dist::Gamma {
                shape: -1.0,
                scale: 1.0
            }
            .compile()
            .is_err()
        );
    }

    #[test]
    fn parses_from_toml() {
        #[derive(Deserialize)]
        struct Holder {
            dist: Dist,
        }
        let holder: Holder = toml::from_str("dist = { kind = \"uniform\", min = 1.0, max = 2.0 }")
            .expect("failed to parse");
        assert_eq!(holder.dist, Dist::Uniform { min: 1.0, max: 2.0 });
    }
}
