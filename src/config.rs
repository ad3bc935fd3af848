use crate::disease::DiseaseParams;
use crate::dist::Dist;
use crate::population::PopulationParams;
use crate::utils::check_num;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, path::Path};

/// Complete description of a simulation scenario.
///
/// Loaded from a TOML file and validated before use.
/// See [`Scenario::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,

    /// Number of independent trials.
    pub trials: usize,
    /// Number of ticks per trial.
    pub duration: u32,
    #[serde(default)]
    pub clock_unit: ClockUnit,
    /// Delay between ticks in milliseconds (playback speed).
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub seed: SeedMode,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub warm_up: WarmUp,

    pub disease: DiseaseParams,
    pub population: PopulationParams,
    #[serde(default)]
    pub vaccines: Vec<Vaccine>,
    #[serde(default)]
    pub strategies: Vec<Strategy>,
}

impl Scenario {
    /// Load a [`Scenario`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the scenario values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let scenario: Scenario =
            toml::from_str(contents).context("failed to deserialize scenario")?;
        scenario.validate().context("failed to validate scenario")?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        check_num(self.trials, 1..100_000).context("invalid number of trials")?;
        check_num(self.duration, 1..10_000_000).context("invalid duration")?;
        self.paths.validate().context("invalid path settings")?;
        self.warm_up.validate().context("invalid warm-up")?;
        self.disease.validate().context("invalid disease")?;
        self.population.validate().context("invalid population")?;

        for vaccine in &self.vaccines {
            check_num(vaccine.efficacy, 0.0..=1.0)
                .with_context(|| format!("invalid efficacy of vaccine {}", vaccine.id))?;
        }
        let n_groups = self.population.groups.len();
        for strategy in &self.strategies {
            strategy
                .validate(self, n_groups)
                .with_context(|| format!("invalid strategy {}", strategy.id))?;
        }
        Ok(())
    }

    pub fn vaccine(&self, id: u32) -> Option<&Vaccine> {
        self.vaccines.iter().find(|vaccine| vaccine.id == id)
    }

    /// Ticks counted per trial, including clock zero.
    pub fn ticks(&self) -> usize {
        self.duration as usize + 1
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockUnit {
    Day,
    #[default]
    Week,
    Month,
    Year,
}

impl ClockUnit {
    pub fn ticks_per_year(&self) -> u32 {
        match self {
            ClockUnit::Day => 365,
            ClockUnit::Week => 52,
            ClockUnit::Month => 12,
            ClockUnit::Year => 1,
        }
    }

    /// Length of one tick in years.
    pub fn years_per_tick(&self) -> f64 {
        1.0 / self.ticks_per_year() as f64
    }

    /// Human-readable date of a tick, e.g. `year 2, week 3`.
    pub fn label(&self, tick: u32) -> String {
        let per_year = self.ticks_per_year();
        let year = tick / per_year;
        let rest = tick % per_year;
        match self {
            ClockUnit::Day => format!("year {year}, day {rest}"),
            ClockUnit::Week => format!("year {year}, week {rest}"),
            ClockUnit::Month => format!("year {year}, month {rest}"),
            ClockUnit::Year => format!("year {year}"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SeedMode {
    #[default]
    Automatic,
    Fixed {
        seed: u64,
    },
}

/// Settings of the shortest-path computations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Largest group computed exactly; larger groups are estimated.
    pub exact_threshold: usize,
    /// Groups whose casual probability reaches this value use breadth-first
    /// search instead of Floyd-Warshall.
    pub bfs_threshold: f64,
    /// Floyd-Warshall over the compact symmetric matrix.
    pub compact_matrix: bool,
    /// Number of pairs drawn by the estimator.
    pub sample_pairs: usize,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            exact_threshold: 1000,
            bfs_threshold: 0.5,
            compact_matrix: true,
            sample_pairs: 5000,
        }
    }
}

impl PathSettings {
    fn validate(&self) -> Result<()> {
        check_num(self.exact_threshold, 3..100_000).context("invalid exact threshold")?;
        check_num(self.bfs_threshold, 0.0..=1.0).context("invalid bfs threshold")?;
        check_num(self.sample_pairs, 1..100_000_000).context("invalid sample pairs")?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmUpKind {
    #[default]
    None,
    Traditional,
    Temporal,
    Conditional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmUp {
    pub kind: WarmUpKind,
    /// Ticks run by the traditional and temporal warm-ups.
    pub duration: u32,
    /// Upper bound on the ticks of the conditional warm-up.
    pub max_ticks: u32,
    /// Concurrency limits used during warm-up instead of each group's.
    pub max_partners: Option<usize>,
    pub pr_concurrency: Option<f64>,
    /// Number of infections seeded by the temporal and conditional warm-ups.
    pub seed_count: Dist,
}

impl Default for WarmUp {
    fn default() -> Self {
        Self {
            kind: WarmUpKind::None,
            duration: 52,
            max_ticks: 520,
            max_partners: None,
            pr_concurrency: None,
            seed_count: Dist::constant(1.0),
        }
    }
}

impl WarmUp {
    fn validate(&self) -> Result<()> {
        if let Some(max_partners) = self.max_partners {
            check_num(max_partners, 1..1_000).context("invalid max partners")?;
        }
        if let Some(prob) = self.pr_concurrency {
            check_num(prob, 0.0..=1.0).context("invalid concurrency probability")?;
        }
        self.seed_count.compile().context("invalid seed count")?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vaccine {
    pub id: u32,
    pub name: String,
    /// Probability that a dose protects a susceptible person.
    pub efficacy: f64,
    /// Ticks of protection; zero means lifelong.
    #[serde(default)]
    pub protection: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    All,
    Groups(Vec<usize>),
}

/// Vaccination campaign applied once at its trigger tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    pub active: bool,
    pub scope: Scope,
    pub trigger: u32,
    /// Fraction of each targeted group offered a dose.
    pub fraction: f64,
    pub vaccine: u32,
    /// Only persons testing negative are offered a dose.
    #[serde(default)]
    pub hiv_test: bool,
}

impl Strategy {
    fn validate(&self, scenario: &Scenario, n_groups: usize) -> Result<()> {
        check_num(self.fraction, 0.0..=1.0).context("invalid fraction")?;
        if scenario.vaccine(self.vaccine).is_none() {
            bail!("unknown vaccine {}", self.vaccine);
        }
        if let Scope::Groups(groups) = &self.scope {
            for &group in groups {
                check_num(group, 0..n_groups).context("invalid group")?;
            }
        }
        Ok(())
    }

    /// Indices of the groups targeted by this strategy.
    pub fn groups(&self, n_groups: usize) -> Vec<usize> {
        match &self.scope {
            Scope::All => (0..n_groups).collect(),
            Scope::Groups(groups) => groups.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn parses_example_scenario() {
        let scenario = Scenario::from_toml(testing::SCENARIO_TOML).expect("invalid scenario");
        assert_eq!(scenario.trials, 2);
        assert_eq!(scenario.population.groups.len(), 2);
        assert_eq!(scenario.seed, SeedMode::Fixed { seed: 42 });
        assert_eq!(scenario.warm_up.kind, WarmUpKind::None);
        assert_eq!(scenario.strategies[0].scope, Scope::Groups(vec![1]));
        assert_eq!(scenario.ticks(), 27);
    }

    #[test]
    fn rejects_strategy_with_unknown_vaccine() {
        let mut scenario = testing::scenario(&[10, 10], 5);
        scenario.strategies.push(Strategy {
            id: 0,
            name: String::new(),
            active: true,
            scope: Scope::All,
            trigger: 1,
            fraction: 0.5,
            vaccine: 9,
            hiv_test: false,
        });
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn clock_labels() {
        assert_eq!(ClockUnit::Week.label(55), "year 1, week 3");
        assert_eq!(ClockUnit::Year.label(4), "year 4");
        assert_eq!(ClockUnit::Month.years_per_tick(), 1.0 / 12.0);
    }
}
