use crate::dist::{Dist, Sampler};
use crate::error::SimResult;
use crate::person::{DiseaseStatus, Gender, Person};
use crate::utils::{check_num, check_prob};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::Bernoulli;
use serde::{Deserialize, Serialize};

/// Disease parameters. Durations and life expectancies are in years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseParams {
    pub name: String,

    /// Per-contact transmission probability from an infected male to a female.
    pub pr_male_to_female: f64,
    /// Per-contact transmission probability from an infected female to a male.
    pub pr_female_to_male: f64,
    /// Per-contact transmission probability between males.
    pub pr_male_to_male: f64,

    /// Probability that an infection is eventually fatal.
    pub mortality: f64,
    /// Remaining life expectancy after a fatal infection.
    pub life_expectancy: Dist,

    /// The infection never ends.
    pub lifelong: bool,
    /// Length of a non-lifelong infection.
    pub duration: Dist,
    /// Recovered persons become susceptible again instead of immune.
    pub reinfection: bool,
}

impl DiseaseParams {
    pub fn validate(&self) -> Result<()> {
        check_num(self.pr_male_to_female, 0.0..=1.0).context("invalid male to female prob")?;
        check_num(self.pr_female_to_male, 0.0..=1.0).context("invalid female to male prob")?;
        check_num(self.pr_male_to_male, 0.0..=1.0).context("invalid male to male prob")?;
        check_num(self.mortality, 0.0..=1.0).context("invalid mortality")?;
        self.life_expectancy
            .compile()
            .context("invalid life expectancy after infection")?;
        self.duration.compile().context("invalid infection duration")?;
        Ok(())
    }
}

/// Compiled disease parameters used while simulating.
#[derive(Debug, Clone)]
pub struct DiseaseModel {
    pub params: DiseaseParams,
    mortality: Bernoulli,
    life_expectancy: Sampler,
    duration: Sampler,
}

impl DiseaseModel {
    pub fn new(params: &DiseaseParams) -> Result<Self> {
        Ok(Self {
            params: params.clone(),
            mortality: Bernoulli::new(params.mortality).context("invalid mortality")?,
            life_expectancy: params.life_expectancy.compile()?,
            duration: params.duration.compile()?,
        })
    }

    /// Per-contact probability that `src` infects `dst`, if the pair can
    /// transmit at all.
    pub fn direction_prob(&self, src: &Person, dst: &Person) -> Option<f64> {
        match (src.gender, dst.gender) {
            (Gender::Male, Gender::Female) => Some(self.params.pr_male_to_female),
            (Gender::Female, Gender::Male) => Some(self.params.pr_female_to_male),
            (Gender::Male, Gender::Male) => Some(self.params.pr_male_to_male),
            (Gender::Female, Gender::Female) => None,
        }
    }

    /// Infect `person` now, at its current age.
    pub fn infect<R: Rng + ?Sized>(&self, person: &mut Person, rng: &mut R) {
        let onset = person.age;
        self.infect_since(person, onset, rng);
        if !self.params.lifelong {
            person.infection_end_age = onset + self.duration.sample(rng);
        }
    }

    /// Infect `person` as part of the initial population, with an onset age
    /// between `debut_age` and its current age.
    pub fn infect_initial<R: Rng + ?Sized>(
        &self,
        person: &mut Person,
        debut_age: f64,
        rng: &mut R,
    ) {
        let low = debut_age.min(person.age);
        let onset = if low < person.age {
            rng.random_range(low..=person.age)
        } else {
            person.age
        };
        self.infect_since(person, onset, rng);
        if !self.params.lifelong {
            let mut duration = self.duration.sample(rng);
            if onset + duration <= person.age {
                duration += onset;
            }
            person.infection_end_age = onset + duration;
        }
    }

    fn infect_since<R: Rng + ?Sized>(&self, person: &mut Person, onset: f64, rng: &mut R) {
        person.status = DiseaseStatus::Infected;
        person.infection_age = onset;
        person.infection_end_age = f64::INFINITY;
        person.protected_until = None;
        person.death_age = if self.mortality.sample(rng) {
            onset + self.life_expectancy.sample(rng)
        } else {
            f64::INFINITY
        };
    }

    /// End the infection of `person`.
    pub fn recover(&self, person: &mut Person) {
        person.status = if self.params.reinfection {
            DiseaseStatus::Susceptible
        } else {
            DiseaseStatus::Protected
        };
        person.infection_end_age = f64::INFINITY;
        person.death_age = f64::INFINITY;
        person.protected_until = None;
    }
}

/// Probability of at least one transmission over `contacts` independent
/// contacts with per-contact probability `prob`.
pub fn transmission_probability(prob: f64, contacts: usize) -> SimResult<f64> {
    let prob = check_prob(prob)?;
    Ok(1.0 - (1.0 - prob).powf(contacts as f64))
}
