use super::Engine;
use crate::person::DiseaseStatus;
use crate::sampling::PersonSampler;
use anyhow::{Context, Result};
use rand_distr::{Bernoulli, Distribution};
use std::sync::Arc;

impl Engine {
    /// Run the vaccination campaigns triggered at `tick`.
    pub(super) fn apply_interventions(&mut self, tick: u32) -> Result<()> {
        let scenario = Arc::clone(&self.scenario);
        let n_groups = self.pop.len();
        let due = scenario
            .strategies
            .iter()
            .filter(|strategy| strategy.active && strategy.trigger == tick);

        for strategy in due {
            let vaccine = scenario
                .vaccine(strategy.vaccine)
                .with_context(|| format!("unknown vaccine {}", strategy.vaccine))?;
            let efficacy = Bernoulli::new(vaccine.efficacy).context("invalid efficacy")?;
            let protected_until =
                (vaccine.protection > 0).then(|| self.now.saturating_add(vaccine.protection));

            for i_group in strategy.groups(n_groups) {
                let group = &self.pop.groups[i_group];
                let count = (strategy.fraction * group.size() as f64).round() as usize;
                let mut sampler = PersonSampler::from_pool(group.members().collect());
                let chosen = sampler
                    .take(&mut self.rng, count.min(group.size()))
                    .context("failed to sample persons to vaccinate")?;

                let mut n_doses = 0;
                for id in chosen {
                    let person = self.net.get_mut(id);
                    if strategy.hiv_test && person.is_infected() {
                        continue;
                    }
                    n_doses += 1;
                    if person.is_susceptible() && efficacy.sample(&mut self.rng) {
                        person.status = DiseaseStatus::Protected;
                        person.protected_until = protected_until;
                    }
                }
                self.tallies[i_group].vaccinated += n_doses;
                log::debug!(
                    "strategy {} gave {n_doses} doses of {} in group {i_group}",
                    strategy.id,
                    vaccine.name
                );
            }
        }
        Ok(())
    }
}
