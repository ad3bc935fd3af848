use super::{Engine, TickPlan};
use crate::config::WarmUpKind;
use crate::control::Flow;
use anyhow::{Context, Result};
use rand::prelude::*;

const WITHOUT_TRANSMISSION: TickPlan = TickPlan {
    transmission: false,
    interventions: None,
};

const WITH_TRANSMISSION: TickPlan = TickPlan {
    transmission: true,
    interventions: None,
};

impl Engine {
    /// Run the configured warm-up with relaxed concurrency limits.
    ///
    /// Returns `false` if a reset aborted it.
    pub(super) fn warm_up(&mut self) -> Result<bool> {
        let warm_up = self.scenario.warm_up.clone();
        for group in &mut self.pop.groups {
            if let Some(max_partners) = warm_up.max_partners {
                group.max_partners = max_partners;
            }
            if let Some(pr_concurrency) = warm_up.pr_concurrency {
                group.pr_concurrency = pr_concurrency;
            }
        }

        log::debug!("starting {:?} warm-up", warm_up.kind);
        let completed = match warm_up.kind {
            WarmUpKind::None => true,
            WarmUpKind::Traditional => self.warm_up_traditional(warm_up.duration)?,
            WarmUpKind::Temporal => self.warm_up_temporal(warm_up.duration)?,
            WarmUpKind::Conditional => self.warm_up_conditional(warm_up.max_ticks)?,
        };
        self.pop.restore_concurrency();
        log::debug!("warm-up ended after {} ticks (completed: {completed})", self.now);
        Ok(completed)
    }

    /// Evolve the network without disease, then seed the initial infections.
    fn warm_up_traditional(&mut self, duration: u32) -> Result<bool> {
        if !self.run_warm_up_ticks(duration, WITHOUT_TRANSMISSION)? {
            return Ok(false);
        }
        for group in &mut self.pop.groups {
            // Ticks without disease drove the tracked prevalence to zero.
            group.prevalence = group.params.prevalence;
            group
                .seed_initial(&mut self.net, &self.disease, &mut self.rng)
                .with_context(|| format!("failed to seed group {}", group.id))?;
        }
        self.pop.update_prevalence(&self.net);
        Ok(true)
    }

    /// Seed one random group, then let the disease spread.
    fn warm_up_temporal(&mut self, duration: u32) -> Result<bool> {
        let i_group = self.rng.random_range(0..self.pop.len());
        let n_seeded = self.seed_group(i_group);
        log::debug!("seeded {n_seeded} infections in group {i_group}");
        self.run_warm_up_ticks(duration, WITH_TRANSMISSION)
    }

    /// Seed every group, then let the disease spread until every group has
    /// reached its target prevalence or `max_ticks` have passed.
    fn warm_up_conditional(&mut self, max_ticks: u32) -> Result<bool> {
        for i_group in 0..self.pop.len() {
            self.seed_group(i_group);
            let group = &mut self.pop.groups[i_group];
            group.warmed_up = group.prevalence >= group.params.prevalence;
        }
        for _ in 0..max_ticks {
            if self.pop.groups.iter().all(|group| group.warmed_up) {
                break;
            }
            self.advance(WITH_TRANSMISSION).context("failed to advance warm-up")?;
            for group in &mut self.pop.groups {
                if group.prevalence >= group.params.prevalence {
                    group.warmed_up = true;
                }
            }
            if self.control.checkpoint() == Flow::Abort {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Infect a sampled number of members of a group, at least one and at
    /// most all of them, and update its prevalence.
    fn seed_group(&mut self, i_group: usize) -> usize {
        let group = &mut self.pop.groups[i_group];
        let target = self
            .seed_count
            .sample_count(&mut self.rng)
            .max(1)
            .min(group.size());
        let n_seeded = group.seed_count(&mut self.net, &self.disease, target, &mut self.rng);
        group.update_prevalence(&self.net);
        n_seeded
    }

    fn run_warm_up_ticks(&mut self, n_ticks: u32, plan: TickPlan) -> Result<bool> {
        for _ in 0..n_ticks {
            self.advance(plan).context("failed to advance warm-up")?;
            if self.control.checkpoint() == Flow::Abort {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::engine;
    use super::*;
    use crate::config::WarmUp;
    use crate::dist::Dist;
    use std::sync::Arc;

    fn with_warm_up(sizes: &[usize], warm_up: WarmUp) -> Engine {
        let mut engine = engine(sizes, 5);
        let mut scenario = (*engine.scenario).clone();
        scenario.warm_up = warm_up;
        engine.seed_count = scenario.warm_up.seed_count.compile().unwrap();
        engine.scenario = Arc::new(scenario);
        engine
    }

    #[test]
    fn traditional_warm_up_seeds_after_evolving() {
        let mut engine = with_warm_up(
            &[20, 20],
            WarmUp {
                kind: WarmUpKind::Traditional,
                duration: 6,
                max_partners: Some(5),
                ..Default::default()
            },
        );
        engine.pop.groups[1].params.seed_infections = 4;

        assert!(engine.warm_up().unwrap());
        assert_eq!(engine.now, 6);
        assert_eq!(engine.pop.groups[0].count_infected(&engine.net), 0);
        assert_eq!(engine.pop.groups[1].count_infected(&engine.net), 4);
        assert_eq!(engine.pop.groups[1].prevalence, 0.2);
        assert_eq!(engine.pop.groups[0].max_partners, 2);
    }

    #[test]
    fn temporal_warm_up_seeds_one_group() {
        let mut engine = with_warm_up(
            &[10, 10],
            WarmUp {
                kind: WarmUpKind::Temporal,
                duration: 0,
                seed_count: Dist::constant(3.0),
                ..Default::default()
            },
        );
        assert!(engine.warm_up().unwrap());
        let infected: Vec<_> = engine
            .pop
            .groups
            .iter()
            .map(|group| group.count_infected(&engine.net))
            .collect();
        assert!(infected == [3, 0] || infected == [0, 3], "{infected:?}");
    }

    #[test]
    fn conditional_warm_up_stops_once_targets_are_met() {
        let mut engine = with_warm_up(
            &[10, 10],
            WarmUp {
                kind: WarmUpKind::Conditional,
                max_ticks: 50,
                seed_count: Dist::constant(2.0),
                ..Default::default()
            },
        );
        engine.pop.groups[0].params.prevalence = 0.2;
        engine.pop.groups[1].params.prevalence = 0.1;

        assert!(engine.warm_up().unwrap());
        assert_eq!(engine.now, 0);
        assert!(engine.pop.groups.iter().all(|group| group.warmed_up));
    }
}
