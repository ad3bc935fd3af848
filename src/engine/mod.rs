mod intervention;
mod partnership;
mod transmission;
mod warmup;

use crate::analytics::{self, GroupGraph, SwnInfo};
use crate::config::{Scenario, SeedMode, WarmUpKind};
use crate::control::{Control, Flow};
use crate::data::{EndReason, SimData, Tally};
use crate::disease::DiseaseModel;
use crate::dist::Sampler;
use crate::ids::IdAllocator;
use crate::network::{Network, PersonId};
use crate::notify::Notification;
use crate::person::{DiseaseStatus, PartnershipState};
use crate::population::Population;
use crate::relation::PartnerKind;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use std::sync::Arc;

/// Simulation engine.
///
/// Holds an immutable scenario snapshot and the mutable state of one run:
/// population, network, random number generator and identifier allocator.
pub struct Engine {
    scenario: Arc<Scenario>,
    control: Arc<Control>,
    rng: ChaCha12Rng,
    ids: IdAllocator,
    net: Network,
    pop: Population,
    disease: DiseaseModel,
    seed_count: Sampler,
    years_per_tick: f64,
    /// Per-group events of the current tick.
    tallies: Vec<Tally>,
    /// Ticks since the start of the trial, warm-up included.
    now: u32,
    /// Epoch of the partnership edges visited by transmission.
    pass: u64,
    /// Epoch of the vertices marked by acquaintance searches.
    epoch: u64,
}

/// Phases run by one tick besides ageing and the partnership lifecycle.
#[derive(Debug, Clone, Copy)]
struct TickPlan {
    transmission: bool,
    /// Reported tick at which interventions are due, if any.
    interventions: Option<u32>,
}

impl Engine {
    pub fn new(scenario: Arc<Scenario>, control: Arc<Control>) -> Result<Self> {
        scenario.validate().context("invalid scenario")?;

        let rng = match scenario.seed {
            SeedMode::Automatic => ChaCha12Rng::try_from_os_rng()?,
            SeedMode::Fixed { seed } => ChaCha12Rng::seed_from_u64(seed),
        };
        let mut ids = IdAllocator::new();
        let pop = Population::new(&scenario.population, &mut ids)
            .context("failed to construct population")?;
        let disease =
            DiseaseModel::new(&scenario.disease).context("failed to construct disease model")?;
        let seed_count = scenario.warm_up.seed_count.compile()?;

        Ok(Self {
            net: Network::with_capacity(scenario.population.total_size()),
            tallies: vec![Tally::default(); pop.len()],
            years_per_tick: scenario.clock_unit.years_per_tick(),
            scenario,
            control,
            rng,
            ids,
            pop,
            disease,
            seed_count,
            now: 0,
            pass: 0,
            epoch: 0,
        })
    }

    /// Run every trial, returning why the last one ended.
    ///
    /// Returns [`EndReason::Aborted`] as soon as a reset is honoured.
    pub fn run(&mut self) -> Result<EndReason> {
        let mut reason = EndReason::Completed;
        for trial in 0..self.scenario.trials {
            self.control.set_progress(trial, 0);
            self.control.emit(Notification::TrialStart { trial });
            log::info!("starting trial {trial}");

            match self
                .run_trial(trial)
                .with_context(|| format!("failed to run trial {trial}"))?
            {
                Some(trial_reason) => reason = trial_reason,
                None => return Ok(EndReason::Aborted),
            }
        }
        Ok(reason)
    }

    fn run_trial(&mut self, trial: usize) -> Result<Option<EndReason>> {
        let scenario = Arc::clone(&self.scenario);
        self.now = 0;
        self.pop.restore_baselines();
        let with_disease = scenario.warm_up.kind == WarmUpKind::None;
        self.pop
            .materialize(&mut self.net, &mut self.ids, &self.disease, with_disease, &mut self.rng)
            .context("failed to materialize population")?;
        self.control.with_results(|results| {
            results.sim_data.push(Vec::with_capacity(scenario.ticks()));
        });

        if !with_disease {
            self.control.emit(Notification::WarmUpStart { trial });
            let completed = self.warm_up().context("failed to warm up")?;
            self.control.emit(Notification::WarmUpEnd { trial, completed });
            if !completed {
                return Ok(None);
            }
        }

        self.tallies.fill(Tally::default());
        self.pop.update_prevalence(&self.net);
        self.record(trial, 0);
        if self.control.checkpoint() == Flow::Abort {
            return Ok(None);
        }

        let plan = |tick| TickPlan {
            transmission: true,
            interventions: Some(tick),
        };
        let mut reason = EndReason::Completed;
        for tick in 1..=scenario.duration {
            self.control.set_progress(trial, tick);
            self.control.emit(Notification::TickStart {
                trial,
                tick,
                label: scenario.clock_unit.label(tick),
            });

            let n_infected = self
                .advance(plan(tick))
                .with_context(|| format!("failed to advance to tick {tick}"))?;
            self.record(trial, tick);
            self.control.emit(Notification::TickEnd { trial, tick });
            self.control.emit(Notification::Animate);

            if n_infected == 0 {
                log::info!("prevalence reached zero at tick {tick}");
                reason = EndReason::PrevalenceZero;
                self.pad(trial, tick, scenario.duration);
            }
            if self.control.checkpoint() == Flow::Abort {
                return Ok(None);
            }
            if reason == EndReason::PrevalenceZero {
                break;
            }
        }

        self.finish_trial(trial, reason).context("failed to finish trial")?;
        Ok(Some(reason))
    }

    /// Advance the clock by one tick and return the number of infected.
    fn advance(&mut self, plan: TickPlan) -> Result<usize> {
        self.now += 1;
        self.tallies.fill(Tally::default());

        self.update_people();
        self.update_partnerships();
        self.form_partnerships();
        if let Some(tick) = plan.interventions {
            self.apply_interventions(tick).context("failed to apply interventions")?;
        }
        if plan.transmission {
            self.transmit().context("failed to transmit disease")?;
        }
        Ok(self.pop.update_prevalence(&self.net))
    }

    /// Age everyone, replace the dead and end infections and protections.
    fn update_people(&mut self) {
        for slot in 0..self.net.len() {
            let id = PersonId(slot);
            let person = self.net.get_mut(id);
            person.age += self.years_per_tick;

            let disease_death = person.is_infected() && person.age >= person.death_age;
            if disease_death || person.age >= person.life_expectancy {
                self.replace_dead(id, disease_death);
                continue;
            }

            if person.is_infected() && person.age >= person.infection_end_age {
                self.disease.recover(person);
            } else if person.status == DiseaseStatus::Protected
                && person.protected_until.is_some_and(|until| self.now >= until)
            {
                person.status = DiseaseStatus::Susceptible;
                person.protected_until = None;
            }
        }
    }

    fn replace_dead(&mut self, id: PersonId, disease_death: bool) {
        let i_group = self.net.get(id).group;
        for (other, kind) in self.net.say_goodbye(id) {
            if kind == PartnerKind::Stable {
                self.enter_transitory(other);
            }
        }
        let person = self.pop.groups[i_group].new_person(i_group, &mut self.ids, &mut self.rng);
        self.net.replace(id, person);

        let tally = &mut self.tallies[i_group];
        tally.deaths += 1;
        if disease_death {
            tally.disease_deaths += 1;
        }
    }

    /// Move `id` to the transitory state unless another stable partner
    /// keeps it engaged.
    fn enter_transitory(&mut self, id: PersonId) {
        let period = self.pop.groups[self.net.get(id).group]
            .params
            .transitory_period;
        let person = self.net.get_mut(id);
        if !person.has_stable_partner() {
            person.state = PartnershipState::Transitory;
            person.transitory_end = self.now.saturating_add(period);
        }
    }

    /// Expire transitory periods and partnerships whose end has come.
    ///
    /// An expired partnership becomes a friendship.
    fn update_partnerships(&mut self) {
        let mut ended = Vec::new();
        for (id, person) in self.net.iter() {
            ended.extend(
                person
                    .partners()
                    .iter()
                    .filter(|(_, rel)| rel.initiator && rel.end <= self.now)
                    .map(|(other, rel)| (id, other, rel.kind)),
            );
        }
        for slot in 0..self.net.len() {
            let person = self.net.get_mut(PersonId(slot));
            if person.state == PartnershipState::Transitory && self.now >= person.transitory_end {
                person.state = PartnershipState::Available;
            }
        }

        for (a, b, kind) in ended {
            self.net.unlink(a, b);
            self.net.befriend(a, b);
            if kind == PartnerKind::Stable {
                self.enter_transitory(a);
                self.enter_transitory(b);
            }
        }
    }

    fn record(&mut self, trial: usize, tick: u32) {
        let rows: Vec<_> = self
            .pop
            .groups
            .iter()
            .enumerate()
            .map(|(i_group, group)| {
                SimData::collect(trial, tick, i_group, group, &self.net, self.tallies[i_group])
            })
            .collect();
        self.control.with_results(|results| {
            if let Some(trial_data) = results.sim_data.get_mut(trial) {
                trial_data.push(rows);
            }
        });
    }

    /// Carry the snapshot of `tick` forward to the end of the trial.
    fn pad(&mut self, trial: usize, tick: u32, duration: u32) {
        self.control.with_results(|results| {
            let Some(trial_data) = results.sim_data.get_mut(trial) else {
                return;
            };
            let Some(last) = trial_data.last().cloned() else {
                return;
            };
            for later in tick + 1..=duration {
                trial_data.push(last.iter().map(|row| row.carried_to(later)).collect());
            }
        });
    }

    fn finish_trial(&mut self, trial: usize, reason: EndReason) -> Result<()> {
        let mut swn = Vec::with_capacity(self.pop.len());
        for (i_group, group) in self.pop.groups.iter().enumerate() {
            let graph = GroupGraph::from_network(&self.net, group.slots.clone());
            let info = analytics::analyze(
                &graph,
                &self.scenario.paths,
                group.params.pr_casual,
                &mut self.rng,
            )
            .with_context(|| format!("failed to analyze group {i_group}"))?;
            swn.push(SwnInfo {
                trial,
                group: i_group,
                ..info
            });
        }
        self.net.sever_partnerships();
        self.net.clear();

        self.control.with_results(|results| {
            results.swn.push(swn);
            results.trial_end.push(reason);
        });
        self.control.emit(Notification::TrialEnd { trial, reason });
        log::info!("finished trial {trial} ({reason})");
        Ok(())
    }
}

/// Bernoulli draw with probability `prob`.
fn chance<R: Rng + ?Sized>(rng: &mut R, prob: f64) -> bool {
    rng.random::<f64>() < prob
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use std::time::Duration;

    pub(super) fn engine(sizes: &[usize], duration: u32) -> Engine {
        let scenario = Arc::new(testing::scenario(sizes, duration));
        let control = Arc::new(Control::new(Duration::ZERO));
        let mut engine = Engine::new(scenario, control).unwrap();
        engine
            .pop
            .materialize(&mut engine.net, &mut engine.ids, &engine.disease, false, &mut engine.rng)
            .unwrap();
        engine
    }

    #[test]
    fn expired_partnership_becomes_friendship() {
        let mut engine = engine(&[10], 5);
        let (a, b) = (PersonId(0), PersonId(1));
        engine.net.link(a, b, PartnerKind::Stable, 1);
        engine.net.get_mut(a).state = PartnershipState::Engaged;
        engine.net.get_mut(b).state = PartnershipState::Engaged;

        engine.now = 1;
        engine.update_partnerships();
        assert!(!engine.net.are_partners(a, b));
        assert!(engine.net.are_friends(a, b));
        for id in [a, b] {
            let person = engine.net.get(id);
            assert_eq!(person.state, PartnershipState::Transitory);
            assert_eq!(person.transitory_end, 3);
        }

        engine.now = 3;
        engine.update_partnerships();
        assert_eq!(engine.net.get(a).state, PartnershipState::Available);
    }

    #[test]
    fn dead_are_replaced_in_place() {
        let mut engine = engine(&[10], 5);
        let (a, b, c) = (PersonId(0), PersonId(1), PersonId(2));
        engine.net.link(a, b, PartnerKind::Stable, 50);
        engine.net.get_mut(b).state = PartnershipState::Engaged;
        engine.net.befriend(a, c);
        let old_id = engine.net.get(a).id;
        engine.net.get_mut(a).life_expectancy = 0.0;

        engine.update_people();
        let person = engine.net.get(a);
        assert_ne!(person.id, old_id);
        assert!(person.partners().is_empty() && person.friends().is_empty());
        assert!(engine.net.get(c).friends().is_empty());
        assert!(!engine.net.are_friends(b, a));
        assert_eq!(engine.net.get(b).state, PartnershipState::Transitory);
        assert_eq!(engine.tallies[0].deaths, 1);
        assert_eq!(engine.tallies[0].disease_deaths, 0);
    }

    #[test]
    fn infections_end_and_protection_expires() {
        let mut engine = engine(&[4], 5);
        let (a, b) = (PersonId(0), PersonId(1));
        let person = engine.net.get_mut(a);
        person.status = DiseaseStatus::Infected;
        person.infection_end_age = person.age;

        let person = engine.net.get_mut(b);
        person.status = DiseaseStatus::Protected;
        person.protected_until = Some(1);

        engine.now = 1;
        engine.update_people();
        // Lifelong protection after recovery without reinfection.
        assert_eq!(engine.net.get(a).status, DiseaseStatus::Protected);
        assert_eq!(engine.net.get(a).protected_until, None);
        assert_eq!(engine.net.get(b).status, DiseaseStatus::Susceptible);
    }
}
