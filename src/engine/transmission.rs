use super::{Engine, chance};
use crate::data::Direction;
use crate::disease::transmission_probability;
use crate::network::PersonId;
use crate::relation::PartnerKind;
use crate::utils::geo_mean;
use anyhow::Result;

/// Infection drawn during a pass, applied once the pass is over.
#[derive(Debug, Clone, Copy)]
struct Exposure {
    src: PersonId,
    dst: PersonId,
    external: bool,
}

impl Engine {
    /// Evaluate every partnership once.
    ///
    /// Infections take effect after all partnerships were evaluated, so a
    /// person infected during this pass does not transmit until the next.
    pub(super) fn transmit(&mut self) -> Result<()> {
        self.pass += 1;
        let pass = self.pass;

        let mut exposures = Vec::new();
        for slot in 0..self.net.len() {
            let a = PersonId(slot);
            let partners: Vec<_> = self.net.get(a).partners().ids().collect();
            for b in partners {
                if !self.net.visit(a, b, pass) {
                    continue;
                }
                if let Some(exposure) = self.expose(a, b)? {
                    exposures.push(exposure);
                }
            }
        }

        for Exposure { src, dst, external } in exposures {
            if !self.net.get(dst).is_susceptible() {
                continue;
            }
            self.disease.infect(self.net.get_mut(dst), &mut self.rng);
            let (src, dst) = (self.net.get(src), self.net.get(dst));
            if let Some(direction) = Direction::new(src.gender, dst.gender) {
                self.tallies[dst.group].add_infection(direction, external);
            }
        }
        Ok(())
    }

    /// Draw whether the partnership `a - b` transmits this tick.
    fn expose(&mut self, a: PersonId, b: PersonId) -> Result<Option<Exposure>> {
        let (person_a, person_b) = (self.net.get(a), self.net.get(b));
        let (src, dst) = if person_a.is_infected() && person_b.is_susceptible() {
            (a, b)
        } else if person_b.is_infected() && person_a.is_susceptible() {
            (b, a)
        } else {
            return Ok(None);
        };
        let Some(rel) = person_a.partners().get(b) else {
            return Ok(None);
        };
        let initiator = if rel.initiator { a } else { b };
        let kind = rel.kind;

        let group_a = &self.pop.groups[person_a.group];
        let group_b = &self.pop.groups[person_b.group];
        let (pr_safe, contacts) = match kind {
            PartnerKind::Stable => {
                let group = &self.pop.groups[self.net.get(initiator).group];
                let contacts = group.contacts_sampler(kind).sample_count(&mut self.rng);
                (group.pr_safe(kind), contacts)
            }
            PartnerKind::Casual => {
                let contacts = geo_mean(
                    group_a.contacts_sampler(kind).sample(&mut self.rng),
                    group_b.contacts_sampler(kind).sample(&mut self.rng),
                );
                (
                    geo_mean(group_a.pr_safe(kind), group_b.pr_safe(kind)),
                    contacts.round() as usize,
                )
            }
        };
        let external = person_a.group != person_b.group;

        if chance(&mut self.rng, pr_safe) {
            return Ok(None);
        }
        let Some(prob) = self
            .disease
            .direction_prob(self.net.get(src), self.net.get(dst))
        else {
            return Ok(None);
        };
        let prob = transmission_probability(prob, contacts)?;
        Ok(chance(&mut self.rng, prob).then_some(Exposure { src, dst, external }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::engine;
    use super::*;
    use crate::person::Gender;

    fn couple(engine: &mut Engine, kind: PartnerKind) -> (PersonId, PersonId) {
        let (a, b) = (PersonId(0), PersonId(1));
        engine.net.get_mut(a).gender = Gender::Male;
        engine.net.get_mut(b).gender = Gender::Female;
        engine.net.link(a, b, kind, 100);
        engine.disease.infect(engine.net.get_mut(a), &mut engine.rng);
        (a, b)
    }

    #[test]
    fn certain_transmission_is_tallied_once() {
        let mut engine = engine(&[4], 5);
        engine.disease.params.pr_male_to_female = 1.0;
        engine.disease = crate::disease::DiseaseModel::new(&engine.disease.params).unwrap();
        let (_, b) = couple(&mut engine, PartnerKind::Stable);

        engine.transmit().unwrap();
        assert!(engine.net.get(b).is_infected());
        let tally = engine.tallies[0];
        assert_eq!(tally.incidence, 1);
        assert_eq!(tally.incidence_mf, 1);
        assert_eq!(tally.incidence_internal, 1);
    }

    #[test]
    fn safe_sex_blocks_transmission() {
        let mut engine = engine(&[4], 5);
        engine.disease.params.pr_male_to_female = 1.0;
        engine.disease = crate::disease::DiseaseModel::new(&engine.disease.params).unwrap();
        engine.pop.groups[0].params.pr_safe_casual = 1.0;
        let (_, b) = couple(&mut engine, PartnerKind::Casual);

        for _ in 0..20 {
            engine.transmit().unwrap();
        }
        assert!(engine.net.get(b).is_susceptible());
        assert_eq!(engine.tallies[0].incidence, 0);
    }

    #[test]
    fn newly_infected_wait_for_next_pass() {
        let mut engine = engine(&[4], 5);
        engine.disease.params.pr_male_to_female = 1.0;
        engine.disease.params.pr_female_to_male = 1.0;
        engine.disease = crate::disease::DiseaseModel::new(&engine.disease.params).unwrap();
        let (_, b) = couple(&mut engine, PartnerKind::Stable);
        let c = PersonId(2);
        engine.net.get_mut(c).gender = Gender::Male;
        engine.net.link(b, c, PartnerKind::Stable, 100);

        engine.transmit().unwrap();
        assert!(engine.net.get(b).is_infected());
        assert!(engine.net.get(c).is_susceptible());
        engine.transmit().unwrap();
        assert!(engine.net.get(c).is_infected());
    }
}
