use super::{Engine, chance};
use crate::dist::Sampler;
use crate::group::Topology;
use crate::network::PersonId;
use crate::person::PartnershipState;
use crate::relation::PartnerKind;
use crate::sampling::PersonSampler;
use rand::prelude::*;
use std::collections::VecDeque;

/// What a search is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Goal {
    Partner(PartnerKind),
    Friend,
}

impl Engine {
    /// Let every person look for a partner or a friend.
    ///
    /// Groups are visited round-robin from a random one, members in a
    /// random order.
    pub(super) fn form_partnerships(&mut self) {
        let n_groups = self.pop.len();
        let first = self.rng.random_range(0..n_groups);
        for offset in 0..n_groups {
            let i_group = (first + offset) % n_groups;
            let mut order = PersonSampler::from_pool(self.pop.groups[i_group].members().collect());
            while let Some(id) = order.next(&mut self.rng) {
                if self.pop.groups[i_group]
                    .model
                    .new_partner
                    .sample(&mut self.rng)
                {
                    self.seek_partner(id);
                } else {
                    self.seek_friend(id);
                }
            }
        }
    }

    fn seek_partner(&mut self, id: PersonId) {
        let kind = self.draw_kind(id);
        if !self.is_willing(id, kind) {
            return;
        }
        let found = match kind {
            PartnerKind::Casual => self.search_casual(id),
            PartnerKind::Stable => self
                .search_acquaintances(id, Goal::Partner(kind))
                .or_else(|| self.search_topology(id, Goal::Partner(kind))),
        };
        if let Some(other) = found {
            self.form_partnership(id, other, kind);
        }
    }

    fn seek_friend(&mut self, id: PersonId) {
        let max_friends = self.pop.group_of(&self.net, id).params.friendship.max_friends;
        if self.net.get(id).friends().len() >= max_friends {
            return;
        }
        let found = self
            .search_acquaintances(id, Goal::Friend)
            .or_else(|| self.search_topology(id, Goal::Friend));
        if let Some(other) = found {
            self.net.befriend(id, other);
        }
    }

    fn draw_kind(&mut self, id: PersonId) -> PartnerKind {
        let group = &self.pop.groups[self.net.get(id).group];
        if group.model.casual.sample(&mut self.rng) {
            PartnerKind::Casual
        } else {
            PartnerKind::Stable
        }
    }

    /// Whether `id` may take one more partner of `kind`.
    fn is_willing(&mut self, id: PersonId, kind: PartnerKind) -> bool {
        let person = self.net.get(id);
        let group = &self.pop.groups[person.group];
        let n_partners = person.partners().len();
        if n_partners >= group.max_partners {
            return false;
        }
        if kind == PartnerKind::Stable && person.state != PartnershipState::Available {
            return false;
        }
        n_partners == 0 || chance(&mut self.rng, group.pr_concurrency)
    }

    fn accepts(&mut self, seeker: PersonId, candidate: PersonId, goal: Goal) -> bool {
        if seeker == candidate {
            return false;
        }
        match goal {
            Goal::Partner(kind) => {
                if self.net.are_partners(seeker, candidate)
                    || !self
                        .net
                        .get(seeker)
                        .orientation_matches(self.net.get(candidate))
                {
                    return false;
                }
                self.draw_kind(candidate) == kind && self.is_willing(candidate, kind)
            }
            Goal::Friend => {
                if self.net.are_friends(seeker, candidate) {
                    return false;
                }
                let person = self.net.get(candidate);
                let params = &self.pop.groups[person.group].params.friendship;
                let n_friends = person.friends().len();
                if n_friends >= params.max_friends {
                    return false;
                }
                let prob = (1.0 - params.decay * (1.0 + n_friends as f64).ln()).clamp(0.0, 1.0);
                chance(&mut self.rng, prob)
            }
        }
    }

    /// Casual search, inside the own group and in one sampled external group,
    /// in an order decided by the internal probability.
    fn search_casual(&mut self, id: PersonId) -> Option<PersonId> {
        let i_group = self.net.get(id).group;
        let internal_first = self.pop.groups[i_group]
            .model
            .internal
            .sample(&mut self.rng);
        let external = self.pop.pick_external(i_group, &mut self.rng);
        let targets = if internal_first {
            [Some(i_group), external]
        } else {
            [external, Some(i_group)]
        };
        targets
            .into_iter()
            .flatten()
            .find_map(|target| self.search_random(id, target, Goal::Partner(PartnerKind::Casual)))
    }

    /// Uniform random candidates from group `target`.
    fn search_random(&mut self, id: PersonId, target: usize, goal: Goal) -> Option<PersonId> {
        let trials = self.pop.group_of(&self.net, id).params.search_trials;
        let slots = self.pop.groups[target].slots.clone();
        if slots.is_empty() {
            return None;
        }
        for _ in 0..trials {
            let candidate = PersonId(self.rng.random_range(slots.clone()));
            if self.accepts(id, candidate, goal) {
                return Some(candidate);
            }
        }
        None
    }

    /// Breadth-first search over friends, friends of friends and so on, up
    /// to the acquaintance depth of the seeker's group.
    fn search_acquaintances(&mut self, id: PersonId, goal: Goal) -> Option<PersonId> {
        let max_depth = self.pop.group_of(&self.net, id).params.acquaintance_depth as u32;
        self.epoch += 1;
        let epoch = self.epoch;

        let seeker = self.net.get_mut(id);
        seeker.mark = epoch;
        seeker.depth = 0;
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let depth = self.net.get(current).depth;
            if depth >= max_depth {
                continue;
            }
            let friends: Vec<_> = self.net.get(current).friends().iter().collect();
            for friend in friends {
                let person = self.net.get_mut(friend);
                if person.mark == epoch {
                    continue;
                }
                person.mark = epoch;
                person.depth = depth + 1;
                if self.accepts(id, friend, goal) {
                    return Some(friend);
                }
                queue.push_back(friend);
            }
        }
        None
    }

    /// Search around the seeker following the topology of its group.
    fn search_topology(&mut self, id: PersonId, goal: Goal) -> Option<PersonId> {
        let i_group = self.net.get(id).group;
        let group = &self.pop.groups[i_group];
        let trials = group.params.search_trials;
        let slots = group.slots.clone();
        let sphere = group.params.sphere.clone();
        let n = slots.len();

        match group.params.topology {
            Topology::Free => self.search_random(id, i_group, goal),
            Topology::Ring => {
                let pos = id.0 - slots.start;
                for step in 1..=trials {
                    let offset = step.div_ceil(2) % n;
                    let cand_pos = if step % 2 == 1 {
                        (pos + offset) % n
                    } else {
                        (pos + n - offset) % n
                    };
                    let candidate = PersonId(slots.start + cand_pos);
                    if self.accepts(id, candidate, goal) {
                        return Some(candidate);
                    }
                }
                None
            }
            Topology::Sphere => {
                let location = self.net.get(id).location?;
                let max_angle = sphere.search_distance / sphere.radius;
                let first = self.rng.random_range(0..n);
                let mut n_tried = 0;
                for k in 0..n {
                    let candidate = PersonId(slots.start + (first + k) % n);
                    let near = self
                        .net
                        .get(candidate)
                        .location
                        .is_some_and(|other| location.angle_to(&other) <= max_angle);
                    if candidate == id || !near {
                        continue;
                    }
                    if self.accepts(id, candidate, goal) {
                        return Some(candidate);
                    }
                    n_tried += 1;
                    if n_tried >= trials {
                        break;
                    }
                }
                None
            }
        }
    }

    /// Create the partnership `a -> b` with a sampled duration.
    ///
    /// Casual partnerships across groups last the geometric mean of one draw
    /// from each group's distribution.
    fn form_partnership(&mut self, a: PersonId, b: PersonId, kind: PartnerKind) {
        let group_a = &self.pop.groups[self.net.get(a).group];
        let group_b = &self.pop.groups[self.net.get(b).group];
        let duration = if kind == PartnerKind::Casual && group_a.id != group_b.id {
            Sampler::sample_geo(
                group_a.duration_sampler(kind),
                group_b.duration_sampler(kind),
                &mut self.rng,
            )
        } else {
            group_a.duration_sampler(kind).sample(&mut self.rng)
        };
        let end = self.now.saturating_add((duration.round() as u32).max(1));
        if self.net.link(a, b, kind, end) && kind == PartnerKind::Stable {
            self.net.get_mut(a).state = PartnershipState::Engaged;
            self.net.get_mut(b).state = PartnershipState::Engaged;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::engine;
    use super::*;
    use crate::dist::Dist;
    use crate::person::Gender;

    #[test]
    fn formation_keeps_edges_mirrored_and_capped() {
        let mut engine = engine(&[30, 20], 5);
        for _ in 0..10 {
            engine.now += 1;
            engine.update_partnerships();
            engine.form_partnerships();
        }
        let mut n_partnerships = 0;
        for (id, person) in engine.net.iter() {
            let group = &engine.pop.groups[person.group];
            assert!(person.partners().len() <= group.max_partners);
            assert!(person.friends().len() <= group.params.friendship.max_friends);
            for (other, rel) in person.partners().iter() {
                let mirror = engine.net.get(other).partners().get(id).unwrap();
                assert_eq!((mirror.kind, mirror.end), (rel.kind, rel.end));
                assert!(person.orientation_matches(engine.net.get(other)));
                n_partnerships += 1;
            }
            if person.has_stable_partner() {
                assert_eq!(person.state, PartnershipState::Engaged);
            }
        }
        assert!(n_partnerships > 0);
    }

    #[test]
    fn acquaintance_search_respects_depth() {
        let mut engine = engine(&[6], 5);
        for slot in 0..6 {
            let person = engine.net.get_mut(PersonId(slot));
            person.gender = Gender::Female;
            person.same_sex = false;
        }
        // Chain 0 - 1 - 2 - 3 - 4 - 5 with only 4 a compatible partner.
        for slot in 0..5 {
            engine.net.befriend(PersonId(slot), PersonId(slot + 1));
        }
        engine.net.get_mut(PersonId(4)).gender = Gender::Male;
        engine.pop.groups[0].model.casual = rand_distr::Bernoulli::new(0.0).unwrap();

        let goal = Goal::Partner(PartnerKind::Stable);
        engine.pop.groups[0].params.acquaintance_depth = 3;
        assert_eq!(engine.search_acquaintances(PersonId(0), goal), None);
        engine.pop.groups[0].params.acquaintance_depth = 2;
        assert_eq!(engine.search_acquaintances(PersonId(2), goal), Some(PersonId(4)));
    }

    #[test]
    fn ring_search_steps_outwards() {
        let mut engine = engine(&[8], 5);
        for slot in 0..8 {
            let person = engine.net.get_mut(PersonId(slot));
            person.gender = Gender::Female;
        }
        engine.net.get_mut(PersonId(6)).gender = Gender::Male;
        engine.pop.groups[0].params.topology = Topology::Ring;
        engine.pop.groups[0].model.casual = rand_distr::Bernoulli::new(0.0).unwrap();

        let goal = Goal::Partner(PartnerKind::Stable);
        engine.pop.groups[0].params.search_trials = 3;
        assert_eq!(engine.search_topology(PersonId(0), goal), None);
        engine.pop.groups[0].params.search_trials = 4;
        assert_eq!(engine.search_topology(PersonId(0), goal), Some(PersonId(6)));
    }

    #[test]
    fn long_partnerships_end_at_the_last_tick() {
        let mut engine = engine(&[4], 5);
        let (a, b) = (PersonId(0), PersonId(1));
        engine.pop.groups[0].model.casual_duration = Dist::constant(1e12).compile().unwrap();
        engine.now = 10;
        engine.form_partnership(a, b, PartnerKind::Casual);
        assert_eq!(engine.net.get(a).partners().get(b).unwrap().end, u32::MAX);

        engine.pop.groups[0].params.transitory_period = u32::MAX;
        engine.enter_transitory(a);
        assert_eq!(engine.net.get(a).transitory_end, u32::MAX);

        engine.update_partnerships();
        assert!(engine.net.are_partners(a, b));
    }
}
