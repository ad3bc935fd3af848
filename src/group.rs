use crate::disease::DiseaseModel;
use crate::dist::{Dist, Sampler};
use crate::ids::IdAllocator;
use crate::network::{Network, PersonId};
use crate::person::{Gender, Person, Point};
use crate::relation::PartnerKind;
use crate::sampling::PersonSampler;
use crate::utils::check_num;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_distr::Bernoulli;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    Free,
    Ring,
    Sphere,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphereParams {
    pub radius: f64,
    /// Geodesic distance within which partners and friends are searched.
    pub search_distance: f64,
}

impl Default for SphereParams {
    fn default() -> Self {
        Self {
            radius: 1.0,
            search_distance: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendshipParams {
    pub max_friends: usize,
    /// Slope of the logarithmic decay of the acceptance probability with
    /// the number of friends a candidate already has.
    pub decay: f64,
}

impl Default for FriendshipParams {
    fn default() -> Self {
        Self {
            max_friends: 20,
            decay: 0.25,
        }
    }
}

/// Group parameters. Ages in years, durations in ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupParams {
    pub name: String,
    pub size: usize,
    pub topology: Topology,

    pub age: Dist,
    pub life_expectancy: Dist,
    pub pr_male: f64,
    /// Probability that a male prefers male partners.
    pub pr_same_sex: f64,
    #[serde(default = "default_debut_age")]
    pub debut_age: f64,

    /// Initial prevalence, also the target of conditional warm-up.
    pub prevalence: f64,
    /// Infections seeded on top of the prevalence draw.
    #[serde(default)]
    pub seed_infections: usize,

    pub pr_new_partner: f64,
    pub max_partners: usize,
    pub pr_concurrency: f64,
    pub pr_casual: f64,
    /// Probability that a casual search starts inside the own group.
    pub pr_internal: f64,
    pub search_trials: usize,
    /// Maximum number of hops of acquaintance searches (1 to 3).
    pub acquaintance_depth: usize,
    /// Ticks spent in the transitory state after a stable partnership.
    pub transitory_period: u32,

    pub casual_duration: Dist,
    pub stable_duration: Dist,
    pub casual_contacts: Dist,
    pub stable_contacts: Dist,
    pub pr_safe_casual: f64,
    pub pr_safe_stable: f64,

    #[serde(default)]
    pub sphere: SphereParams,
    #[serde(default)]
    pub friendship: FriendshipParams,
}

fn default_debut_age() -> f64 {
    15.0
}

impl GroupParams {
    pub fn validate(&self) -> Result<()> {
        check_num(self.size, 1..1_000_000).context("invalid size")?;
        for (name, prob) in [
            ("male", self.pr_male),
            ("same sex", self.pr_same_sex),
            ("prevalence", self.prevalence),
            ("new partner", self.pr_new_partner),
            ("concurrency", self.pr_concurrency),
            ("casual", self.pr_casual),
            ("internal", self.pr_internal),
            ("safe casual", self.pr_safe_casual),
            ("safe stable", self.pr_safe_stable),
        ] {
            check_num(prob, 0.0..=1.0).with_context(|| format!("invalid {name} probability"))?;
        }
        check_num(self.seed_infections, 0..=self.size).context("invalid seed infections")?;
        check_num(self.max_partners, 1..1_000).context("invalid max partners")?;
        check_num(self.search_trials, 1..100_000).context("invalid search trials")?;
        check_num(self.acquaintance_depth, 1..=3).context("invalid acquaintance depth")?;
        check_num(self.debut_age, 0.0..200.0).context("invalid debut age")?;
        check_num(self.friendship.decay, 0.0..=10.0).context("invalid friendship decay")?;

        for (name, dist) in [
            ("age", &self.age),
            ("life expectancy", &self.life_expectancy),
            ("casual duration", &self.casual_duration),
            ("stable duration", &self.stable_duration),
            ("casual contacts", &self.casual_contacts),
            ("stable contacts", &self.stable_contacts),
        ] {
            dist.compile().with_context(|| format!("invalid {name}"))?;
        }

        if self.topology == Topology::Sphere {
            let sphere = &self.sphere;
            check_num(sphere.radius, f64::MIN_POSITIVE..f64::INFINITY)
                .context("invalid sphere radius")?;
            // The cosine is bounded by 1, so this can only trigger for radii
            // below 1/pi.
            if (sphere.search_distance / sphere.radius).cos() > PI * sphere.radius {
                bail!("search distance is not compatible with the sphere radius");
            }
        }
        Ok(())
    }
}

/// Compiled stochastic parameters of a group.
#[derive(Debug, Clone)]
pub(crate) struct GroupModel {
    pub age: Sampler,
    pub life_expectancy: Sampler,
    pub male: Bernoulli,
    pub same_sex: Bernoulli,
    pub new_partner: Bernoulli,
    pub casual: Bernoulli,
    pub internal: Bernoulli,
    pub casual_duration: Sampler,
    pub stable_duration: Sampler,
    pub casual_contacts: Sampler,
    pub stable_contacts: Sampler,
}

impl GroupModel {
    fn new(params: &GroupParams) -> Result<Self> {
        Ok(Self {
            age: params.age.compile()?,
            life_expectancy: params.life_expectancy.compile()?,
            male: Bernoulli::new(params.pr_male)?,
            same_sex: Bernoulli::new(params.pr_same_sex)?,
            new_partner: Bernoulli::new(params.pr_new_partner)?,
            casual: Bernoulli::new(params.pr_casual)?,
            internal: Bernoulli::new(params.pr_internal)?,
            casual_duration: params.casual_duration.compile()?,
            stable_duration: params.stable_duration.compile()?,
            casual_contacts: params.casual_contacts.compile()?,
            stable_contacts: params.stable_contacts.compile()?,
        })
    }
}

/// A group of the population and its live vertices.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: u32,
    pub params: GroupParams,
    /// Slots of the network arena holding this group's persons.
    pub slots: Range<usize>,
    /// Current prevalence.
    pub prevalence: f64,
    /// Current concurrency limits, relaxed during warm-up.
    pub max_partners: usize,
    pub pr_concurrency: f64,
    pub warmed_up: bool,
    pub(crate) model: GroupModel,
}

impl Group {
    pub fn new(params: &GroupParams, ids: &mut IdAllocator) -> Result<Self> {
        Ok(Self {
            id: ids.next_group(),
            params: params.clone(),
            slots: 0..0,
            prevalence: params.prevalence,
            max_partners: params.max_partners,
            pr_concurrency: params.pr_concurrency,
            warmed_up: false,
            model: GroupModel::new(params).context("failed to compile group model")?,
        })
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn members(&self) -> impl Iterator<Item = PersonId> {
        self.slots.clone().map(PersonId)
    }

    pub fn contains(&self, id: PersonId) -> bool {
        self.slots.contains(&id.0)
    }

    /// Restore prevalence and concurrency to their configured values.
    pub fn restore_baselines(&mut self) {
        self.prevalence = self.params.prevalence;
        self.warmed_up = false;
        self.restore_concurrency();
    }

    pub fn restore_concurrency(&mut self) {
        self.max_partners = self.params.max_partners;
        self.pr_concurrency = self.params.pr_concurrency;
    }

    pub fn duration_sampler(&self, kind: PartnerKind) -> &Sampler {
        match kind {
            PartnerKind::Casual => &self.model.casual_duration,
            PartnerKind::Stable => &self.model.stable_duration,
        }
    }

    pub fn contacts_sampler(&self, kind: PartnerKind) -> &Sampler {
        match kind {
            PartnerKind::Casual => &self.model.casual_contacts,
            PartnerKind::Stable => &self.model.stable_contacts,
        }
    }

    pub fn pr_safe(&self, kind: PartnerKind) -> f64 {
        match kind {
            PartnerKind::Casual => self.params.pr_safe_casual,
            PartnerKind::Stable => self.params.pr_safe_stable,
        }
    }

    /// Sample a new susceptible person belonging to this group.
    pub fn new_person<R: Rng + ?Sized>(
        &self,
        index: usize,
        ids: &mut IdAllocator,
        rng: &mut R,
    ) -> Person {
        let age = self.model.age.sample(rng);
        let life_expectancy = self.model.life_expectancy.sample(rng);
        let gender = if self.model.male.sample(rng) {
            Gender::Male
        } else {
            Gender::Female
        };
        let mut person = Person::new(ids.next_person(), index, age, life_expectancy, gender);
        if gender == Gender::Male {
            person.same_sex = self.model.same_sex.sample(rng);
        }
        if self.params.topology == Topology::Sphere {
            person.location = Some(random_unit_point(rng));
        }
        person
    }

    /// Append `size` new persons to the network and take ownership of their
    /// slots. Initial infections are drawn unless `with_disease` is false.
    pub fn create_population<R: Rng + ?Sized>(
        &mut self,
        index: usize,
        net: &mut Network,
        ids: &mut IdAllocator,
        disease: &DiseaseModel,
        with_disease: bool,
        rng: &mut R,
    ) -> Result<()> {
        let start = net.len();
        for _ in 0..self.params.size {
            let person = self.new_person(index, ids, rng);
            net.push(person);
        }
        self.slots = start..net.len();
        if with_disease {
            self.seed_initial(net, disease, rng)?;
        }
        Ok(())
    }

    /// Infect each susceptible member with probability equal to the current
    /// prevalence, then add the configured seed infections.
    pub fn seed_initial<R: Rng + ?Sized>(
        &self,
        net: &mut Network,
        disease: &DiseaseModel,
        rng: &mut R,
    ) -> Result<usize> {
        let prevalence = Bernoulli::new(self.prevalence).context("invalid prevalence")?;
        let mut n_seeded = 0;
        for id in self.members() {
            let person = net.get_mut(id);
            if person.is_susceptible() && prevalence.sample(rng) {
                disease.infect_initial(person, self.params.debut_age, rng);
                n_seeded += 1;
            }
        }
        let mut sampler = self.susceptible_sampler(net);
        for _ in 0..self.params.seed_infections {
            let Some(id) = sampler.next(rng) else {
                break;
            };
            disease.infect_initial(net.get_mut(id), self.params.debut_age, rng);
            n_seeded += 1;
        }
        Ok(n_seeded)
    }

    /// Infect up to `count` distinct susceptible members now.
    pub fn seed_count<R: Rng + ?Sized>(
        &self,
        net: &mut Network,
        disease: &DiseaseModel,
        count: usize,
        rng: &mut R,
    ) -> usize {
        let mut sampler = self.susceptible_sampler(net);
        let mut n_seeded = 0;
        while n_seeded < count {
            let Some(id) = sampler.next(rng) else {
                break;
            };
            disease.infect(net.get_mut(id), rng);
            n_seeded += 1;
        }
        n_seeded
    }

    fn susceptible_sampler(&self, net: &Network) -> PersonSampler {
        PersonSampler::from_pool(
            self.members()
                .filter(|&id| net.get(id).is_susceptible())
                .collect(),
        )
    }

    pub fn count_infected(&self, net: &Network) -> usize {
        self.members().filter(|&id| net.get(id).is_infected()).count()
    }

    pub fn update_prevalence(&mut self, net: &Network) -> usize {
        let n_infected = self.count_infected(net);
        self.prevalence = if self.size() > 0 {
            n_infected as f64 / self.size() as f64
        } else {
            0.0
        };
        n_infected
    }
}

fn random_unit_point<R: Rng + ?Sized>(rng: &mut R) -> Point {
    let z: f64 = rng.random_range(-1.0..=1.0);
    let phi: f64 = rng.random_range(0.0..2.0 * PI);
    let r = (1.0 - z * z).sqrt();
    Point {
        x: r * phi.cos(),
        y: r * phi.sin(),
        z,
    }
}
