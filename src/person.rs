use crate::relation::{FriendList, PartnerKind, PartnerList};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseStatus {
    Susceptible,
    Infected,
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartnershipState {
    Available,
    Engaged,
    Transitory,
}

/// Point on the unit sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    /// Angle in radians between two points on the unit sphere.
    pub fn angle_to(&self, other: &Point) -> f64 {
        let dot = self.x * other.x + self.y * other.y + self.z * other.z;
        dot.clamp(-1.0, 1.0).acos()
    }
}

/// Vertex of the social network.
///
/// Ages are measured in years; times (`transitory_end`, `protected_until`)
/// in simulation ticks.
#[derive(Debug, Clone)]
pub struct Person {
    pub id: u64,
    pub group: usize,
    pub age: f64,
    pub life_expectancy: f64,
    pub gender: Gender,
    /// Same-sex preference, only ever set for males.
    pub same_sex: bool,

    pub status: DiseaseStatus,
    pub infection_age: f64,
    /// Age at which the infection ends (infinite for lifelong diseases).
    pub infection_end_age: f64,
    /// Age at which the disease kills (infinite if it never does).
    pub death_age: f64,
    pub protected_until: Option<u32>,

    pub state: PartnershipState,
    pub transitory_end: u32,

    pub(crate) partners: PartnerList,
    pub(crate) friends: FriendList,

    pub location: Option<Point>,

    pub(crate) mark: u64,
    pub(crate) depth: u32,
}

impl Person {
    pub fn new(id: u64, group: usize, age: f64, life_expectancy: f64, gender: Gender) -> Self {
        Self {
            id,
            group,
            age,
            life_expectancy,
            gender,
            same_sex: false,
            status: DiseaseStatus::Susceptible,
            infection_age: 0.0,
            infection_end_age: f64::INFINITY,
            death_age: f64::INFINITY,
            protected_until: None,
            state: PartnershipState::Available,
            transitory_end: 0,
            partners: PartnerList::default(),
            friends: FriendList::default(),
            location: None,
            mark: 0,
            depth: 0,
        }
    }

    pub fn partners(&self) -> &PartnerList {
        &self.partners
    }

    pub fn friends(&self) -> &FriendList {
        &self.friends
    }

    pub fn is_infected(&self) -> bool {
        self.status == DiseaseStatus::Infected
    }

    pub fn is_susceptible(&self) -> bool {
        self.status == DiseaseStatus::Susceptible
    }

    pub fn is_msm(&self) -> bool {
        self.gender == Gender::Male && self.same_sex
    }

    pub fn has_stable_partner(&self) -> bool {
        self.partners.count(PartnerKind::Stable) > 0
    }

    fn attracted_to(&self, other: &Person) -> bool {
        match self.gender {
            Gender::Male if self.same_sex => other.gender == Gender::Male,
            Gender::Male => other.gender == Gender::Female,
            Gender::Female => other.gender == Gender::Male,
        }
    }

    /// Gender and orientation allow a partnership in both directions.
    pub fn orientation_matches(&self, other: &Person) -> bool {
        self.attracted_to(other) && other.attracted_to(self)
    }
}
