use crate::analytics::SwnInfo;
use crate::group::Group;
use crate::network::Network;
use crate::person::{DiseaseStatus, Gender};
use crate::relation::PartnerKind;
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Events counted during one tick, per group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub incidence: usize,
    pub incidence_mf: usize,
    pub incidence_fm: usize,
    pub incidence_mm: usize,
    pub incidence_internal: usize,
    pub incidence_external: usize,
    pub deaths: usize,
    pub disease_deaths: usize,
    pub vaccinated: usize,
}

/// Direction of a transmission, by gender of source and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    MaleToFemale,
    FemaleToMale,
    MaleToMale,
}

impl Direction {
    pub fn new(src: Gender, dst: Gender) -> Option<Self> {
        match (src, dst) {
            (Gender::Male, Gender::Female) => Some(Direction::MaleToFemale),
            (Gender::Female, Gender::Male) => Some(Direction::FemaleToMale),
            (Gender::Male, Gender::Male) => Some(Direction::MaleToMale),
            (Gender::Female, Gender::Female) => None,
        }
    }
}

impl Tally {
    pub fn add_infection(&mut self, direction: Direction, external: bool) {
        self.incidence += 1;
        match direction {
            Direction::MaleToFemale => self.incidence_mf += 1,
            Direction::FemaleToMale => self.incidence_fm += 1,
            Direction::MaleToMale => self.incidence_mm += 1,
        }
        if external {
            self.incidence_external += 1;
        } else {
            self.incidence_internal += 1;
        }
    }
}

/// Snapshot of one group at one tick of one trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimData {
    pub trial: usize,
    pub tick: u32,
    pub group: usize,

    pub size: usize,
    pub males: usize,
    pub females: usize,
    pub msm: usize,

    /// Friendships with both ends in the group.
    pub friendships: usize,
    /// Partnerships with both ends in the group, by kind.
    pub casual_internal: usize,
    pub stable_internal: usize,
    /// Partnerships of members with persons of other groups, by kind.
    pub casual_external: usize,
    pub stable_external: usize,

    pub susceptible: usize,
    pub infected: usize,
    pub protected: usize,
    pub prevalence: f64,
    pub infected_males: usize,
    pub infected_females: usize,
    pub infected_msm: usize,

    pub tally: Tally,
}

impl SimData {
    pub fn collect(
        trial: usize,
        tick: u32,
        i_group: usize,
        group: &Group,
        net: &Network,
        tally: Tally,
    ) -> Self {
        let mut data = SimData {
            trial,
            tick,
            group: i_group,
            size: group.size(),
            tally,
            ..Default::default()
        };
        let mut internal_ends = [0, 0];
        let mut friend_ends = 0;
        for id in group.members() {
            let person = net.get(id);
            let infected = person.is_infected();
            match person.gender {
                Gender::Male => {
                    data.males += 1;
                    data.infected_males += infected as usize;
                }
                Gender::Female => {
                    data.females += 1;
                    data.infected_females += infected as usize;
                }
            }
            if person.is_msm() {
                data.msm += 1;
                data.infected_msm += infected as usize;
            }
            match person.status {
                DiseaseStatus::Susceptible => data.susceptible += 1,
                DiseaseStatus::Infected => data.infected += 1,
                DiseaseStatus::Protected => data.protected += 1,
            }
            for (other, rel) in person.partners().iter() {
                let i_kind = match rel.kind {
                    PartnerKind::Casual => 0,
                    PartnerKind::Stable => 1,
                };
                if group.contains(other) {
                    internal_ends[i_kind] += 1;
                } else if i_kind == 0 {
                    data.casual_external += 1;
                } else {
                    data.stable_external += 1;
                }
            }
            friend_ends += person
                .friends()
                .iter()
                .filter(|&other| group.contains(other))
                .count();
        }
        // Internal edges were counted from both ends.
        data.casual_internal = internal_ends[0] / 2;
        data.stable_internal = internal_ends[1] / 2;
        data.friendships = friend_ends / 2;
        if data.size > 0 {
            data.prevalence = data.infected as f64 / data.size as f64;
        }
        data
    }

    /// Copy of this snapshot at a later tick, with no events.
    pub fn carried_to(&self, tick: u32) -> Self {
        SimData {
            tick,
            tally: Tally::default(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Completed,
    PrevalenceZero,
    Aborted,
    Error,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EndReason::Completed => "normal completion",
            EndReason::PrevalenceZero => "prevalence zero",
            EndReason::Aborted => "reset",
            EndReason::Error => "error",
        };
        f.write_str(text)
    }
}

/// Everything a run produces.
///
/// `sim_data` is indexed by trial, tick and group; `swn` by trial and group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    pub sim_data: Vec<Vec<Vec<SimData>>>,
    pub swn: Vec<Vec<SwnInfo>>,
    pub trial_end: Vec<EndReason>,
}

impl RunResults {
    pub fn is_empty(&self) -> bool {
        self.sim_data.is_empty() && self.swn.is_empty() && self.trial_end.is_empty()
    }

    pub fn n_trials(&self) -> usize {
        self.trial_end.len()
    }

    pub fn clear(&mut self) {
        self.sim_data.clear();
        self.swn.clear();
        self.trial_end.clear();
    }

    /// Snapshots of the last tick of `trial`.
    pub fn final_tick(&self, trial: usize) -> Option<&[SimData]> {
        self.sim_data.get(trial)?.last().map(Vec::as_slice)
    }

    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, self).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let results = decode::from_read(&mut reader).context("failed to deserialize results")?;
        Ok(results)
    }
}
