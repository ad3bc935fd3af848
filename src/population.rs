use crate::disease::DiseaseModel;
use crate::group::{Group, GroupParams};
use crate::ids::IdAllocator;
use crate::network::{Network, PersonId};
use crate::utils::check_mixing;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};

/// Groups of the population and their casual mixing probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationParams {
    pub groups: Vec<GroupParams>,
    /// Probability that a casual search of group `i` targets group `j`
    /// (matrix `n_groups x n_groups`, zero diagonal).
    pub mixing: Vec<Vec<f64>>,
}

impl PopulationParams {
    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            anyhow::bail!("population must have at least one group");
        }
        for (i_group, group) in self.groups.iter().enumerate() {
            group
                .validate()
                .with_context(|| format!("invalid group {i_group} ({})", group.name))?;
        }
        check_mixing(&self.mixing, self.groups.len()).context("invalid mixing matrix")?;
        Ok(())
    }

    pub fn total_size(&self) -> usize {
        self.groups.iter().map(|group| group.size).sum()
    }
}

/// Weighted directed graph of groups.
#[derive(Debug, Clone)]
pub struct Population {
    pub groups: Vec<Group>,
    mixing: Vec<Option<WeightedIndex<f64>>>,
}

impl Population {
    pub fn new(params: &PopulationParams, ids: &mut IdAllocator) -> Result<Self> {
        let groups = params
            .groups
            .iter()
            .map(|group| Group::new(group, ids))
            .collect::<Result<Vec<_>>>()?;
        // Rows without any weight leave the group without external targets.
        let mixing = params
            .mixing
            .iter()
            .map(|row| WeightedIndex::new(row).ok())
            .collect();
        Ok(Self { groups, mixing })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_of(&self, net: &Network, id: PersonId) -> &Group {
        &self.groups[net.get(id).group]
    }

    /// Create a fresh vertex set for every group, replacing the network.
    pub fn materialize<R: Rng + ?Sized>(
        &mut self,
        net: &mut Network,
        ids: &mut IdAllocator,
        disease: &DiseaseModel,
        with_disease: bool,
        rng: &mut R,
    ) -> Result<()> {
        net.clear();
        for (i_group, group) in self.groups.iter_mut().enumerate() {
            group
                .create_population(i_group, net, ids, disease, with_disease, rng)
                .with_context(|| format!("failed to create group {i_group}"))?;
        }
        Ok(())
    }

    /// Sample the target group of an external casual search from `group`.
    pub fn pick_external<R: Rng + ?Sized>(&self, group: usize, rng: &mut R) -> Option<usize> {
        self.mixing[group].as_ref().map(|dist| dist.sample(rng))
    }

    pub fn restore_baselines(&mut self) {
        self.groups.iter_mut().for_each(Group::restore_baselines);
    }

    pub fn restore_concurrency(&mut self) {
        self.groups.iter_mut().for_each(Group::restore_concurrency);
    }

    /// Recompute every group's prevalence, returning the total infected.
    pub fn update_prevalence(&mut self, net: &Network) -> usize {
        self.groups
            .iter_mut()
            .map(|group| group.update_prevalence(net))
            .sum()
    }
}
