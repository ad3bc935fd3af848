use crate::data::RunResults;
use crate::stats::Accumulator;
use anyhow::{Context, Result, bail};
use std::{fs::File, io::BufWriter, path::Path};

/// Observable summarised over the trials of one or more runs.
pub trait Obs {
    fn update(&mut self, results: &RunResults) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

fn check_groups(results: &RunResults, n_groups: usize) -> Result<()> {
    for trial_data in &results.sim_data {
        for tick_data in trial_data {
            if tick_data.len() != n_groups {
                bail!("expected {n_groups} groups, found {}", tick_data.len());
            }
        }
    }
    Ok(())
}

fn group_reports(acc_vec: &[Accumulator]) -> Vec<serde_json::Value> {
    acc_vec
        .iter()
        .map(|acc| serde_json::json!(acc.report()))
        .collect()
}

pub struct FinalPrevalence {
    acc_vec: Vec<Accumulator>,
}

impl FinalPrevalence {
    pub fn new(n_groups: usize) -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(n_groups, Accumulator::new);
        Self { acc_vec }
    }
}

impl Obs for FinalPrevalence {
    fn update(&mut self, results: &RunResults) -> Result<()> {
        check_groups(results, self.acc_vec.len())?;
        for trial in 0..results.sim_data.len() {
            let Some(final_tick) = results.final_tick(trial) else {
                continue;
            };
            for (acc, data) in self.acc_vec.iter_mut().zip(final_tick) {
                acc.add(data.prevalence);
            }
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "final_prevalence": group_reports(&self.acc_vec) })
    }
}

/// Events summed over each trial: incidence, deaths and doses.
pub struct TrialTotals {
    incidence: Vec<Accumulator>,
    deaths: Vec<Accumulator>,
    disease_deaths: Vec<Accumulator>,
    vaccinated: Vec<Accumulator>,
}

impl TrialTotals {
    pub fn new(n_groups: usize) -> Self {
        let accs = || {
            let mut acc_vec = Vec::new();
            acc_vec.resize_with(n_groups, Accumulator::new);
            acc_vec
        };
        Self {
            incidence: accs(),
            deaths: accs(),
            disease_deaths: accs(),
            vaccinated: accs(),
        }
    }
}

impl Obs for TrialTotals {
    fn update(&mut self, results: &RunResults) -> Result<()> {
        let n_groups = self.incidence.len();
        check_groups(results, n_groups)?;
        for trial_data in &results.sim_data {
            for i_group in 0..n_groups {
                let tallies = trial_data.iter().map(|tick_data| tick_data[i_group].tally);
                let mut sums = [0usize; 4];
                for tally in tallies {
                    sums[0] += tally.incidence;
                    sums[1] += tally.deaths;
                    sums[2] += tally.disease_deaths;
                    sums[3] += tally.vaccinated;
                }
                self.incidence[i_group].add(sums[0] as f64);
                self.deaths[i_group].add(sums[1] as f64);
                self.disease_deaths[i_group].add(sums[2] as f64);
                self.vaccinated[i_group].add(sums[3] as f64);
            }
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "cumulative_incidence": group_reports(&self.incidence),
            "deaths": group_reports(&self.deaths),
            "disease_deaths": group_reports(&self.disease_deaths),
            "vaccinated": group_reports(&self.vaccinated),
        })
    }
}

/// Epidemic curve: prevalence over trials at each tick.
pub struct PrevalenceCurve {
    acc_vecs: Vec<Vec<Accumulator>>,
}

impl PrevalenceCurve {
    pub fn new(n_groups: usize) -> Self {
        Self {
            acc_vecs: vec![Vec::new(); n_groups],
        }
    }
}

impl Obs for PrevalenceCurve {
    fn update(&mut self, results: &RunResults) -> Result<()> {
        check_groups(results, self.acc_vecs.len())?;
        for trial_data in &results.sim_data {
            for (i_tick, tick_data) in trial_data.iter().enumerate() {
                for (acc_vec, data) in self.acc_vecs.iter_mut().zip(tick_data) {
                    if acc_vec.len() <= i_tick {
                        acc_vec.resize_with(i_tick + 1, Accumulator::new);
                    }
                    acc_vec[i_tick].add(data.prevalence);
                }
            }
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let curves: Vec<_> = self
            .acc_vecs
            .iter()
            .map(|acc_vec| group_reports(acc_vec))
            .collect();
        serde_json::json!({ "prevalence_curve": curves })
    }
}

/// Small-world metrics over trials.
pub struct SmallWorld {
    path_length: Vec<Accumulator>,
    clustering: Vec<Accumulator>,
    diameter: Vec<Accumulator>,
    global_efficiency: Vec<Accumulator>,
    local_efficiency: Vec<Accumulator>,
}

impl SmallWorld {
    pub fn new(n_groups: usize) -> Self {
        let accs = || {
            let mut acc_vec = Vec::new();
            acc_vec.resize_with(n_groups, Accumulator::new);
            acc_vec
        };
        Self {
            path_length: accs(),
            clustering: accs(),
            diameter: accs(),
            global_efficiency: accs(),
            local_efficiency: accs(),
        }
    }
}

impl Obs for SmallWorld {
    fn update(&mut self, results: &RunResults) -> Result<()> {
        for trial_swn in &results.swn {
            if trial_swn.len() != self.path_length.len() {
                bail!("expected {} groups, found {}", self.path_length.len(), trial_swn.len());
            }
            for (i_group, info) in trial_swn.iter().enumerate() {
                self.path_length[i_group].add(info.path_length);
                self.clustering[i_group].add(info.clustering);
                self.diameter[i_group].add(info.diameter as f64);
                self.global_efficiency[i_group].add(info.global_efficiency);
                self.local_efficiency[i_group].add(info.local_efficiency);
            }
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "path_length": group_reports(&self.path_length),
            "clustering": group_reports(&self.clustering),
            "diameter": group_reports(&self.diameter),
            "global_efficiency": group_reports(&self.global_efficiency),
            "local_efficiency": group_reports(&self.local_efficiency),
        })
    }
}

pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(n_groups: usize) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(FinalPrevalence::new(n_groups)),
            Box::new(TrialTotals::new(n_groups)),
            Box::new(PrevalenceCurve::new(n_groups)),
            Box::new(SmallWorld::new(n_groups)),
        ];
        Self { obs_ptr_vec }
    }

    pub fn add_results(&mut self, results: &RunResults) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(results).context("failed to update observable")?;
        }
        Ok(())
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let results = RunResults::load(file)?;
        self.add_results(&results)
    }

    pub fn reports(&self) -> Vec<serde_json::Value> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.reports())
            .context("failed to serialize summary")?;
        Ok(())
    }
}
