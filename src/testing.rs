use crate::config::{Scenario, SeedMode};
use crate::disease::DiseaseParams;
use crate::dist::Dist;
use crate::group::{FriendshipParams, GroupParams, SphereParams, Topology};
use crate::population::PopulationParams;

pub const SCENARIO_TOML: &str = r#"
name = "two groups"
trials = 2
duration = 26
clock_unit = "week"
seed = { mode = "fixed", seed = 42 }

[paths]
exact_threshold = 200
bfs_threshold = 0.6

[disease]
name = "hiv"
pr_male_to_female = 0.02
pr_female_to_male = 0.01
pr_male_to_male = 0.05
mortality = 0.5
life_expectancy = { kind = "uniform", min = 5.0, max = 15.0 }
lifelong = true
duration = { kind = "constant", value = 0.0 }
reinfection = false

[[vaccines]]
id = 0
name = "v"
efficacy = 0.8
protection = 0

[[strategies]]
id = 0
active = true
scope = { groups = [1] }
trigger = 10
fraction = 0.5
vaccine = 0
hiv_test = true

[population]
mixing = [[0.0, 1.0], [1.0, 0.0]]

[[population.groups]]
name = "a"
size = 40
topology = "ring"
age = { kind = "uniform", min = 18.0, max = 40.0 }
life_expectancy = { kind = "normal", mean = 75.0, std_dev = 5.0 }
pr_male = 0.5
pr_same_sex = 0.1
prevalence = 0.1
pr_new_partner = 0.3
max_partners = 3
pr_concurrency = 0.2
pr_casual = 0.7
pr_internal = 0.8
search_trials = 10
acquaintance_depth = 2
transitory_period = 4
casual_duration = { kind = "exponential", mean = 3.0 }
stable_duration = { kind = "uniform", min = 20.0, max = 100.0 }
casual_contacts = { kind = "poisson", mean = 2.0 }
stable_contacts = { kind = "poisson", mean = 4.0 }
pr_safe_casual = 0.4
pr_safe_stable = 0.1

[[population.groups]]
name = "b"
size = 60
topology = "sphere"
sphere = { radius = 1.0, search_distance = 0.5 }
age = { kind = "uniform", min = 18.0, max = 40.0 }
life_expectancy = { kind = "constant", value = 80.0 }
pr_male = 0.5
pr_same_sex = 0.0
prevalence = 0.0
seed_infections = 2
pr_new_partner = 0.2
max_partners = 2
pr_concurrency = 0.1
pr_casual = 0.3
pr_internal = 0.9
search_trials = 10
acquaintance_depth = 3
transitory_period = 4
casual_duration = { kind = "constant", value = 2.0 }
stable_duration = { kind = "constant", value = 50.0 }
casual_contacts = { kind = "constant", value = 1.0 }
stable_contacts = { kind = "constant", value = 3.0 }
pr_safe_casual = 0.5
pr_safe_stable = 0.2
"#;

pub fn disease_params() -> DiseaseParams {
    DiseaseParams {
        name: "test".into(),
        pr_male_to_female: 0.1,
        pr_female_to_male: 0.1,
        pr_male_to_male: 0.1,
        mortality: 0.0,
        life_expectancy: Dist::constant(10.0),
        lifelong: true,
        duration: Dist::constant(0.0),
        reinfection: false,
    }
}

pub fn group_params(name: &str, size: usize) -> GroupParams {
    GroupParams {
        name: name.into(),
        size,
        topology: Topology::Free,
        age: Dist::Uniform {
            min: 20.0,
            max: 40.0,
        },
        life_expectancy: Dist::constant(500.0),
        pr_male: 0.5,
        pr_same_sex: 0.0,
        debut_age: 15.0,
        prevalence: 0.0,
        seed_infections: 0,
        pr_new_partner: 0.5,
        max_partners: 2,
        pr_concurrency: 0.5,
        pr_casual: 0.5,
        pr_internal: 0.5,
        search_trials: 10,
        acquaintance_depth: 2,
        transitory_period: 2,
        casual_duration: Dist::constant(2.0),
        stable_duration: Dist::constant(20.0),
        casual_contacts: Dist::constant(2.0),
        stable_contacts: Dist::constant(4.0),
        pr_safe_casual: 0.0,
        pr_safe_stable: 0.0,
        sphere: SphereParams::default(),
        friendship: FriendshipParams::default(),
    }
}

/// Scenario with one free group per entry of `sizes`, uniform mixing and a
/// fixed seed.
pub fn scenario(sizes: &[usize], duration: u32) -> Scenario {
    let n = sizes.len();
    let groups = sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| group_params(&format!("g{i}"), size))
        .collect();
    let mixing = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j || n == 1 {
                        0.0
                    } else {
                        1.0 / (n - 1) as f64
                    }
                })
                .collect()
        })
        .collect();
    Scenario {
        name: "test".into(),
        trials: 1,
        duration,
        clock_unit: Default::default(),
        delay_ms: 0,
        seed: SeedMode::Fixed { seed: 7 },
        paths: Default::default(),
        warm_up: Default::default(),
        disease: disease_params(),
        population: PopulationParams { groups, mixing },
        vaccines: Vec::new(),
        strategies: Vec::new(),
    }
}
