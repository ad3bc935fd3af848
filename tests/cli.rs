use std::{fs, path::PathBuf, process::Command};

const SCENARIO: &str = r#"
name = "cli"
trials = 2
duration = 10
seed = { mode = "fixed", seed = 3 }

[disease]
name = "sti"
pr_male_to_female = 0.2
pr_female_to_male = 0.1
pr_male_to_male = 0.3
mortality = 0.0
life_expectancy = { kind = "constant", value = 20.0 }
lifelong = true
duration = { kind = "constant", value = 0.0 }
reinfection = false

[population]
mixing = [[0.0]]

[[population.groups]]
name = "only"
size = 25
topology = "free"
age = { kind = "uniform", min = 20.0, max = 30.0 }
life_expectancy = { kind = "constant", value = 80.0 }
pr_male = 0.5
pr_same_sex = 0.0
prevalence = 0.2
pr_new_partner = 0.5
max_partners = 2
pr_concurrency = 0.2
pr_casual = 0.5
pr_internal = 1.0
search_trials = 10
acquaintance_depth = 2
transitory_period = 2
casual_duration = { kind = "constant", value = 2.0 }
stable_duration = { kind = "constant", value = 8.0 }
casual_contacts = { kind = "constant", value = 2.0 }
stable_contacts = { kind = "constant", value = 3.0 }
pr_safe_casual = 0.2
pr_safe_stable = 0.1
"#;

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let scenario_path = test_dir.join("scenario.toml");
    fs::write(&scenario_path, SCENARIO).expect("failed to write scenario file");

    fn run_bin(args: &[&str]) -> bool {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_stisim"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");
        if !output.status.success() {
            eprintln!("{args:?} failed\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n");
        }
        output.status.success()
    }

    let out_dir = test_dir.join("out");
    let out_dir_str = out_dir.to_str().expect("failed to convert out dir to string");
    let scenario_str = scenario_path.to_str().expect("failed to convert scenario path to string");

    assert!(run_bin(&["--out-dir", out_dir_str, "run", "--scenario", scenario_str]));
    assert!(run_bin(&["--out-dir", out_dir_str, "run", "--scenario", scenario_str]));
    for run_dir in ["run-0000", "run-0001"] {
        assert!(out_dir.join(run_dir).join("results.msgpack").is_file());
    }

    assert!(run_bin(&["--out-dir", out_dir_str, "analyze"]));
    let summary = fs::read_to_string(out_dir.join("run-0000").join("summary.json"))
        .expect("failed to read summary");
    let summary: serde_json::Value = serde_json::from_str(&summary).expect("invalid summary");
    assert!(summary.as_array().is_some_and(|reports| !reports.is_empty()));

    let missing = test_dir.join("missing.toml");
    let missing_str = missing.to_str().expect("failed to convert path to string");
    assert!(!run_bin(&["--out-dir", out_dir_str, "run", "--scenario", missing_str]));

    assert!(run_bin(&["--out-dir", out_dir_str, "clean"]));
    assert!(!out_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}
