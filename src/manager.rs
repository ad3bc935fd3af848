use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};
use stisim::analysis::Analyzer;
use stisim::{EndReason, Notification, Scenario, Simulation};

pub struct Manager {
    out_dir: PathBuf,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(out_dir: P) -> Result<Self> {
        let out_dir = out_dir.as_ref().to_path_buf();
        fs::create_dir_all(&out_dir).with_context(|| format!("failed to create {out_dir:?}"))?;
        Ok(Self { out_dir })
    }

    pub fn run_scenario<P: AsRef<Path>>(&self, scenario_file: P) -> Result<()> {
        let scenario_file = scenario_file.as_ref();
        let scenario = Scenario::from_file(scenario_file)
            .with_context(|| format!("failed to load {scenario_file:?}"))?;
        log::info!("{scenario:#?}");

        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let copy = self.scenario_file(run_idx);
        fs::copy(scenario_file, &copy).with_context(|| format!("failed to copy to {copy:?}"))?;

        let sim = Simulation::new(scenario).context("failed to construct simulation")?;
        let receiver = sim.subscribe();
        sim.run();

        let mut reason = None;
        for notification in receiver.iter() {
            match notification {
                Notification::TrialStart { trial } => log::info!("trial {trial} started"),
                Notification::TrialEnd { trial, reason } => {
                    log::info!("trial {trial} ended ({reason})")
                }
                Notification::TickEnd { trial, tick } => {
                    log::debug!("trial {trial} tick {tick} done")
                }
                Notification::Error { message } => log::warn!("{message}"),
                Notification::RunEnd { reason: end } => {
                    reason = Some(end);
                    break;
                }
                _ => {}
            }
        }
        sim.wait().context("failed to wait for simulation")?;

        match reason {
            Some(EndReason::Error) => bail!("simulation failed"),
            Some(EndReason::Aborted) | None => bail!("simulation did not complete"),
            Some(_) => {}
        }
        log::info!("run took {:?}", sim.elapsed());

        let results_file = self.results_file(run_idx);
        sim.results()
            .save(&results_file)
            .with_context(|| format!("failed to save {results_file:?}"))?;
        log::info!("saved {results_file:?}");

        Ok(())
    }

    pub fn analyze_runs(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let scenario_file = self.scenario_file(run_idx);
            let scenario = Scenario::from_file(&scenario_file)
                .with_context(|| format!("failed to load {scenario_file:?}"))?;

            let mut analyzer = Analyzer::new(scenario.population.groups.len());
            analyzer
                .add_file(self.results_file(run_idx))
                .context("failed to add file")?;

            let summary_file = self.summary_file(run_idx);
            analyzer
                .save_results(&summary_file)
                .context("failed to save results")?;
            log::info!("saved {summary_file:?}");
        }

        Ok(())
    }

    pub fn clean_runs(&self) -> Result<()> {
        for run_dir in self.run_dirs()? {
            fs::remove_dir_all(&run_dir).with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }
        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.out_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.out_dir.join(format!("run-{run_idx:04}"))
    }

    fn scenario_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("scenario.toml")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.msgpack")
    }

    fn summary_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("summary.json")
    }
}
