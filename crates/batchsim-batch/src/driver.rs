//! Stepping one simulation instance to completion.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use batchsim_core::{ComputeEngine, SimulationResult};

use crate::error::{BatchError, BatchResult};
use crate::progress::ProgressReporter;

/// What to do when a simulation step fails with a non-fatal error.
///
/// Fatal errors (a wedged clock, an infeasible workload) always abort the
/// instance regardless of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepErrorPolicy {
    /// Log the error and keep stepping.
    #[default]
    LogAndContinue,
    /// Abort the instance on the first error.
    Abort,
}

/// Identifies one simulation instance within a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimIds {
    /// Position in the sweep's cross product.
    pub sim_id: usize,
    /// Index of the workload in the scenario.
    pub inp_id: usize,
    /// Index of the scheduler in the scenario.
    pub sched_id: usize,
}

/// Periodic progress of a running instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub sim_id: usize,
    pub progress_perc: f64,
}

/// Final accounting for one finished instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub sim_id: usize,
    pub inp_id: usize,
    pub sched_id: usize,
    pub scheduler_name: String,
    /// Wall-clock seconds the instance took to simulate.
    pub real_time: f64,
    /// Simulated seconds the workload spanned (the makespan).
    pub sim_time: f64,
    pub jobs: usize,
}

// Consecutive failing steps before LogAndContinue escalates; a step that
// keeps failing without retiring work would otherwise spin forever.
const MAX_CONSECUTIVE_ERRORS: u32 = 32;

/// Steps engines to completion, reporting progress along the way.
#[derive(Debug, Clone, Copy, Default)]
pub struct Driver {
    policy: StepErrorPolicy,
}

impl Driver {
    pub fn new(policy: StepErrorPolicy) -> Self {
        Self { policy }
    }

    /// Run `engine` to completion.
    ///
    /// Progress is reported on every whole percent of retired jobs; the
    /// completion report fires once at the end.
    pub fn run(
        &self,
        ids: SimIds,
        mut engine: ComputeEngine,
        reporter: &mut dyn ProgressReporter,
    ) -> BatchResult<(CompletionReport, SimulationResult)> {
        let started = Instant::now();
        let mut last_reported = f64::NEG_INFINITY;
        let mut consecutive_errors = 0u32;

        while !engine.is_finished() {
            match engine.sim_step() {
                Ok(_) => consecutive_errors = 0,
                Err(err) if err.is_fatal() || self.policy == StepErrorPolicy::Abort => {
                    tracing::error!(sim_id = ids.sim_id, error = %err, "instance aborted");
                    return Err(err.into());
                }
                Err(err) => {
                    consecutive_errors += 1;
                    tracing::warn!(
                        sim_id = ids.sim_id,
                        error = %err,
                        attempt = consecutive_errors,
                        "step failed, continuing"
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(BatchError::Worker(format!(
                            "instance {} made no progress after {consecutive_errors} failing steps",
                            ids.sim_id
                        )));
                    }
                }
            }

            let perc = engine.progress_perc();
            if perc - last_reported >= 1.0 {
                reporter.progress(&ProgressUpdate {
                    sim_id: ids.sim_id,
                    progress_perc: perc,
                });
                last_reported = perc;
            }
        }

        let result = engine.into_result();
        let report = CompletionReport {
            sim_id: ids.sim_id,
            inp_id: ids.inp_id,
            sched_id: ids.sched_id,
            scheduler_name: result.scheduler_name.clone(),
            real_time: started.elapsed().as_secs_f64(),
            sim_time: result.makespan,
            jobs: result.jobs.len(),
        };
        reporter.complete(&report);
        tracing::info!(
            sim_id = ids.sim_id,
            scheduler = %report.scheduler_name,
            jobs = report.jobs,
            sim_time = report.sim_time,
            real_time = report.real_time,
            "instance finished"
        );
        Ok((report, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgressReporter;
    use batchsim_core::{Cluster, Database, Fifo, Job, JobId};

    fn ids() -> SimIds {
        SimIds {
            sim_id: 0,
            inp_id: 0,
            sched_id: 0,
        }
    }

    #[test]
    fn test_drives_instance_to_completion() {
        let cluster = Cluster::new(2, &[4, 4]).unwrap();
        let jobs = vec![
            Job::new(JobId(1), "a", 16, 10.0, 0.0),
            Job::new(JobId(2), "b", 16, 10.0, 0.0),
        ];
        let engine =
            ComputeEngine::new(cluster, Database::new(jobs), Box::new(Fifo::new())).unwrap();

        let driver = Driver::default();
        let (report, result) = driver
            .run(ids(), engine, &mut NullProgressReporter)
            .unwrap();

        assert_eq!(report.jobs, 2);
        assert_eq!(report.sim_time, 20.0);
        assert_eq!(report.scheduler_name, "fifo");
        assert_eq!(result.jobs.len(), 2);
    }

    #[test]
    fn test_progress_reaches_hundred_percent() {
        #[derive(Default)]
        struct Capture {
            percents: Vec<f64>,
            completions: usize,
        }
        impl ProgressReporter for Capture {
            fn progress(&mut self, update: &ProgressUpdate) {
                self.percents.push(update.progress_perc);
            }
            fn complete(&mut self, _report: &CompletionReport) {
                self.completions += 1;
            }
        }

        let cluster = Cluster::new(1, &[4]).unwrap();
        let jobs: Vec<Job> = (0..5)
            .map(|i| Job::new(JobId(i), format!("j{i}"), 4, 10.0, 0.0))
            .collect();
        let engine =
            ComputeEngine::new(cluster, Database::new(jobs), Box::new(Fifo::new())).unwrap();

        let mut capture = Capture::default();
        Driver::default().run(ids(), engine, &mut capture).unwrap();

        assert!(capture.percents.windows(2).all(|p| p[0] <= p[1]));
        assert_eq!(capture.percents.last().copied(), Some(100.0));
        assert_eq!(capture.completions, 1);
    }
}
