//! Running a sweep's instances across threads.

use std::thread;

use batchsim_core::{ComputeEngine, Database, Job, SchedulerRegistry, SimulationResult};

use crate::config::{ClusterConfig, ScenarioConfig};
use crate::driver::{CompletionReport, Driver, SimIds, StepErrorPolicy};
use crate::error::{BatchError, BatchResult};
use crate::progress::{NullProgressReporter, ProgressReporter, TcpProgressReporter};

/// Everything one worker thread needs to run one instance.
#[derive(Debug, Clone)]
pub struct SimInstance {
    pub ids: SimIds,
    pub cluster: ClusterConfig,
    pub jobs: Vec<Job>,
    pub scheduler: String,
}

/// Expand a scenario into its cross product of workloads and schedulers.
///
/// Instance ids are assigned workload-major, so the ordering is stable
/// across runs of the same scenario.
pub fn expand_scenario(scenario: &ScenarioConfig) -> BatchResult<Vec<SimInstance>> {
    let cluster = scenario.cluster.build()?;
    let mut instances = Vec::with_capacity(scenario.num_instances());
    let mut sim_id = 0;
    for (inp_id, workload) in scenario.workloads.iter().enumerate() {
        let jobs = workload.build_jobs(&cluster);
        for (sched_id, scheduler) in scenario.schedulers.iter().enumerate() {
            instances.push(SimInstance {
                ids: SimIds {
                    sim_id,
                    inp_id,
                    sched_id,
                },
                cluster: scenario.cluster.clone(),
                jobs: jobs.clone(),
                scheduler: scheduler.clone(),
            });
            sim_id += 1;
        }
    }
    Ok(instances)
}

/// Runs simulation instances on one thread each, at most `max_parallel` at
/// a time. Results come back in instance order regardless of which thread
/// finished first.
pub struct ParallelLauncher {
    max_parallel: usize,
    policy: StepErrorPolicy,
    progress_addr: Option<String>,
}

impl Default for ParallelLauncher {
    fn default() -> Self {
        Self {
            max_parallel: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            policy: StepErrorPolicy::default(),
            progress_addr: None,
        }
    }
}

impl ParallelLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn with_policy(mut self, policy: StepErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stream progress to a TCP collector at `addr`.
    pub fn with_progress_addr(mut self, addr: impl Into<String>) -> Self {
        self.progress_addr = Some(addr.into());
        self
    }

    /// Run every instance to completion. The first failing instance fails
    /// the sweep; instances already running in the same batch still finish.
    pub fn launch(
        &self,
        registry: &SchedulerRegistry,
        instances: Vec<SimInstance>,
    ) -> BatchResult<Vec<(CompletionReport, SimulationResult)>> {
        let driver = Driver::new(self.policy);
        let mut outcomes = Vec::with_capacity(instances.len());

        let mut remaining = instances.into_iter();
        loop {
            let batch: Vec<SimInstance> = remaining.by_ref().take(self.max_parallel).collect();
            if batch.is_empty() {
                break;
            }
            tracing::debug!(instances = batch.len(), "launching batch");

            let batch_outcomes = thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .into_iter()
                    .map(|instance| {
                        let progress_addr = self.progress_addr.clone();
                        scope.spawn(move || {
                            let mut reporter: Box<dyn ProgressReporter> = match progress_addr {
                                Some(addr) => Box::new(TcpProgressReporter::connect(addr)),
                                None => Box::new(NullProgressReporter),
                            };
                            run_instance(&driver, registry, instance, reporter.as_mut())
                        })
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|panic| Err(BatchError::Worker(panic_message(panic))))
                    })
                    .collect::<Vec<_>>()
            });

            for outcome in batch_outcomes {
                outcomes.push(outcome?);
            }
        }
        Ok(outcomes)
    }
}

fn run_instance(
    driver: &Driver,
    registry: &SchedulerRegistry,
    instance: SimInstance,
    reporter: &mut dyn ProgressReporter,
) -> BatchResult<(CompletionReport, SimulationResult)> {
    let cluster = instance.cluster.build()?;
    let scheduler = registry.resolve(&instance.scheduler)?;
    let engine = ComputeEngine::new(cluster, Database::new(instance.jobs), scheduler)?;
    driver.run(instance.ids, engine, reporter)
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
