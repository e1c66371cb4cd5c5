//! The discrete-event simulation loop.
//!
//! A [`ComputeEngine`] owns one cluster, one database and one scheduler and
//! advances them step by step. Each step jumps the simulated clock to the
//! next event (a job release or a job finish), retires finished jobs, hands
//! the scheduler the waiting queue, and samples a checkpoint. There is no
//! global event queue: the next event time is recomputed from the database
//! head and the execution list, which is what makes job state the single
//! source of truth.

use std::mem;

use crate::cluster::Cluster;
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::job::JobState;
use crate::result::{Checkpoint, JobRecord, SimulationResult};
use crate::scheduler::{SchedCtx, Scheduler};

/// What one call to [`ComputeEngine::sim_step`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepStats {
    /// Clock value after the step.
    pub time: f64,
    /// Jobs moved from the database into the waiting queue.
    pub released: usize,
    /// Jobs retired from the execution list.
    pub retired: usize,
    /// Whether the scheduler placed at least one job from the queue head.
    pub deployed: bool,
    /// Whether backfill placed at least one job past a blocked head.
    pub backfilled: bool,
}

/// One simulation instance: cluster, job database and scheduling policy
/// under a single simulated clock.
pub struct ComputeEngine {
    cluster: Cluster,
    database: Database,
    scheduler: Box<dyn Scheduler>,
    clock: f64,
    finished_jobs: Vec<JobRecord>,
    checkpoints: Vec<Checkpoint>,
    total_jobs: usize,
}

impl ComputeEngine {
    /// Wire up a simulation instance and validate the workload against the
    /// topology.
    ///
    /// Fails with [`CoreError::EmptyWorkload`] when the database holds no
    /// jobs and with [`CoreError::InfeasibleJob`] when any job demands more
    /// hosts under full-socket allocation than the cluster has. Catching the
    /// latter here means a run can never wedge on a job that will fit at no
    /// future instant.
    pub fn new(
        cluster: Cluster,
        database: Database,
        mut scheduler: Box<dyn Scheduler>,
    ) -> CoreResult<Self> {
        if database.is_empty() {
            return Err(CoreError::EmptyWorkload);
        }

        let available_hosts = cluster.hosts().len();
        let cores_per_host = cluster.cores_per_host();
        for job in database.iter() {
            let needed_hosts = job.num_of_processes.div_ceil(cores_per_host) as usize;
            if needed_hosts > available_hosts {
                return Err(CoreError::InfeasibleJob {
                    job: job.id,
                    needed_hosts,
                    available_hosts,
                });
            }
        }

        scheduler.setup(&cluster);
        tracing::info!(
            scheduler = scheduler.name(),
            hosts = available_hosts,
            cores = cluster.total_cores(),
            jobs = database.len(),
            "engine ready"
        );

        let total_jobs = database.len();
        Ok(Self {
            cluster,
            database,
            scheduler,
            clock: 0.0,
            finished_jobs: Vec::new(),
            checkpoints: Vec::new(),
            total_jobs,
        })
    }

    /// The simulated clock. Never decreases.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn scheduler_name(&self) -> &'static str {
        self.scheduler.name()
    }

    /// Whether every job has been retired.
    pub fn is_finished(&self) -> bool {
        self.database.is_empty()
            && self.cluster.waiting_queue.is_empty()
            && self.cluster.execution_list.is_empty()
    }

    /// Fraction of the workload retired so far, in percent.
    pub fn progress_perc(&self) -> f64 {
        if self.total_jobs == 0 {
            return 100.0;
        }
        self.finished_jobs.len() as f64 / self.total_jobs as f64 * 100.0
    }

    /// Advance the clock to the next event and process it.
    ///
    /// In order: jump the clock, release due jobs into the waiting queue,
    /// retire finished jobs, run the scheduler's deploy pass (and backfill
    /// where the policy enables it), then sample a checkpoint. A finished
    /// simulation steps to a no-op.
    pub fn sim_step(&mut self) -> CoreResult<StepStats> {
        if self.is_finished() {
            return Ok(StepStats {
                time: self.clock,
                ..StepStats::default()
            });
        }

        let next_release = self.database.next_release_time();
        let next_finish = self.cluster.earliest_finish_time();
        let next_event = match (next_release, next_finish) {
            (Some(r), Some(f)) => r.min(f),
            (Some(r), None) => r,
            (None, Some(f)) => f,
            (None, None) => {
                // Waiting jobs with no future event: the clock is stuck.
                return Err(CoreError::ClockStall {
                    time: self.clock,
                    waiting: self.cluster.waiting_queue.len(),
                });
            }
        };
        // Zero advance is legal (several events at one instant); going
        // backwards is not.
        self.clock = self.clock.max(next_event);

        let mut stats = StepStats {
            time: self.clock,
            ..StepStats::default()
        };

        let released = self.database.release_due(self.clock);
        stats.released = released.len();
        self.cluster.waiting_queue.extend(released);

        stats.retired = self.retire_finished();

        let mut ctx = SchedCtx {
            cluster: &mut self.cluster,
            database: &mut self.database,
            now: self.clock,
        };
        stats.deployed = self.scheduler.deploy(&mut ctx)?;
        if self.scheduler.backfill_enabled() {
            stats.backfilled = self.scheduler.backfill(&mut ctx)?;
        }

        debug_assert!(self.cluster.is_consistent());
        self.record_checkpoint();
        tracing::trace!(?stats, "step");
        Ok(stats)
    }

    /// Retire every executing job whose finish time has passed, returning
    /// its cores to the cluster. Jobs at their wall-time limit retire as
    /// `Aborted`, the rest as `Completed`.
    fn retire_finished(&mut self) -> usize {
        let mut retired = 0;
        let executing = mem::take(&mut self.cluster.execution_list);
        for mut job in executing {
            let Some(finish) = job.finish_time() else {
                self.cluster.execution_list.push(job);
                continue;
            };
            if finish > self.clock {
                self.cluster.execution_list.push(job);
                continue;
            }

            self.cluster.reclaim(&job);
            job.end_time = Some(finish);
            job.state = if job.overruns_wall_time() {
                JobState::Aborted
            } else {
                JobState::Completed
            };
            self.cluster.record_completion(finish);
            tracing::debug!(job = %job.signature(), state = job.state.name(), t = finish, "retire");
            self.finished_jobs.push(JobRecord::from_job(&job));
            retired += 1;
        }
        retired
    }

    /// Sample the cluster at the current clock. A step that did not advance
    /// the clock replaces the sample taken at the same instant, so the
    /// series stays strictly increasing in time.
    fn record_checkpoint(&mut self) {
        let checkpoint = Checkpoint {
            time: self.clock,
            idle_cores: self.cluster.idle_cores(),
            waiting: self.cluster.waiting_queue.len(),
            running: self.cluster.execution_list.len(),
            finished: self.finished_jobs.len(),
        };
        match self.checkpoints.last_mut() {
            Some(last) if last.time == checkpoint.time => *last = checkpoint,
            _ => self.checkpoints.push(checkpoint),
        }
    }

    /// Step until every job has retired.
    pub fn run(&mut self) -> CoreResult<()> {
        while !self.is_finished() {
            self.sim_step()?;
        }
        Ok(())
    }

    /// Consume the engine into its result. Usually called on a finished
    /// engine; calling early yields the jobs retired so far.
    pub fn into_result(self) -> SimulationResult {
        SimulationResult {
            scheduler_name: self.scheduler.name().to_string(),
            num_hosts: self.cluster.hosts().len() as u32,
            total_cores: self.cluster.total_cores(),
            makespan: self.cluster.makespan(),
            jobs: self.finished_jobs,
            checkpoints: self.checkpoints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobId};
    use crate::scheduler::Fifo;

    fn engine(jobs: Vec<Job>) -> ComputeEngine {
        let cluster = Cluster::new(2, &[4, 4]).unwrap();
        ComputeEngine::new(cluster, Database::new(jobs), Box::new(Fifo::new())).unwrap()
    }

    #[test]
    fn test_empty_workload_is_rejected() {
        let cluster = Cluster::new(2, &[4, 4]).unwrap();
        let err = ComputeEngine::new(cluster, Database::new(Vec::new()), Box::new(Fifo::new()));
        assert!(matches!(err, Err(CoreError::EmptyWorkload)));
    }

    #[test]
    fn test_oversized_job_is_rejected_at_setup() {
        let cluster = Cluster::new(2, &[4, 4]).unwrap();
        let jobs = vec![Job::new(JobId(1), "huge", 24, 10.0, 0.0)];
        let err = ComputeEngine::new(cluster, Database::new(jobs), Box::new(Fifo::new()));
        assert!(matches!(
            err,
            Err(CoreError::InfeasibleJob {
                needed_hosts: 3,
                available_hosts: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_single_job_runs_to_completion() {
        let mut engine = engine(vec![Job::new(JobId(1), "only", 8, 10.0, 0.0)]);

        let stats = engine.sim_step().unwrap();
        assert_eq!(stats.time, 0.0);
        assert_eq!(stats.released, 1);
        assert!(stats.deployed);
        assert!(!engine.is_finished());

        let stats = engine.sim_step().unwrap();
        assert_eq!(stats.time, 10.0);
        assert_eq!(stats.retired, 1);
        assert!(engine.is_finished());
        assert_eq!(engine.progress_perc(), 100.0);

        let result = engine.into_result();
        assert_eq!(result.makespan, 10.0);
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(result.jobs[0].state, JobState::Completed);
    }

    #[test]
    fn test_clock_never_decreases() {
        let mut engine = engine(vec![
            Job::new(JobId(1), "a", 8, 10.0, 0.0),
            Job::new(JobId(2), "b", 8, 5.0, 1.0),
        ]);
        let mut last = 0.0;
        while !engine.is_finished() {
            let stats = engine.sim_step().unwrap();
            assert!(stats.time >= last);
            last = stats.time;
        }
    }

    #[test]
    fn test_wall_time_aborts_job() {
        let mut engine = engine(vec![
            Job::new(JobId(1), "runaway", 8, 100.0, 0.0).with_wall_time(10.0),
        ]);
        engine.run().unwrap();
        let result = engine.into_result();
        assert_eq!(result.makespan, 10.0);
        assert_eq!(result.jobs[0].state, JobState::Aborted);
        assert_eq!(result.jobs[0].end_time, 10.0);
    }

    #[test]
    fn test_checkpoints_strictly_increase() {
        let mut engine = engine(vec![
            Job::new(JobId(1), "a", 8, 10.0, 0.0),
            Job::new(JobId(2), "b", 8, 10.0, 0.0),
            Job::new(JobId(3), "c", 8, 10.0, 5.0),
        ]);
        engine.run().unwrap();
        let result = engine.into_result();
        for pair in result.checkpoints.windows(2) {
            assert!(pair[0].time < pair[1].time);
        }
        let last = result.checkpoints.last().unwrap();
        assert_eq!(last.finished, 3);
        assert_eq!(last.idle_cores, 16);
    }

    #[test]
    fn test_step_after_finish_is_noop() {
        let mut engine = engine(vec![Job::new(JobId(1), "only", 1, 1.0, 0.0)]);
        engine.run().unwrap();
        let clock = engine.clock();
        let stats = engine.sim_step().unwrap();
        assert_eq!(stats, StepStats {
            time: clock,
            ..StepStats::default()
        });
    }
}
