//! Serializable outcome of a finished simulation.

use serde::{Deserialize, Serialize};

use crate::host::HostId;
use crate::job::{Job, JobId, JobState};
use crate::procset::ProcSet;

/// Cluster state sampled at the end of one simulation step.
///
/// Checkpoint times are strictly increasing: steps that do not advance the
/// clock overwrite the checkpoint recorded at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Simulated time of the sample.
    pub time: f64,
    /// Cores not allocated to any job.
    pub idle_cores: u32,
    /// Jobs in the waiting queue.
    pub waiting: usize,
    /// Jobs executing.
    pub running: usize,
    /// Jobs retired so far.
    pub finished: usize,
}

/// Immutable record of one job's lifetime, taken at retirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub name: String,
    pub num_of_processes: u32,
    /// Cores that were committed to the job.
    pub allocated_cores: u32,
    /// Committed procsets per host and socket, in allocation order.
    pub allocation: Vec<(HostId, Vec<ProcSet>)>,
    pub release_time: f64,
    pub start_time: f64,
    pub end_time: f64,
    /// `Completed`, or `Aborted` for wall-time overruns.
    pub state: JobState,
}

impl JobRecord {
    /// Snapshot a retired job. Start and end default to the release time for
    /// jobs that somehow never ran, keeping the record well-formed.
    pub fn from_job(job: &Job) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            num_of_processes: job.num_of_processes,
            allocated_cores: job.allocated_cores(),
            allocation: job.allocation.clone(),
            release_time: job.release_time,
            start_time: job.start_time.unwrap_or(job.release_time),
            end_time: job.end_time.unwrap_or(job.release_time),
            state: job.state,
        }
    }

    /// Hosts the job ran on, in allocation order.
    pub fn hosts(&self) -> impl Iterator<Item = HostId> + '_ {
        self.allocation.iter().map(|(host, _)| *host)
    }

    /// Time spent in the waiting queue.
    pub fn waiting_time(&self) -> f64 {
        self.start_time - self.release_time
    }

    /// Time spent executing.
    pub fn run_time(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Everything a finished run produced, ready for analysis or serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Registry name of the scheduler that produced this run.
    pub scheduler_name: String,
    pub num_hosts: u32,
    pub total_cores: u32,
    /// Latest end time over all retired jobs.
    pub makespan: f64,
    /// Retired jobs in retirement order.
    pub jobs: Vec<JobRecord>,
    /// Per-step samples in time order.
    pub checkpoints: Vec<Checkpoint>,
}

impl SimulationResult {
    /// Mean time jobs spent in the waiting queue.
    pub fn mean_waiting_time(&self) -> f64 {
        if self.jobs.is_empty() {
            return 0.0;
        }
        let total: f64 = self.jobs.iter().map(JobRecord::waiting_time).sum();
        total / self.jobs.len() as f64
    }

    /// Jobs retired per simulated second. Zero for an instantaneous run.
    pub fn throughput(&self) -> f64 {
        if self.makespan > 0.0 {
            self.jobs.len() as f64 / self.makespan
        } else {
            0.0
        }
    }

    /// Fraction of core-seconds spent running jobs, in `0.0..=1.0`.
    pub fn utilization(&self) -> f64 {
        let available = f64::from(self.total_cores) * self.makespan;
        if available <= 0.0 {
            return 0.0;
        }
        let used: f64 = self
            .jobs
            .iter()
            .map(|job| f64::from(job.allocated_cores) * job.run_time())
            .sum();
        used / available
    }

    /// Records of jobs cut short by their wall-time limit.
    pub fn aborted_jobs(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs
            .iter()
            .filter(|job| job.state == JobState::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, release: f64, start: f64, end: f64, cores: u32) -> JobRecord {
        JobRecord {
            id: JobId(id),
            name: format!("j{id}"),
            num_of_processes: cores,
            allocated_cores: cores,
            allocation: vec![(HostId(0), vec![ProcSet::from_range(0, cores)])],
            release_time: release,
            start_time: start,
            end_time: end,
            state: JobState::Completed,
        }
    }

    fn result(jobs: Vec<JobRecord>, makespan: f64) -> SimulationResult {
        SimulationResult {
            scheduler_name: "fifo".to_string(),
            num_hosts: 1,
            total_cores: 8,
            makespan,
            jobs,
            checkpoints: Vec::new(),
        }
    }

    #[test]
    fn test_aggregate_metrics() {
        let res = result(
            vec![record(1, 0.0, 0.0, 10.0, 8), record(2, 0.0, 10.0, 20.0, 8)],
            20.0,
        );
        assert_eq!(res.mean_waiting_time(), 5.0);
        assert_eq!(res.throughput(), 0.1);
        assert!((res.utilization() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_result_metrics() {
        let res = result(Vec::new(), 0.0);
        assert_eq!(res.mean_waiting_time(), 0.0);
        assert_eq!(res.throughput(), 0.0);
        assert_eq!(res.utilization(), 0.0);
    }

    #[test]
    fn test_json_round_trip() {
        let res = result(vec![record(1, 0.0, 2.0, 12.0, 4)], 12.0);
        let json = serde_json::to_string(&res).unwrap();
        let back: SimulationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.jobs.len(), 1);
        assert_eq!(back.jobs[0].id, JobId(1));
        assert_eq!(back.makespan, 12.0);
    }
}
