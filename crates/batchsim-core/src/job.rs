//! Job model: resource demand, timing and lifecycle state.

use serde::{Deserialize, Serialize};

use crate::host::HostId;
use crate::procset::ProcSet;

/// Unique identifier for a job within one simulation instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
///
/// A job moves strictly forward: `Pending` in the database, `Waiting` once
/// released into the cluster queue, `Running` after a successful allocation,
/// and `Completed` (or `Aborted` on wall-time overrun) when retired. It is
/// never re-queued after allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Created but not yet released into the waiting queue.
    Pending,
    /// Released, waiting for resources.
    Waiting,
    /// Allocated and executing.
    Running,
    /// Finished normally.
    Completed,
    /// Killed at its wall-time limit before finishing.
    Aborted,
}

impl JobState {
    /// Whether the job has left the system.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Aborted)
    }

    /// Human-readable state name.
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Pending => "Pending",
            JobState::Waiting => "Waiting",
            JobState::Running => "Running",
            JobState::Completed => "Completed",
            JobState::Aborted => "Aborted",
        }
    }
}

/// A unit of work submitted to the simulated cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,

    /// Human-readable job name.
    pub name: String,

    /// Number of processes the job spawns. Always at least 1.
    pub num_of_processes: u32,

    /// Required cores per socket, fixed at allocation time. Empty until the
    /// job is allocated.
    pub socket_conf: Vec<u32>,

    /// Execution time in simulated seconds, fixed at creation.
    pub duration: f64,

    /// Simulated instant at which the job enters the waiting queue.
    pub release_time: f64,

    /// Wall-time limit; a running job is aborted once it elapses.
    pub wall_time: Option<f64>,

    /// Set exactly once, on successful allocation.
    pub start_time: Option<f64>,

    /// `start_time + duration`, or the wall-time cutoff for aborted jobs.
    pub end_time: Option<f64>,

    /// Current lifecycle state.
    pub state: JobState,

    /// Committed procsets per host, in allocation order.
    pub allocation: Vec<(HostId, Vec<ProcSet>)>,
}

impl Job {
    /// Create a new pending job.
    ///
    /// `num_of_processes` is clamped to at least 1 and negative times to 0,
    /// so malformed trace entries degrade instead of poisoning the run.
    pub fn new(
        id: JobId,
        name: impl Into<String>,
        num_of_processes: u32,
        duration: f64,
        release_time: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            num_of_processes: num_of_processes.max(1),
            socket_conf: Vec::new(),
            duration: duration.max(0.0),
            release_time: release_time.max(0.0),
            wall_time: None,
            start_time: None,
            end_time: None,
            state: JobState::Pending,
            allocation: Vec::new(),
        }
    }

    /// Set a wall-time limit.
    pub fn with_wall_time(mut self, wall_time: f64) -> Self {
        self.wall_time = Some(wall_time.max(0.0));
        self
    }

    /// Hosts the job currently occupies, in allocation order.
    pub fn assigned_hosts(&self) -> impl Iterator<Item = HostId> + '_ {
        self.allocation.iter().map(|(host, _)| *host)
    }

    /// Total number of cores committed to the job across all hosts.
    pub fn allocated_cores(&self) -> u32 {
        self.allocation
            .iter()
            .flat_map(|(_, psets)| psets.iter())
            .map(ProcSet::len)
            .sum()
    }

    /// The instant the job will leave the cluster, accounting for its
    /// wall-time limit. `None` until the job starts.
    pub fn finish_time(&self) -> Option<f64> {
        let start = self.start_time?;
        let runtime = match self.wall_time {
            Some(wall) => self.duration.min(wall),
            None => self.duration,
        };
        Some(start + runtime)
    }

    /// Whether the wall-time limit cuts the job short.
    pub fn overruns_wall_time(&self) -> bool {
        self.wall_time.is_some_and(|wall| wall < self.duration)
    }

    /// Time spent in the waiting queue. `None` until the job starts.
    pub fn waiting_time(&self) -> Option<f64> {
        self.start_time.map(|start| start - self.release_time)
    }

    /// Short identifier used in logs: `id:name`.
    pub fn signature(&self) -> String {
        format!("{}:{}", self.id, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_degenerate_inputs() {
        let job = Job::new(JobId(1), "noop", 0, -5.0, -1.0);
        assert_eq!(job.num_of_processes, 1);
        assert_eq!(job.duration, 0.0);
        assert_eq!(job.release_time, 0.0);
        assert_eq!(job.state, JobState::Pending);
    }

    #[test]
    fn test_finish_time_respects_wall_time() {
        let mut job = Job::new(JobId(1), "long", 4, 100.0, 0.0).with_wall_time(60.0);
        job.start_time = Some(10.0);
        assert_eq!(job.finish_time(), Some(70.0));
        assert!(job.overruns_wall_time());

        let mut ok = Job::new(JobId(2), "short", 4, 30.0, 0.0).with_wall_time(60.0);
        ok.start_time = Some(10.0);
        assert_eq!(ok.finish_time(), Some(40.0));
        assert!(!ok.overruns_wall_time());
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Aborted.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::Waiting.is_terminal());
    }

    #[test]
    fn test_signature() {
        let job = Job::new(JobId(7), "lammps", 16, 10.0, 0.0);
        assert_eq!(job.signature(), "7:lammps");
    }
}
