//! Error handling for the simulation engine.

use thiserror::Error;

use crate::host::HostId;
use crate::job::JobId;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building or stepping a simulation.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A job demands more resources than the whole cluster can ever provide.
    #[error(
        "job {job} can never be satisfied: needs {needed_hosts} hosts under \
         full-socket allocation but the cluster has {available_hosts}"
    )]
    InfeasibleJob {
        job: JobId,
        needed_hosts: usize,
        available_hosts: usize,
    },

    /// The simulation was constructed with no jobs to run.
    #[error("the workload is empty")]
    EmptyWorkload,

    /// The cluster was constructed with no hosts or no cores.
    #[error("invalid cluster topology: {0}")]
    InvalidTopology(String),

    /// No future event exists but jobs are still waiting: the simulated
    /// clock can never advance again.
    #[error("simulation stalled at t={time}: {waiting} job(s) waiting with no future event")]
    ClockStall { time: f64, waiting: usize },

    /// A scheduler referenced a host the cluster does not know about.
    #[error("unknown host: {0}")]
    UnknownHost(HostId),

    /// No scheduler registered under the requested name.
    #[error("unknown scheduler: {0:?}")]
    UnknownScheduler(String),

    /// Internal engine invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the error leaves the simulation permanently unable to make
    /// progress. Fatal errors must abort the run; the driver may elect to
    /// continue past non-fatal ones.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::InfeasibleJob { .. }
                | CoreError::EmptyWorkload
                | CoreError::InvalidTopology(_)
                | CoreError::ClockStall { .. }
                | CoreError::UnknownScheduler(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnknownScheduler("fcfs".to_string());
        assert_eq!(err.to_string(), "unknown scheduler: \"fcfs\"");

        let err = CoreError::ClockStall {
            time: 12.5,
            waiting: 3,
        };
        assert!(err.to_string().contains("stalled at t=12.5"));
    }

    #[test]
    fn test_fatality() {
        assert!(
            CoreError::ClockStall {
                time: 0.0,
                waiting: 1
            }
            .is_fatal()
        );
        assert!(!CoreError::Internal("oops".to_string()).is_fatal());
    }
}
