//! Discrete-event simulation engine for HPC batch scheduling.
//!
//! The engine models a cluster of multi-socket hosts executing a stream of
//! batch jobs under a pluggable scheduling policy, at socket granularity:
//! a job's claim on a host is a set of cores per socket, and two jobs never
//! share a core.
//!
//! The moving parts:
//!
//! - [`Cluster`]: hosts, the waiting queue and the execution list.
//! - [`Database`]: the backlog of jobs not yet released into the queue.
//! - [`Scheduler`]: the policy deciding which waiting jobs start each step
//!   ([`Fifo`] and [`EasyBackfill`] are built in, [`SchedulerRegistry`]
//!   resolves policies by name).
//! - [`ComputeEngine`]: the event loop advancing the simulated clock from
//!   one job release or finish to the next.
//!
//! Runs are deterministic: the same cluster, workload and policy always
//! produce the same [`SimulationResult`].
//!
//! ```
//! use batchsim_core::{Cluster, ComputeEngine, Database, Fifo, Job, JobId};
//!
//! let cluster = Cluster::new(2, &[4, 4])?;
//! let jobs = vec![
//!     Job::new(JobId(0), "prep", 8, 60.0, 0.0),
//!     Job::new(JobId(1), "solve", 16, 600.0, 30.0),
//! ];
//! let mut engine = ComputeEngine::new(cluster, Database::new(jobs), Box::new(Fifo::new()))?;
//! engine.run()?;
//! let result = engine.into_result();
//! assert_eq!(result.jobs.len(), 2);
//! # Ok::<(), batchsim_core::CoreError>(())
//! ```

pub mod cluster;
pub mod database;
pub mod engine;
pub mod error;
pub mod host;
pub mod job;
pub mod procset;
pub mod result;
pub mod scheduler;
pub mod workload;

pub use cluster::{Cluster, Placement};
pub use database::Database;
pub use engine::{ComputeEngine, StepStats};
pub use error::{CoreError, CoreResult};
pub use host::{Host, HostId, HostState};
pub use job::{Job, JobId, JobState};
pub use procset::ProcSet;
pub use result::{Checkpoint, JobRecord, SimulationResult};
pub use scheduler::{EasyBackfill, Fifo, SchedCtx, Scheduler, SchedulerRegistry};
pub use workload::{RandomWorkload, StaticWorkload, WorkloadGenerator};
