//! Batch driver for scheduling simulation sweeps.
//!
//! Loads a [`ScenarioConfig`] (one cluster, several workloads, several
//! schedulers), expands it into the cross product of simulation instances,
//! and runs them across threads with [`ParallelLauncher`]. Each instance is
//! stepped by a [`Driver`] that can stream progress to a TCP collector.

pub mod config;
pub mod driver;
pub mod error;
pub mod launcher;
pub mod progress;

pub use config::{ClusterConfig, JobConfig, ScenarioConfig, WorkloadConfig};
pub use driver::{CompletionReport, Driver, ProgressUpdate, SimIds, StepErrorPolicy};
pub use error::{BatchError, BatchResult};
pub use launcher::{ParallelLauncher, SimInstance, expand_scenario};
pub use progress::{NullProgressReporter, ProgressReporter, TcpProgressReporter};
