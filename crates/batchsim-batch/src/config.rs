//! Scenario files: cluster topology, workloads and schedulers for a sweep.
//!
//! A scenario is a JSON document describing one cluster, one or more
//! workloads and one or more scheduler names. The sweep runs the cross
//! product: every workload under every scheduler, each as an independent
//! simulation instance.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use batchsim_core::{
    Cluster, CoreResult, Job, JobId, RandomWorkload, StaticWorkload, WorkloadGenerator,
};

use crate::error::{BatchError, BatchResult};

/// Homogeneous cluster topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub num_hosts: u32,
    pub cores_per_socket: Vec<u32>,
}

impl ClusterConfig {
    pub fn build(&self) -> CoreResult<Cluster> {
        Cluster::new(self.num_hosts, &self.cores_per_socket)
    }
}

/// One job of a hand-written trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub processes: u32,
    pub duration: f64,
    #[serde(default)]
    pub release: f64,
    #[serde(default)]
    pub wall_time: Option<f64>,
}

impl JobConfig {
    fn build(&self) -> Job {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("job{}", self.id));
        let job = Job::new(
            JobId(self.id),
            name,
            self.processes,
            self.duration,
            self.release,
        );
        match self.wall_time {
            Some(wall) => job.with_wall_time(wall),
            None => job,
        }
    }
}

/// Where one simulation instance's jobs come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WorkloadConfig {
    /// Seeded synthetic workload.
    Random {
        num_jobs: usize,
        seed: u64,
        #[serde(default)]
        max_hosts_per_job: Option<u32>,
        #[serde(default)]
        duration_range: Option<(f64, f64)>,
        #[serde(default)]
        max_interarrival: Option<f64>,
    },
    /// Explicit job list (trace replay).
    Trace { jobs: Vec<JobConfig> },
}

impl WorkloadConfig {
    /// Materialize the job set for `cluster`.
    pub fn build_jobs(&self, cluster: &Cluster) -> Vec<Job> {
        match self {
            WorkloadConfig::Random {
                num_jobs,
                seed,
                max_hosts_per_job,
                duration_range,
                max_interarrival,
            } => {
                let mut generator = RandomWorkload::new(*num_jobs, *seed);
                if let Some(hosts) = max_hosts_per_job {
                    generator = generator.with_max_hosts_per_job(*hosts);
                }
                if let Some((min, max)) = duration_range {
                    generator = generator.with_duration_range(*min, *max);
                }
                if let Some(gap) = max_interarrival {
                    generator = generator.with_max_interarrival(*gap);
                }
                generator.generate(cluster)
            }
            WorkloadConfig::Trace { jobs } => {
                let jobs = jobs.iter().map(JobConfig::build).collect();
                StaticWorkload::new(jobs).generate(cluster)
            }
        }
    }
}

/// A full sweep description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub cluster: ClusterConfig,
    pub workloads: Vec<WorkloadConfig>,
    pub schedulers: Vec<String>,
}

impl ScenarioConfig {
    /// Load and validate a scenario file.
    pub fn from_file(path: impl AsRef<Path>) -> BatchResult<Self> {
        let raw = fs::read_to_string(path)?;
        let scenario: ScenarioConfig = serde_json::from_str(&raw)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> BatchResult<()> {
        if self.workloads.is_empty() {
            return Err(BatchError::Scenario("no workloads".to_string()));
        }
        if self.schedulers.is_empty() {
            return Err(BatchError::Scenario("no schedulers".to_string()));
        }
        Ok(())
    }

    /// Number of simulation instances the sweep will run.
    pub fn num_instances(&self) -> usize {
        self.workloads.len() * self.schedulers.len()
    }
}
