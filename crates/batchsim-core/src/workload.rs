//! Workload generation: turning traces or distributions into job sets.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cluster::Cluster;
use crate::job::{Job, JobId};

/// Produces the job set for one simulation instance.
///
/// Generators size jobs against a concrete cluster so the produced demand is
/// always satisfiable by the topology it will run on.
pub trait WorkloadGenerator {
    fn name(&self) -> &'static str;

    /// Generate jobs for `cluster`, in submission order.
    fn generate(&mut self, cluster: &Cluster) -> Vec<Job>;
}

/// Hand-written job list, passed through untouched.
///
/// The degenerate generator for trace replay and tests.
#[derive(Debug, Default)]
pub struct StaticWorkload {
    jobs: Vec<Job>,
}

impl StaticWorkload {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self { jobs }
    }
}

impl WorkloadGenerator for StaticWorkload {
    fn name(&self) -> &'static str {
        "static"
    }

    fn generate(&mut self, _cluster: &Cluster) -> Vec<Job> {
        std::mem::take(&mut self.jobs)
    }
}

/// Seeded random workload.
///
/// Process counts are drawn in whole-host multiples up to `max_hosts_per_job`
/// hosts, durations uniformly from `duration_range`, and inter-arrival gaps
/// uniformly from `0..=max_interarrival`. The same seed always produces the
/// same job set for the same cluster.
#[derive(Debug, Clone)]
pub struct RandomWorkload {
    num_jobs: usize,
    max_hosts_per_job: u32,
    duration_range: (f64, f64),
    max_interarrival: f64,
    seed: u64,
}

impl RandomWorkload {
    pub fn new(num_jobs: usize, seed: u64) -> Self {
        Self {
            num_jobs,
            max_hosts_per_job: 4,
            duration_range: (60.0, 3600.0),
            max_interarrival: 120.0,
            seed,
        }
    }

    /// Cap each job's demand at this many whole hosts.
    pub fn with_max_hosts_per_job(mut self, hosts: u32) -> Self {
        self.max_hosts_per_job = hosts.max(1);
        self
    }

    /// Uniform duration bounds in simulated seconds.
    pub fn with_duration_range(mut self, min: f64, max: f64) -> Self {
        self.duration_range = (min.max(0.0), max.max(min).max(0.0));
        self
    }

    /// Maximum gap between consecutive submissions.
    pub fn with_max_interarrival(mut self, gap: f64) -> Self {
        self.max_interarrival = gap.max(0.0);
        self
    }
}

impl WorkloadGenerator for RandomWorkload {
    fn name(&self) -> &'static str {
        "random"
    }

    fn generate(&mut self, cluster: &Cluster) -> Vec<Job> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let cores_per_host = cluster.cores_per_host();
        let max_hosts = self.max_hosts_per_job.min(cluster.hosts().len() as u32);
        let (min_dur, max_dur) = self.duration_range;

        let mut jobs = Vec::with_capacity(self.num_jobs);
        let mut release = 0.0;
        for i in 0..self.num_jobs {
            let hosts = rng.gen_range(1..=max_hosts);
            let duration = if max_dur > min_dur {
                rng.gen_range(min_dur..=max_dur)
            } else {
                min_dur
            };
            jobs.push(Job::new(
                JobId(i as u64),
                format!("rand{i}"),
                hosts * cores_per_host,
                duration,
                release,
            ));
            if self.max_interarrival > 0.0 {
                release += rng.gen_range(0.0..=self.max_interarrival);
            }
        }
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> Cluster {
        Cluster::new(4, &[4, 4]).unwrap()
    }

    #[test]
    fn test_same_seed_same_workload() {
        let cluster = cluster();
        let a = RandomWorkload::new(50, 7).generate(&cluster);
        let b = RandomWorkload::new(50, 7).generate(&cluster);
        assert_eq!(a.len(), 50);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.num_of_processes, y.num_of_processes);
            assert_eq!(x.duration, y.duration);
            assert_eq!(x.release_time, y.release_time);
        }
    }

    #[test]
    fn test_different_seed_differs() {
        let cluster = cluster();
        let a = RandomWorkload::new(50, 7).generate(&cluster);
        let b = RandomWorkload::new(50, 8).generate(&cluster);
        assert!(
            a.iter()
                .zip(&b)
                .any(|(x, y)| x.duration != y.duration || x.release_time != y.release_time)
        );
    }

    #[test]
    fn test_jobs_fit_the_cluster() {
        let cluster = cluster();
        let jobs = RandomWorkload::new(100, 1)
            .with_max_hosts_per_job(16)
            .generate(&cluster);
        let max_cores = cluster.total_cores();
        assert!(jobs.iter().all(|j| j.num_of_processes <= max_cores));
        // Releases are non-decreasing.
        for pair in jobs.windows(2) {
            assert!(pair[0].release_time <= pair[1].release_time);
        }
    }

    #[test]
    fn test_static_passthrough() {
        let cluster = cluster();
        let jobs = vec![Job::new(JobId(1), "a", 8, 10.0, 0.0)];
        let out = StaticWorkload::new(jobs).generate(&cluster);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, JobId(1));
    }
}
