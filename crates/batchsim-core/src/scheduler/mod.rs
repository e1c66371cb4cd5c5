//! Pluggable scheduling policies.
//!
//! A [`Scheduler`] decides, each simulation step, which waiting jobs to
//! place onto the cluster. Policies only see the cluster and database
//! through a [`SchedCtx`], which also provides the shared allocation
//! algorithms, so every policy goes through the same resource accounting:
//! candidate discovery via [`Cluster::find_suitable_nodes`], scoring via
//! [`Scheduler::host_alloc_condition`], and an atomic commit.

mod easy;
mod fifo;
mod registry;

pub use easy::EasyBackfill;
pub use fifo::Fifo;
pub use registry::SchedulerRegistry;

use crate::cluster::Cluster;
use crate::database::Database;
use crate::error::CoreResult;
use crate::host::Host;
use crate::job::Job;

/// Mutable view of one simulation instance handed to a scheduler for the
/// duration of a step.
pub struct SchedCtx<'a> {
    pub cluster: &'a mut Cluster,
    pub database: &'a mut Database,
    /// The simulated clock at this step.
    pub now: f64,
}

impl SchedCtx<'_> {
    /// Attempt to allocate the waiting-queue job at `queue_idx` under
    /// `socket_conf`. All-or-nothing: on failure nothing is mutated except
    /// the socket configuration recorded on the job.
    ///
    /// `score` orders candidate hosts (higher first, stable w.r.t. the
    /// canonical scan order); `immediate` stops the host scan at the first
    /// sufficient candidate set.
    pub fn allocation(
        &mut self,
        queue_idx: usize,
        socket_conf: &[u32],
        immediate: bool,
        score: impl Fn(&Host, &Job) -> f64,
    ) -> bool {
        let Some(job) = self.cluster.waiting_queue.get_mut(queue_idx) else {
            return false;
        };
        job.socket_conf = socket_conf.to_vec();

        let job = &self.cluster.waiting_queue[queue_idx];
        let (mut candidates, feasible) =
            self.cluster
                .find_suitable_nodes(job.num_of_processes, socket_conf, immediate);
        if !feasible {
            return false;
        }

        // Stable sort: equal scores keep the canonical scan order.
        candidates.sort_by(|a, b| {
            let score_a = self
                .cluster
                .host(a.0)
                .map(|host| score(host, job))
                .unwrap_or(0.0);
            let score_b = self
                .cluster
                .host(b.0)
                .map(|host| score(host, job))
                .unwrap_or(0.0);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let cores_per_host: u32 = socket_conf.iter().sum();
        let needed_hosts = job.num_of_processes.div_ceil(cores_per_host) as usize;
        if candidates.len() < needed_hosts {
            return false;
        }
        candidates.truncate(needed_hosts);

        // Commit point: past here the allocation cannot fail.
        let Some(job) = self.cluster.waiting_queue.remove(queue_idx) else {
            return false;
        };
        tracing::debug!(
            job = %job.signature(),
            hosts = needed_hosts,
            conf = ?socket_conf,
            t = self.now,
            "allocate"
        );
        self.cluster.deploy_job(job, candidates, self.now);
        true
    }

    /// Exclusive whole-host allocation: [`SchedCtx::allocation`] under the
    /// cluster's full socket configuration.
    pub fn compact_allocation(
        &mut self,
        queue_idx: usize,
        immediate: bool,
        score: impl Fn(&Host, &Job) -> f64,
    ) -> bool {
        let conf = self.cluster.full_socket_allocation().to_vec();
        self.allocation(queue_idx, &conf, immediate, score)
    }

    /// Stable-sort the waiting queue by `key`, descending. A constant key
    /// leaves arrival order (FIFO) untouched.
    pub fn sort_waiting_queue(&mut self, key: impl Fn(&Job) -> f64) {
        self.cluster.waiting_queue.make_contiguous().sort_by(|a, b| {
            key(b)
                .partial_cmp(&key(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

/// Size a host-scan worker pool: one worker per host, capped at the
/// machine's parallelism. A throughput hint only, never a correctness knob.
pub fn worker_hint(cluster: &Cluster) -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cluster.hosts().len().min(parallelism)
}

/// A scheduling policy.
///
/// `deploy` runs every step and must honor head-of-line blocking: a job it
/// cannot place blocks every job behind it in the same pass. `backfill` is
/// the designated escape valve; its commitment contract (conservative or
/// aggressive) is a documented property of each implementation.
pub trait Scheduler {
    /// Registry name of the policy.
    fn name(&self) -> &'static str;

    /// One-line description of the policy.
    fn description(&self) -> &'static str {
        "batch scheduling policy"
    }

    /// Called once before the simulation starts.
    fn setup(&mut self, _cluster: &Cluster) {}

    /// How many head-of-queue jobs `deploy` considers per step.
    /// `None` means the whole queue.
    fn queue_depth(&self) -> Option<usize> {
        None
    }

    /// Whether [`Scheduler::backfill`] runs after `deploy` each step.
    fn backfill_enabled(&self) -> bool {
        false
    }

    /// How far past the blocked head backfill may look.
    fn backfill_depth(&self) -> usize {
        100
    }

    /// Score a candidate host for `job`; higher is preferred. The default
    /// expresses no preference, keeping the canonical scan order.
    fn host_alloc_condition(&self, _host: &Host, _job: &Job) -> f64 {
        1.0
    }

    /// Priority key for the waiting queue; higher sorts first. The default
    /// is constant, i.e. arrival order.
    fn waiting_queue_reorder(&self, _job: &Job) -> f64 {
        1.0
    }

    /// Attempt to allocate jobs from the head of the waiting queue.
    /// Returns whether any job was placed.
    fn deploy(&mut self, ctx: &mut SchedCtx<'_>) -> CoreResult<bool>;

    /// Opportunistically place jobs from behind the blocked head into idle
    /// capacity. Default: no backfill.
    fn backfill(&mut self, _ctx: &mut SchedCtx<'_>) -> CoreResult<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobId;

    fn ctx_parts() -> (Cluster, Database) {
        let cluster = Cluster::new(2, &[4, 4]).unwrap();
        let database = Database::new(vec![Job::new(JobId(0), "seed", 1, 1.0, 0.0)]);
        (cluster, database)
    }

    #[test]
    fn test_allocation_is_atomic_on_failure() {
        let (mut cluster, mut database) = ctx_parts();
        // 24 processes can never fit on 16 cores.
        cluster
            .waiting_queue
            .push_back(Job::new(JobId(1), "huge", 24, 10.0, 0.0));

        let mut ctx = SchedCtx {
            cluster: &mut cluster,
            database: &mut database,
            now: 0.0,
        };
        assert!(!ctx.compact_allocation(0, true, |_, _| 1.0));

        assert_eq!(cluster.waiting_queue.len(), 1);
        assert!(cluster.execution_list.is_empty());
        assert_eq!(cluster.idle_cores(), 16);
        assert!(cluster.is_consistent());
    }

    #[test]
    fn test_allocation_commits_and_moves_job() {
        let (mut cluster, mut database) = ctx_parts();
        cluster
            .waiting_queue
            .push_back(Job::new(JobId(1), "fit", 8, 10.0, 0.0));

        let mut ctx = SchedCtx {
            cluster: &mut cluster,
            database: &mut database,
            now: 3.0,
        };
        assert!(ctx.compact_allocation(0, true, |_, _| 1.0));

        assert!(cluster.waiting_queue.is_empty());
        assert_eq!(cluster.execution_list.len(), 1);
        let job = &cluster.execution_list[0];
        assert_eq!(job.start_time, Some(3.0));
        assert_eq!(job.socket_conf, vec![4, 4]);
        assert_eq!(job.allocated_cores(), 8);
        assert_eq!(cluster.idle_cores(), 8);
    }

    #[test]
    fn test_host_scoring_orders_candidates() {
        let (mut cluster, mut database) = ctx_parts();
        cluster
            .waiting_queue
            .push_back(Job::new(JobId(1), "picky", 8, 10.0, 0.0));

        let mut ctx = SchedCtx {
            cluster: &mut cluster,
            database: &mut database,
            now: 0.0,
        };
        // Prefer the highest host id: the job must land on host 1.
        assert!(ctx.compact_allocation(0, false, |host, _| f64::from(host.id().0)));
        let job = &cluster.execution_list[0];
        assert_eq!(job.allocation.len(), 1);
        assert_eq!(job.allocation[0].0.0, 1);
    }

    #[test]
    fn test_sort_waiting_queue_is_stable() {
        let (mut cluster, mut database) = ctx_parts();
        for id in 1..=3 {
            cluster
                .waiting_queue
                .push_back(Job::new(JobId(id), format!("j{id}"), 1, 10.0, 0.0));
        }
        let mut ctx = SchedCtx {
            cluster: &mut cluster,
            database: &mut database,
            now: 0.0,
        };
        ctx.sort_waiting_queue(|_| 1.0);
        let ids: Vec<u64> = cluster.waiting_queue.iter().map(|j| j.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
