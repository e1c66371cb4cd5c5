//! Cluster topology and queue state.
//!
//! The cluster owns every [`Host`], the waiting queue and the execution
//! list. Jobs move between the queues by value: the cluster is the single
//! owner of a job from release until retirement.

use std::collections::VecDeque;

use crate::error::{CoreError, CoreResult};
use crate::host::{Host, HostId};
use crate::job::{Job, JobId, JobState};
use crate::procset::ProcSet;

/// A candidate placement: a host and the procsets reserved on it, one per
/// socket.
pub type Placement = (HostId, Vec<ProcSet>);

/// The simulated machine: hosts in canonical scan order plus the waiting
/// queue and execution list.
#[derive(Debug)]
pub struct Cluster {
    /// Hosts indexed by `HostId`. Vector order is the canonical scan order.
    hosts: Vec<Host>,

    /// Per-socket core capacity of one whole host; the socket configuration
    /// used for exclusive (compact) allocation.
    full_socket_allocation: Vec<u32>,

    /// Jobs released but not yet allocated, in release order.
    pub waiting_queue: VecDeque<Job>,

    /// Jobs currently executing.
    pub execution_list: Vec<Job>,

    /// Running maximum of completed jobs' end times.
    makespan: f64,

    total_cores: u32,
    idle_cores: u32,
}

impl Cluster {
    /// Create a homogeneous cluster of `num_hosts` hosts, each with the
    /// given cores per socket.
    pub fn new(num_hosts: u32, cores_per_socket: &[u32]) -> CoreResult<Self> {
        if num_hosts == 0 {
            return Err(CoreError::InvalidTopology("no hosts".to_string()));
        }
        if cores_per_socket.is_empty() || cores_per_socket.iter().any(|&c| c == 0) {
            return Err(CoreError::InvalidTopology(format!(
                "bad socket layout {cores_per_socket:?}"
            )));
        }

        let hosts: Vec<Host> = (0..num_hosts)
            .map(|i| Host::new(HostId(i), cores_per_socket))
            .collect();
        let total_cores: u32 = hosts.iter().map(Host::total_cores).sum();

        Ok(Self {
            hosts,
            full_socket_allocation: cores_per_socket.to_vec(),
            waiting_queue: VecDeque::new(),
            execution_list: Vec::new(),
            makespan: 0.0,
            total_cores,
            idle_cores: total_cores,
        })
    }

    /// Hosts in canonical scan order.
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn host(&self, id: HostId) -> CoreResult<&Host> {
        self.hosts
            .get(id.0 as usize)
            .ok_or(CoreError::UnknownHost(id))
    }

    /// The socket configuration that claims one whole host.
    pub fn full_socket_allocation(&self) -> &[u32] {
        &self.full_socket_allocation
    }

    /// Half of each socket, rounded up. Lets two jobs share a host
    /// socket-by-socket.
    pub fn half_socket_allocation(&self) -> Vec<u32> {
        self.full_socket_allocation
            .iter()
            .map(|&c| c.div_ceil(2))
            .collect()
    }

    /// Cores one host contributes to a job under full-socket allocation.
    pub fn cores_per_host(&self) -> u32 {
        self.full_socket_allocation.iter().sum()
    }

    pub fn total_cores(&self) -> u32 {
        self.total_cores
    }

    pub fn idle_cores(&self) -> u32 {
        self.idle_cores
    }

    pub fn makespan(&self) -> f64 {
        self.makespan
    }

    /// Scan hosts in canonical order for candidates able to provide
    /// `socket_conf`, reserving (without committing) the first matching
    /// cores of each socket.
    ///
    /// The returned flag says whether the candidates cover `req_cores` in
    /// total. With `immediate` the scan stops as soon as they do, so the
    /// candidate set is minimal instead of exhaustive.
    pub fn find_suitable_nodes(
        &self,
        req_cores: u32,
        socket_conf: &[u32],
        immediate: bool,
    ) -> (Vec<Placement>, bool) {
        let cores_per_host: u32 = socket_conf.iter().sum();
        if cores_per_host == 0 {
            return (Vec::new(), false);
        }

        let mut still_needed = req_cores as i64;
        let mut candidates = Vec::new();
        for host in &self.hosts {
            if !host.fits(socket_conf) {
                continue;
            }
            candidates.push((host.id(), host.reserve(socket_conf)));
            still_needed -= cores_per_host as i64;
            if immediate && still_needed <= 0 {
                break;
            }
        }
        (candidates, still_needed <= 0)
    }

    /// Commit a placement: occupy the cores on every host, stamp the job's
    /// times and append it to the execution list.
    ///
    /// The caller has already removed the job from the waiting queue and
    /// verified the placement covers its demand; this only mutates state.
    pub fn deploy_job(&mut self, mut job: Job, placement: Vec<Placement>, now: f64) {
        job.state = JobState::Running;
        job.start_time = Some(now);
        job.end_time = Some(now + job.duration);

        for (host_id, psets) in &placement {
            let host = &mut self.hosts[host_id.0 as usize];
            let occupied = host.occupy(job.id, psets.clone());
            self.idle_cores -= occupied;
            tracing::debug!(job = %job.signature(), host = %host_id, cores = occupied, "deploy");
        }
        job.allocation = placement;
        self.execution_list.push(job);
    }

    /// Return a retired job's cores to its hosts.
    pub fn reclaim(&mut self, job: &Job) {
        for (host_id, _) in &job.allocation {
            let released = self.hosts[host_id.0 as usize].release(job.id);
            self.idle_cores += released;
            tracing::debug!(job = %job.signature(), host = %host_id, cores = released, "reclaim");
        }
    }

    /// Fold a completed job's end time into the makespan.
    pub fn record_completion(&mut self, end_time: f64) {
        if end_time > self.makespan {
            self.makespan = end_time;
        }
    }

    /// Earliest instant at which an executing job will finish.
    pub fn earliest_finish_time(&self) -> Option<f64> {
        self.execution_list
            .iter()
            .filter_map(Job::finish_time)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Whether a job holding `id` is currently executing.
    pub fn is_executing(&self, id: JobId) -> bool {
        self.execution_list.iter().any(|job| job.id == id)
    }

    /// Verify resource accounting across all hosts: every host internally
    /// consistent and the idle-core counter in agreement with them.
    pub fn is_consistent(&self) -> bool {
        self.hosts.iter().all(Host::is_consistent)
            && self.idle_cores == self.hosts.iter().map(Host::free_cores).sum::<u32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_host_cluster() -> Cluster {
        Cluster::new(2, &[4, 4]).unwrap()
    }

    #[test]
    fn test_topology_validation() {
        assert!(Cluster::new(0, &[4]).is_err());
        assert!(Cluster::new(2, &[]).is_err());
        assert!(Cluster::new(2, &[4, 0]).is_err());
    }

    #[test]
    fn test_new_cluster_counters() {
        let cluster = two_host_cluster();
        assert_eq!(cluster.total_cores(), 16);
        assert_eq!(cluster.idle_cores(), 16);
        assert_eq!(cluster.cores_per_host(), 8);
        assert_eq!(cluster.half_socket_allocation(), vec![2, 2]);
        assert!(cluster.is_consistent());
    }

    #[test]
    fn test_find_suitable_nodes_all_idle() {
        let cluster = two_host_cluster();
        let (candidates, feasible) = cluster.find_suitable_nodes(8, &[4, 4], false);
        assert!(feasible);
        // Exhaustive scan returns both hosts even though one suffices.
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].0, HostId(0));

        let (candidates, feasible) = cluster.find_suitable_nodes(8, &[4, 4], true);
        assert!(feasible);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_find_suitable_nodes_infeasible() {
        let cluster = two_host_cluster();
        let (_, feasible) = cluster.find_suitable_nodes(24, &[4, 4], false);
        assert!(!feasible);
    }

    #[test]
    fn test_deploy_and_reclaim() {
        let mut cluster = two_host_cluster();
        let job = Job::new(JobId(1), "a", 8, 10.0, 0.0);
        let (candidates, feasible) = cluster.find_suitable_nodes(8, &[4, 4], true);
        assert!(feasible);

        cluster.deploy_job(job, candidates, 5.0);
        assert_eq!(cluster.idle_cores(), 8);
        assert!(cluster.is_executing(JobId(1)));
        assert!(cluster.is_consistent());

        let job = cluster.execution_list.pop().unwrap();
        assert_eq!(job.start_time, Some(5.0));
        assert_eq!(job.end_time, Some(15.0));
        cluster.reclaim(&job);
        assert_eq!(cluster.idle_cores(), 16);
        assert!(cluster.is_consistent());
    }

    #[test]
    fn test_makespan_is_running_max() {
        let mut cluster = two_host_cluster();
        cluster.record_completion(10.0);
        cluster.record_completion(5.0);
        assert_eq!(cluster.makespan(), 10.0);
    }
}
