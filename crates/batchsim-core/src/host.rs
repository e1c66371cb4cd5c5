//! A single multi-socket host and its allocation state.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::job::JobId;
use crate::procset::ProcSet;

/// Identifier of a host within the cluster. Also its canonical scan position.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct HostId(pub u32);

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "host{}", self.0)
    }
}

/// Occupancy state of a host, derived from its free cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostState {
    /// No cores allocated.
    Idle,
    /// Some cores allocated, some free.
    Partial,
    /// No socket has a free core.
    Full,
}

/// A node with a fixed socket/core topology and the procsets of the jobs
/// currently running on it.
///
/// Core identifiers are host-local: socket 0 holds cores `0..n0`, socket 1
/// holds `n0..n0+n1`, and so on.
#[derive(Debug, Clone)]
pub struct Host {
    id: HostId,
    /// Full core set of each socket. Never mutated after construction.
    capacity: Vec<ProcSet>,
    /// Currently free cores of each socket.
    free: Vec<ProcSet>,
    /// Procsets occupied per running job, parallel to `capacity`.
    jobs: FxHashMap<JobId, Vec<ProcSet>>,
}

impl Host {
    /// Create an idle host with the given number of cores per socket.
    pub fn new(id: HostId, cores_per_socket: &[u32]) -> Self {
        let mut capacity = Vec::with_capacity(cores_per_socket.len());
        let mut next_core = 0;
        for &cores in cores_per_socket {
            capacity.push(ProcSet::from_range(next_core, next_core + cores));
            next_core += cores;
        }
        Self {
            id,
            free: capacity.clone(),
            capacity,
            jobs: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> HostId {
        self.id
    }

    pub fn num_sockets(&self) -> usize {
        self.capacity.len()
    }

    /// Free cores of each socket, in socket order.
    pub fn free_sockets(&self) -> &[ProcSet] {
        &self.free
    }

    /// Full core set of each socket, in socket order.
    pub fn capacity_sockets(&self) -> &[ProcSet] {
        &self.capacity
    }

    pub fn total_cores(&self) -> u32 {
        self.capacity.iter().map(ProcSet::len).sum()
    }

    pub fn free_cores(&self) -> u32 {
        self.free.iter().map(ProcSet::len).sum()
    }

    /// Ids of the jobs currently occupying this host.
    pub fn running_jobs(&self) -> impl Iterator<Item = JobId> + '_ {
        self.jobs.keys().copied()
    }

    /// Derived occupancy state.
    pub fn state(&self) -> HostState {
        if self.jobs.is_empty() {
            HostState::Idle
        } else if self.free.iter().all(ProcSet::is_empty) {
            HostState::Full
        } else {
            HostState::Partial
        }
    }

    /// Whether the host can currently satisfy `socket_conf`.
    ///
    /// A host qualifies if it is idle or if every socket has at least the
    /// requested number of free cores. The configuration must match the
    /// socket count and per-socket capacity.
    pub fn fits(&self, socket_conf: &[u32]) -> bool {
        if socket_conf.len() != self.capacity.len() {
            return false;
        }
        self.free
            .iter()
            .zip(self.capacity.iter())
            .zip(socket_conf.iter())
            .all(|((free, cap), &want)| want <= cap.len() && want <= free.len())
    }

    /// Pick the first `socket_conf[i]` free cores of each socket without
    /// committing them. The caller commits through [`Host::occupy`].
    pub fn reserve(&self, socket_conf: &[u32]) -> Vec<ProcSet> {
        self.free
            .iter()
            .zip(socket_conf.iter())
            .map(|(free, &want)| free.take_first(want))
            .collect()
    }

    /// Commit `psets` to `job`, removing the cores from the free sets.
    ///
    /// Returns the number of cores occupied.
    pub fn occupy(&mut self, job: JobId, psets: Vec<ProcSet>) -> u32 {
        let mut occupied = 0;
        for (free, pset) in self.free.iter_mut().zip(psets.iter()) {
            debug_assert!(pset.is_subset(free));
            free.subtract(pset);
            occupied += pset.len();
        }
        self.jobs.insert(job, psets);
        occupied
    }

    /// Return `job`'s cores to the free sets.
    ///
    /// Returns the number of cores released; 0 if the job was not here.
    pub fn release(&mut self, job: JobId) -> u32 {
        let Some(psets) = self.jobs.remove(&job) else {
            return 0;
        };
        let mut released = 0;
        for (free, pset) in self.free.iter_mut().zip(psets.iter()) {
            free.merge(pset);
            released += pset.len();
        }
        released
    }

    /// Verify the socket-disjointness invariant: per socket, the procsets of
    /// running jobs are pairwise disjoint, disjoint from the free set, and
    /// together with it reconstruct the socket's capacity exactly.
    pub fn is_consistent(&self) -> bool {
        for (socket, cap) in self.capacity.iter().enumerate() {
            let mut seen = self.free[socket].clone();
            if !seen.is_subset(cap) {
                return false;
            }
            for psets in self.jobs.values() {
                let pset = &psets[socket];
                if !pset.is_disjoint(&seen) || !pset.is_subset(cap) {
                    return false;
                }
                seen.merge(pset);
            }
            if &seen != cap {
                return false;
            }
        }
        true
    }
}
