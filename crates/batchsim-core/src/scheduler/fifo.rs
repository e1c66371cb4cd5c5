//! First-in-first-out scheduling with exclusive host allocation.

use super::{SchedCtx, Scheduler, worker_hint};
use crate::cluster::Cluster;
use crate::error::CoreResult;

/// Strict FIFO: jobs are placed in arrival order with compact (whole-host)
/// allocation, and a job that does not fit blocks everything behind it.
#[derive(Debug, Default)]
pub struct Fifo {
    queue_depth: Option<usize>,
    workers: usize,
}

impl Fifo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit how many head-of-queue jobs are considered per step.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = Some(depth);
        self
    }
}

impl Scheduler for Fifo {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn description(&self) -> &'static str {
        "first-in-first-out with exclusive whole-host allocation"
    }

    fn setup(&mut self, cluster: &Cluster) {
        self.workers = worker_hint(cluster);
        tracing::debug!(workers = self.workers, "fifo setup");
    }

    fn queue_depth(&self) -> Option<usize> {
        self.queue_depth
    }

    fn deploy(&mut self, ctx: &mut SchedCtx<'_>) -> CoreResult<bool> {
        ctx.sort_waiting_queue(|job| self.waiting_queue_reorder(job));

        let depth = self.queue_depth.unwrap_or(usize::MAX);
        let mut deployed = false;
        for _ in 0..depth {
            if ctx.cluster.waiting_queue.is_empty() {
                break;
            }
            if ctx.compact_allocation(0, true, |host, job| self.host_alloc_condition(host, job)) {
                deployed = true;
            } else {
                // Head-of-line blocking: nothing behind the head may start.
                break;
            }
        }
        Ok(deployed)
    }
}
