//! EASY-style aggressive backfill on top of FIFO deployment.

use super::{SchedCtx, Scheduler, worker_hint};
use crate::cluster::Cluster;
use crate::error::CoreResult;

/// FIFO deployment plus aggressive backfill.
///
/// When the head of the queue cannot be placed, jobs up to
/// `backfill_depth` positions behind it may start in currently idle
/// capacity. Each candidate is tried with compact allocation first and,
/// failing that, with half-socket allocation so it can slot in next to
/// running jobs.
///
/// Commitment contract: aggressive. No reservation is made for the blocked
/// head job, so backfilled work may delay its eventual start.
#[derive(Debug)]
pub struct EasyBackfill {
    queue_depth: Option<usize>,
    backfill_depth: usize,
    workers: usize,
}

impl Default for EasyBackfill {
    fn default() -> Self {
        Self {
            queue_depth: None,
            backfill_depth: 100,
            workers: 0,
        }
    }
}

impl EasyBackfill {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit how far past the blocked head backfill looks.
    pub fn with_backfill_depth(mut self, depth: usize) -> Self {
        self.backfill_depth = depth;
        self
    }

    /// Limit how many head-of-queue jobs deployment considers per step.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = Some(depth);
        self
    }
}

impl Scheduler for EasyBackfill {
    fn name(&self) -> &'static str {
        "easy-backfill"
    }

    fn description(&self) -> &'static str {
        "FIFO deployment with aggressive (non-reserving) backfill"
    }

    fn setup(&mut self, cluster: &Cluster) {
        self.workers = worker_hint(cluster);
        tracing::debug!(workers = self.workers, "easy-backfill setup");
    }

    fn queue_depth(&self) -> Option<usize> {
        self.queue_depth
    }

    fn backfill_enabled(&self) -> bool {
        true
    }

    fn backfill_depth(&self) -> usize {
        self.backfill_depth
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
                break;
            }
        }
        Ok(deployed)
    }

    fn backfill(&mut self, ctx: &mut SchedCtx<'_>) -> CoreResult<bool> {
        // Position 0 is the blocked head; everything behind it is fair game.
        let half_conf = ctx.cluster.half_socket_allocation();
        let mut backfilled = false;
        let mut idx = 1;
        let mut scanned = 0;
        while idx < ctx.cluster.waiting_queue.len() && scanned < self.backfill_depth {
            let placed = ctx
                .compact_allocation(idx, true, |host, job| self.host_alloc_condition(host, job))
                || ctx.allocation(idx, &half_conf, true, |host, job| {
                    self.host_alloc_condition(host, job)
                });
            if placed {
                // The next candidate shifted into this position.
                backfilled = true;
            } else {
                idx += 1;
            }
            scanned += 1;
        }
        if backfilled {
            tracing::debug!(t = ctx.now, "backfill placed job(s) past blocked head");
        }
        Ok(backfilled)
    }
}
