//! Backlog of not-yet-released jobs and their release schedule.

use std::collections::VecDeque;

use crate::job::{Job, JobId, JobState};

/// Owns the ordered backlog of pending jobs and feeds them into the
/// cluster's waiting queue as simulated time passes their release times.
#[derive(Debug, Default)]
pub struct Database {
    /// Pending jobs ordered by release time; ties keep submission order.
    preloaded_queue: VecDeque<Job>,
}

impl Database {
    /// Build the backlog from a job set.
    ///
    /// Jobs are stably sorted by release time and shifted so the first
    /// release lands at t = 0, which anchors every run to the same origin
    /// regardless of where the trace starts.
    pub fn new(mut jobs: Vec<Job>) -> Self {
        jobs.sort_by(|a, b| {
            a.release_time
                .partial_cmp(&b.release_time)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if let Some(first) = jobs.first().map(|job| job.release_time) {
            for job in &mut jobs {
                job.release_time -= first;
            }
        }
        Self {
            preloaded_queue: jobs.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.preloaded_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preloaded_queue.is_empty()
    }

    /// Release time of the next pending job.
    pub fn next_release_time(&self) -> Option<f64> {
        self.preloaded_queue.front().map(|job| job.release_time)
    }

    /// Pop every job due at or before `now`, in release order, marking each
    /// `Waiting`. Release is monotonic: a released job never returns.
    pub fn release_due(&mut self, now: f64) -> Vec<Job> {
        let mut released = Vec::new();
        while let Some(front) = self.preloaded_queue.front() {
            if front.release_time > now {
                break;
            }
            // Front exists, checked above.
            if let Some(mut job) = self.preloaded_queue.pop_front() {
                job.state = JobState::Waiting;
                released.push(job);
            }
        }
        released
    }

    /// The release schedule: distinct release instants with the jobs due at
    /// each, in order.
    pub fn release_schedule(&self) -> Vec<(f64, Vec<JobId>)> {
        let mut schedule: Vec<(f64, Vec<JobId>)> = Vec::new();
        for job in &self.preloaded_queue {
            match schedule.last_mut() {
                Some((time, ids)) if *time == job.release_time => ids.push(job.id),
                _ => schedule.push((job.release_time, vec![job.id])),
            }
        }
        schedule
    }

    /// Iterate over pending jobs in release order.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.preloaded_queue.iter()
    }
}
