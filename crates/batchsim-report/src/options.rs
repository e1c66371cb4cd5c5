//! Report configuration.

use serde::{Deserialize, Serialize};

/// Which sections a [`crate::Report`] carries. Everything is on by default;
/// large sweeps switch the per-job sections off to keep output small.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Per-job, per-host occupancy rows.
    pub gantt: bool,
    /// Utilization and queue-length time series from the checkpoints.
    pub series: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            gantt: true,
            series: true,
        }
    }
}

impl ReportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate metrics only.
    pub fn summary_only() -> Self {
        Self {
            gantt: false,
            series: false,
        }
    }

    pub fn with_gantt(mut self, gantt: bool) -> Self {
        self.gantt = gantt;
        self
    }

    pub fn with_series(mut self, series: bool) -> Self {
        self.series = series;
        self
    }
}
