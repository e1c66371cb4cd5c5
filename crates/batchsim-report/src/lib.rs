//! Post-run analysis for batch scheduling simulations.
//!
//! Consumes a [`batchsim_core::SimulationResult`] and produces aggregate
//! metrics, occupancy (Gantt) rows, utilization and queue-length series,
//! and a workload table export. Which sections are materialized is driven
//! by [`ReportOptions`].

pub mod error;
pub mod options;
pub mod report;

pub use error::{ReportError, ReportResult};
pub use options::ReportOptions;
pub use report::{
    GanttRow, Report, SeriesPoint, gantt_rows, queue_series, throughput_series,
    utilization_series, workload_csv,
};
