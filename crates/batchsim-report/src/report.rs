//! Turning a finished run into metrics, series and exportable tables.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use batchsim_core::{HostId, JobId, JobState, ProcSet, SimulationResult};

use crate::error::ReportResult;
use crate::options::ReportOptions;

/// One bar of the cluster occupancy chart: a job's tenure on one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GanttRow {
    pub job: JobId,
    pub name: String,
    pub host: HostId,
    /// Cores the job held on this host, one procset per socket.
    pub cores: Vec<ProcSet>,
    pub start: f64,
    pub end: f64,
}

/// One sample of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub time: f64,
    pub value: f64,
}

/// Aggregate metrics and optional detail sections derived from a
/// [`SimulationResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub scheduler_name: String,
    pub num_hosts: u32,
    pub total_cores: u32,
    pub num_jobs: usize,
    pub num_aborted: usize,
    pub makespan: f64,
    pub mean_waiting_time: f64,
    pub throughput: f64,
    pub utilization: f64,
    /// Empty unless [`ReportOptions::gantt`] is set.
    pub gantt: Vec<GanttRow>,
    /// Empty unless [`ReportOptions::series`] is set.
    pub utilization_series: Vec<SeriesPoint>,
    /// Empty unless [`ReportOptions::series`] is set.
    pub queue_series: Vec<SeriesPoint>,
    /// Empty unless [`ReportOptions::series`] is set.
    pub throughput_series: Vec<SeriesPoint>,
}

impl Report {
    /// Build a report from a finished run.
    pub fn build(result: &SimulationResult, options: ReportOptions) -> Self {
        let report = Self {
            scheduler_name: result.scheduler_name.clone(),
            num_hosts: result.num_hosts,
            total_cores: result.total_cores,
            num_jobs: result.jobs.len(),
            num_aborted: result.aborted_jobs().count(),
            makespan: result.makespan,
            mean_waiting_time: result.mean_waiting_time(),
            throughput: result.throughput(),
            utilization: result.utilization(),
            gantt: if options.gantt {
                gantt_rows(result)
            } else {
                Vec::new()
            },
            utilization_series: if options.series {
                utilization_series(result)
            } else {
                Vec::new()
            },
            queue_series: if options.series {
                queue_series(result)
            } else {
                Vec::new()
            },
            throughput_series: if options.series {
                throughput_series(result)
            } else {
                Vec::new()
            },
        };
        tracing::debug!(
            scheduler = %report.scheduler_name,
            jobs = report.num_jobs,
            makespan = report.makespan,
            "report built"
        );
        report
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> ReportResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Per-job, per-host occupancy rows, ordered by start time then host.
pub fn gantt_rows(result: &SimulationResult) -> Vec<GanttRow> {
    let mut rows: Vec<GanttRow> = result
        .jobs
        .iter()
        .flat_map(|job| {
            job.allocation.iter().map(|(host, psets)| GanttRow {
                job: job.id,
                name: job.name.clone(),
                host: *host,
                cores: psets.clone(),
                start: job.start_time,
                end: job.end_time,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        a.start
            .partial_cmp(&b.start)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.host.cmp(&b.host))
    });
    rows
}

/// Core utilization (busy fraction) at each checkpoint.
pub fn utilization_series(result: &SimulationResult) -> Vec<SeriesPoint> {
    let total = f64::from(result.total_cores);
    result
        .checkpoints
        .iter()
        .map(|cp| SeriesPoint {
            time: cp.time,
            value: if total > 0.0 {
                (total - f64::from(cp.idle_cores)) / total
            } else {
                0.0
            },
        })
        .collect()
}

/// Waiting-queue length at each checkpoint.
pub fn queue_series(result: &SimulationResult) -> Vec<SeriesPoint> {
    result
        .checkpoints
        .iter()
        .map(|cp| SeriesPoint {
            time: cp.time,
            value: cp.waiting as f64,
        })
        .collect()
}

/// Cumulative retired-job count at each checkpoint.
pub fn throughput_series(result: &SimulationResult) -> Vec<SeriesPoint> {
    result
        .checkpoints
        .iter()
        .map(|cp| SeriesPoint {
            time: cp.time,
            value: cp.finished as f64,
        })
        .collect()
}

/// Render the retired jobs as a workload table in the standard-workload-
/// format column layout: one line per job with id, submit time, wait time,
/// run time, allocated processors and completion status (1 completed,
/// 0 aborted).
pub fn workload_csv(result: &SimulationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "; jobs: {}", result.jobs.len());
    let _ = writeln!(out, "; scheduler: {}", result.scheduler_name);
    let _ = writeln!(out, "; makespan: {:.3}", result.makespan);
    let mut jobs: Vec<_> = result.jobs.iter().collect();
    jobs.sort_by_key(|job| job.id);
    for job in jobs {
        let status = if job.state == JobState::Aborted { 0 } else { 1 };
        let _ = writeln!(
            out,
            "{} {:.3} {:.3} {:.3} {} {}",
            job.id,
            job.release_time,
            job.waiting_time(),
            job.run_time(),
            job.allocated_cores,
            status,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchsim_core::{
        Cluster, ComputeEngine, Database, Fifo, Job, JobId as CoreJobId, SimulationResult,
    };

    fn sample_result() -> SimulationResult {
        let cluster = Cluster::new(2, &[4, 4]).unwrap();
        let jobs = vec![
            Job::new(CoreJobId(1), "first", 16, 50.0, 0.0),
            Job::new(CoreJobId(2), "second", 8, 30.0, 10.0),
            Job::new(CoreJobId(3), "cut", 8, 500.0, 10.0).with_wall_time(20.0),
        ];
        let mut engine =
            ComputeEngine::new(cluster, Database::new(jobs), Box::new(Fifo::new())).unwrap();
        engine.run().unwrap();
        engine.into_result()
    }

    #[test]
    fn test_report_sections_follow_options() {
        let result = sample_result();

        let full = Report::build(&result, ReportOptions::default());
        assert!(!full.gantt.is_empty());
        assert!(!full.utilization_series.is_empty());
        assert_eq!(full.num_jobs, 3);
        assert_eq!(full.num_aborted, 1);

        let summary = Report::build(&result, ReportOptions::summary_only());
        assert!(summary.gantt.is_empty());
        assert!(summary.utilization_series.is_empty());
        assert_eq!(summary.makespan, full.makespan);
    }

    #[test]
    fn test_gantt_rows_cover_every_host_tenure() {
        let result = sample_result();
        let rows = gantt_rows(&result);
        // Job 1 spans two hosts, jobs 2 and 3 one each.
        assert_eq!(rows.len(), 4);
        assert!(rows.windows(2).all(|p| p[0].start <= p[1].start));
        assert!(rows.iter().all(|r| r.end > r.start));
        // Every row carries the cores held on that host.
        assert!(
            rows.iter()
                .all(|r| r.cores.iter().map(ProcSet::len).sum::<u32>() > 0)
        );
    }

    #[test]
    fn test_utilization_series_bounds() {
        let result = sample_result();
        let series = utilization_series(&result);
        assert!(!series.is_empty());
        assert!(
            series
                .iter()
                .all(|p| (0.0..=1.0).contains(&p.value))
        );
        // Fully drained at the end.
        assert_eq!(series.last().unwrap().value, 0.0);
    }

    #[test]
    fn test_throughput_series_is_cumulative() {
        let result = sample_result();
        let series = throughput_series(&result);
        assert!(series.windows(2).all(|p| p[0].value <= p[1].value));
        assert_eq!(series.last().unwrap().value, 3.0);
    }

    #[test]
    fn test_workload_csv_layout() {
        let result = sample_result();
        let csv = workload_csv(&result);
        let data: Vec<&str> = csv.lines().filter(|l| !l.starts_with(';')).collect();
        assert_eq!(data.len(), 3);
        for line in &data {
            assert_eq!(line.split_whitespace().count(), 6);
        }
        // The aborted job reports status 0.
        let cut = data.iter().find(|l| l.starts_with("3 ")).unwrap();
        assert!(cut.ends_with(" 0"));
    }

    #[test]
    fn test_write_json() {
        let result = sample_result();
        let report = Report::build(&result, ReportOptions::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.write_json(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let back: Report = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.num_jobs, report.num_jobs);
        assert_eq!(back.gantt.len(), report.gantt.len());
    }
}
