//! Progress reporting over a side channel.
//!
//! A sweep can stream progress to a collector (a dashboard, a wrapper
//! script) over plain TCP as newline-delimited JSON. Reporting is fire and
//! forget: a dead collector never fails or slows a simulation, it just
//! stops receiving updates.

use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;

use serde::Serialize;

use crate::driver::{CompletionReport, ProgressUpdate};

/// Sink for instance progress. Implementations must never fail the caller.
pub trait ProgressReporter: Send {
    fn progress(&mut self, update: &ProgressUpdate);
    fn complete(&mut self, report: &CompletionReport);
}

/// Discards everything.
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn progress(&mut self, _update: &ProgressUpdate) {}
    fn complete(&mut self, _report: &CompletionReport) {}
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireMessage<'a> {
    Progress(&'a ProgressUpdate),
    Done(&'a CompletionReport),
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Streams newline-delimited JSON messages to a TCP collector.
///
/// On a write failure the reporter reconnects once; if that also fails it
/// goes silent for the rest of the instance.
pub struct TcpProgressReporter {
    addr: String,
    stream: Option<TcpStream>,
    gave_up: bool,
}

impl TcpProgressReporter {
    /// Connect to `addr` (`host:port`). A refused connection is logged and
    /// the reporter starts out silent but will retry once on first use.
    pub fn connect(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        let stream = Self::dial(&addr);
        if stream.is_none() {
            tracing::warn!(%addr, "progress collector unreachable, will retry once");
        }
        Self {
            addr,
            stream,
            gave_up: false,
        }
    }

    fn dial(addr: &str) -> Option<TcpStream> {
        let resolved = std::net::ToSocketAddrs::to_socket_addrs(addr)
            .ok()?
            .next()?;
        let stream = TcpStream::connect_timeout(&resolved, CONNECT_TIMEOUT).ok()?;
        stream.set_nodelay(true).ok();
        Some(stream)
    }

    fn send(&mut self, message: &WireMessage<'_>) {
        if self.gave_up {
            return;
        }
        let Ok(mut line) = serde_json::to_vec(message) else {
            return;
        };
        line.push(b'\n');

        if self.stream.is_none() {
            self.stream = Self::dial(&self.addr);
        }
        let sent = match self.stream.as_mut() {
            Some(stream) => stream.write_all(&line).is_ok(),
            None => false,
        };
        if sent {
            return;
        }

        // One reconnect, then go quiet.
        self.stream = Self::dial(&self.addr);
        let resent = match self.stream.as_mut() {
            Some(stream) => stream.write_all(&line).is_ok(),
            None => false,
        };
        if !resent {
            tracing::warn!(addr = %self.addr, "progress collector lost, reporting disabled");
            self.stream = None;
            self.gave_up = true;
        }
    }
}

impl ProgressReporter for TcpProgressReporter {
    fn progress(&mut self, update: &ProgressUpdate) {
        self.send(&WireMessage::Progress(update));
    }

    fn complete(&mut self, report: &CompletionReport) {
        self.send(&WireMessage::Done(report));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    #[test]
    fn test_streams_tagged_json_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut lines = BufReader::new(stream).lines();
            let first = lines.next().unwrap().unwrap();
            let second = lines.next().unwrap().unwrap();
            (first, second)
        });

        let mut reporter = TcpProgressReporter::connect(addr);
        reporter.progress(&ProgressUpdate {
            sim_id: 3,
            progress_perc: 50.0,
        });
        reporter.complete(&CompletionReport {
            sim_id: 3,
            inp_id: 1,
            sched_id: 0,
            scheduler_name: "fifo".to_string(),
            real_time: 0.5,
            sim_time: 120.0,
            jobs: 10,
        });
        drop(reporter);

        let (first, second) = server.join().unwrap();
        let first: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(first["type"], "progress");
        assert_eq!(first["sim_id"], 3);
        assert_eq!(first["progress_perc"], 50.0);

        let second: serde_json::Value = serde_json::from_str(&second).unwrap();
        assert_eq!(second["type"], "done");
        assert_eq!(second["scheduler_name"], "fifo");
        assert_eq!(second["jobs"], 10);
    }

    #[test]
    fn test_unreachable_collector_is_silent() {
        // Port 1 is essentially never listening.
        let mut reporter = TcpProgressReporter::connect("127.0.0.1:1");
        reporter.progress(&ProgressUpdate {
            sim_id: 0,
            progress_perc: 10.0,
        });
        reporter.progress(&ProgressUpdate {
            sim_id: 0,
            progress_perc: 20.0,
        });
        // No panic, no error: reporting just stops.
        assert!(reporter.gave_up);
    }
}
