// Tue Jan 13 2026 - Alex

use crate::orchestration::aggregator::AggregateState;
use crate::orchestration::session::SessionContext;
use crate::utils::format_duration;
use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    IdleTimeout,
    ConnectionLost,
    Unhandled { kind: u32 },
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::IdleTimeout => write!(f, "scheduler went quiet"),
            EndReason::ConnectionLost => write!(f, "connection to scheduler lost"),
            EndReason::Unhandled { kind } => write!(f, "unhandled message kind {}", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub total_jobs: u64,
    pub hosts: usize,
    pub reason: EndReason,
    pub network_name: String,
    pub scheduler_name: String,
    pub sessions: u32,
    pub elapsed: Duration,
}

pub struct OutputFinalizer;

impl OutputFinalizer {
    pub fn finalize(
        state: &AggregateState,
        session: &SessionContext,
        reason: EndReason,
        sessions: u32,
        elapsed: Duration,
    ) -> RunReport {
        RunReport {
            total_jobs: state.total(),
            hosts: state.host_count(),
            reason,
            network_name: session.network_name.clone(),
            scheduler_name: session.scheduler_name.clone(),
            sessions,
            elapsed,
        }
    }

    /// The tool's only output: the total, newline-terminated.
    pub fn render(report: &RunReport) -> String {
        format!("{}\n", report.total_jobs)
    }

    pub fn emit<W: Write>(report: &RunReport, out: &mut W) -> io::Result<()> {
        out.write_all(Self::render(report).as_bytes())?;
        out.flush()
    }

    pub fn summary(report: &RunReport) -> String {
        format!(
            "{} jobs on {} hosts via {} ({}), {} after {}",
            report.total_jobs,
            report.hosts,
            report.scheduler_name,
            report.network_name,
            report.reason,
            format_duration(report.elapsed)
        )
    }
}
