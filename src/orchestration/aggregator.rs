// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::error::{MonitorError, MonitorResult, StatsError};
use crate::orchestration::finalizer::EndReason;
use crate::orchestration::session::SessionContext;
use crate::transport::{Connection, Message, Readiness, Received};
use indexmap::IndexSet;
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsPolicy {
    /// Skip malformed stats messages with a warning.
    #[default]
    Lenient,
    /// Abort the run on the first malformed stats message.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnhandledPolicy {
    #[default]
    EndSession,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The monitor login could not be sent; the caller should rediscover.
    LoginFailed,
    Ended(EndReason),
}

/// Running job total plus every host that has contributed to it.
/// Each host counts once, with the capacity from its first report.
#[derive(Debug, Clone, Default)]
pub struct AggregateState {
    total_jobs_available: u64,
    known_hosts: IndexSet<String>,
}

impl AggregateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total_jobs_available
    }

    pub fn host_count(&self) -> usize {
        self.known_hosts.len()
    }

    pub fn knows(&self, ip: &str) -> bool {
        self.known_hosts.contains(ip)
    }

    /// Returns false when the host was already counted.
    pub fn record(&mut self, report: &StatsReport) -> bool {
        if self.known_hosts.contains(report.ip.as_str()) {
            return false;
        }
        self.total_jobs_available += u64::from(report.max_jobs);
        self.known_hosts.insert(report.ip.clone());
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsReport {
    pub ip: String,
    pub max_jobs: u32,
}

impl StatsReport {
    pub fn parse(payload: &str) -> Result<Self, StatsError> {
        let fields = parse_stats(payload);

        let ip = fields.get("IP").ok_or(StatsError::MissingKey("IP"))?;
        let max_jobs = fields.get("MaxJobs").ok_or(StatsError::MissingKey("MaxJobs"))?;
        let max_jobs = max_jobs
            .trim()
            .parse::<u32>()
            .map_err(|_| StatsError::InvalidMaxJobs(max_jobs.to_string()))?;

        Ok(Self {
            ip: ip.to_string(),
            max_jobs,
        })
    }
}

/// Splits `KEY:VALUE` lines. The key runs up to the first colon; lines without
/// one are skipped and the first occurrence of a key wins.
pub fn parse_stats(payload: &str) -> HashMap<&str, &str> {
    let mut fields = HashMap::new();
    for line in payload.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields.entry(key).or_insert(value);
        }
    }
    fields
}

pub struct StatsAggregator {
    idle_deadline: Duration,
    stats_policy: StatsPolicy,
    unhandled_policy: UnhandledPolicy,
}

impl StatsAggregator {
    pub fn new(idle_deadline: Duration) -> Self {
        Self {
            idle_deadline,
            stats_policy: StatsPolicy::default(),
            unhandled_policy: UnhandledPolicy::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let stats_policy = if config.strict_stats { StatsPolicy::Strict } else { StatsPolicy::Lenient };
        let unhandled_policy = if config.ignore_unhandled { UnhandledPolicy::Ignore } else { UnhandledPolicy::EndSession };

        Self::new(config.idle_deadline())
            .with_stats_policy(stats_policy)
            .with_unhandled_policy(unhandled_policy)
    }

    pub fn with_stats_policy(mut self, policy: StatsPolicy) -> Self {
        self.stats_policy = policy;
        self
    }

    pub fn with_unhandled_policy(mut self, policy: UnhandledPolicy) -> Self {
        self.unhandled_policy = policy;
        self
    }

    /// Logs in as a monitor and folds stats into `state` until the scheduler goes
    /// quiet for the idle deadline, the link drops, or an unhandled message arrives.
    pub fn run<C: Connection>(
        &self,
        conn: &mut C,
        state: &mut AggregateState,
        session: &mut SessionContext,
    ) -> MonitorResult<SessionOutcome> {
        if let Err(e) = conn.send(&Message::MonLogin) {
            warn!("Monitor login to {} failed: {}", session.scheduler_name, e);
            session.go_offline();
            return Ok(SessionOutcome::LoginFailed);
        }

        loop {
            match conn.wait_readable(self.idle_deadline).map_err(MonitorError::ConnectionWait)? {
                Readiness::TimedOut => {
                    debug!("No message for {:?}, finishing", self.idle_deadline);
                    return Ok(SessionOutcome::Ended(EndReason::IdleTimeout));
                }
                Readiness::Ready => {}
            }

            // Drain whole frames only; a partial frame goes back to the deadline wait.
            loop {
                let message = match conn.receive_message() {
                    Received::Message(message) => message,
                    Received::Pending => break,
                    Received::Closed => {
                        debug!("Lost scheduler {}", session.scheduler_name);
                        session.go_offline();
                        return Ok(SessionOutcome::Ended(EndReason::ConnectionLost));
                    }
                };

                if let Some(reason) = self.handle_message(message, state, session)? {
                    return Ok(SessionOutcome::Ended(reason));
                }

                if !conn.has_buffered_message() {
                    break;
                }
            }
        }
    }

    fn handle_message(
        &self,
        message: Message,
        state: &mut AggregateState,
        session: &mut SessionContext,
    ) -> MonitorResult<Option<EndReason>> {
        match message {
            Message::MonStats { host_id, payload } => {
                trace!("Stats from host {}: {:?}", host_id, payload);
                self.handle_stats(&payload, state)?;
                Ok(None)
            }
            Message::End => {
                debug!("Scheduler {} ended the session", session.scheduler_name);
                session.go_offline();
                Ok(Some(EndReason::ConnectionLost))
            }
            other => match self.unhandled_policy {
                UnhandledPolicy::EndSession => Ok(Some(EndReason::Unhandled { kind: other.kind_code() })),
                UnhandledPolicy::Ignore => {
                    trace!("Ignoring message kind {}", other.kind_code());
                    Ok(None)
                }
            },
        }
    }

    fn handle_stats(&self, payload: &str, state: &mut AggregateState) -> MonitorResult<()> {
        let report = match StatsReport::parse(payload) {
            Ok(report) => report,
            Err(e) => match self.stats_policy {
                StatsPolicy::Strict => return Err(MonitorError::MalformedStats(e)),
                StatsPolicy::Lenient => {
                    warn!("Skipping malformed stats message: {}", e);
                    return Ok(());
                }
            },
        };

        if state.record(&report) {
            debug!(
                "Host {} offers {} jobs (total {})",
                report.ip, report.max_jobs, state.total()
            );
        }
        Ok(())
    }
}
