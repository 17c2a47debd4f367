// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::error::MonitorResult;
use crate::orchestration::aggregator::{AggregateState, SessionOutcome, StatsAggregator};
use crate::orchestration::discovery::DiscoveryController;
use crate::orchestration::finalizer::{OutputFinalizer, RunReport};
use crate::orchestration::session::SessionContext;
use crate::transport::Discovery;
use indicatif::ProgressBar;
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

pub struct MonitorCoordinator<D: Discovery> {
    discovery: DiscoveryController<D>,
    aggregator: StatsAggregator,
    login_retry_delay: Duration,
    session: SessionContext,
    progress: Option<ProgressBar>,
}

impl<D: Discovery> MonitorCoordinator<D> {
    pub fn new(discovery: DiscoveryController<D>, aggregator: StatsAggregator, config: &Config) -> Self {
        Self {
            discovery,
            aggregator,
            login_retry_delay: config.login_retry_delay(),
            session: SessionContext::new(config.network_name.clone()),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Finds a scheduler, collects stats until the session ends and reports the total.
    /// A failed monitor login goes back to discovery and keeps what was counted so far.
    pub fn run(&mut self) -> MonitorResult<RunReport> {
        let started = Instant::now();
        let mut state = AggregateState::new();
        let mut sessions: u32 = 0;

        loop {
            self.set_progress("Waiting for scheduler...".to_string());
            let mut conn = match self.discovery.acquire_scheduler(&mut self.session) {
                Ok(conn) => conn,
                Err(e) => {
                    self.finish_progress();
                    return Err(e);
                }
            };
            sessions += 1;

            self.set_progress(format!("Collecting stats from {}", conn.scheduler_name()));
            let outcome = self.aggregator.run(&mut *conn, &mut state, &mut self.session);

            match outcome {
                Ok(SessionOutcome::LoginFailed) => {
                    warn!("Rediscovering scheduler in {:?}", self.login_retry_delay);
                    thread::sleep(self.login_retry_delay);
                    drop(conn);
                }
                Ok(SessionOutcome::Ended(reason)) => {
                    self.finish_progress();
                    let report = OutputFinalizer::finalize(&state, &self.session, reason, sessions, started.elapsed());
                    info!("{}", OutputFinalizer::summary(&report));
                    return Ok(report);
                }
                Err(e) => {
                    self.finish_progress();
                    return Err(e);
                }
            }
        }
    }

    fn set_progress(&self, message: String) {
        if let Some(ref pb) = self.progress {
            pb.set_message(message);
        }
    }

    fn finish_progress(&self) {
        if let Some(ref pb) = self.progress {
            pb.finish_and_clear();
        }
    }
}
