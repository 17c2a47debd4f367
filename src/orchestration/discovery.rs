// Tue Jan 13 2026 - Alex

use crate::config::{Config, DEFAULT_NETWORK_NAME};
use crate::error::{MonitorError, MonitorResult};
use crate::orchestration::session::SessionContext;
use crate::transport::{Connection, Discovery, Probe};
use log::{debug, info, trace};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

pub type ConnectionOf<D> = <<D as Discovery>::Probe as Probe>::Connection;

/// The single live link to a scheduler. Dropping it closes the connection.
pub struct ScopedConnection<C: Connection> {
    inner: C,
    scheduler_name: String,
}

impl<C: Connection> ScopedConnection<C> {
    pub fn new(inner: C, scheduler_name: impl Into<String>) -> Self {
        Self {
            inner,
            scheduler_name: scheduler_name.into(),
        }
    }

    pub fn scheduler_name(&self) -> &str {
        &self.scheduler_name
    }
}

impl<C: Connection> Deref for ScopedConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner
    }
}

impl<C: Connection> DerefMut for ScopedConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.inner
    }
}

impl<C: Connection> Drop for ScopedConnection<C> {
    fn drop(&mut self) {
        debug!("Closing connection to scheduler {}", self.scheduler_name);
    }
}

/// Network names to probe, in order: the configured name (or the default when
/// empty), then the override if one is set.
pub fn candidate_names(configured: &str, override_name: Option<&str>) -> Vec<String> {
    let mut names = Vec::with_capacity(2);

    if configured.is_empty() {
        names.push(DEFAULT_NETWORK_NAME.to_string());
    } else {
        names.push(configured.to_string());
    }

    if let Some(name) = override_name {
        names.push(name.to_string());
    }

    names
}

pub struct DiscoveryController<D: Discovery> {
    discovery: D,
    override_name: Option<String>,
    probe_wait: Duration,
    poll_interval: Duration,
}

impl<D: Discovery> DiscoveryController<D> {
    pub fn new(discovery: D, config: &Config, override_name: Option<String>) -> Self {
        Self {
            discovery,
            override_name,
            probe_wait: config.probe_wait(),
            poll_interval: config.poll_interval(),
        }
    }

    /// Blocks until some candidate network yields a scheduler. Absence is retried
    /// forever; only local transport faults come back as errors.
    pub fn acquire_scheduler(
        &mut self,
        session: &mut SessionContext,
    ) -> MonitorResult<ScopedConnection<ConnectionOf<D>>> {
        let mut pass: u64 = 0;

        loop {
            pass += 1;
            let candidates = candidate_names(&session.network_name, self.override_name.as_deref());
            trace!("Discovery pass {} over {:?}", pass, candidates);

            for name in &candidates {
                if let Some(conn) = self.try_candidate(name, session)? {
                    return Ok(conn);
                }
            }

            debug!("No scheduler answered for {:?} (pass {}), retrying", candidates, pass);
        }
    }

    fn try_candidate(
        &mut self,
        name: &str,
        session: &mut SessionContext,
    ) -> MonitorResult<Option<ScopedConnection<ConnectionOf<D>>>> {
        let mut probe = self.discovery.start(name).map_err(|source| MonitorError::DiscoveryStart {
            network: name.to_string(),
            source,
        })?;

        let mut conn = probe.try_connect();
        while conn.is_none() && !probe.timed_out() {
            probe
                .wait(self.probe_wait, self.poll_interval)
                .map_err(MonitorError::DiscoveryWait)?;
            conn = probe.try_connect();
        }

        let Some(mut conn) = conn else {
            return Ok(None);
        };

        session.go_online(probe.resolved_network_name(), probe.resolved_scheduler_name());
        conn.set_bulk_mode();

        info!(
            "Connected to scheduler {} on network {}",
            session.scheduler_name, session.network_name
        );

        Ok(Some(ScopedConnection::new(conn, session.scheduler_name.clone())))
    }
}
