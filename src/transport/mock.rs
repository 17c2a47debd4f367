// Wed Jan 15 2026 - Alex

use crate::transport::protocol::Message;
use crate::transport::{Connection, Discovery, Probe, Readiness, Received};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::Duration;

/// Observations of a connection that stay readable after it has been moved.
#[derive(Clone, Default)]
pub(crate) struct ConnectionLog {
    pub sent: Rc<RefCell<Vec<Message>>>,
    pub bulk: Rc<Cell<bool>>,
    pub dropped: Rc<Cell<bool>>,
}

pub(crate) struct MockConnection {
    script: VecDeque<Option<Message>>,
    login_fails: bool,
    log: ConnectionLog,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            login_fails: false,
            log: ConnectionLog::default(),
        }
    }

    pub fn stats(self, ip: &str, max_jobs: u32) -> Self {
        self.payload(&format!("IP:{}\nMaxJobs:{}", ip, max_jobs))
    }

    pub fn payload(self, payload: &str) -> Self {
        self.message(Message::MonStats { host_id: 0, payload: payload.to_string() })
    }

    pub fn message(mut self, message: Message) -> Self {
        self.script.push_back(Some(message));
        self
    }

    pub fn close(mut self) -> Self {
        self.script.push_back(None);
        self
    }

    pub fn failing_login(mut self) -> Self {
        self.login_fails = true;
        self
    }

    pub fn log(&self) -> ConnectionLog {
        self.log.clone()
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.log.dropped.set(true);
    }
}

impl Connection for MockConnection {
    fn send(&mut self, message: &Message) -> io::Result<()> {
        if self.login_fails {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted send failure"));
        }
        self.log.sent.borrow_mut().push(message.clone());
        Ok(())
    }

    fn readiness_fd(&self) -> RawFd {
        -1
    }

    fn has_buffered_message(&self) -> bool {
        !self.script.is_empty()
    }

    fn receive_message(&mut self) -> Received {
        match self.script.pop_front() {
            Some(Some(message)) => Received::Message(message),
            Some(None) => Received::Closed,
            None => Received::Pending,
        }
    }

    fn set_bulk_mode(&mut self) {
        self.log.bulk.set(true);
    }

    fn wait_readable(&self, _timeout: Duration) -> io::Result<Readiness> {
        if self.script.is_empty() {
            Ok(Readiness::TimedOut)
        } else {
            Ok(Readiness::Ready)
        }
    }
}

pub(crate) enum ProbePlan {
    /// Nobody answers; the probe times out after `polls` connect attempts.
    Absent { polls: usize },
    /// A scheduler answers on connect attempt `after_polls + 1`.
    Answer {
        after_polls: usize,
        network: String,
        scheduler: String,
        connection: MockConnection,
    },
    /// Waiting on the probe descriptor fails.
    WaitFails,
}

impl ProbePlan {
    pub fn answer(network: &str, scheduler: &str, connection: MockConnection) -> Self {
        ProbePlan::Answer {
            after_polls: 0,
            network: network.to_string(),
            scheduler: scheduler.to_string(),
            connection,
        }
    }
}

#[derive(Default)]
pub(crate) struct MockDiscovery {
    plans: HashMap<String, VecDeque<ProbePlan>>,
    pub starts: Rc<RefCell<Vec<String>>>,
}

impl MockDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome of the next probe started for `name`. Unplanned probes find nothing.
    pub fn plan(mut self, name: &str, plan: ProbePlan) -> Self {
        self.plans.entry(name.to_string()).or_default().push_back(plan);
        self
    }
}

impl Discovery for MockDiscovery {
    type Probe = MockProbe;

    fn start(&mut self, network_name: &str) -> io::Result<MockProbe> {
        self.starts.borrow_mut().push(network_name.to_string());
        let plan = self
            .plans
            .get_mut(network_name)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(ProbePlan::Absent { polls: 1 });

        Ok(MockProbe {
            plan: Some(plan),
            attempts: 0,
            network: network_name.to_string(),
            scheduler: String::new(),
        })
    }
}

pub(crate) struct MockProbe {
    plan: Option<ProbePlan>,
    attempts: usize,
    network: String,
    scheduler: String,
}

impl Probe for MockProbe {
    type Connection = MockConnection;

    fn try_connect(&mut self) -> Option<MockConnection> {
        self.attempts += 1;
        match self.plan.take() {
            Some(ProbePlan::Answer { after_polls, network, scheduler, connection }) if self.attempts > after_polls => {
                self.network = network;
                self.scheduler = scheduler;
                Some(connection)
            }
            other => {
                self.plan = other;
                None
            }
        }
    }

    fn timed_out(&self) -> bool {
        match &self.plan {
            Some(ProbePlan::Absent { polls }) => self.attempts >= *polls,
            Some(_) => false,
            None => true,
        }
    }

    /// Absent and failing probes expose a descriptor; answering ones make the caller sleep.
    fn readiness_fd(&self) -> Option<RawFd> {
        match &self.plan {
            Some(ProbePlan::Answer { .. }) | None => None,
            _ => Some(-1),
        }
    }

    fn resolved_network_name(&self) -> &str {
        &self.network
    }

    fn resolved_scheduler_name(&self) -> &str {
        &self.scheduler
    }

    fn wait_readable(&self, _timeout: Duration) -> io::Result<Readiness> {
        match &self.plan {
            Some(ProbePlan::WaitFails) => Err(io::Error::new(io::ErrorKind::Other, "scripted poll failure")),
            _ => Ok(Readiness::TimedOut),
        }
    }
}
