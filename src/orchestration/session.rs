// Tue Jan 13 2026 - Alex

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Offline,
    Online,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Offline => write!(f, "offline"),
            SessionPhase::Online => write!(f, "online"),
        }
    }
}

/// Where the monitor currently is: the network it last found a scheduler on,
/// that scheduler, and whether the link is believed live.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub network_name: String,
    pub scheduler_name: String,
    pub phase: SessionPhase,
}

impl SessionContext {
    pub fn new(network_name: impl Into<String>) -> Self {
        Self {
            network_name: network_name.into(),
            scheduler_name: String::new(),
            phase: SessionPhase::Offline,
        }
    }

    /// Adopts the names reported by a successful probe.
    pub fn go_online(&mut self, network_name: &str, scheduler_name: &str) {
        self.network_name = network_name.to_string();
        self.scheduler_name = scheduler_name.to_string();
        self.phase = SessionPhase::Online;
    }

    pub fn go_offline(&mut self) {
        self.phase = SessionPhase::Offline;
    }

    pub fn is_online(&self) -> bool {
        self.phase == SessionPhase::Online
    }
}
