// Wed Jan 15 2026 - Alex

pub mod broadcast;
pub mod channel;
pub mod protocol;
pub mod readiness;

#[cfg(test)]
pub(crate) mod mock;

pub use broadcast::{BroadcastDiscovery, BroadcastProbe};
pub use channel::FramedChannel;
pub use protocol::{Message, MessageKind};
pub use readiness::Readiness;

use std::io;
use std::os::unix::io::RawFd;
use std::thread;
use std::time::Duration;

pub trait Discovery {
    type Probe: Probe;

    /// Begins looking for a scheduler serving `network_name`. Errors are local faults.
    fn start(&mut self, network_name: &str) -> io::Result<Self::Probe>;
}

pub trait Probe {
    type Connection: Connection;

    fn try_connect(&mut self) -> Option<Self::Connection>;
    fn timed_out(&self) -> bool;
    fn readiness_fd(&self) -> Option<RawFd>;
    fn resolved_network_name(&self) -> &str;
    fn resolved_scheduler_name(&self) -> &str;

    fn wait_readable(&self, timeout: Duration) -> io::Result<Readiness> {
        match self.readiness_fd() {
            Some(fd) => readiness::wait_readable(fd, Some(timeout)),
            None => Ok(Readiness::TimedOut),
        }
    }

    /// Blocks on the probe descriptor for up to `timeout`, or sleeps `fallback`
    /// when the probe has no descriptor.
    fn wait(&self, timeout: Duration, fallback: Duration) -> io::Result<Readiness> {
        if self.readiness_fd().is_some() {
            return self.wait_readable(timeout);
        }
        thread::sleep(fallback);
        Ok(Readiness::TimedOut)
    }
}

/// Result of one non-blocking receive attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Message(Message),
    /// Only part of a frame has arrived so far.
    Pending,
    /// The peer hung up, the read failed or the stream is corrupt.
    Closed,
}

pub trait Connection {
    fn send(&mut self, message: &Message) -> io::Result<()>;
    fn readiness_fd(&self) -> RawFd;
    fn has_buffered_message(&self) -> bool;

    /// Decodes the next buffered message. When none is buffered, reads from the
    /// peer at most once and never blocks.
    fn receive_message(&mut self) -> Received;

    fn set_bulk_mode(&mut self);

    fn wait_readable(&self, timeout: Duration) -> io::Result<Readiness> {
        if self.has_buffered_message() {
            return Ok(Readiness::Ready);
        }
        readiness::wait_readable(self.readiness_fd(), Some(timeout))
    }
}
