// Wed Jan 15 2026 - Alex

use libc::{c_int, nfds_t, pollfd};
use std::io;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
}

/// Blocks until `fd` is readable, hung up or in error, or until `timeout` passes.
/// `None` waits forever. Interrupted polls resume with the remaining time.
pub fn wait_readable(fd: RawFd, timeout: Option<Duration>) -> io::Result<Readiness> {
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        let mut fds = [pollfd {
            fd,
            events: libc::POLLIN | libc::POLLERR | libc::POLLHUP,
            revents: 0,
        }];

        let timeout_ms = match deadline {
            Some(deadline) => to_poll_timeout(deadline.saturating_duration_since(Instant::now())),
            None => -1,
        };

        let res = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as nfds_t, timeout_ms) };

        if res < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }

        if res == 0 {
            return Ok(Readiness::TimedOut);
        }

        if fds[0].revents & libc::POLLNVAL != 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("fd {} is not open", fd)));
        }

        return Ok(Readiness::Ready);
    }
}

fn to_poll_timeout(remaining: Duration) -> c_int {
    // Round up so a sub-millisecond remainder does not spin.
    let millis = remaining.as_micros().div_ceil(1000);
    millis.min(c_int::MAX as u128) as c_int
}
