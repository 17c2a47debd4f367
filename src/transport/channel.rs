// Wed Jan 15 2026 - Alex

use crate::transport::protocol::{self, Message};
use crate::transport::{Connection, Received};
use bytes::BytesMut;
use libc::{c_int, c_void, socklen_t};
use log::{debug, trace, warn};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

const READ_CHUNK: usize = 8192;
const BULK_RECV_BUFFER: c_int = 256 * 1024;

/// Socket settings a framed channel needs from its stream.
pub trait SocketTuning {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;
    fn tune_for_bulk(&self) -> io::Result<()>;
}

impl SocketTuning for TcpStream {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn tune_for_bulk(&self) -> io::Result<()> {
        self.set_nodelay(false)?;
        set_recv_buffer(self.as_raw_fd(), BULK_RECV_BUFFER)
    }
}

impl SocketTuning for UnixStream {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        UnixStream::set_nonblocking(self, nonblocking)
    }

    fn tune_for_bulk(&self) -> io::Result<()> {
        set_recv_buffer(self.as_raw_fd(), BULK_RECV_BUFFER)
    }
}

fn set_recv_buffer(fd: RawFd, size: c_int) -> io::Result<()> {
    let res = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &size as *const c_int as *const c_void,
            std::mem::size_of::<c_int>() as socklen_t,
        )
    };
    if res < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Length-prefixed message channel over a non-blocking stream. Readiness is
/// always waited for with `poll`, never by blocking in `read`.
pub struct FramedChannel<S> {
    stream: S,
    buffer: BytesMut,
    peer: String,
    closed: bool,
    bulk: bool,
}

impl<S> FramedChannel<S>
where
    S: Read + Write + AsRawFd + SocketTuning,
{
    pub fn new(stream: S, peer: impl Into<String>) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            peer: peer.into(),
            closed: false,
            bulk: false,
        })
    }

    pub fn is_bulk(&self) -> bool {
        self.bulk
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn fill(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.stream.read(&mut chunk)?;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn decode_buffered(&mut self) -> Option<Received> {
        match protocol::decode(&mut self.buffer) {
            Ok(Some(message)) => {
                trace!("Received kind {} from {}", message.kind_code(), self.peer);
                Some(Received::Message(message))
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Corrupt frame from {}: {}", self.peer, e);
                self.buffer.clear();
                self.closed = true;
                Some(Received::Closed)
            }
        }
    }

    fn close(&mut self) -> Received {
        self.closed = true;
        Received::Closed
    }
}

impl<S> Connection for FramedChannel<S>
where
    S: Read + Write + AsRawFd + SocketTuning,
{
    fn send(&mut self, message: &Message) -> io::Result<()> {
        let mut frame = BytesMut::new();
        protocol::encode(message, &mut frame);
        self.stream.write_all(&frame)?;
        self.stream.flush()
    }

    fn readiness_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    fn has_buffered_message(&self) -> bool {
        protocol::complete_frame_len(&self.buffer).is_some()
    }

    fn receive_message(&mut self) -> Received {
        if let Some(received) = self.decode_buffered() {
            return received;
        }
        if self.closed {
            return Received::Closed;
        }

        loop {
            match self.fill() {
                Ok(0) => {
                    debug!("Scheduler {} closed the connection", self.peer);
                    return self.close();
                }
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Received::Pending,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    debug!("Read from {} failed: {}", self.peer, e);
                    return self.close();
                }
            }
        }

        self.decode_buffered().unwrap_or(Received::Pending)
    }

    fn set_bulk_mode(&mut self) {
        if let Err(e) = self.stream.tune_for_bulk() {
            warn!("Could not switch {} to bulk transfer: {}", self.peer, e);
        }
        self.bulk = true;
    }
}

/// Waits up to `timeout` for a whole message. Used by tests that play the scheduler.
#[cfg(test)]
pub(crate) fn next_message<C: Connection>(conn: &mut C, timeout: std::time::Duration) -> Received {
    use crate::transport::Readiness;

    let start = std::time::Instant::now();
    loop {
        match conn.receive_message() {
            Received::Pending => {}
            other => return other,
        }
        let Some(left) = timeout.checked_sub(start.elapsed()) else {
            return Received::Pending;
        };
        match conn.wait_readable(left) {
            Ok(Readiness::Ready) => {}
            Ok(Readiness::TimedOut) | Err(_) => return Received::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::protocol::MessageKind;
    use crate::transport::Readiness;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);

    fn pair() -> (FramedChannel<UnixStream>, FramedChannel<UnixStream>) {
        let (a, b) = UnixStream::pair().unwrap();
        (FramedChannel::new(a, "client").unwrap(), FramedChannel::new(b, "scheduler").unwrap())
    }

    fn stats_frame(ip: &str, max_jobs: u32) -> BytesMut {
        let mut frame = BytesMut::new();
        let payload = format!("IP:{}\nMaxJobs:{}", ip, max_jobs);
        protocol::encode(&Message::MonStats { host_id: 1, payload }, &mut frame);
        frame
    }

    #[test]
    fn test_send_and_receive() {
        let (mut client, mut scheduler) = pair();
        client.send(&Message::MonLogin).unwrap();
        assert_eq!(next_message(&mut scheduler, WAIT), Received::Message(Message::MonLogin));
    }

    #[test]
    fn test_empty_stream_is_pending() {
        let (mut client, _scheduler) = pair();
        assert_eq!(client.receive_message(), Received::Pending);
        assert!(!client.is_closed());
    }

    #[test]
    fn test_buffered_messages_drain_without_reading() {
        let (mut client, mut scheduler) = pair();
        scheduler.send(&Message::MonStats { host_id: 1, payload: "IP:a\nMaxJobs:1".to_string() }).unwrap();
        scheduler.send(&Message::Other(MessageKind::MonJobDone)).unwrap();

        assert!(!client.has_buffered_message());
        assert!(matches!(next_message(&mut client, WAIT), Received::Message(Message::MonStats { host_id: 1, .. })));
        assert!(client.has_buffered_message());
        assert_eq!(client.wait_readable(Duration::from_millis(1)).unwrap(), Readiness::Ready);
        assert_eq!(client.receive_message(), Received::Message(Message::Other(MessageKind::MonJobDone)));
        assert!(!client.has_buffered_message());
    }

    #[test]
    fn test_split_frame_does_not_block() {
        let (a, mut raw) = UnixStream::pair().unwrap();
        let mut client = FramedChannel::new(a, "client").unwrap();
        let frame = stats_frame("10.0.0.1", 3);
        let (head, tail) = frame.split_at(frame.len() / 2);

        raw.write_all(head).unwrap();
        assert_eq!(client.wait_readable(WAIT).unwrap(), Readiness::Ready);
        let start = Instant::now();
        assert_eq!(client.receive_message(), Received::Pending);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!client.has_buffered_message());
        assert_eq!(client.wait_readable(Duration::from_millis(30)).unwrap(), Readiness::TimedOut);

        raw.write_all(tail).unwrap();
        assert!(matches!(next_message(&mut client, WAIT), Received::Message(Message::MonStats { .. })));
    }

    #[test]
    fn test_peer_close_yields_closed() {
        let (mut client, scheduler) = pair();
        drop(scheduler);
        assert_eq!(client.receive_message(), Received::Closed);
        assert!(client.is_closed());
        assert_eq!(client.receive_message(), Received::Closed);
    }

    #[test]
    fn test_messages_before_close_are_delivered() {
        let (mut client, mut scheduler) = pair();
        scheduler.send(&Message::Ping).unwrap();
        drop(scheduler);
        assert_eq!(next_message(&mut client, WAIT), Received::Message(Message::Ping));
        assert_eq!(client.receive_message(), Received::Closed);
    }

    #[test]
    fn test_corrupt_frame_yields_closed() {
        let (a, mut raw) = UnixStream::pair().unwrap();
        let mut client = FramedChannel::new(a, "client").unwrap();
        raw.write_all(&u32::MAX.to_be_bytes()).unwrap();
        assert_eq!(next_message(&mut client, WAIT), Received::Closed);
        assert!(client.is_closed());
    }

    #[test]
    fn test_bulk_mode_flag() {
        let (mut client, _scheduler) = pair();
        assert!(!client.is_bulk());
        client.set_bulk_mode();
        assert!(client.is_bulk());
    }
}
