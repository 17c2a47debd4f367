// Wed Jan 15 2026 - Alex

use crate::transport::channel::FramedChannel;
use crate::transport::protocol::{MIN_PROTOCOL_VERSION, PROTOCOL_VERSION};
use crate::transport::{Discovery, Probe};
use log::{debug, trace, warn};
use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream, UdpSocket};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_REPLY_LEN: usize = 512;

pub struct BroadcastDiscovery {
    port: u16,
    probe_timeout: Duration,
    target: IpAddr,
}

impl BroadcastDiscovery {
    pub fn new(port: u16, probe_timeout: Duration) -> Self {
        Self {
            port,
            probe_timeout,
            target: IpAddr::V4(Ipv4Addr::BROADCAST),
        }
    }

    /// Sends discovery requests to `target` instead of the limited broadcast address.
    pub fn with_target(mut self, target: IpAddr) -> Self {
        self.target = target;
        self
    }
}

impl Discovery for BroadcastDiscovery {
    type Probe = BroadcastProbe;

    fn start(&mut self, network_name: &str) -> io::Result<BroadcastProbe> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;

        let destination = SocketAddr::new(self.target, self.port);
        debug!("Looking for scheduler of network {} via {}", network_name, destination);

        // An unroutable broadcast only means nobody will answer this probe.
        if let Err(e) = socket.send_to(&[PROTOCOL_VERSION as u8], destination) {
            warn!("Discovery request to {} failed: {}", destination, e);
        }

        Ok(BroadcastProbe {
            socket,
            wanted: network_name.to_string(),
            port: self.port,
            started: Instant::now(),
            timeout: self.probe_timeout,
            network_name: network_name.to_string(),
            scheduler_name: String::new(),
        })
    }
}

pub struct BroadcastProbe {
    socket: UdpSocket,
    wanted: String,
    port: u16,
    started: Instant,
    timeout: Duration,
    network_name: String,
    scheduler_name: String,
}

impl BroadcastProbe {
    fn connect(&self, ip: IpAddr) -> io::Result<FramedChannel<TcpStream>> {
        let addr = SocketAddr::new(ip, self.port);
        let mut stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

        let peer_version = handshake(&mut stream)?;
        if peer_version < MIN_PROTOCOL_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("scheduler speaks protocol {}, need at least {}", peer_version, MIN_PROTOCOL_VERSION),
            ));
        }

        debug!("Scheduler {} speaks protocol {}", addr, peer_version);
        stream.set_read_timeout(None)?;
        FramedChannel::new(stream, ip.to_string())
    }
}

impl Probe for BroadcastProbe {
    type Connection = FramedChannel<TcpStream>;

    fn try_connect(&mut self) -> Option<FramedChannel<TcpStream>> {
        let mut buf = [0u8; MAX_REPLY_LEN];

        loop {
            let (n, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return None,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Discovery socket error: {}", e);
                    return None;
                }
            };

            let Some(reply) = SchedulerReply::parse(&buf[..n]) else {
                trace!("Ignoring malformed discovery reply from {}", from);
                continue;
            };

            if reply.network_name != self.wanted {
                trace!("Ignoring scheduler {} of network {}", from, reply.network_name);
                continue;
            }

            debug!("Scheduler {} answered for {} (protocol {})", from, reply.network_name, reply.version);
            match self.connect(from.ip()) {
                Ok(channel) => {
                    self.network_name = reply.network_name;
                    self.scheduler_name = from.ip().to_string();
                    return Some(channel);
                }
                Err(e) => {
                    warn!("Could not connect to scheduler {}: {}", from.ip(), e);
                }
            }
        }
    }

    fn timed_out(&self) -> bool {
        self.started.elapsed() >= self.timeout
    }

    fn readiness_fd(&self) -> Option<RawFd> {
        Some(self.socket.as_raw_fd())
    }

    fn resolved_network_name(&self) -> &str {
        &self.network_name
    }

    fn resolved_scheduler_name(&self) -> &str {
        &self.scheduler_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SchedulerReply {
    version: u8,
    network_name: String,
}

impl SchedulerReply {
    fn parse(datagram: &[u8]) -> Option<Self> {
        let (&version, rest) = datagram.split_first()?;
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let network_name = std::str::from_utf8(&rest[..end]).ok()?;
        if network_name.is_empty() {
            return None;
        }
        Some(Self {
            version,
            network_name: network_name.to_string(),
        })
    }
}

fn handshake(stream: &mut TcpStream) -> io::Result<u32> {
    stream.write_all(&PROTOCOL_VERSION.to_be_bytes())?;
    let mut peer = [0u8; 4];
    stream.read_exact(&mut peer)?;
    Ok(u32::from_be_bytes(peer))
}
