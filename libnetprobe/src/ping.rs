use crate::{
    icmp,
    task::Probe,
    types::{PingConfig, ProbeStatus, TIMEOUT_GRACE},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    io,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::{net::UdpSocket, time::Instant};
use tracing::{debug, warn};

const PAYLOAD: &[u8] = b"netprobe-echo-payload-0123456789";

#[derive(Debug, Error)]
pub enum PingError {
    #[error("Could not resolve {0}")]
    Resolve(String),
    #[error("Socket error: {0}")]
    Io(#[from] io::Error),
    #[error("Ping timed out after {0:?}")]
    Timeout(Duration),
}

/// What a transport actually did: requests put on the wire and the RTT of
/// each answered one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EchoSummary {
    pub sent: u16,
    pub rtts: Vec<Duration>,
}

/// Echo-request transport. Sends at most `count` requests within `timeout`.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, target: &str, count: u16, timeout: Duration) -> Result<EchoSummary, PingError>;
}

/// Unprivileged ICMP over datagram sockets (`net.ipv4.ping_group_range` on Linux).
pub struct IcmpPinger {
    interval: Duration,
    identifier: u16,
}

impl IcmpPinger {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            identifier: std::process::id() as u16,
        }
    }
}

impl Default for IcmpPinger {
    fn default() -> Self {
        Self::new(PingConfig::default().interval)
    }
}

async fn resolve_target(target: &str) -> Result<IpAddr, PingError> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }
    tokio::net::lookup_host((target, 0))
        .await
        .map_err(|_| PingError::Resolve(target.to_string()))?
        .map(|addr| addr.ip())
        .next()
        .ok_or_else(|| PingError::Resolve(target.to_string()))
}

fn open_socket(addr: IpAddr) -> io::Result<UdpSocket> {
    let (domain, protocol) = match addr {
        IpAddr::V4(_) => (Domain::IPV4, Protocol::ICMPV4),
        IpAddr::V6(_) => (Domain::IPV6, Protocol::ICMPV6),
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(protocol))?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

async fn await_reply(
    socket: &UdpSocket,
    v6: bool,
    sequence: u16,
    sent_at: Instant,
    until: Instant,
) -> Option<Duration> {
    let mut buf = [0u8; 1500];
    loop {
        match tokio::time::timeout_at(until, socket.recv(&mut buf)).await {
            Err(_) => return None,
            Ok(Err(e)) => {
                debug!(error = %e, sequence, "echo receive failed");
                return None;
            }
            Ok(Ok(n)) => {
                // The kernel owns the identifier on datagram sockets; match on sequence.
                if let Some(reply) = icmp::parse_echo_reply(&buf[..n], v6) {
                    if reply.sequence == sequence {
                        return Some(sent_at.elapsed());
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Pinger for IcmpPinger {
    async fn ping(&self, target: &str, count: u16, timeout: Duration) -> Result<EchoSummary, PingError> {
        let deadline = Instant::now() + timeout;
        let addr = tokio::time::timeout_at(deadline, resolve_target(target))
            .await
            .map_err(|_| PingError::Timeout(timeout))??;

        let v6 = addr.is_ipv6();
        let socket = open_socket(addr)?;
        socket.connect(SocketAddr::new(addr, 0)).await?;

        let mut summary = EchoSummary {
            sent: 0,
            rtts: Vec::with_capacity(count as usize),
        };
        for sequence in 0..count {
            let sent_at = Instant::now();
            if sent_at >= deadline {
                break;
            }

            let packet = icmp::echo_request(v6, self.identifier, sequence, PAYLOAD);
            socket.send(&packet).await?;
            summary.sent += 1;

            let next_send = if sequence + 1 == count {
                deadline
            } else {
                (sent_at + self.interval).min(deadline)
            };

            if let Some(rtt) = await_reply(&socket, v6, sequence, sent_at, next_send).await {
                summary.rtts.push(rtt);
            }
            if sequence + 1 < count {
                tokio::time::sleep_until(next_send).await;
            }
        }
        Ok(summary)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingRecord {
    pub ip: String,
    pub reachable: bool,
    pub sent: u16,
    pub received: usize,
    pub rtts_ms: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingStats {
    pub sent: u16,
    pub received: usize,
    pub loss_percent: f64,
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
}

pub struct PingProbe {
    target: String,
    pinger: Arc<dyn Pinger>,
    config: Arc<PingConfig>,
    status: ProbeStatus,
    pub sent: u16,
    pub rtts: Vec<Duration>,
}

impl PingProbe {
    pub fn new(target: impl Into<String>, pinger: Arc<dyn Pinger>, config: Arc<PingConfig>) -> Self {
        Self {
            target: target.into(),
            pinger,
            config,
            status: ProbeStatus::Pending,
            sent: 0,
            rtts: Vec::new(),
        }
    }

    pub fn is_reachable(&self) -> bool {
        !self.rtts.is_empty()
    }

    pub fn stats(&self) -> Option<PingStats> {
        let min = *self.rtts.iter().min()?;
        let max = *self.rtts.iter().max()?;
        let received = self.rtts.len();
        let total: Duration = self.rtts.iter().sum();
        let sent = self.sent.max(received as u16);

        Some(PingStats {
            sent,
            received,
            loss_percent: 100.0 * (sent as usize - received) as f64 / sent as f64,
            min,
            avg: total / received as u32,
            max,
        })
    }

    pub fn record(&self) -> PingRecord {
        PingRecord {
            ip: self.target.clone(),
            reachable: self.is_reachable(),
            sent: self.sent,
            received: self.rtts.len(),
            rtts_ms: self.rtts.iter().map(|d| d.as_secs_f64() * 1000.0).collect(),
        }
    }
}

#[async_trait]
impl Probe for PingProbe {
    async fn execute(&mut self) {
        let bound = self.config.timeout + TIMEOUT_GRACE;
        let outcome = tokio::time::timeout(
            bound,
            self.pinger.ping(&self.target, self.config.count, self.config.timeout),
        )
        .await
        .unwrap_or(Err(PingError::Timeout(bound)));

        match outcome {
            Ok(summary) if !summary.rtts.is_empty() => {
                debug!(ip = %self.target, sent = summary.sent, replies = summary.rtts.len(), "host answered");
                self.sent = summary.sent;
                self.rtts = summary.rtts;
                self.status = ProbeStatus::Done;
            }
            Ok(summary) => {
                debug!(ip = %self.target, sent = summary.sent, "no echo replies");
                self.sent = summary.sent;
                self.status = ProbeStatus::Failed;
            }
            Err(e) => {
                warn!(ip = %self.target, error = %e, "ping failed");
                self.status = ProbeStatus::Failed;
            }
        }
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn status(&self) -> ProbeStatus {
        self.status
    }
}
