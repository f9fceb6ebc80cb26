use std::{net::SocketAddr, time::Duration};

/// Slack a task allows its backend past the backend's own deadline.
pub(crate) const TIMEOUT_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProbeStatus {
    #[default]
    Pending,
    Done,
    Failed,
}

impl ProbeStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, ProbeStatus::Done)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProbeStatus::Failed)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ProbeStatus::Pending)
    }
}

#[derive(Debug, Clone)]
pub struct DnsConfig {
    pub resolver: SocketAddr,
    pub timeout: Duration,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            resolver: SocketAddr::from(([8, 8, 8, 8], 53)),
            timeout: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PingConfig {
    pub count: u16,
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            count: 3,
            timeout: Duration::from_secs(3),
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BgpConfig {
    pub api_host: String,
    pub timeout: Duration,
}

impl BgpConfig {
    pub fn url_for(&self, target: &str) -> String {
        format!(
            "https://{}/data/bgp-state/data.json?resource={}",
            self.api_host, target
        )
    }
}

impl Default for BgpConfig {
    fn default() -> Self {
        Self {
            api_host: "stat.ripe.net".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}
