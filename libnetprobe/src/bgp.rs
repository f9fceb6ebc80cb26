use crate::{
    http::{FetchError, HttpFetch},
    task::Probe,
    types::{BgpConfig, ProbeStatus, TIMEOUT_GRACE},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum BgpError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("No BGP state information available")]
    NoState,
    #[error("BGP path is empty")]
    EmptyPath,
}

#[derive(Debug, Deserialize)]
struct BgpStateResponse {
    data: BgpStateData,
}

#[derive(Debug, Deserialize)]
struct BgpStateData {
    bgp_state: Vec<BgpRoute>,
}

#[derive(Debug, Deserialize)]
struct BgpRoute {
    path: Vec<u32>,
    target_prefix: String,
}

/// Origin AS and prefix taken from the first reported route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpOrigin {
    pub target_prefix: String,
    pub origin_as: String,
}

pub fn parse_bgp_state(body: &str) -> Result<BgpOrigin, BgpError> {
    let response: BgpStateResponse = serde_json::from_str(body)?;

    let route = response
        .data
        .bgp_state
        .into_iter()
        .next()
        .ok_or(BgpError::NoState)?;
    let origin = route.path.last().ok_or(BgpError::EmptyPath)?;

    Ok(BgpOrigin {
        target_prefix: route.target_prefix,
        origin_as: origin.to_string(),
    })
}

/// Serialized shape of a resolved BGP probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpRecord {
    pub ip: String,
    pub target_prefix: String,
    #[serde(rename = "as")]
    pub origin_as: String,
}

pub struct BgpStateProbe {
    target: String,
    fetcher: Arc<dyn HttpFetch>,
    config: Arc<BgpConfig>,
    status: ProbeStatus,
    pub target_prefix: String,
    pub origin_as: String,
}

impl BgpStateProbe {
    pub fn new(target: impl Into<String>, fetcher: Arc<dyn HttpFetch>, config: Arc<BgpConfig>) -> Self {
        Self {
            target: target.into(),
            fetcher,
            config,
            status: ProbeStatus::Pending,
            target_prefix: String::new(),
            origin_as: String::new(),
        }
    }

    pub fn record(&self) -> Option<BgpRecord> {
        if !self.status.is_done() {
            return None;
        }
        Some(BgpRecord {
            ip: self.target.clone(),
            target_prefix: self.target_prefix.clone(),
            origin_as: self.origin_as.clone(),
        })
    }

    /// Fetch plus decode, cut off shortly after the configured HTTP timeout.
    async fn bounded_lookup(&self) -> Result<BgpOrigin, BgpError> {
        let bound = self.config.timeout + TIMEOUT_GRACE;
        tokio::time::timeout(bound, self.lookup())
            .await
            .unwrap_or(Err(BgpError::Fetch(FetchError::Timeout(bound))))
    }

    async fn lookup(&self) -> Result<BgpOrigin, BgpError> {
        let url = self.config.url_for(&self.target);
        let response = self.fetcher.get(&url).await?;
        if !response.is_ok() {
            return Err(BgpError::Status(response.status));
        }
        parse_bgp_state(&response.body)
    }
}

#[async_trait]
impl Probe for BgpStateProbe {
    async fn execute(&mut self) {
        match self.bounded_lookup().await {
            Ok(origin) => {
                debug!(ip = %self.target, prefix = %origin.target_prefix, asn = %origin.origin_as, "BGP origin resolved");
                self.target_prefix = origin.target_prefix;
                self.origin_as = origin.origin_as;
                self.status = ProbeStatus::Done;
            }
            Err(e) => {
                warn!(ip = %self.target, error = %e, "BGP state lookup failed");
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
