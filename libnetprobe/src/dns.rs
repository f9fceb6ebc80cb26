use crate::{
    task::Probe,
    types::{DnsConfig, ProbeStatus, TIMEOUT_GRACE},
};
use async_trait::async_trait;
use hickory_resolver::{
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    error::ResolveError,
    TokioAsyncResolver,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("NS lookup failed: {0}")]
    Resolve(#[from] ResolveError),
    #[error("NS lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("No nameservers returned")]
    Empty,
}

/// Nameserver lookup against some upstream resolver.
///
/// Implementations should give up on their own; [`DnsLookup`] still cuts a
/// lookup off once its timeout plus a short grace period has passed.
#[async_trait]
pub trait NsResolver: Send + Sync {
    async fn lookup_ns(&self, domain: &str) -> Result<Vec<String>, DnsError>;
}

/// Queries a single fixed upstream server over UDP.
pub struct HickoryNsResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl HickoryNsResolver {
    pub fn new(config: &DnsConfig) -> Self {
        let servers = NameServerConfigGroup::from_ips_clear(
            &[config.resolver.ip()],
            config.resolver.port(),
            true,
        );
        let resolver_config = ResolverConfig::from_parts(None, Vec::new(), servers);

        let mut opts = ResolverOpts::default();
        opts.timeout = config.timeout;
        opts.attempts = 1;
        opts.cache_size = 0;

        Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
            timeout: config.timeout,
        }
    }
}

#[async_trait]
impl NsResolver for HickoryNsResolver {
    async fn lookup_ns(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        let budget = lookup_budget(self.timeout);
        let lookup = tokio::time::timeout(budget, self.resolver.ns_lookup(domain))
            .await
            .map_err(|_| DnsError::Timeout(budget))??;

        let nameservers: Vec<String> = lookup
            .iter()
            .map(|ns| normalize_ns_name(&ns.to_string()))
            .collect();

        if nameservers.is_empty() {
            return Err(DnsError::Empty);
        }
        Ok(nameservers)
    }
}

// Covers both the UDP attempt and a truncation retry over TCP.
fn lookup_budget(timeout: Duration) -> Duration {
    timeout * 2
}

/// Drops the root label's trailing dot: `ns1.example.com.` -> `ns1.example.com`.
pub fn normalize_ns_name(name: &str) -> String {
    name.trim_end_matches('.').to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub domain: String,
    pub nameservers: Vec<String>,
}

pub struct DnsLookup {
    target: String,
    resolver: Arc<dyn NsResolver>,
    bound: Duration,
    status: ProbeStatus,
    pub nameservers: Vec<String>,
}

impl DnsLookup {
    pub fn new(target: impl Into<String>, resolver: Arc<dyn NsResolver>) -> Self {
        Self {
            target: target.into(),
            resolver,
            bound: lookup_budget(DnsConfig::default().timeout) + TIMEOUT_GRACE,
            status: ProbeStatus::Pending,
            nameservers: Vec::new(),
        }
    }

    /// Bounds `execute` by the resolver timeout it was configured with.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.bound = lookup_budget(timeout) + TIMEOUT_GRACE;
        self
    }

    pub fn record(&self) -> Option<DnsRecord> {
        if !self.status.is_done() {
            return None;
        }
        Some(DnsRecord {
            domain: self.target.clone(),
            nameservers: self.nameservers.clone(),
        })
    }
}

#[async_trait]
impl Probe for DnsLookup {
    async fn execute(&mut self) {
        let outcome = tokio::time::timeout(self.bound, self.resolver.lookup_ns(&self.target))
            .await
            .unwrap_or(Err(DnsError::Timeout(self.bound)));

        match outcome {
            Ok(nameservers) => {
                debug!(domain = %self.target, count = nameservers.len(), "nameservers resolved");
                self.nameservers = nameservers;
                self.status = ProbeStatus::Done;
            }
            Err(e) => {
                warn!(domain = %self.target, error = %e, "NS lookup failed");
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
