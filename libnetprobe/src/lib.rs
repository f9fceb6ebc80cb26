mod bgp;
mod dns;
mod http;
pub mod icmp;
mod ping;
mod pool;
mod targets;
mod task;
mod types;

pub use bgp::{parse_bgp_state, BgpError, BgpOrigin, BgpRecord, BgpStateProbe};
pub use dns::{normalize_ns_name, DnsError, DnsLookup, DnsRecord, HickoryNsResolver, NsResolver};
pub use http::{create_http_pool, FetchError, HttpFetch, HttpResponse, ReqwestFetcher};
pub use ping::{EchoSummary, IcmpPinger, PingError, PingProbe, PingRecord, PingStats, Pinger};
pub use pool::WorkerPool;
pub use targets::{dedup_targets, parse_targets, read_targets, TargetError};
pub use task::Probe;
pub use types::{BgpConfig, DnsConfig, PingConfig, ProbeStatus};

use std::{num::NonZeroUsize, sync::Arc};

pub async fn lookup_nameservers<I>(domains: I, config: DnsConfig, workers: NonZeroUsize) -> Vec<DnsLookup>
where
    I: IntoIterator<Item = String>,
{
    let resolver: Arc<dyn NsResolver> = Arc::new(HickoryNsResolver::new(&config));
    let tasks = domains
        .into_iter()
        .map(|domain| DnsLookup::new(domain, Arc::clone(&resolver)).with_timeout(config.timeout))
        .collect();
    WorkerPool::new(tasks, workers).run().await
}

pub async fn ping_many<I>(hosts: I, config: PingConfig, workers: NonZeroUsize) -> Vec<PingProbe>
where
    I: IntoIterator<Item = String>,
{
    let pinger: Arc<dyn Pinger> = Arc::new(IcmpPinger::new(config.interval));
    let config = Arc::new(config);
    let tasks = hosts
        .into_iter()
        .map(|host| PingProbe::new(host, Arc::clone(&pinger), Arc::clone(&config)))
        .collect();
    WorkerPool::new(tasks, workers).run().await
}

pub async fn bgp_origins<I>(
    ips: I,
    config: BgpConfig,
    workers: NonZeroUsize,
) -> Result<Vec<BgpStateProbe>, FetchError>
where
    I: IntoIterator<Item = String>,
{
    let fetcher: Arc<dyn HttpFetch> = Arc::new(ReqwestFetcher::new(config.timeout)?);
    let config = Arc::new(config);
    let tasks = ips
        .into_iter()
        .map(|ip| BgpStateProbe::new(ip, Arc::clone(&fetcher), Arc::clone(&config)))
        .collect();
    Ok(WorkerPool::new(tasks, workers).run().await)
}
