use async_trait::async_trait;
use libnetprobe::{
    BgpConfig, BgpRecord, BgpStateProbe, DnsError, DnsLookup, EchoSummary, FetchError, HttpFetch,
    HttpResponse, NsResolver, PingConfig, PingError, PingProbe, Pinger, Probe, WorkerPool,
};
use std::{
    collections::{BTreeMap, HashMap},
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

fn workers(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

struct MapResolver(HashMap<&'static str, Vec<&'static str>>);

#[async_trait]
impl NsResolver for MapResolver {
    async fn lookup_ns(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        self.0
            .get(domain)
            .map(|ns| ns.iter().map(|s| s.to_string()).collect())
            .ok_or(DnsError::Empty)
    }
}

struct OneReply {
    calls: AtomicUsize,
}

#[async_trait]
impl Pinger for OneReply {
    async fn ping(&self, _target: &str, count: u16, _timeout: Duration) -> Result<EchoSummary, PingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EchoSummary {
            sent: count,
            rtts: vec![Duration::from_millis(12)],
        })
    }
}

struct CannedApi {
    status: u16,
    body: &'static str,
    urls: std::sync::Mutex<Vec<String>>,
}

impl CannedApi {
    fn new(status: u16, body: &'static str) -> Arc<Self> {
        Arc::new(Self {
            status,
            body,
            urls: std::sync::Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl HttpFetch for CannedApi {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(HttpResponse {
            status: self.status,
            body: self.body.to_string(),
        })
    }
}

const GOOGLE_STATE: &str =
    r#"{"data":{"bgp_state":[{"path":[64500,64501,64502],"target_prefix":"8.8.8.0/24"}]}}"#;

#[tokio::test]
async fn dns_lookup_keeps_resolver_order() {
    let resolver = Arc::new(MapResolver(HashMap::from([(
        "example.com",
        vec!["ns1.example.com", "ns2.example.com"],
    )])));
    let tasks = vec![DnsLookup::new("example.com", resolver)];

    let done = WorkerPool::new(tasks, workers(4)).run().await;

    assert_eq!(done.len(), 1);
    assert_eq!(done[0].target(), "example.com");
    assert_eq!(done[0].nameservers, vec!["ns1.example.com", "ns2.example.com"]);
}

#[tokio::test]
async fn duplicate_ping_targets_run_independently() {
    let pinger = Arc::new(OneReply {
        calls: AtomicUsize::new(0),
    });
    let config = Arc::new(PingConfig::default());
    let tasks = ["10.0.0.1", "10.0.0.1"]
        .into_iter()
        .map(|ip| PingProbe::new(ip, pinger.clone(), Arc::clone(&config)))
        .collect();

    let done = WorkerPool::new(tasks, workers(2)).run().await;

    assert_eq!(done.len(), 2);
    assert_eq!(pinger.calls.load(Ordering::SeqCst), 2);
    assert!(done.iter().all(|p| p.is_reachable() && p.status().is_done()));
}

#[tokio::test]
async fn bgp_origin_is_last_path_element() {
    let api = CannedApi::new(200, GOOGLE_STATE);
    let config = Arc::new(BgpConfig::default());
    let tasks = vec![BgpStateProbe::new("8.8.8.8", api.clone(), config)];

    let done = WorkerPool::new(tasks, workers(1)).run().await;

    assert_eq!(
        done[0].record(),
        Some(BgpRecord {
            ip: "8.8.8.8".into(),
            target_prefix: "8.8.8.0/24".into(),
            origin_as: "64502".into(),
        })
    );
    assert_eq!(
        api.urls.lock().unwrap().as_slice(),
        ["https://stat.ripe.net/data/bgp-state/data.json?resource=8.8.8.8"]
    );
}

#[tokio::test]
async fn bgp_not_found_leaves_fields_empty() {
    let api = CannedApi::new(404, "not found");
    let config = Arc::new(BgpConfig::default());
    let tasks = vec![BgpStateProbe::new("192.0.2.10", api, config)];

    let done = WorkerPool::new(tasks, workers(1)).run().await;

    assert_eq!(done.len(), 1);
    assert!(done[0].status().is_failed());
    assert!(done[0].target_prefix.is_empty());
    assert!(done[0].origin_as.is_empty());
    assert!(done[0].record().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_targets_do_not_disturb_the_rest() {
    let resolver: Arc<dyn NsResolver> = Arc::new(MapResolver(HashMap::from([
        ("a.test", vec!["ns.a.test"]),
        ("c.test", vec!["ns.c.test"]),
    ])));
    let tasks = ["a.test", "broken.test", "c.test", "also-broken.test"]
        .into_iter()
        .map(|d| DnsLookup::new(d, Arc::clone(&resolver)))
        .collect();

    let done = WorkerPool::new(tasks, workers(3)).run().await;

    let outcome: BTreeMap<_, _> = done
        .iter()
        .map(|t| (t.target().to_string(), t.nameservers.clone()))
        .collect();
    assert_eq!(outcome.len(), 4);
    assert_eq!(outcome["a.test"], vec!["ns.a.test"]);
    assert_eq!(outcome["c.test"], vec!["ns.c.test"]);
    assert!(outcome["broken.test"].is_empty());
    assert!(outcome["also-broken.test"].is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rerun_with_fresh_tasks_gives_same_results() {
    let resolver: Arc<dyn NsResolver> = Arc::new(MapResolver(HashMap::from([
        ("one.test", vec!["ns1.one.test", "ns2.one.test"]),
        ("two.test", vec!["ns.two.test"]),
    ])));
    let domains = ["one.test", "two.test", "three.test"];

    let mut runs = Vec::new();
    for _ in 0..2 {
        let tasks = domains
            .iter()
            .map(|d| DnsLookup::new(*d, Arc::clone(&resolver)))
            .collect();
        let done = WorkerPool::new(tasks, workers(3)).run().await;
        let set: BTreeMap<_, _> = done.into_iter().map(|t| (t.target().to_string(), t.record())).collect();
        runs.push(set);
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[0].len(), 3);
}
