use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Minimal GET capability the BGP probe needs from an HTTP stack.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

pub fn create_http_pool(timeout: Duration) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(100)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .use_rustls_tls()
        .build()
        .map_err(FetchError::Client)
}

/// Shares one pooled client across every task that holds a clone.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout: Duration,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: create_http_pool(timeout)?,
            timeout,
        })
    }

    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let request = async {
            let response = self.client.get(url).send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(HttpResponse { status, body })
        };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => Ok(response),
            // The client carries the same deadline and may fire first.
            Ok(Err(e)) if e.is_timeout() => Err(FetchError::Timeout(self.timeout)),
            Ok(Err(e)) => Err(FetchError::Request(e)),
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let url = format!("http://{addr}/");
        let timeout = Duration::from_millis(100);

        let pooled = ReqwestFetcher::new(timeout).unwrap();
        assert!(matches!(pooled.get(&url).await, Err(FetchError::Timeout(d)) if d == timeout));

        // Same deadline without any proxy from the environment in the way.
        let client = Client::builder().timeout(timeout).no_proxy().build().unwrap();
        let direct = ReqwestFetcher::with_client(client, timeout);
        assert!(matches!(direct.get(&url).await, Err(FetchError::Timeout(d)) if d == timeout));
    }

    #[test]
    fn only_200_is_ok() {
        let ok = HttpResponse { status: 200, body: String::new() };
        let missing = HttpResponse { status: 404, body: String::new() };
        assert!(ok.is_ok());
        assert!(!missing.is_ok());
    }
}
