use libnetprobe::{BgpConfig, DnsConfig, PingConfig};
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

const DEFAULT_WORKERS: usize = 900;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid resolver address: {0}")]
    Resolver(String),
}

fn default_workers() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_WORKERS).unwrap_or(NonZeroUsize::MIN)
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dns: DnsSection,
    #[serde(default)]
    pub ping: PingSection,
    #[serde(default)]
    pub bgp: BgpSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DnsSection {
    pub resolver: String,
    pub timeout_ms: u64,
    pub workers: NonZeroUsize,
}

impl Default for DnsSection {
    fn default() -> Self {
        let defaults = DnsConfig::default();
        Self {
            resolver: defaults.resolver.to_string(),
            timeout_ms: defaults.timeout.as_millis() as u64,
            workers: default_workers(),
        }
    }
}

impl DnsSection {
    /// Accepts `ip:port`, `[v6]:port` or a bare address on port 53.
    pub fn to_config(&self) -> Result<DnsConfig, ConfigError> {
        let resolver = self
            .resolver
            .parse::<SocketAddr>()
            .or_else(|_| self.resolver.parse::<IpAddr>().map(|ip| SocketAddr::new(ip, 53)))
            .map_err(|_| ConfigError::Resolver(self.resolver.clone()))?;

        Ok(DnsConfig {
            resolver,
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PingSection {
    pub count: u16,
    pub timeout_ms: u64,
    pub interval_ms: u64,
    pub workers: NonZeroUsize,
}

impl Default for PingSection {
    fn default() -> Self {
        let defaults = PingConfig::default();
        Self {
            count: defaults.count,
            timeout_ms: defaults.timeout.as_millis() as u64,
            interval_ms: defaults.interval.as_millis() as u64,
            workers: default_workers(),
        }
    }
}

impl PingSection {
    pub fn to_config(&self) -> PingConfig {
        PingConfig {
            count: self.count,
            timeout: Duration::from_millis(self.timeout_ms),
            interval: Duration::from_millis(self.interval_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BgpSection {
    pub api_host: String,
    pub timeout_ms: u64,
    pub workers: NonZeroUsize,
}

impl Default for BgpSection {
    fn default() -> Self {
        let defaults = BgpConfig::default();
        Self {
            api_host: defaults.api_host,
            timeout_ms: defaults.timeout.as_millis() as u64,
            workers: default_workers(),
        }
    }
}

impl BgpSection {
    pub fn to_config(&self) -> BgpConfig {
        BgpConfig {
            api_host: self.api_host.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("netprobe").join("config.toml"))
}

/// An explicitly named file must exist; the default location may be absent.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => match config_path() {
            Some(path) => (path, false),
            None => return Ok(Config::default()),
        },
    };

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Config::default());
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
}

pub fn get_default_config_toml() -> String {
    r#"# netprobe configuration

[dns]
# Upstream resolver queried for NS records
resolver = "8.8.8.8:53"
timeout_ms = 1000
workers = 900

[ping]
# Echo requests per target, overall deadline and spacing
count = 3
timeout_ms = 3000
interval_ms = 1000
workers = 900

[bgp]
# Host serving /data/bgp-state/data.json
api_host = "stat.ripe.net"
timeout_ms = 10000
workers = 900
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_matches_builtin_defaults() {
        let parsed: Config = toml::from_str(&get_default_config_toml()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: Config = toml::from_str("[ping]\ncount = 5\n").unwrap();
        assert_eq!(parsed.ping.count, 5);
        assert_eq!(parsed.ping.timeout_ms, 3000);
        assert_eq!(parsed.dns, DnsSection::default());
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(toml::from_str::<Config>("[bgp]\nworkers = 0\n").is_err());
    }

    #[test]
    fn resolver_without_port_uses_53() {
        let section = DnsSection {
            resolver: "1.1.1.1".into(),
            ..DnsSection::default()
        };
        let config = section.to_config().unwrap();
        assert_eq!(config.resolver, SocketAddr::from(([1, 1, 1, 1], 53)));
        assert_eq!(config.timeout, Duration::from_millis(1000));
    }

    #[test]
    fn garbage_resolver_is_an_error() {
        let section = DnsSection {
            resolver: "dns.google".into(),
            ..DnsSection::default()
        };
        assert!(matches!(section.to_config(), Err(ConfigError::Resolver(_))));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/netprobe.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
