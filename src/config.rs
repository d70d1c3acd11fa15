//! Configuration types for zonedns.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::DnsError;
use crate::record::{RecordSpec, SoaData};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    pub dns: DnsConfig,

    /// Inventory directory endpoints.
    pub inventory: InventoryConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for DNS server to listen on (UDP and TCP).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// TTL for synthesized records in seconds.
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Private base domain (e.g., "cloud.example.com"). Every VM address is
    /// published here.
    pub private_base: String,

    /// Public base domain. Only non-RFC1918 addresses are published here;
    /// names without one fall back to a CNAME to this apex.
    pub public_base: String,

    /// This server's own host label, qualified with each zone's base.
    pub hostname: String,

    /// Hostmaster mailbox in DNS form (e.g., "hostmaster.example.com").
    pub hostmaster: String,

    /// Records answered for this server's own name.
    #[serde(default)]
    pub self_records: Vec<RecordSpec>,

    /// Secondary nameservers listed alongside this server in NS answers.
    #[serde(default)]
    pub secondary_ns: Vec<String>,

    /// Reverse proxy fronting the public apex.
    #[serde(default)]
    pub reverse_proxy: Option<ReverseProxyConfig>,

    /// Static zone file merged into the private zone.
    pub private_zone_file: PathBuf,

    /// Static zone file merged into the public zone. Defaults to the private
    /// file.
    #[serde(default)]
    pub public_zone_file: Option<PathBuf>,

    /// Alias ownership registry file.
    #[serde(default = "default_names_db")]
    pub names_db: PathBuf,

    /// Seconds between zone rebuilds.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// SOA record configuration.
    #[serde(default)]
    pub soa: SoaConfig,
}

impl DnsConfig {
    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), DnsError> {
        for (what, value) in [
            ("private_base", &self.private_base),
            ("public_base", &self.public_base),
            ("hostname", &self.hostname),
            ("hostmaster", &self.hostmaster),
        ] {
            if value.trim().trim_end_matches('.').is_empty() {
                return Err(DnsError::Config(format!("{what} must not be empty")));
            }
        }
        if self.sync_interval_secs == 0 {
            return Err(DnsError::Config(
                "sync_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Private base without trailing dot, lowercased.
    pub fn private_base(&self) -> String {
        normalize_base(&self.private_base)
    }

    /// Public base without trailing dot, lowercased.
    pub fn public_base(&self) -> String {
        normalize_base(&self.public_base)
    }

    /// This server's name as seen from zone `base`. Reverse zones use the
    /// private name.
    pub fn server_name(&self, base: &str) -> String {
        let base = normalize_base(base);
        let owner = if base == self.public_base() {
            base
        } else {
            self.private_base()
        };
        format!("{}.{}", self.hostname.trim_end_matches('.'), owner)
    }

    /// Nameservers for zone `base`: this server first, then the secondaries.
    pub fn nameservers(&self, base: &str) -> Vec<String> {
        let mut names = vec![self.server_name(base)];
        for ns in &self.secondary_ns {
            let ns = normalize_base(ns);
            if !names.contains(&ns) {
                names.push(ns);
            }
        }
        names
    }

    /// SOA for zone `base` with the given serial.
    pub fn soa(&self, base: &str, serial: u32) -> SoaData {
        SoaData {
            mname: self.server_name(base),
            rname: self.hostmaster.trim_end_matches('.').to_string(),
            serial,
            refresh: self.soa.refresh,
            retry: self.soa.retry,
            expire: self.soa.expire,
            minimum: self.soa.minimum,
        }
    }
}

fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Reverse proxy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReverseProxyConfig {
    /// Records answered at the public apex.
    #[serde(default)]
    pub records: Vec<RecordSpec>,
}

/// Inventory directory endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Compute-node directory base URL.
    pub cnapi_url: String,

    /// Network-interface directory base URL.
    pub napi_url: String,

    /// VM directory base URL.
    pub vmapi_url: String,

    /// Identity directory base URL.
    pub ufds_url: String,

    /// Per-request timeout. Unset means calls may wait indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "zonedns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,

    /// OpenTelemetry configuration.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name for traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
            opentelemetry: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "zonedns".to_string()
}

/// SOA timer configuration. The primary nameserver and hostmaster come from
/// [`DnsConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoaConfig {
    /// Refresh interval in seconds.
    #[serde(default = "default_refresh")]
    pub refresh: u32,

    /// Retry interval in seconds.
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Expire time in seconds.
    #[serde(default = "default_expire")]
    pub expire: u32,

    /// Minimum TTL in seconds.
    #[serde(default = "default_minimum")]
    pub minimum: u32,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 53))
}

fn default_ttl() -> u32 {
    300
}

fn default_names_db() -> PathBuf {
    PathBuf::from("names.db")
}

fn default_sync_interval() -> u64 {
    12
}

fn default_refresh() -> u32 {
    60
}

fn default_retry() -> u32 {
    60
}

fn default_expire() -> u32 {
    181440
}

fn default_minimum() -> u32 {
    300
}

impl Default for SoaConfig {
    fn default() -> Self {
        Self {
            refresh: default_refresh(),
            retry: default_retry(),
            expire: default_expire(),
            minimum: default_minimum(),
        }
    }
}
