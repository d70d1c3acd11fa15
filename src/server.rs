//! DNS server setup and lifecycle management.

use hickory_server::ServerFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::authority::ZoneAuthority;
use crate::config::{Config, DnsConfig};
use crate::error::DnsError;
use crate::inventory::{HttpInventory, Inventory};
use crate::registry::{AliasRegistry, FileAliasRegistry};
use crate::state::DnsState;
use crate::sync::{StaticZones, Synchronizer};

/// Interval for emitting state metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Idle timeout for TCP connections (zone transfers included).
const TCP_TIMEOUT: Duration = Duration::from_secs(30);

/// Periodically emit state metrics.
async fn metrics_loop(state: DnsState, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                state.emit_metrics();
                debug!(zones = state.zones_count(), "emitted state metrics");
            }
            _ = cancel.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// Authoritative DNS server fed by the zone synchronizer.
pub struct DnsServer {
    config: Arc<DnsConfig>,
    inventory: Arc<dyn Inventory>,
    registry: Arc<dyn AliasRegistry>,
    static_zones: Arc<StaticZones>,
    state: DnsState,
}

impl DnsServer {
    /// Create a server from already constructed collaborators.
    pub fn new(
        config: DnsConfig,
        inventory: Arc<dyn Inventory>,
        registry: Arc<dyn AliasRegistry>,
        static_zones: StaticZones,
    ) -> Self {
        Self {
            config: Arc::new(config),
            inventory,
            registry,
            static_zones: Arc::new(static_zones),
            state: DnsState::new(),
        }
    }

    /// Load zone files and the alias registry and set up the HTTP inventory
    /// client. Any failure here aborts startup.
    pub fn from_config(config: Config) -> Result<Self, DnsError> {
        config.dns.validate()?;
        let static_zones = StaticZones::load(&config.dns)?;
        let registry = FileAliasRegistry::open(&config.dns.names_db)?;
        let inventory = HttpInventory::new(config.inventory)?;
        Ok(Self::new(
            config.dns,
            Arc::new(inventory),
            Arc::new(registry),
            static_zones,
        ))
    }

    /// Get a reference to the DNS state.
    pub fn state(&self) -> &DnsState {
        &self.state
    }

    /// Run the DNS server until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), DnsError> {
        info!(
            listen_addr = %self.config.listen_addr,
            private_base = %self.config.private_base(),
            public_base = %self.config.public_base(),
            "Starting zonedns server"
        );

        // Fail on bad self/proxy records before any background work starts.
        let handler = ZoneAuthority::new(self.config.clone(), self.state.clone())?;

        let synchronizer = Synchronizer::new(
            self.config.clone(),
            self.inventory.clone(),
            self.registry.clone(),
            self.static_zones.clone(),
            self.state.clone(),
        );
        let sync_handle = tokio::spawn(synchronizer.run(cancel.clone()));

        info!("Waiting for first zone publish...");
        loop {
            if cancel.is_cancelled() {
                info!("Shutdown requested before zones were published");
                let _ = sync_handle.await;
                return Ok(());
            }

            if self.state.is_ready() {
                info!(zones = self.state.zones_count(), "Initial zones published");
                break;
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let mut server = ServerFuture::new(handler);

        let udp_socket = UdpSocket::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        let tcp_listener = TcpListener::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "DNS TCP listening");
        server.register_listener(tcp_listener, TCP_TIMEOUT);

        info!("DNS server ready to serve queries");

        let metrics_handle = tokio::spawn(metrics_loop(self.state.clone(), cancel.clone()));
        self.state.emit_metrics();

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
                cancel.cancel();
            }
        }

        let _ = metrics_handle.await;

        info!("Waiting for zone synchronizer to stop...");
        let _ = sync_handle.await;

        info!("DNS server stopped");
        Ok(())
    }
}
