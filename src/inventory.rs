//! Cloud inventory directories consulted by the zone synchronizer.
//!
//! Only the data contracts matter to zone synthesis; [`HttpInventory`] talks
//! to the JSON directory services and [`MemoryInventory`] serves a fixed
//! snapshot.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::InventoryConfig;
use crate::error::DnsError;

/// A compute node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComputeNode {
    /// Node identifier.
    pub uuid: String,
    /// Node hostname.
    pub hostname: String,
}

/// A network interface.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Nic {
    /// Address assigned to the interface, if any.
    #[serde(default)]
    pub ip: Option<String>,
}

/// A virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Vm {
    /// VM identifier.
    pub uuid: String,
    /// Human-chosen display alias.
    #[serde(default)]
    pub alias: Option<String>,
    /// Lifecycle state (running, stopped, failed, ...).
    #[serde(default)]
    pub state: String,
    /// Set once the VM has been destroyed. The directory reports either a
    /// flag or a timestamp.
    #[serde(default, deserialize_with = "present_or_true")]
    pub destroyed: bool,
    /// Owning user identifier.
    pub owner_uuid: String,
    /// Compute node hosting the VM.
    #[serde(default)]
    pub server_uuid: Option<String>,
    /// Attached interfaces.
    #[serde(default)]
    pub nics: Vec<Nic>,
}

impl Vm {
    /// True for VMs that should appear in DNS.
    pub fn is_live(&self) -> bool {
        !self.destroyed && self.state != "failed"
    }
}

/// A user identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    /// User identifier.
    pub uuid: String,
    /// Login name, used as the long-form DNS prefix.
    pub login: String,
}

fn present_or_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    })
}

/// Read-only access to the inventory directories.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// List all compute nodes.
    async fn list_compute_nodes(&self) -> Result<Vec<ComputeNode>, DnsError>;

    /// List the NICs belonging to a compute node.
    async fn list_nics(&self, node_uuid: &str) -> Result<Vec<Nic>, DnsError>;

    /// List active VMs.
    async fn list_active_vms(&self) -> Result<Vec<Vm>, DnsError>;

    /// Look up a user; `None` when the directory has no such user.
    async fn get_user(&self, uuid: &str) -> Result<Option<User>, DnsError>;
}

/// Inventory backed by the HTTP directory services.
#[derive(Debug, Clone)]
pub struct HttpInventory {
    client: Client,
    config: InventoryConfig,
}

impl HttpInventory {
    /// Build a client for the configured endpoints.
    pub fn new(config: InventoryConfig) -> Result<Self, DnsError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, DnsError> {
        debug!(url = %url, "inventory request");
        let response = self.client.get(&url).query(query).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.json().await?))
    }

    async fn list<T: for<'de> Deserialize<'de>>(
        &self,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, DnsError> {
        self.get_json(url.clone(), query)
            .await?
            .ok_or_else(|| DnsError::Inventory(format!("{url} returned 404")))
    }
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

#[async_trait]
impl Inventory for HttpInventory {
    async fn list_compute_nodes(&self) -> Result<Vec<ComputeNode>, DnsError> {
        self.list(endpoint(&self.config.cnapi_url, "servers"), &[])
            .await
    }

    async fn list_nics(&self, node_uuid: &str) -> Result<Vec<Nic>, DnsError> {
        self.list(
            endpoint(&self.config.napi_url, "nics"),
            &[("belongs_to_uuid", node_uuid)],
        )
        .await
    }

    async fn list_active_vms(&self) -> Result<Vec<Vm>, DnsError> {
        self.list(endpoint(&self.config.vmapi_url, "vms"), &[("state", "active")])
            .await
    }

    async fn get_user(&self, uuid: &str) -> Result<Option<User>, DnsError> {
        self.get_json(endpoint(&self.config.ufds_url, &format!("users/{uuid}")), &[])
            .await
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    nodes: Vec<ComputeNode>,
    nics: HashMap<String, Vec<Nic>>,
    vms: Vec<Vm>,
    users: HashMap<String, User>,
    failing_users: Vec<String>,
    fail_listing: bool,
}

/// Inventory serving an in-memory snapshot that can be edited between
/// sync cycles.
#[derive(Debug, Clone, Default)]
pub struct MemoryInventory {
    inner: Arc<RwLock<Snapshot>>,
}

impl MemoryInventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a compute node with the given NIC addresses.
    pub fn add_node(&self, uuid: &str, hostname: &str, ips: &[&str]) {
        let mut inner = self.inner.write();
        inner.nodes.push(ComputeNode {
            uuid: uuid.to_string(),
            hostname: hostname.to_string(),
        });
        inner.nics.insert(
            uuid.to_string(),
            ips.iter()
                .map(|ip| Nic {
                    ip: Some(ip.to_string()),
                })
                .collect(),
        );
    }

    /// Add a user.
    pub fn add_user(&self, uuid: &str, login: &str) {
        self.inner.write().users.insert(
            uuid.to_string(),
            User {
                uuid: uuid.to_string(),
                login: login.to_string(),
            },
        );
    }

    /// Add a VM.
    pub fn add_vm(&self, vm: Vm) {
        self.inner.write().vms.push(vm);
    }

    /// Replace the VM list.
    pub fn set_vms(&self, vms: Vec<Vm>) {
        self.inner.write().vms = vms;
    }

    /// Current VM list.
    pub fn vms(&self) -> Vec<Vm> {
        self.inner.read().vms.clone()
    }

    /// Make lookups of `uuid` fail.
    pub fn fail_user(&self, uuid: &str) {
        self.inner.write().failing_users.push(uuid.to_string());
    }

    /// Make every listing call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.inner.write().fail_listing = failing;
    }

    fn check(&self) -> Result<(), DnsError> {
        if self.inner.read().fail_listing {
            return Err(DnsError::Inventory("directory unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Inventory for MemoryInventory {
    async fn list_compute_nodes(&self) -> Result<Vec<ComputeNode>, DnsError> {
        self.check()?;
        Ok(self.inner.read().nodes.clone())
    }

    async fn list_nics(&self, node_uuid: &str) -> Result<Vec<Nic>, DnsError> {
        self.check()?;
        Ok(self
            .inner
            .read()
            .nics
            .get(node_uuid)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_active_vms(&self) -> Result<Vec<Vm>, DnsError> {
        self.check()?;
        Ok(self.inner.read().vms.clone())
    }

    async fn get_user(&self, uuid: &str) -> Result<Option<User>, DnsError> {
        let inner = self.inner.read();
        if inner.failing_users.iter().any(|u| u == uuid) {
            return Err(DnsError::Inventory(format!("user lookup for {uuid} failed")));
        }
        Ok(inner.users.get(uuid).cloned())
    }
}
