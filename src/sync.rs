//! Periodic zone synthesis from inventory state.
//!
//! Each cycle builds brand-new stores for the private, public and reverse
//! zones from the static zone files plus whatever the inventory directories
//! report, sanity-checks them, and hands them to [`DnsState::publish`].
//! Nothing is published unless the whole cycle succeeds, and cycles never
//! overlap: the next one is scheduled only after the current one, including
//! all of its fan-out fetches, has finished.

use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::inventory::{Inventory, Nic, User, Vm};
use crate::metrics::{self, SyncOutcome, Timer};
use crate::record::ResourceRecord;
use crate::registry::{AliasOwner, AliasRegistry};
use crate::serial::next_serial;
use crate::state::{DnsState, PublishReport};
use crate::store::RecordStore;
use crate::zonefile::StaticZone;

/// Rebuilt forward zones with fewer names than this are assumed truncated.
pub const MIN_ZONE_NAMES: usize = 5;

/// Static zone files, parsed once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticZones {
    /// Entries merged into the private zone.
    pub private: StaticZone,
    /// Entries merged into the public zone.
    pub public: StaticZone,
}

impl StaticZones {
    /// Load the configured zone files, each relative to its own base. The
    /// private file doubles as the public one when no public file is
    /// configured.
    pub fn load(config: &DnsConfig) -> Result<Self, DnsError> {
        let private = StaticZone::load(&config.private_zone_file, &config.private_base())?;
        let public = match &config.public_zone_file {
            Some(path) => StaticZone::load(path, &config.public_base())?,
            None => private.clone(),
        };
        info!(
            private_entries = private.len(),
            public_entries = public.len(),
            "loaded static zones"
        );
        Ok(Self { private, public })
    }
}

/// True for RFC1918 addresses (10/8, 172.16/12, 192.168/16).
pub fn is_rfc1918(ip: Ipv4Addr) -> bool {
    ip.is_private()
}

/// Reverse zone and relative owner name for an IPv4 address:
/// `a.b.c.d` lives at `d` in `c.b.a.in-addr.arpa`.
pub fn reverse_zone(ip: Ipv4Addr) -> (String, String) {
    let [a, b, c, d] = ip.octets();
    (format!("{c}.{b}.{a}.in-addr.arpa"), d.to_string())
}

fn nic_ipv4(nic: &Nic) -> Option<Ipv4Addr> {
    nic.ip.as_deref()?.parse().ok()
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Zones under construction for one cycle.
#[derive(Debug, Clone)]
pub struct ZoneSet {
    /// Private zone.
    pub private: RecordStore,
    /// Public zone.
    pub public: RecordStore,
    /// Reverse zones keyed by `c.b.a.in-addr.arpa`.
    pub reverse: BTreeMap<String, RecordStore>,
}

impl ZoneSet {
    /// Empty zones for the given bases.
    pub fn new(private_base: &str, public_base: &str) -> Self {
        Self {
            private: RecordStore::new(private_base),
            public: RecordStore::new(public_base),
            reverse: BTreeMap::new(),
        }
    }

    /// Add a PTR for `ip`, creating its reverse zone on first use.
    pub fn add_ptr(&mut self, ip: Ipv4Addr, target: String) {
        let (zone, name) = reverse_zone(ip);
        self.reverse
            .entry(zone)
            .or_insert_with_key(|zone| RecordStore::new(zone))
            .add(&name, ResourceRecord::Ptr(target));
    }

    /// Check the forward zones against [`MIN_ZONE_NAMES`].
    pub fn validate(&self) -> Result<(), DnsError> {
        for store in [&self.private, &self.public] {
            if store.len() < MIN_ZONE_NAMES {
                return Err(DnsError::Validation {
                    zone: store.base().to_string(),
                    names: store.len(),
                });
            }
        }
        Ok(())
    }

    /// All stores, forward zones first.
    pub fn into_stores(self) -> Vec<RecordStore> {
        let mut stores = vec![self.private, self.public];
        stores.extend(self.reverse.into_values());
        stores
    }
}

/// Merge static zone-file entries into `store`.
///
/// CNAME targets of `@` point at the public apex; other targets are
/// qualified with `base` unless written absolute. The `@` and `IN` owners the
/// file format leaves behind are dropped afterwards.
pub fn merge_static(store: &mut RecordStore, zone: &StaticZone, public_base: &str) {
    let base = store.base().to_string();

    for entry in &zone.cname {
        let alias = match entry.alias.as_str() {
            "@" | "@." => format!("{public_base}."),
            other => other.to_string(),
        };
        let target = match alias.strip_suffix('.') {
            Some(absolute) => absolute.to_string(),
            None => format!("{alias}.{base}"),
        };
        store.add(&entry.name, ResourceRecord::Cname(target));
    }
    for entry in &zone.a {
        store.add(&entry.name, ResourceRecord::A(entry.ip));
    }
    for entry in &zone.aaaa {
        store.add(&entry.name, ResourceRecord::Aaaa(entry.ip));
    }

    store.remove("@");
    store.remove("IN");
}

/// Rebuilds and republishes zones on a fixed cadence.
pub struct Synchronizer {
    config: Arc<DnsConfig>,
    inventory: Arc<dyn Inventory>,
    registry: Arc<dyn AliasRegistry>,
    static_zones: Arc<StaticZones>,
    state: DnsState,
}

impl Synchronizer {
    /// Create a synchronizer publishing into `state`.
    pub fn new(
        config: Arc<DnsConfig>,
        inventory: Arc<dyn Inventory>,
        registry: Arc<dyn AliasRegistry>,
        static_zones: Arc<StaticZones>,
        state: DnsState,
    ) -> Self {
        Self {
            config,
            inventory,
            registry,
            static_zones,
            state,
        }
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let interval = Duration::from_secs(self.config.sync_interval_secs);
        info!(interval_secs = interval.as_secs(), "zone synchronizer started");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("zone synchronizer shutting down");
                    return;
                }

                result = self.sync_once() => {
                    if let Err(e) = result {
                        error!(error = %e, "zone rebuild failed, keeping published zones");
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("zone synchronizer shutting down");
                    return;
                }
                _ = sleep(interval) => {}
            }
        }
    }

    /// One full cycle: build, validate, publish.
    pub async fn sync_once(&self) -> Result<PublishReport, DnsError> {
        let timer = Timer::start();

        let zones = match self.build().await {
            Ok(zones) => zones,
            Err(e) => {
                metrics::record_sync_cycle(SyncOutcome::InventoryFailed, timer.elapsed());
                return Err(e);
            }
        };

        if let Err(e) = zones.validate() {
            metrics::record_sync_cycle(SyncOutcome::ValidationFailed, timer.elapsed());
            return Err(e);
        }

        let now = Utc::now();
        let config = &self.config;
        let report = self
            .state
            .publish(zones.into_stores(), |base, previous| {
                config.soa(base, next_serial(previous, now))
            });

        let outcome = if report.swapped() {
            SyncOutcome::Published
        } else {
            SyncOutcome::Unchanged
        };
        metrics::record_sync_cycle(outcome, timer.elapsed());
        self.state.emit_metrics();
        debug!(
            changed = report.changed.len(),
            unchanged = report.unchanged.len(),
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "sync cycle complete"
        );

        Ok(report)
    }

    /// Build a fresh zone set without publishing it.
    pub async fn build(&self) -> Result<ZoneSet, DnsError> {
        let public_base = self.config.public_base();
        let mut zones = ZoneSet::new(&self.config.private_base(), &public_base);

        merge_static(&mut zones.private, &self.static_zones.private, &public_base);
        merge_static(&mut zones.public, &self.static_zones.public, &public_base);

        self.add_compute_nodes(&mut zones).await?;
        self.add_vms(&mut zones).await?;

        Ok(zones)
    }

    async fn add_compute_nodes(&self, zones: &mut ZoneSet) -> Result<(), DnsError> {
        let nodes = self.inventory.list_compute_nodes().await?;
        let nics = join_all(nodes.iter().map(|node| self.inventory.list_nics(&node.uuid))).await;
        let private_base = self.config.private_base();

        for (node, nics) in nodes.iter().zip(nics) {
            let nics = nics?;
            for ip in nics.iter().filter_map(nic_ipv4) {
                for name in [&node.uuid, &node.hostname] {
                    zones.public.add(name, ResourceRecord::A(ip));
                    zones.private.add(name, ResourceRecord::A(ip));
                }
                zones.add_ptr(ip, format!("{}.{}", node.hostname, private_base));
            }
        }

        debug!(nodes = nodes.len(), "added compute node records");
        Ok(())
    }

    async fn add_vms(&self, zones: &mut ZoneSet) -> Result<(), DnsError> {
        let vms: Vec<Vm> = self
            .inventory
            .list_active_vms()
            .await?
            .into_iter()
            .filter(Vm::is_live)
            .collect();

        // One lookup per distinct owner per cycle.
        let owners: BTreeSet<&str> = vms.iter().map(|vm| vm.owner_uuid.as_str()).collect();
        let users: HashMap<&str, Result<Option<User>, DnsError>> = join_all(
            owners
                .into_iter()
                .map(|uuid| async move { (uuid, self.inventory.get_user(uuid).await) }),
        )
        .await
        .into_iter()
        .collect();

        let mut published = 0usize;
        for vm in &vms {
            let Some(alias) = vm
                .alias
                .as_deref()
                .map(str::to_ascii_lowercase)
                .filter(|a| is_valid_label(a))
            else {
                warn!(vm = %vm.uuid, alias = ?vm.alias, "VM alias is not a valid DNS label, skipping VM");
                metrics::record_vm_skipped("invalid_alias");
                continue;
            };

            let login = match users.get(vm.owner_uuid.as_str()) {
                Some(Ok(Some(user))) => user.login.to_ascii_lowercase(),
                Some(Ok(None)) | None => {
                    debug!(vm = %vm.uuid, owner = %vm.owner_uuid, "skipping VM with unknown owner");
                    metrics::record_vm_skipped("unknown_owner");
                    continue;
                }
                Some(Err(e)) => {
                    warn!(vm = %vm.uuid, owner = %vm.owner_uuid, error = %e, "owner lookup failed, skipping VM this cycle");
                    metrics::record_vm_skipped("owner_lookup_failed");
                    continue;
                }
            };
            if !is_valid_label(&login) {
                warn!(vm = %vm.uuid, login = %login, "owner login is not a valid DNS label, skipping VM");
                metrics::record_vm_skipped("invalid_login");
                continue;
            }

            let granted = self.claim_alias(&alias, &vm.owner_uuid).await;
            let long = format!("{login}-{alias}");
            let short = granted.then_some(alias.as_str());
            self.add_vm(zones, vm, &long, short);
            published += 1;
        }

        debug!(vms = published, "added VM records");
        Ok(())
    }

    /// Decide whether `owner` may publish the short `alias`.
    ///
    /// The first owner ever recorded keeps it. Registry failures deny the
    /// short form for this cycle only.
    async fn claim_alias(&self, alias: &str, owner: &str) -> bool {
        let granted = match self.registry.find(alias).await {
            Ok(Some(record)) => record.owner_uuid == owner,
            Ok(None) => {
                let record = AliasOwner {
                    alias: alias.to_string(),
                    owner_uuid: owner.to_string(),
                };
                match self.registry.insert(record).await {
                    Ok(()) => {
                        info!(alias, owner, "alias claimed");
                        true
                    }
                    Err(e) => {
                        warn!(alias, owner, error = %e, "failed to record alias owner");
                        false
                    }
                }
            }
            Err(e) => {
                warn!(alias, owner, error = %e, "alias registry lookup failed");
                false
            }
        };
        metrics::record_alias_decision(granted);
        granted
    }

    fn add_vm(&self, zones: &mut ZoneSet, vm: &Vm, long: &str, short: Option<&str>) {
        let names: Vec<&str> = std::iter::once(long).chain(short).collect();
        let ptr_target = format!("{}.{}", long, self.config.private_base());
        let mut has_address = false;
        let mut has_public = false;

        for ip in vm.nics.iter().filter_map(nic_ipv4) {
            for name in &names {
                zones.private.add(name, ResourceRecord::A(ip));
            }
            has_address = true;
            if !is_rfc1918(ip) {
                for name in &names {
                    zones.public.add(name, ResourceRecord::A(ip));
                }
                has_public = true;
            }
            zones.add_ptr(ip, ptr_target.clone());
        }

        if !has_public {
            let fallback = ResourceRecord::Cname(self.config.public_base());
            for name in &names {
                zones.public.set(name, vec![fallback.clone()]);
            }
        }

        if !has_address {
            return;
        }
        let locator = ResourceRecord::Txt(format!(
            "{}@{}",
            vm.uuid,
            vm.server_uuid.as_deref().unwrap_or_default()
        ));
        for name in &names {
            zones.private.add(name, locator.clone());
        }
    }
}
