//! Published zone table shared between the synchronizer and query handling.
//!
//! The table is immutable once published. Readers grab the current
//! `Arc<ZoneTable>` and resolve against it without holding any lock; the
//! synchronizer swaps in a whole new table after a successful rebuild.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::metrics;
use crate::record::SoaData;
use crate::store::RecordStore;

/// One live zone: its records plus the SOA cached at publish time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedZone {
    /// Zone contents.
    pub store: RecordStore,
    /// SOA answered for the zone apex.
    pub soa: SoaData,
}

impl PublishedZone {
    /// Base domain of this zone.
    pub fn base(&self) -> &str {
        self.store.base()
    }

    /// Current serial.
    pub fn serial(&self) -> u32 {
        self.soa.serial
    }
}

/// A complete generation of published zones, keyed by base domain.
#[derive(Debug, Default)]
pub struct ZoneTable {
    zones: BTreeMap<String, Arc<PublishedZone>>,
    generation: u64,
}

impl ZoneTable {
    /// Zone published for exactly `base`.
    pub fn zone(&self, base: &str) -> Option<&Arc<PublishedZone>> {
        self.zones.get(base)
    }

    /// The most specific published zone containing `name`.
    pub fn find_zone(&self, name: &str) -> Option<&Arc<PublishedZone>> {
        self.zones
            .iter()
            .filter(|(base, _)| {
                name == base.as_str()
                    || name
                        .strip_suffix(base.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .max_by_key(|(base, _)| base.len())
            .map(|(_, zone)| zone)
    }

    /// All zones in base-domain order.
    pub fn zones(&self) -> impl Iterator<Item = &Arc<PublishedZone>> {
        self.zones.values()
    }

    /// Number of zones.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// True before anything has been published.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Publish counter; zero until the first successful rebuild.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Outcome of a publish attempt.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Zones whose content changed and got a new serial.
    pub changed: Vec<String>,
    /// Zones kept with their previous generation.
    pub unchanged: Vec<String>,
    /// Zones that existed before but were not rebuilt.
    pub removed: Vec<String>,
}

impl PublishReport {
    /// True when the live table was replaced.
    pub fn swapped(&self) -> bool {
        !self.changed.is_empty() || !self.removed.is_empty()
    }
}

/// Thread-safe handle on the currently published zones.
#[derive(Debug, Clone, Default)]
pub struct DnsState {
    inner: Arc<RwLock<Arc<ZoneTable>>>,
}

impl DnsState {
    /// Create an empty, not-yet-ready state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation. Cheap; holds the lock only to clone the `Arc`.
    pub fn snapshot(&self) -> Arc<ZoneTable> {
        self.inner.read().clone()
    }

    /// True once the first generation has been published.
    pub fn is_ready(&self) -> bool {
        self.inner.read().generation > 0
    }

    /// Serial of the zone published for `base`.
    pub fn serial(&self, base: &str) -> Option<u32> {
        self.inner.read().zone(base).map(|z| z.serial())
    }

    /// Number of published zones.
    pub fn zones_count(&self) -> usize {
        self.inner.read().len()
    }

    /// Publish freshly built stores.
    ///
    /// Each zone is decided independently: a store equal to the live one is
    /// dropped and the live generation (and serial) kept; a changed or new
    /// store is published with the SOA produced by `soa_for`, which receives
    /// the base and the previous serial if any. The table is swapped only
    /// when at least one zone changed or disappeared.
    ///
    /// Comparisons run against a snapshot without holding the lock; the
    /// write lock covers only the final swap. Callers must not publish
    /// concurrently.
    pub fn publish<F>(&self, stores: Vec<RecordStore>, mut soa_for: F) -> PublishReport
    where
        F: FnMut(&str, Option<u32>) -> SoaData,
    {
        let current = self.snapshot();
        let mut report = PublishReport::default();
        let mut zones = BTreeMap::new();

        for store in stores {
            let base = store.base().to_string();
            let live = current.zones.get(&base);

            let zone = match live {
                Some(live) if live.store == store => {
                    report.unchanged.push(base.clone());
                    live.clone()
                }
                _ => {
                    let soa = soa_for(&base, live.map(|z| z.serial()));
                    debug!(zone = %base, serial = soa.serial, names = store.len(), "zone content changed");
                    report.changed.push(base.clone());
                    Arc::new(PublishedZone { store, soa })
                }
            };
            zones.insert(base, zone);
        }

        report.removed = current
            .zones
            .keys()
            .filter(|base| !zones.contains_key(*base))
            .cloned()
            .collect();

        if report.swapped() || current.generation == 0 {
            let table = Arc::new(ZoneTable {
                zones,
                generation: current.generation + 1,
            });
            *self.inner.write() = table;
            info!(
                changed = ?report.changed,
                removed = ?report.removed,
                generation = current.generation + 1,
                "published zones"
            );
        }

        report
    }

    /// Emit current state metrics.
    pub fn emit_metrics(&self) {
        let table = self.snapshot();
        metrics::record_generation(table.generation);
        for zone in table.zones() {
            metrics::record_zone_state(zone.base(), zone.store.len(), zone.serial());
        }
    }
}
