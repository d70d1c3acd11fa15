//! zonedns - An authoritative DNS server whose zones are synthesized from
//! cloud inventory state.
//!
//! Every few seconds the zone synchronizer pulls compute nodes, VMs, NICs and
//! users from the inventory directories, merges them with the operator's
//! static zone files, and republishes the private, public and reverse zones.
//! Queries are answered from the last published generation and never wait on
//! inventory I/O.
//!
//! ## Features
//!
//! - A/AAAA/CNAME/TXT/PTR/SRV answers with single-label wildcards
//! - Short VM aliases granted to the first owner on record, login-prefixed
//!   long names for everyone
//! - Reverse zones derived from every published address
//! - Per-zone SOA serials that only move when zone content changes
//! - Chunked AXFR for secondaries
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            zonedns                               │
//! │                                                                  │
//! │  ┌──────────────────┐   ┌──────────────────┐                     │
//! │  │ Inventory (HTTP) │──▶│ Zone Synchronizer│◀── alias registry   │
//! │  └──────────────────┘   │ (every 12s)      │    (names.db)       │
//! │  ┌──────────────────┐   └────────┬─────────┘                     │
//! │  │ Static zone files│───────────▶│ publish                       │
//! │  └──────────────────┘            ▼                               │
//! │                         ┌──────────────────┐                     │
//! │                         │  DnsState        │                     │
//! │                         │  (zone table)    │                     │
//! │                         └────────┬─────────┘                     │
//! │                                  ▼                               │
//! │                         ┌──────────────────┐                     │
//! │                         │  Hickory DNS     │◀── UDP/TCP :53      │
//! │                         │  ZoneAuthority   │                     │
//! │                         └──────────────────┘                     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Naming
//!
//! ```text
//! VM alias "web1" owned by login "alice", NICs 10.0.0.5 and 203.0.113.9
//!   private: alice-web1, web1 (if granted) → A 10.0.0.5, A 203.0.113.9, TXT
//!   public:  alice-web1, web1 (if granted) → A 203.0.113.9
//!   reverse: 5.0.0.10.in-addr.arpa, 9.113.0.203.in-addr.arpa
//!            → PTR alice-web1.<private base>
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use zonedns::{Config, DnsServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config: Config = config::Config::builder()
//!         .add_source(config::File::with_name("zonedns.toml"))
//!         .build()?
//!         .try_deserialize()?;
//!
//!     let cancel = CancellationToken::new();
//!     let server = DnsServer::from_config(config)?;
//!     server.run(cancel).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod authority;
pub mod config;
pub mod error;
pub mod inventory;
pub mod matching;
pub mod metrics;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod serial;
pub mod server;
pub mod state;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod zonefile;

// Re-export main types
pub use authority::ZoneAuthority;
pub use config::{Config, DnsConfig, InventoryConfig, SoaConfig, TelemetryConfig};
pub use error::DnsError;
pub use record::ResourceRecord;
pub use server::DnsServer;
pub use state::DnsState;
pub use store::RecordStore;
pub use sync::Synchronizer;
