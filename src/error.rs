//! Error types for zonedns.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error talking to an inventory directory
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Failed to parse address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Static zone file could not be read or parsed
    #[error("Zone file {}: {message}", path.display())]
    ZoneFile {
        /// File being read.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// An inventory directory returned an unusable answer
    #[error("Inventory error: {0}")]
    Inventory(String),

    /// Alias registry persistence failure
    #[error("Alias registry error: {0}")]
    Registry(#[from] serde_json::Error),

    /// A freshly built zone failed the sanity check and was not published
    #[error("Zone {zone} has only {names} names, refusing to publish")]
    Validation {
        /// Base domain of the rejected zone.
        zone: String,
        /// Distinct names found.
        names: usize,
    },
}
