//! Reader for the operator-authored static zone files.
//!
//! Parsing is done by hickory's master-file parser. Only the entries merged
//! into the synthesized zones are kept: CNAME, A and AAAA. Names come back
//! relative to the file's origin so the same file can be merged into more
//! than one zone:
//!
//! - the origin itself is `@`
//! - names below the origin are bare (`www`, `web.lab`)
//! - wildcard owners and names outside the origin stay fully qualified
//! - CNAME targets outside the origin keep their trailing dot

use hickory_proto::rr::{Name, RData, RecordType};
use hickory_proto::serialize::txt::Parser;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;
use tracing::debug;

use crate::error::DnsError;

/// A CNAME entry from a zone file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnameEntry {
    /// Owner name, relative to the origin.
    pub name: String,
    /// Target: `@`, a bare name below the origin, or an absolute name
    /// ending in a dot.
    pub alias: String,
}

/// An address entry from a zone file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntry<T> {
    /// Owner name, relative to the origin.
    pub name: String,
    /// Address.
    pub ip: T,
}

/// Structured contents of one static zone file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticZone {
    /// CNAME entries in name order.
    pub cname: Vec<CnameEntry>,
    /// A entries in name order, file order within a name.
    pub a: Vec<AddressEntry<Ipv4Addr>>,
    /// AAAA entries in name order, file order within a name.
    pub aaaa: Vec<AddressEntry<Ipv6Addr>>,
}

/// Lowercased text form of `name`, always ending in a dot.
fn absolute(name: &Name) -> String {
    let mut text = name.to_lowercase().to_ascii();
    if !text.ends_with('.') {
        text.push('.');
    }
    text
}

/// `name` relative to `origin` (`example.com.`), or `None` when it is not
/// strictly below it.
fn below<'a>(name: &'a str, origin: &str) -> Option<&'a str> {
    name.strip_suffix(origin)?.strip_suffix('.')
}

fn owner_name(name: &Name, origin: &str) -> String {
    let full = absolute(name);
    if full == origin {
        return "@".to_string();
    }
    match below(&full, origin) {
        Some(relative) if !name.is_wildcard() => relative.to_string(),
        _ => full.trim_end_matches('.').to_string(),
    }
}

fn target_name(name: &Name, origin: &str) -> String {
    let full = absolute(name);
    if full == origin {
        return "@".to_string();
    }
    match below(&full, origin) {
        Some(relative) => relative.to_string(),
        None => full,
    }
}

impl StaticZone {
    /// Read and parse a zone file from disk. Relative names resolve
    /// against `origin` until the file sets its own `$ORIGIN`.
    pub fn load(path: &Path, origin: &str) -> Result<Self, DnsError> {
        let text = std::fs::read_to_string(path).map_err(|e| DnsError::ZoneFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&text, path, origin)
    }

    /// Parse zone file text; `path` anchors `$INCLUDE` and error messages.
    pub fn parse(text: &str, path: &Path, origin: &str) -> Result<Self, DnsError> {
        let err = |message: String| DnsError::ZoneFile {
            path: path.to_path_buf(),
            message,
        };
        let default_origin = Name::from_ascii(format!("{}.", origin.trim_end_matches('.')))
            .map_err(|e| err(format!("invalid origin {origin:?}: {e}")))?;

        let (origin, records) = Parser::new(text, Some(path.to_path_buf()), Some(default_origin))
            .parse()
            .map_err(|e| err(e.to_string()))?;
        let origin = absolute(&origin);

        let mut zone = Self::default();
        for (key, set) in &records {
            let name = owner_name(set.name(), &origin);
            for record in set.records_without_rrsigs() {
                match record.data() {
                    RData::CNAME(cname) => zone.cname.push(CnameEntry {
                        name: name.clone(),
                        alias: target_name(&cname.0, &origin),
                    }),
                    RData::A(a) => zone.a.push(AddressEntry {
                        name: name.clone(),
                        ip: a.0,
                    }),
                    RData::AAAA(aaaa) => zone.aaaa.push(AddressEntry {
                        name: name.clone(),
                        ip: aaaa.0,
                    }),
                    _ => {
                        if key.record_type != RecordType::SOA {
                            debug!(name = %name, record_type = %key.record_type, "ignoring static record");
                        }
                    }
                }
            }
        }

        Ok(zone)
    }

    /// Total number of entries kept.
    pub fn len(&self) -> usize {
        self.cname.len() + self.a.len() + self.aaaa.len()
    }

    /// True when the file contributed nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
