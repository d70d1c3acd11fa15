//! Resource records held by the zone stores.
//!
//! Records carry only their payload; the owner name and TTL are supplied when
//! a record is placed into a response section.

use hickory_proto::rr::rdata::{A, AAAA, CNAME, NS, PTR, SOA, SRV, TXT};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::DnsError;

/// SOA payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SoaData {
    /// Primary nameserver.
    pub mname: String,
    /// Hostmaster mailbox in DNS form.
    pub rname: String,
    /// Zone serial.
    pub serial: u32,
    /// Refresh interval in seconds.
    pub refresh: u32,
    /// Retry interval in seconds.
    pub retry: u32,
    /// Expire time in seconds.
    pub expire: u32,
    /// Negative caching TTL in seconds.
    pub minimum: u32,
}

/// SRV payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SrvData {
    /// Priority.
    pub priority: u16,
    /// Weight.
    pub weight: u16,
    /// Port.
    pub port: u16,
    /// Target host.
    pub target: String,
}

/// A typed DNS record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceRecord {
    /// IPv4 address.
    A(Ipv4Addr),
    /// IPv6 address.
    Aaaa(Ipv6Addr),
    /// Alias to another name.
    Cname(String),
    /// Free-form text.
    Txt(String),
    /// Nameserver.
    Ns(String),
    /// Start of authority.
    Soa(SoaData),
    /// Reverse pointer.
    Ptr(String),
    /// Service location.
    Srv(SrvData),
}

impl ResourceRecord {
    /// The wire record type of this record.
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::A(_) => RecordType::A,
            Self::Aaaa(_) => RecordType::AAAA,
            Self::Cname(_) => RecordType::CNAME,
            Self::Txt(_) => RecordType::TXT,
            Self::Ns(_) => RecordType::NS,
            Self::Soa(_) => RecordType::SOA,
            Self::Ptr(_) => RecordType::PTR,
            Self::Srv(_) => RecordType::SRV,
        }
    }

    /// Parse a configured `{type, value}` record.
    ///
    /// SRV values are written as `priority weight port target`. SOA records
    /// are synthesized by the server and cannot be configured.
    pub fn parse(kind: &str, value: &str) -> Result<Self, DnsError> {
        let value = value.trim();
        let record = match kind.to_ascii_uppercase().as_str() {
            "A" => Self::A(
                value
                    .parse()
                    .map_err(|_| DnsError::InvalidAddress(value.to_string()))?,
            ),
            "AAAA" => Self::Aaaa(
                value
                    .parse()
                    .map_err(|_| DnsError::InvalidAddress(value.to_string()))?,
            ),
            "CNAME" => Self::Cname(value.to_string()),
            "TXT" => Self::Txt(value.to_string()),
            "NS" => Self::Ns(value.to_string()),
            "PTR" => Self::Ptr(value.to_string()),
            "SRV" => {
                let parts: Vec<&str> = value.split_whitespace().collect();
                let [priority, weight, port, target] = parts[..] else {
                    return Err(DnsError::Config(format!("malformed SRV value {value:?}")));
                };
                let num = |s: &str| {
                    s.parse::<u16>()
                        .map_err(|_| DnsError::Config(format!("malformed SRV value {value:?}")))
                };
                Self::Srv(SrvData {
                    priority: num(priority)?,
                    weight: num(weight)?,
                    port: num(port)?,
                    target: target.to_string(),
                })
            }
            other => {
                return Err(DnsError::Config(format!(
                    "unsupported record type {other:?}"
                )))
            }
        };
        Ok(record)
    }

    /// Build the wire record for `owner` with the given TTL.
    pub fn to_record(&self, owner: &str, ttl: u32) -> Result<Record, DnsError> {
        let rdata = match self {
            Self::A(ip) => RData::A(A(*ip)),
            Self::Aaaa(ip) => RData::AAAA(AAAA(*ip)),
            Self::Cname(target) => RData::CNAME(CNAME(fqdn(target)?)),
            Self::Txt(text) => RData::TXT(TXT::new(vec![text.clone()])),
            Self::Ns(host) => RData::NS(NS(fqdn(host)?)),
            Self::Ptr(target) => RData::PTR(PTR(fqdn(target)?)),
            Self::Srv(srv) => RData::SRV(SRV::new(
                srv.priority,
                srv.weight,
                srv.port,
                fqdn(&srv.target)?,
            )),
            Self::Soa(soa) => RData::SOA(SOA::new(
                fqdn(&soa.mname)?,
                fqdn(&soa.rname)?,
                soa.serial,
                soa.refresh as i32,
                soa.retry as i32,
                soa.expire as i32,
                soa.minimum,
            )),
        };

        let mut record = Record::from_rdata(fqdn(owner)?, ttl, rdata);
        record.set_dns_class(DNSClass::IN);
        Ok(record)
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A(ip) => write!(f, "A {ip}"),
            Self::Aaaa(ip) => write!(f, "AAAA {ip}"),
            Self::Cname(target) => write!(f, "CNAME {target}"),
            Self::Txt(text) => write!(f, "TXT {text:?}"),
            Self::Ns(host) => write!(f, "NS {host}"),
            Self::Ptr(target) => write!(f, "PTR {target}"),
            Self::Srv(srv) => write!(
                f,
                "SRV {} {} {} {}",
                srv.priority, srv.weight, srv.port, srv.target
            ),
            Self::Soa(soa) => write!(f, "SOA {} {} {}", soa.mname, soa.rname, soa.serial),
        }
    }
}

/// A `{type, value}` record as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpec {
    /// Record type (A, AAAA, CNAME, TXT, NS, PTR, SRV).
    #[serde(rename = "type")]
    pub kind: String,
    /// Record value in presentation form.
    pub value: String,
}

impl RecordSpec {
    /// Convert to a typed record.
    pub fn to_record(&self) -> Result<ResourceRecord, DnsError> {
        ResourceRecord::parse(&self.kind, &self.value)
    }
}

/// Parse a list of configured records, failing on the first bad entry.
pub fn parse_specs(specs: &[RecordSpec]) -> Result<Vec<ResourceRecord>, DnsError> {
    specs.iter().map(RecordSpec::to_record).collect()
}

/// Fully qualified wire name for a dotted string with or without trailing dot.
pub fn fqdn(name: &str) -> Result<Name, DnsError> {
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    Ok(Name::from_ascii(format!("{trimmed}."))?)
}
