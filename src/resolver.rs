//! Query resolution against a published [`ZoneTable`].
//!
//! Resolution is a synchronous function of the table snapshot and the
//! question. It yields section contents only; encoding and sending belong
//! to [`crate::authority::ZoneAuthority`].

use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;
use std::sync::Arc;
use tracing::debug;

use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::record::{parse_specs, ResourceRecord};
use crate::state::{PublishedZone, ZoneTable};

/// Maximum zone records per AXFR message.
pub const AXFR_BATCH_SIZE: usize = 200;

/// TTL of SOA records.
pub const SOA_TTL: u32 = 60;

/// TTL of NS, reverse-proxy and self records.
pub const SERVER_TTL: u32 = 3600;

/// A record placed in a response section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRecord {
    /// Fully qualified owner name, without trailing dot.
    pub owner: String,
    /// Time to live.
    pub ttl: u32,
    /// Record data.
    pub record: ResourceRecord,
}

impl SectionRecord {
    fn new(owner: &str, ttl: u32, record: ResourceRecord) -> Self {
        Self {
            owner: owner.to_string(),
            ttl,
            record,
        }
    }
}

/// Sections of a single response message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response code.
    pub rcode: ResponseCode,
    /// False when the name lies outside every published zone.
    pub authoritative: bool,
    /// Answer section.
    pub answers: Vec<SectionRecord>,
    /// Authority section.
    pub authority: Vec<SectionRecord>,
    /// Additional section.
    pub additional: Vec<SectionRecord>,
}

impl Response {
    fn empty(authoritative: bool) -> Self {
        Self {
            rcode: ResponseCode::NoError,
            authoritative,
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }
}

/// Outcome of resolving one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A single response message.
    Answer(Response),
    /// A zone transfer, one entry per outbound message.
    Transfer(Vec<Vec<SectionRecord>>),
}

/// Resolves questions against published zones.
#[derive(Debug, Clone)]
pub struct Resolver {
    config: Arc<DnsConfig>,
    self_records: Vec<ResourceRecord>,
    proxy_records: Vec<ResourceRecord>,
}

impl Resolver {
    /// Build a resolver, parsing the configured self and reverse-proxy
    /// records.
    pub fn new(config: Arc<DnsConfig>) -> Result<Self, DnsError> {
        let self_records = parse_specs(&config.self_records)?;
        let proxy_records = match &config.reverse_proxy {
            Some(proxy) => parse_specs(&proxy.records)?,
            None => Vec::new(),
        };
        Ok(Self {
            config,
            self_records,
            proxy_records,
        })
    }

    /// Resolve `qname`/`qtype` against `table`.
    pub fn resolve(&self, table: &ZoneTable, qname: &str, qtype: RecordType) -> Resolution {
        let name = qname.trim_end_matches('.').to_ascii_lowercase();
        let Some(zone) = table.find_zone(&name) else {
            return Resolution::Answer(Response::empty(false));
        };
        let apex = name == zone.base();

        match qtype {
            RecordType::AXFR if apex => Resolution::Transfer(self.transfer(zone)),
            RecordType::AXFR => Resolution::Answer(self.name_error(zone)),
            RecordType::NS if apex => Resolution::Answer(Response {
                answers: self.ns_records(zone),
                ..Response::empty(true)
            }),
            RecordType::NS => Resolution::Answer(self.name_error(zone)),
            RecordType::SOA if apex => Resolution::Answer(Response {
                answers: vec![self.soa_record(zone)],
                authority: self.ns_records(zone),
                additional: self.server_records(zone),
                ..Response::empty(true)
            }),
            RecordType::A
            | RecordType::AAAA
            | RecordType::CNAME
            | RecordType::TXT
            | RecordType::PTR
            | RecordType::SRV
            | RecordType::SOA => Resolution::Answer(self.lookup(zone, &name, qtype, apex)),
            other => {
                debug!(qname = %name, qtype = %other, "unsupported query type");
                Resolution::Answer(Response::empty(true))
            }
        }
    }

    fn lookup(&self, zone: &PublishedZone, name: &str, qtype: RecordType, apex: bool) -> Response {
        let wanted = |r: &&ResourceRecord| {
            r.record_type() == qtype || matches!(r, ResourceRecord::Cname(_))
        };

        if apex {
            if zone.base() != self.config.public_base() {
                return self.name_error(zone);
            }
            let answers: Vec<_> = self
                .proxy_records
                .iter()
                .filter(wanted)
                .map(|r| SectionRecord::new(name, SERVER_TTL, r.clone()))
                .collect();
            if answers.is_empty() {
                return Response {
                    authority: vec![self.soa_record(zone)],
                    ..Response::empty(true)
                };
            }
            return Response {
                answers,
                authority: self.ns_records(zone),
                ..Response::empty(true)
            };
        }

        let relative = name
            .strip_suffix(zone.base())
            .map(|r| r.trim_end_matches('.'))
            .unwrap_or(name);

        let answers: Vec<_> = if self.is_server_name(zone, name) {
            self.self_records
                .iter()
                .filter(wanted)
                .map(|r| SectionRecord::new(name, SERVER_TTL, r.clone()))
                .collect()
        } else {
            zone.store
                .lookup(relative)
                .unwrap_or_default()
                .iter()
                .filter(wanted)
                .map(|r| SectionRecord::new(name, self.config.ttl, r.clone()))
                .collect()
        };

        if answers.is_empty() {
            return self.name_error(zone);
        }
        Response {
            answers,
            authority: self.ns_records(zone),
            ..Response::empty(true)
        }
    }

    fn transfer(&self, zone: &PublishedZone) -> Vec<Vec<SectionRecord>> {
        let base = zone.base();
        let soa = self.soa_record(zone);

        let mut head = self.ns_records(zone);
        if base == self.config.public_base() {
            head.extend(
                self.proxy_records
                    .iter()
                    .map(|r| SectionRecord::new(base, SERVER_TTL, r.clone())),
            );
        }

        let suffix = format!(".{base}");
        let records: Vec<SectionRecord> = zone
            .store
            .iter()
            .flat_map(|(name, records)| {
                let owner = match name.strip_suffix('.') {
                    Some(absolute) => absolute.to_string(),
                    None if name.ends_with(&suffix) => name.to_string(),
                    None => format!("{name}{suffix}"),
                };
                records
                    .iter()
                    .map(move |r| SectionRecord::new(&owner, self.config.ttl, r.clone()))
            })
            .collect();

        let mut messages = Vec::with_capacity(3 + records.len() / AXFR_BATCH_SIZE + 1);
        messages.push(vec![soa.clone()]);
        messages.push(head);
        messages.extend(records.chunks(AXFR_BATCH_SIZE).map(<[_]>::to_vec));
        messages.push(vec![soa]);
        messages
    }

    fn name_error(&self, zone: &PublishedZone) -> Response {
        Response {
            rcode: ResponseCode::NXDomain,
            authority: vec![self.soa_record(zone)],
            ..Response::empty(true)
        }
    }

    fn soa_record(&self, zone: &PublishedZone) -> SectionRecord {
        SectionRecord::new(zone.base(), SOA_TTL, ResourceRecord::Soa(zone.soa.clone()))
    }

    fn ns_records(&self, zone: &PublishedZone) -> Vec<SectionRecord> {
        self.config
            .nameservers(zone.base())
            .into_iter()
            .map(|ns| SectionRecord::new(zone.base(), SERVER_TTL, ResourceRecord::Ns(ns)))
            .collect()
    }

    fn server_records(&self, zone: &PublishedZone) -> Vec<SectionRecord> {
        let owner = self.config.server_name(zone.base());
        self.self_records
            .iter()
            .map(|r| SectionRecord::new(&owner, SERVER_TTL, r.clone()))
            .collect()
    }

    fn is_server_name(&self, zone: &PublishedZone, name: &str) -> bool {
        !self.self_records.is_empty() && name == self.config.server_name(zone.base())
    }
}
