//! Shared test infrastructure for end-to-end query tests.

#![allow(dead_code)]

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use zonedns::config::{DnsConfig, ReverseProxyConfig, SoaConfig};
use zonedns::inventory::{MemoryInventory, Nic, Vm};
use zonedns::record::RecordSpec;
use zonedns::registry::{AliasRegistry, MemoryAliasRegistry};
use zonedns::state::DnsState;
use zonedns::sync::{StaticZones, Synchronizer};
use zonedns::zonefile::StaticZone;
use zonedns::ZoneAuthority;

// --- Constants ---

pub const PRIVATE_BASE: &str = "cloud.example.com";
pub const PUBLIC_BASE: &str = "example.com";
pub const PROXY_IP: &str = "198.51.100.80";
pub const SELF_IP: &str = "192.0.2.53";

pub const STATIC_ZONE: &str = "\
$ORIGIN example.com.
$TTL 300
@       IN SOA ns1.example.com. hostmaster.example.com. (
            1 60 60 181440 300 )
@       IN A     192.0.2.1
www     IN CNAME @
docs    IN CNAME pages.example.net.
wiki    IN CNAME web
web     IN A     192.0.2.10
        IN A     192.0.2.11
*.apps.cloud.example.com. IN A 192.0.2.99
";

// --- TestResponseHandler ---

/// Captures every serialized DNS message sent for one request.
///
/// Zone transfers send several messages through the same handle, so each
/// `send_response` call appends a new buffer.
#[derive(Clone)]
pub struct TestResponseHandler {
    bufs: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            bufs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Parse all captured messages in send order.
    pub fn into_messages(self) -> Vec<Message> {
        let bufs = self.bufs.lock().unwrap();
        bufs.iter()
            .map(|buf| Message::from_vec(buf).expect("failed to parse captured DNS response"))
            .collect()
    }

    /// Parse the single captured message.
    pub fn into_message(self) -> Message {
        let mut messages = self.into_messages();
        assert_eq!(messages.len(), 1, "expected exactly one response");
        messages.remove(0)
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = Vec::with_capacity(512);
        let mut encoder = BinEncoder::new(&mut buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        self.bufs.lock().unwrap().push(buf);
        Ok(info)
    }
}

// --- Config builders ---

fn spec(kind: &str, value: &str) -> RecordSpec {
    RecordSpec {
        kind: kind.to_string(),
        value: value.to_string(),
    }
}

pub fn test_dns_config() -> DnsConfig {
    DnsConfig {
        listen_addr: "127.0.0.1:5353".parse().unwrap(),
        ttl: 300,
        private_base: PRIVATE_BASE.to_string(),
        public_base: PUBLIC_BASE.to_string(),
        hostname: "ns1".to_string(),
        hostmaster: "hostmaster.example.com".to_string(),
        self_records: vec![spec("A", SELF_IP)],
        secondary_ns: vec!["ns2.example.net".to_string()],
        reverse_proxy: Some(ReverseProxyConfig {
            records: vec![spec("A", PROXY_IP)],
        }),
        private_zone_file: PathBuf::from("private.zone"),
        public_zone_file: None,
        names_db: PathBuf::from("names.db"),
        sync_interval_secs: 12,
        soa: SoaConfig::default(),
    }
}

pub fn static_zones(text: &str) -> StaticZones {
    let zone = StaticZone::parse(text, Path::new("test.zone"), PRIVATE_BASE).unwrap();
    StaticZones {
        private: zone.clone(),
        public: zone,
    }
}

// --- Inventory builders ---

pub fn vm(uuid: &str, alias: &str, owner: &str, ips: &[&str]) -> Vm {
    Vm {
        uuid: uuid.to_string(),
        alias: Some(alias.to_string()),
        state: "running".to_string(),
        destroyed: false,
        owner_uuid: owner.to_string(),
        server_uuid: Some("cn-uuid-1".to_string()),
        nics: ips
            .iter()
            .map(|ip| Nic {
                ip: Some(ip.to_string()),
            })
            .collect(),
    }
}

/// Inventory with one compute node and two users, alice and bob.
pub fn test_inventory() -> MemoryInventory {
    let inventory = MemoryInventory::new();
    inventory.add_node("node-uuid-1", "cn1", &["10.0.0.1"]);
    inventory.add_user("u1", "alice");
    inventory.add_user("u2", "bob");
    inventory
}

// --- Harness ---

/// Synchronizer and request handler sharing one state.
pub struct TestHarness {
    pub inventory: MemoryInventory,
    pub state: DnsState,
    pub synchronizer: Synchronizer,
    pub authority: ZoneAuthority,
}

impl TestHarness {
    pub fn new(inventory: MemoryInventory) -> Self {
        Self::with_registry(inventory, Arc::new(MemoryAliasRegistry::new()), STATIC_ZONE)
    }

    pub fn with_registry(
        inventory: MemoryInventory,
        registry: Arc<dyn AliasRegistry>,
        zone_text: &str,
    ) -> Self {
        let config = Arc::new(test_dns_config());
        let state = DnsState::new();
        let synchronizer = Synchronizer::new(
            config.clone(),
            Arc::new(inventory.clone()),
            registry,
            Arc::new(static_zones(zone_text)),
            state.clone(),
        );
        let authority =
            ZoneAuthority::new(config, state.clone()).expect("failed to create ZoneAuthority");
        Self {
            inventory,
            state,
            synchronizer,
            authority,
        }
    }

    /// Run one sync cycle, panicking if it fails.
    pub async fn sync(&self) {
        self.synchronizer
            .sync_once()
            .await
            .expect("sync cycle failed");
    }

    pub async fn query(&self, name: &str, record_type: RecordType) -> Message {
        execute_query(&self.authority, name, record_type).await
    }

    /// SOA serial for `zone` as served over DNS.
    pub async fn served_serial(&self, zone: &str) -> u32 {
        let msg = self.query(zone, RecordType::SOA).await;
        match msg.answers().first().map(|r| r.data()) {
            Some(RData::SOA(soa)) => soa.serial(),
            other => panic!("expected SOA answer for {zone}, got {other:?}"),
        }
    }
}

// --- Query/Request construction ---

pub fn test_src() -> SocketAddr {
    "192.0.2.200:12345".parse().unwrap()
}

/// Build wire-format bytes for a DNS message with one question.
pub fn build_query_bytes(name: &str, record_type: RecordType, op_code: OpCode, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(op_code);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

pub fn build_request(name: &str, record_type: RecordType, op_code: OpCode) -> Request {
    let bytes = build_query_bytes(name, record_type, op_code, 7);
    Request::new(parse_message_request(&bytes), test_src(), Protocol::Tcp)
}

/// Send a request through the handler and collect every message it emits.
pub async fn execute_request<H: RequestHandler>(handler: &H, request: Request) -> Vec<Message> {
    let capture = TestResponseHandler::new();
    handler.handle_request(&request, capture.clone()).await;
    capture.into_messages()
}

/// Execute a standard query and return the single response.
pub async fn execute_query<H: RequestHandler>(
    handler: &H,
    name: &str,
    record_type: RecordType,
) -> Message {
    let mut messages =
        execute_request(handler, build_request(name, record_type, OpCode::Query)).await;
    assert_eq!(messages.len(), 1, "expected exactly one response");
    messages.remove(0)
}

// --- Response helpers ---

pub fn extract_a_ips(records: &[Record]) -> Vec<Ipv4Addr> {
    records
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(Ipv4Addr::from(*a)),
            _ => None,
        })
        .collect()
}

pub fn record_types(records: &[Record]) -> Vec<RecordType> {
    records.iter().map(|r| r.record_type()).collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}

/// Assert a successful answer with exactly the expected A addresses, in order.
pub fn assert_a_response(msg: &Message, expected: &[&str]) {
    assert_response_code(msg, ResponseCode::NoError);
    let expected: Vec<Ipv4Addr> = expected.iter().map(|ip| ip.parse().unwrap()).collect();
    assert_eq!(extract_a_ips(msg.answers()), expected);
}

/// Assert a name error carrying the zone SOA as authority.
pub fn assert_name_error(msg: &Message) {
    assert_response_code(msg, ResponseCode::NXDomain);
    assert!(msg.answers().is_empty());
    assert_eq!(record_types(msg.name_servers()), vec![RecordType::SOA]);
}
