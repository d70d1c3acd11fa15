//! Zone transfer tests: message framing and batching.

mod common;

use std::net::Ipv4Addr;
use std::sync::Arc;

use common::*;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{RData, RecordType};
use zonedns::registry::MemoryAliasRegistry;

const BATCH: usize = 200;

fn large_zone(hosts: usize) -> String {
    let mut text = String::from(STATIC_ZONE);
    for i in 0..hosts {
        text.push_str(&format!("host{i} IN A 10.1.{}.{}\n", i / 250, i % 250 + 1));
    }
    text
}

async fn transfer(harness: &TestHarness, zone: &str) -> Vec<Message> {
    let request = build_request(zone, RecordType::AXFR, hickory_proto::op::OpCode::Query);
    execute_request(&harness.authority, request).await
}

fn soa_serial(msg: &Message) -> u32 {
    assert_eq!(msg.answers().len(), 1);
    match msg.answers()[0].data() {
        RData::SOA(soa) => soa.serial(),
        other => panic!("expected SOA, got {other:?}"),
    }
}

#[tokio::test]
async fn large_zone_is_batched_and_framed_by_soa() {
    let harness = TestHarness::with_registry(
        test_inventory(),
        Arc::new(MemoryAliasRegistry::new()),
        &large_zone(450),
    );
    harness.sync().await;

    let messages = transfer(&harness, PRIVATE_BASE).await;
    let first = &messages[0];
    let last = &messages[messages.len() - 1];

    for msg in &messages {
        assert_response_code(msg, ResponseCode::NoError);
    }
    assert_eq!(soa_serial(first), soa_serial(last));
    assert_eq!(
        soa_serial(first),
        harness.state.serial(PRIVATE_BASE).unwrap()
    );

    assert!(messages[1]
        .answers()
        .iter()
        .all(|r| r.record_type() == RecordType::NS));

    let batches = &messages[2..messages.len() - 1];
    assert!(batches.len() >= 3, "got {} batches", batches.len());
    assert!(batches.iter().all(|m| m.answers().len() <= BATCH));

    let hosts = batches
        .iter()
        .flat_map(|m| m.answers())
        .filter(|r| r.name().to_string().starts_with("host"))
        .count();
    assert_eq!(hosts, 450);
    assert!(batches
        .iter()
        .flat_map(|m| m.answers())
        .all(|r| r.name().to_string().ends_with(".cloud.example.com.")));
}

#[tokio::test]
async fn public_transfer_includes_proxy_records() {
    let harness = TestHarness::new(test_inventory());
    harness.sync().await;

    let messages = transfer(&harness, PUBLIC_BASE).await;
    let head = messages[1].answers();

    assert_eq!(
        record_types(head),
        vec![RecordType::NS, RecordType::NS, RecordType::A]
    );
    assert_eq!(extract_a_ips(head), vec![PROXY_IP.parse::<Ipv4Addr>().unwrap()]);
}

#[tokio::test]
async fn reverse_zone_transfer() {
    let inventory = test_inventory();
    inventory.add_vm(vm("vm-1", "web1", "u1", &["10.0.0.5"]));
    let harness = TestHarness::new(inventory);
    harness.sync().await;

    let messages = transfer(&harness, "0.0.10.in-addr.arpa").await;
    assert_eq!(messages.len(), 4);

    let ptrs: Vec<(String, String)> = messages[2]
        .answers()
        .iter()
        .map(|r| match r.data() {
            RData::PTR(ptr) => (r.name().to_string(), ptr.0.to_string()),
            other => panic!("expected PTR, got {other:?}"),
        })
        .collect();
    assert_eq!(
        ptrs,
        vec![
            (
                "1.0.0.10.in-addr.arpa.".to_string(),
                "cn1.cloud.example.com.".to_string()
            ),
            (
                "5.0.0.10.in-addr.arpa.".to_string(),
                "alice-web1.cloud.example.com.".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn transfer_below_apex_is_name_error() {
    let harness = TestHarness::new(test_inventory());
    harness.sync().await;

    let messages = transfer(&harness, "www.cloud.example.com").await;
    assert_eq!(messages.len(), 1);
    assert_name_error(&messages[0]);
}
