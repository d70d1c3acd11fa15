//! End-to-end query tests.
//!
//! Zones are built by the real synchronizer from an in-memory inventory and
//! queried through `ZoneAuthority::handle_request()`. No network access
//! required.

mod common;

use std::net::Ipv4Addr;

use common::*;
use hickory_proto::op::{OpCode, ResponseCode};
use hickory_proto::rr::{RData, RecordType};

async fn harness_with_vms() -> TestHarness {
    let inventory = test_inventory();
    inventory.add_vm(vm("vm-1", "web1", "u1", &["10.0.0.5", "203.0.113.9"]));
    inventory.add_vm(vm("vm-2", "db", "u1", &["10.0.0.6"]));
    inventory.add_vm(vm("vm-3", "web1", "u2", &["10.0.0.7"]));
    let harness = TestHarness::new(inventory);
    harness.sync().await;
    harness
}

// =========================================================================
// Address records
// =========================================================================

#[tokio::test]
async fn private_zone_lists_every_address() {
    let harness = harness_with_vms().await;
    let msg = harness.query("alice-web1.cloud.example.com", RecordType::A).await;

    assert_a_response(&msg, &["10.0.0.5", "203.0.113.9"]);
    assert!(msg.authoritative());
    assert_eq!(
        record_types(msg.name_servers()),
        vec![RecordType::NS, RecordType::NS]
    );
}

#[tokio::test]
async fn public_zone_skips_rfc1918_addresses() {
    let harness = harness_with_vms().await;
    let msg = harness.query("alice-web1.example.com", RecordType::A).await;
    assert_a_response(&msg, &["203.0.113.9"]);
}

#[tokio::test]
async fn private_only_vm_is_cname_to_public_apex() {
    let harness = harness_with_vms().await;
    let msg = harness.query("alice-db.example.com", RecordType::A).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert_eq!(msg.answers().len(), 1);
    match msg.answers()[0].data() {
        RData::CNAME(cname) => assert_eq!(cname.0.to_string(), "example.com."),
        other => panic!("expected CNAME, got {other:?}"),
    }
}

#[tokio::test]
async fn short_alias_belongs_to_first_owner() {
    let harness = harness_with_vms().await;

    let short = harness.query("web1.cloud.example.com", RecordType::A).await;
    assert_a_response(&short, &["10.0.0.5", "203.0.113.9"]);

    let long = harness.query("bob-web1.cloud.example.com", RecordType::A).await;
    assert_a_response(&long, &["10.0.0.7"]);
}

#[tokio::test]
async fn compute_node_published_in_both_zones() {
    let harness = harness_with_vms().await;
    for name in [
        "cn1.cloud.example.com",
        "cn1.example.com",
        "node-uuid-1.cloud.example.com",
    ] {
        let msg = harness.query(name, RecordType::A).await;
        assert_a_response(&msg, &["10.0.0.1"]);
    }
}

#[tokio::test]
async fn query_names_are_case_insensitive() {
    let harness = harness_with_vms().await;
    let msg = harness.query("Alice-WEB1.Cloud.Example.com", RecordType::A).await;
    assert_a_response(&msg, &["10.0.0.5", "203.0.113.9"]);
}

// =========================================================================
// Static zone content
// =========================================================================

#[tokio::test]
async fn static_records_merged() {
    let harness = harness_with_vms().await;

    let web = harness.query("web.cloud.example.com", RecordType::A).await;
    assert_a_response(&web, &["192.0.2.10", "192.0.2.11"]);

    let wiki = harness.query("wiki.example.com", RecordType::CNAME).await;
    match wiki.answers()[0].data() {
        RData::CNAME(cname) => assert_eq!(cname.0.to_string(), "web.example.com."),
        other => panic!("expected CNAME, got {other:?}"),
    }

    let docs = harness.query("docs.cloud.example.com", RecordType::A).await;
    match docs.answers()[0].data() {
        RData::CNAME(cname) => assert_eq!(cname.0.to_string(), "pages.example.net."),
        other => panic!("expected CNAME, got {other:?}"),
    }
}

#[tokio::test]
async fn wildcard_absorbs_exactly_one_label() {
    let harness = harness_with_vms().await;

    let hit = harness.query("build.apps.cloud.example.com", RecordType::A).await;
    assert_a_response(&hit, &["192.0.2.99"]);

    let deep = harness.query("a.b.apps.cloud.example.com", RecordType::A).await;
    assert_name_error(&deep);

    let bare = harness.query("apps.cloud.example.com", RecordType::A).await;
    assert_name_error(&bare);
}

// =========================================================================
// TXT, PTR
// =========================================================================

#[tokio::test]
async fn txt_locator_for_vm_with_addresses() {
    let harness = harness_with_vms().await;
    let msg = harness.query("alice-web1.cloud.example.com", RecordType::TXT).await;

    assert_response_code(&msg, ResponseCode::NoError);
    match msg.answers()[0].data() {
        RData::TXT(txt) => assert_eq!(&*txt.txt_data()[0], b"vm-1@cn-uuid-1"),
        other => panic!("expected TXT, got {other:?}"),
    }
}

#[tokio::test]
async fn reverse_lookup_points_at_long_name() {
    let harness = harness_with_vms().await;

    let vm = harness.query("9.113.0.203.in-addr.arpa", RecordType::PTR).await;
    assert_response_code(&vm, ResponseCode::NoError);
    match vm.answers()[0].data() {
        RData::PTR(ptr) => assert_eq!(ptr.0.to_string(), "alice-web1.cloud.example.com."),
        other => panic!("expected PTR, got {other:?}"),
    }

    let node = harness.query("1.0.0.10.in-addr.arpa", RecordType::PTR).await;
    match node.answers()[0].data() {
        RData::PTR(ptr) => assert_eq!(ptr.0.to_string(), "cn1.cloud.example.com."),
        other => panic!("expected PTR, got {other:?}"),
    }
}

// =========================================================================
// Apex, SOA, NS
// =========================================================================

#[tokio::test]
async fn public_apex_answers_reverse_proxy() {
    let harness = harness_with_vms().await;
    let msg = harness.query("example.com", RecordType::A).await;
    assert_a_response(&msg, &[PROXY_IP]);
    assert_eq!(msg.answers()[0].ttl(), 3600);
}

#[tokio::test]
async fn private_apex_is_name_error() {
    let harness = harness_with_vms().await;
    let msg = harness.query("cloud.example.com", RecordType::A).await;
    assert_name_error(&msg);
}

#[tokio::test]
async fn soa_carries_ns_authority_and_self_additional() {
    let harness = harness_with_vms().await;
    let msg = harness.query("example.com", RecordType::SOA).await;

    assert_response_code(&msg, ResponseCode::NoError);
    match msg.answers()[0].data() {
        RData::SOA(soa) => {
            assert_eq!(soa.mname().to_string(), "ns1.example.com.");
            assert_eq!(soa.rname().to_string(), "hostmaster.example.com.");
            assert!(soa.serial() > 0x8000_0000);
        }
        other => panic!("expected SOA, got {other:?}"),
    }
    assert_eq!(
        record_types(msg.name_servers()),
        vec![RecordType::NS, RecordType::NS]
    );
    assert_eq!(extract_a_ips(msg.additionals()), vec![SELF_IP.parse::<Ipv4Addr>().unwrap()]);
}

#[tokio::test]
async fn ns_only_at_apex() {
    let harness = harness_with_vms().await;

    let apex = harness.query("cloud.example.com", RecordType::NS).await;
    let names: Vec<String> = apex
        .answers()
        .iter()
        .map(|r| match r.data() {
            RData::NS(ns) => ns.0.to_string(),
            other => panic!("expected NS, got {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["ns1.cloud.example.com.", "ns2.example.net."]);

    let below = harness.query("www.cloud.example.com", RecordType::NS).await;
    assert_name_error(&below);
}

#[tokio::test]
async fn server_name_resolves_to_self_records() {
    let harness = harness_with_vms().await;
    let msg = harness.query("ns1.cloud.example.com", RecordType::A).await;
    assert_a_response(&msg, &[SELF_IP]);
}

// =========================================================================
// Misses and unsupported requests
// =========================================================================

#[tokio::test]
async fn unknown_name_is_name_error_with_soa() {
    let harness = harness_with_vms().await;
    let msg = harness.query("nothing.cloud.example.com", RecordType::A).await;
    assert_name_error(&msg);
}

#[tokio::test]
async fn outside_zones_is_empty_noerror() {
    let harness = harness_with_vms().await;
    let msg = harness.query("www.example.org", RecordType::A).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert!(msg.answers().is_empty());
    assert!(msg.name_servers().is_empty());
    assert!(!msg.authoritative());
}

#[tokio::test]
async fn unsupported_type_is_empty_noerror() {
    let harness = harness_with_vms().await;
    let msg = harness.query("alice-web1.cloud.example.com", RecordType::MX).await;
    assert_response_code(&msg, ResponseCode::NoError);
    assert!(msg.answers().is_empty());
}

#[tokio::test]
async fn dynamic_update_not_implemented() {
    let harness = harness_with_vms().await;
    let request = build_request("cloud.example.com", RecordType::SOA, OpCode::Update);
    let messages = execute_request(&harness.authority, request).await;

    assert_eq!(messages.len(), 1);
    assert_response_code(&messages[0], ResponseCode::NotImp);
}

#[tokio::test]
async fn servfail_before_first_publish() {
    let harness = TestHarness::new(test_inventory());
    let msg = harness.query("cn1.cloud.example.com", RecordType::A).await;
    assert_response_code(&msg, ResponseCode::ServFail);
}
