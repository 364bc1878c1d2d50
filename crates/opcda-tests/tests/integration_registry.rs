// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Registry Integration Tests
//!
//! Session setup and the per-connection item registry against the
//! simulated server:
//!
//! - Connect sequence and the error of each setup step
//! - Trying several nodes in order
//! - Batch adds with partial failure, removal, write-only flags
//! - Quality normalization on read
//!
//! ## Test Categories
//!
//! - `test_connect_*`: Connect sequence
//! - `test_try_connect_*`: Node fallback
//! - `test_registry_*`: Registry membership and I/O

use opcda_client::session;
use opcda_tests::prelude::*;

// =============================================================================
// Test Helpers
// =============================================================================

fn open_registry(driver: &Arc<SimulatedDriver>) -> ItemRegistry<SimulatedDriver> {
    let session = driver.create_session().expect("session");
    session::connect(driver, session, PROG_ID, NODE).expect("connect")
}

fn connect_error(result: Result<ItemRegistry<SimulatedDriver>, OpcDaError>) -> ConnectError {
    match result {
        Err(OpcDaError::Connect(e)) => e,
        Err(other) => panic!("Expected connect error, got: {other}"),
        Ok(_) => panic!("Expected connect error, got a registry"),
    }
}

// =============================================================================
// Connect Sequence Tests
// =============================================================================

#[test]
fn test_connect_keeps_only_session_and_container() {
    let driver = DriverFixtures::simulator();
    let session = driver.create_session().unwrap();

    let mut registry = session::connect(&driver, session, PROG_ID, NODE).unwrap();
    assert!(session::is_connected(driver.as_ref(), session));
    assert!(registry.container().is_some());
    // Grouping and group are released right after the container is obtained.
    assert_eq!(driver.live_handles(), 2);

    registry.close();
    session::release_session(driver.as_ref(), session);
    assert_no_leaks(&driver);
}

#[test]
fn test_connect_reconnects_a_connected_session() {
    let driver = DriverFixtures::simulator();
    let session = driver.create_session().unwrap();

    let first = session::connect(&driver, session, PROG_ID, NODE).unwrap();
    let second = session::connect(&driver, session, PROG_ID, NODE).unwrap();

    assert_eq!(driver.calls().disconnects, 1);
    assert_ne!(first.container(), second.container());

    drop(first);
    drop(second);
    session::release_session(driver.as_ref(), session);
    assert_no_leaks(&driver);
}

#[test]
fn test_connect_unknown_server() {
    let driver = DriverFixtures::simulator();
    let session = driver.create_session().unwrap();

    let error = connect_error(session::connect(&driver, session, "Unknown.Server", NODE));
    assert!(matches!(error, ConnectError::ConnectionFailed { .. }));
    let message = error.to_string();
    assert!(message.starts_with("connection failed: code=-2147467259"), "{message}");
    assert!(message.contains("unknown server Unknown.Server"), "{message}");

    session::release_session(driver.as_ref(), session);
    assert_no_leaks(&driver);
}

#[test]
fn test_connect_grouping_failure() {
    let driver = DriverFixtures::simulator();
    driver.fail(FailPoint::Grouping);
    let session = driver.create_session().unwrap();

    let error = connect_error(session::connect(&driver, session, PROG_ID, NODE));
    assert_eq!(error.to_string(), "cannot get OPCGroups property");
    assert_eq!(error.step(), "grouping");

    session::release_session(driver.as_ref(), session);
    assert_no_leaks(&driver);
}

#[test]
fn test_connect_group_failure_releases_grouping() {
    let driver = DriverFixtures::simulator();
    driver.fail(FailPoint::Group);
    let session = driver.create_session().unwrap();

    let error = connect_error(session::connect(&driver, session, PROG_ID, NODE));
    assert_eq!(error.to_string(), "cannot add new OPC Group");
    assert_eq!(driver.live_handles(), 1);

    session::release_session(driver.as_ref(), session);
    assert_no_leaks(&driver);
}

#[test]
fn test_connect_container_failure_releases_group() {
    let driver = DriverFixtures::simulator();
    driver.fail(FailPoint::Container);
    let session = driver.create_session().unwrap();

    let error = connect_error(session::connect(&driver, session, PROG_ID, NODE));
    assert_eq!(error.to_string(), "cannot get OPC Items");
    assert_eq!(driver.live_handles(), 1);

    session::release_session(driver.as_ref(), session);
    assert_no_leaks(&driver);
}

// =============================================================================
// Node Fallback Tests
// =============================================================================

#[test]
fn test_try_connect_uses_first_reachable_node() {
    let driver = DriverFixtures::simulator();
    driver.set_reachable_nodes(&["backup-host"]);
    let session = driver.create_session().unwrap();

    let registry =
        session::try_connect(&driver, session, PROG_ID, &["plant-host", "backup-host"]).unwrap();
    assert!(session::is_connected(driver.as_ref(), session));
    assert_eq!(driver.calls().connects, 2);

    drop(registry);
    session::release_session(driver.as_ref(), session);
    assert_no_leaks(&driver);
}

#[test]
fn test_try_connect_aggregates_every_node() {
    let driver = DriverFixtures::simulator();
    driver.set_reachable_nodes(&[]);
    let session = driver.create_session().unwrap();

    let error = session::try_connect(&driver, session, PROG_ID, &["node-a", "node-b"]).unwrap_err();
    assert_aggregate_keys(&error, &["node-a", "node-b"]);

    let message = error.to_string();
    assert!(message.starts_with(session::TRY_CONNECT_CONTEXT), "{message}");
    assert!(message.contains("node node-a unreachable"), "{message}");
    assert!(message.contains(";; "), "{message}");

    session::release_session(driver.as_ref(), session);
    assert_no_leaks(&driver);
}

#[test]
fn test_try_connect_without_nodes() {
    let driver = DriverFixtures::simulator();
    let session = driver.create_session().unwrap();

    let none: [&str; 0] = [];
    let error = session::try_connect(&driver, session, PROG_ID, &none).unwrap_err();
    assert_aggregate_keys(&error, &[]);
    assert_eq!(error.to_string(), session::TRY_CONNECT_CONTEXT);

    session::release_session(driver.as_ref(), session);
}

#[test]
fn test_is_connected_reflects_server_state() {
    let driver = DriverFixtures::simulator();
    let session = driver.create_session().unwrap();
    assert!(!session::is_connected(driver.as_ref(), session));

    let _registry = session::connect(&driver, session, PROG_ID, NODE).unwrap();
    assert!(session::is_connected(driver.as_ref(), session));

    // Suspended servers do not count as connected.
    driver.set_server_state(Some(5));
    assert!(!session::is_connected(driver.as_ref(), session));

    driver.set_server_state(None);
    driver.set_running(false);
    assert!(!session::is_connected(driver.as_ref(), session));
}

// =============================================================================
// Registry Tests
// =============================================================================

#[test]
fn test_registry_partial_add_keeps_successes() {
    let driver = DriverFixtures::simulator();
    driver.reject_tag("numeric.saw.int64");
    let mut registry = open_registry(&driver);

    let error = registry
        .add(&["numeric.sin.int64", "numeric.saw.int64", "numeric.saw.float"])
        .unwrap_err();

    assert_aggregate_keys(&error, &["numeric.saw.int64"]);
    assert!(error.to_string().starts_with("failed to add tags: numeric.saw.int64: "));
    assert_same_tags(&registry.tags(), &["numeric.sin.int64", "numeric.saw.float"]);
    assert_eq!(driver.live_items(), 2);
}

#[test]
fn test_registry_unknown_tag_carries_driver_code() {
    let driver = DriverFixtures::simulator();
    let mut registry = open_registry(&driver);

    let error = registry.add_single("not.in.namespace").unwrap_err();
    match &error {
        ItemError::TagNotFound { tag, source } => {
            assert_eq!(tag, "not.in.namespace");
            assert_eq!(source.code(), Some(OPC_E_UNKNOWNITEMID));
            assert!(source.sub_error().is_some());
        }
        other => panic!("Expected TagNotFound, got: {other}"),
    }
    assert!(registry.is_empty());
}

#[test]
fn test_registry_missing_handle_is_a_failure() {
    let driver = DriverFixtures::simulator();
    driver.withhold_handle("bandwidth");
    let mut registry = open_registry(&driver);

    let error = registry.add_single("bandwidth").unwrap_err();
    assert!(matches!(error, ItemError::NoHandle { .. }));
    assert!(!registry.contains("bandwidth"));
}

#[test]
fn test_registry_readd_replaces_handle() {
    let driver = DriverFixtures::simulator();
    let mut registry = open_registry(&driver);

    registry.add_single("bandwidth").unwrap();
    let first = registry.get("bandwidth").unwrap().handle;
    registry.set_write_only("bandwidth", true);

    registry.add_single("bandwidth").unwrap();
    let second = registry.get("bandwidth").unwrap().handle;

    assert_ne!(first, second);
    assert!(!registry.is_write_only("bandwidth"));
    assert_eq!(driver.live_items(), 1);
    assert_eq!(driver.calls().unknown_releases, 0);
}

#[test]
fn test_registry_remove() {
    let driver = DriverFixtures::simulator();
    let mut registry = open_registry(&driver);
    registry.add(&["bandwidth", "textual.random"]).unwrap();

    registry.remove("bandwidth");
    registry.remove("bandwidth");
    registry.remove("never.added");

    assert_eq!(registry.tags(), vec!["textual.random"]);
    assert_eq!(driver.live_items(), 1);
    assert_eq!(driver.calls().unknown_releases, 0);
}

#[test]
fn test_registry_write_only_excluded_from_readable() {
    let driver = DriverFixtures::simulator();
    let mut registry = open_registry(&driver);
    registry
        .add(&["numeric.sin.int64", "numeric.saw.float"])
        .unwrap();

    assert!(registry.set_write_only("numeric.saw.float", true));
    assert!(!registry.set_write_only("never.added", true));

    assert_eq!(registry.readable(), vec!["numeric.sin.int64"]);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_registry_read_values() {
    let driver = DriverFixtures::simulator();
    let mut registry = open_registry(&driver);
    registry.add(&simulator_tags()).unwrap();

    let item = registry.read("numeric.sin.int64").unwrap();
    item.assert_good_quality();
    item.assert_value(42i64);

    registry.read("textual.random").unwrap().assert_value("lorem");

    let calls = driver.calls();
    assert_eq!(calls.reads, 2);
    assert_eq!(calls.device_reads, 0);
}

#[test]
fn test_registry_read_normalizes_quality() {
    let driver = DriverFixtures::simulator();
    let mut registry = open_registry(&driver);
    registry.add(&["bandwidth", "textual.random", "numeric.sin.float"]).unwrap();

    driver.set_raw_quality("bandwidth", 40000i32);
    driver.set_raw_quality("textual.random", 0x40i32);
    driver.set_raw_quality("numeric.sin.float", "good");

    registry.read("bandwidth").unwrap().assert_quality(Quality(0));
    let uncertain = registry.read("textual.random").unwrap();
    uncertain.assert_quality(Quality::UNCERTAIN);
    assert!(uncertain.quality.is_uncertain());
    registry.read("numeric.sin.float").unwrap().assert_quality(Quality::UNKNOWN);
}

#[test]
fn test_registry_read_unregistered() {
    let driver = DriverFixtures::simulator();
    let registry = open_registry(&driver);

    let error = registry.read("bandwidth").unwrap_err();
    assert_eq!(error.to_string(), "tag bandwidth not found, add it first");
}

#[test]
fn test_registry_write() {
    let driver = DriverFixtures::simulator();
    let mut registry = open_registry(&driver);
    registry.add(&["storage.numeric.reg01"]).unwrap();

    registry
        .write("storage.numeric.reg01", &Value::I32(17))
        .unwrap();

    assert_eq!(driver.value("storage.numeric.reg01"), Some(Value::I32(17)));
    assert_eq!(
        driver.writes(),
        vec![("storage.numeric.reg01".to_string(), Value::I32(17))]
    );
}

#[test]
fn test_registry_write_failure() {
    let driver = DriverFixtures::simulator();
    driver.fail(FailPoint::Write);
    let mut registry = open_registry(&driver);
    registry.add(&["storage.numeric.reg01"]).unwrap();

    let error = registry
        .write("storage.numeric.reg01", &Value::I32(1))
        .unwrap_err();
    assert!(matches!(error, ItemError::WriteFailed { .. }));
    assert!(driver.writes().is_empty());
}

#[test]
fn test_registry_close_releases_items_once() {
    let driver = DriverFixtures::simulator();
    let session = driver.create_session().unwrap();
    let mut registry = session::connect(&driver, session, PROG_ID, NODE).unwrap();
    registry.add(&simulator_tags()).unwrap();
    assert_eq!(driver.live_items(), TreeFixtures::SIMULATOR_TAGS);

    registry.close();
    registry.close();
    assert!(registry.is_empty());
    assert!(registry.container().is_none());

    // A closed registry refuses new tags without asking the server.
    let adds = driver.calls().adds;
    let error = registry.add_single("bandwidth").unwrap_err();
    assert!(matches!(error, ItemError::ContainerClosed { .. }));
    assert_eq!(error.tag(), "bandwidth");
    assert_eq!(driver.calls().adds, adds);

    drop(registry);
    session::release_session(driver.as_ref(), session);
    assert_no_leaks(&driver);
}
