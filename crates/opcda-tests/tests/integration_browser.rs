// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Browser Integration Tests
//!
//! Namespace browsing against the simulated server:
//!
//! - Cursor navigation and enumeration
//! - Behaviour when the session is lost
//! - Materializing the namespace into a tree
//!
//! ## Test Categories
//!
//! - `test_browse_*`: Navigation and enumeration
//! - `test_disconnected_*`: Lost session
//! - `test_build_tree_*`: Materialization
//! - `test_create_tree_*`: One-shot materialization
//! - `test_lifetime_*`: Release of cursor and session

use opcda_tests::prelude::*;

// =============================================================================
// Test Helpers
// =============================================================================

fn open_browser(driver: &Arc<SimulatedDriver>) -> Browser<SimulatedDriver> {
    init_test_logging();
    Browser::new(Arc::clone(driver), PROG_ID, &nodes()).expect("browser")
}

// =============================================================================
// Navigation Tests
// =============================================================================

#[test]
fn test_browse_starts_at_root() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);

    assert!(browser.is_connected());
    assert_eq!(browser.position(), "");
    assert_eq!(browser.show_branches(), vec!["numeric", "textual", "storage"]);
    assert_eq!(browser.show_leafs(), vec![Leaf::new("bandwidth", "bandwidth")]);
}

#[test]
fn test_browse_down_and_up() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);

    browser.move_down("numeric");
    assert_eq!(browser.position(), "numeric");
    assert_eq!(browser.show_branches(), vec!["sin", "saw"]);
    assert!(browser.show_leafs().is_empty());

    browser.move_down("sin");
    assert_eq!(
        browser.show_leafs(),
        vec![
            Leaf::new("int64", "numeric.sin.int64"),
            Leaf::new("float", "numeric.sin.float"),
        ]
    );

    browser.move_up();
    assert_eq!(browser.position(), "numeric");
    browser.move_to_root();
    assert_eq!(browser.position(), "");
}

#[test]
fn test_browse_move_to_absolute_path() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);

    browser.move_to(&["storage", "numeric"]);
    assert_eq!(browser.position(), "storage.numeric");
    assert_eq!(
        browser.show_leafs(),
        vec![Leaf::new("reg01", "storage.numeric.reg01")]
    );
    assert!(browser.show_branches().is_empty());
}

#[test]
fn test_browse_unknown_branch_is_ignored() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);
    browser.move_down("textual");

    browser.move_down("no-such-branch");
    browser.move_to(&["numeric", "cos"]);

    assert_eq!(browser.position(), "textual");
    assert_eq!(browser.show_leafs(), vec![Leaf::new("random", "textual.random")]);
}

#[test]
fn test_browse_move_up_invalidates_branch_list() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);
    browser.move_down("numeric");
    browser.move_down("sin");
    browser.move_up();

    browser.move_down("saw");
    assert_eq!(browser.position(), "numeric");

    assert_eq!(browser.show_branches(), vec!["sin", "saw"]);
    browser.move_down("saw");
    assert_eq!(browser.position(), "numeric.saw");
}

#[test]
fn test_browse_navigation_errors_are_swallowed() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);
    browser.move_down("numeric");
    assert_eq!(browser.position(), "numeric");

    driver.fail(FailPoint::Navigation);
    browser.move_up();
    assert!(browser.show_branches().is_empty());
    assert!(browser.show_leafs().is_empty());
    // Last known position is kept.
    assert_eq!(browser.position(), "numeric");

    driver.heal(FailPoint::Navigation);
    assert_eq!(browser.show_branches(), vec!["sin", "saw"]);
}

// =============================================================================
// Disconnected Tests
// =============================================================================

#[test]
fn test_disconnected_browser_is_inert() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);
    browser.move_down("numeric");
    assert_eq!(browser.position(), "numeric");
    let moves = driver.calls().moves_down;

    driver.set_running(false);
    assert!(!browser.is_connected());

    browser.move_down("sin");
    browser.move_to_root();
    assert!(browser.show_branches().is_empty());
    assert!(browser.show_leafs().is_empty());
    assert_eq!(browser.position(), "numeric");
    assert_eq!(driver.calls().moves_down, moves);
}

#[test]
fn test_disconnected_build_tree_fails() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);
    driver.set_running(false);

    let error = browser.build_tree().unwrap_err();
    assert!(matches!(error, OpcDaError::Connect(ConnectError::NotConnected)));
    assert_eq!(error.to_string(), "cannot browse because we are not connected");
}

// =============================================================================
// Materialization Tests
// =============================================================================

#[test]
fn test_build_tree_matches_namespace() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);

    let tree = browser.build_tree().unwrap();

    assert_eq!(&tree, driver.namespace());
    assert_eq!(tree.name, "root");
    assert_eq!(tree.collect_tags(), simulator_tags());
}

#[test]
fn test_build_tree_restores_cursor_and_balances_moves() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);
    browser.move_to(&["storage", "numeric"]);

    let tree = browser.build_tree().unwrap();

    assert_eq!(tree.leaf_count(), TreeFixtures::SIMULATOR_TAGS);
    assert_eq!(driver.cursor_paths(), vec![Vec::<String>::new()]);
    assert_eq!(browser.position(), "");

    let calls = driver.calls();
    // numeric, numeric.sin, numeric.saw, textual, storage, storage.numeric
    assert_eq!(calls.moves_down, 6);
    assert_eq!(calls.moves_up, calls.moves_down);
    // One listing per visited node plus one after every move back up.
    assert_eq!(calls.branch_listings, 7 + calls.moves_up);
}

#[test]
fn test_build_tree_sets_parent_paths() {
    let driver = DriverFixtures::with_namespace(TreeFixtures::sim_device());
    let browser = open_browser(&driver);

    let tree = browser.build_tree().unwrap();
    let dev1 = tree.extract_branch_by_names(&["sim", "dev1"]).unwrap();

    assert_eq!(dev1.path, vec!["root", "sim"]);
    assert_eq!(dev1.parent(), Some("sim"));
    assert_eq!(dev1.collect_tags(), vec!["sim.dev1.t1", "sim.dev1.t2"]);
}

#[test]
fn test_build_tree_empty_namespace() {
    let driver = DriverFixtures::with_namespace(Tree::new("root"));
    let browser = open_browser(&driver);

    let tree = browser.build_tree().unwrap();
    assert!(tree.branches.is_empty());
    assert!(tree.leaves.is_empty());
}

#[test]
fn test_build_tree_reports_driver_errors() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);
    driver.fail(FailPoint::Navigation);

    let error = browser.build_tree().unwrap_err();
    assert!(matches!(error, OpcDaError::Driver(_)));
}

#[test]
fn test_build_tree_twice() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);

    let first = browser.build_tree().unwrap();
    let second = browser.build_tree().unwrap();
    assert_eq!(first, second);
}

// =============================================================================
// One-shot Tests
// =============================================================================

#[test]
fn test_create_tree() {
    init_test_logging();
    let driver = DriverFixtures::simulator();

    let tree = create_tree(Arc::clone(&driver), PROG_ID, &nodes()).unwrap();

    assert_eq!(tree.collect_tags().len(), TreeFixtures::SIMULATOR_TAGS);
    assert_eq!(
        tree.extract_branch_by_name("textual").unwrap().collect_tags(),
        vec!["textual.random"]
    );
    assert_no_leaks(&driver);
}

#[test]
fn test_create_tree_unreachable_server() {
    let driver = DriverFixtures::simulator();
    driver.set_reachable_nodes(&[]);

    let error = create_tree(Arc::clone(&driver), PROG_ID, &["node-a"]).unwrap_err();
    assert_aggregate_keys(&error, &["node-a"]);
    assert_no_leaks(&driver);
}

#[test]
fn test_create_tree_cursor_failure() {
    let driver = DriverFixtures::simulator();
    driver.fail(FailPoint::Cursor);

    let error = create_tree(Arc::clone(&driver), PROG_ID, &nodes()).unwrap_err();
    assert!(matches!(
        error,
        OpcDaError::Connect(ConnectError::CursorUnavailable { .. })
    ));
    assert_eq!(error.to_string(), "failed to create OPCBrowser");
    assert_no_leaks(&driver);
}

#[test]
fn test_build_tree_failure_then_close() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);
    driver.fail(FailPoint::Navigation);
    assert!(browser.build_tree().is_err());

    browser.close();
    assert_no_leaks(&driver);
}

// =============================================================================
// Lifetime Tests
// =============================================================================

#[test]
fn test_lifetime_close_releases_cursor_and_session() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);
    assert_eq!(driver.cursor_paths().len(), 1);

    browser.close();
    assert!(driver.cursor_paths().is_empty());
    assert_no_leaks(&driver);
}

#[test]
fn test_lifetime_drop_releases() {
    let driver = DriverFixtures::simulator();
    {
        let _browser = open_browser(&driver);
    }
    assert_no_leaks(&driver);
}

#[test]
fn test_lifetime_browser_from_config() {
    let driver = DriverFixtures::simulator();
    let config = ClientConfig::builder()
        .server(PROG_ID)
        .nodes(["plant-host", NODE])
        .build()
        .unwrap();
    driver.set_reachable_nodes(&[NODE]);

    let browser = Browser::from_config(Arc::clone(&driver), &config).unwrap();
    assert!(browser.is_connected());
    assert_eq!(driver.calls().connects, 2);
}

#[test]
fn test_lifetime_browser_and_connection_coexist() {
    let driver = DriverFixtures::simulator();
    let browser = open_browser(&driver);
    let connection =
        Connection::new(Arc::clone(&driver), PROG_ID, nodes(), &["bandwidth"]).unwrap();

    let tree = browser.build_tree().unwrap();
    let tags = tree.collect_tags();
    connection.add(&tags).unwrap();
    assert_eq!(connection.read().len(), TreeFixtures::SIMULATOR_TAGS);

    browser.close();
    assert!(connection.is_connected());
    connection.close();
    assert_no_leaks(&driver);
}
