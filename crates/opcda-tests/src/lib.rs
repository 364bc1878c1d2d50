// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # OPC DA Client Integration Tests
//!
//! Integration tests for the OPC DA client, run against an in-memory
//! simulated server.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `mocks`: [`SimulatedDriver`](common::SimulatedDriver) with failure
//!     injection and handle accounting
//!   - `fixtures`: sample namespaces and servers
//!   - `assertions`: custom assertion helpers
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p opcda-tests
//!
//! # Run specific test suite
//! cargo test -p opcda-tests --test integration_tree
//! cargo test -p opcda-tests --test integration_registry
//! cargo test -p opcda-tests --test integration_connection
//! cargo test -p opcda-tests --test integration_browser
//! cargo test -p opcda-tests --test integration_config
//!
//! # Show client logs
//! RUST_LOG=opcda_client=trace cargo test -p opcda-tests -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! ### Tree Tests (`integration_tree.rs`)
//! - Branch extraction by name and by name path
//! - Tag collection order
//! - Rendering
//!
//! ### Registry Tests (`integration_registry.rs`)
//! - Connect sequence and its step errors
//! - Partial batch adds, removal, write-only flags
//!
//! ### Connection Tests (`integration_connection.rs`)
//! - Reads, writes, implicit write-only registration
//! - Recovery after an outage
//! - Handle release on close and on failed construction
//!
//! ### Browser Tests (`integration_browser.rs`)
//! - Navigation, enumeration, behaviour when disconnected
//! - Tree materialization
//!
//! ### Config Tests (`integration_config.rs`)
//! - YAML, TOML and JSON files
//! - Environment variable overrides

pub mod common;

/// Prelude for convenient imports in tests.
pub mod prelude {
    pub use crate::common::*;
    pub use opcda_client::{
        create_tree, Browser, ClientConfig, ConfigFormat, ConfigLoader, Connection,
        ItemRegistry, RecoveryPolicy, RetryStrategy,
    };
    pub use opcda_core::{
        ConnectError, ConnectionState, DriverError, Item, ItemError, Leaf, OpcDaError, Quality,
        ServerDriver, Tree, Value,
    };
    pub use std::sync::Arc;
    pub use std::time::Duration;
}
