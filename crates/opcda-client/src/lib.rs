// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Blocking OPC DA client.
//!
//! This crate drives an OPC DA server through any [`ServerDriver`]
//! implementation. It provides:
//!
//! - [`Connection`]: a thread-safe working set of tags with cached reads,
//!   writes and automatic reconnect
//! - [`Browser`]: cursor based navigation of the server namespace and
//!   materialization into a [`Tree`]
//! - [`ClientConfig`] / [`ConfigLoader`]: settings from code or YAML, TOML
//!   and JSON files
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐     ┌──────────────────────────┐
//! │        Connection        │     │         Browser          │
//! │  Mutex ─► ItemRegistry   │     │  Mutex ─► cursor         │
//! │  recovery loop           │     │  build_tree ─► Tree      │
//! └────────────┬─────────────┘     └────────────┬─────────────┘
//!              │ session::try_connect           │
//!              ▼                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ServerDriver (Arc<D>)                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A connection and a browser each own their own session and never share
//! locks.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use opcda_client::{ClientConfig, Connection};
//!
//! let config = ClientConfig::builder()
//!     .server("Graybox.Simulator.1")
//!     .node("localhost")
//!     .tags(["numeric.sin.int64", "numeric.saw.float"])
//!     .build()?;
//!
//! let connection = Connection::from_config(Arc::new(driver), &config)?;
//! for (tag, item) in connection.read() {
//!     println!("{tag}: {item}");
//! }
//! connection.write("numeric.sin.int64", 42i64)?;
//! connection.close();
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod browser;
pub mod config;
pub mod connection;
pub mod recovery;
pub mod registry;
pub mod session;

pub use browser::{create_tree, Browser};
pub use config::{load_config, ClientConfig, ClientConfigBuilder, ConfigFormat, ConfigLoader};
pub use connection::{Connection, ConnectionStats};
pub use recovery::{RecoveryPolicy, RetryStrategy};
pub use registry::{Entry, ItemRegistry};

pub use opcda_core::{
    ConnectionState, DriverError, Item, Leaf, OpcDaError, OpcDaResult, Quality, ServerDriver,
    Tree, Value,
};
