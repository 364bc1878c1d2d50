// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core types for the OPC DA client.
//!
//! This crate holds everything the client needs that does not talk to a
//! server on its own: the error hierarchy, the value and quality model, the
//! [`ServerDriver`] capability a platform binding implements, the namespace
//! [`Tree`] and the diagnostic sink.
//!
//! # Error Handling
//!
//! ```text
//! OpcDaError
//! ├── Connect    - Session, group and item container setup
//! ├── Item       - Per-tag add/read/write failures
//! ├── Aggregate  - Several failures from one batch call
//! ├── Config     - Invalid or unreadable client configuration
//! └── Driver     - Raw failure reported by the server driver
//! ```
//!
//! # Example
//!
//! ```
//! use opcda_core::{Quality, Tree, Value};
//!
//! let tree = Tree::new("root")
//!     .with_leaf("bandwidth", "bandwidth")
//!     .with_branch("numeric", |b| b.with_leaf("sin", "numeric.sin"));
//!
//! assert_eq!(tree.collect_tags(), vec!["bandwidth", "numeric.sin"]);
//! assert_eq!(Quality::normalize(&Value::I32(40000)), Quality::UNKNOWN);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod driver;
pub mod error;
pub mod logging;
pub mod tree;
pub mod types;

// Re-export commonly used types
pub use error::{
    AggregateError, ConfigError, ConnectError, DriverError, DriverResult, ErrorSeverity, Failure,
    ItemError, OpcDaError, OpcDaResult,
};

pub use types::{ConnectionState, DataSource, Item, Quality, ServerState, Value};

pub use driver::{
    ContainerHandle, CursorHandle, GroupHandle, GroupingHandle, Handle, ItemHandle, RawReading,
    ServerDriver, SessionHandle,
};

pub use tree::{Leaf, Tree};

pub use logging::{LogFormat, LoggingError};
