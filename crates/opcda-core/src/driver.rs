// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Server driver abstraction.
//!
//! The client never speaks OPC DA itself. Everything it needs from the
//! server goes through [`ServerDriver`], which a platform binding (the
//! automation object on Windows, or an in-memory simulator in tests)
//! implements.
//!
//! # Handles
//!
//! The driver hands out opaque handles for every object it creates. Their
//! owner gives them back through [`ServerDriver::release`] exactly once.
//!
//! ```text
//! SessionHandle ──► GroupingHandle ──► GroupHandle ──► ContainerHandle ──► ItemHandle
//!       │
//!       └─────────► CursorHandle
//! ```
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync`. The client serializes the calls it
//! makes on one session, but a connection and a browser may use the same
//! driver from different threads.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::DriverResult;
use crate::types::{DataSource, Value};

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u64);

            impl $name {
                /// Returns the raw handle value.
                #[inline]
                pub fn raw(self) -> u64 {
                    self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}#{}", stringify!($name), self.0)
                }
            }

            impl From<$name> for Handle {
                fn from(handle: $name) -> Self {
                    Handle::$name(handle)
                }
            }
        )*

        /// Any driver handle, for [`ServerDriver::release`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Handle {
            $(
                #[allow(missing_docs)]
                $name($name),
            )*
        }

        impl Handle {
            /// Returns the raw handle value.
            pub fn raw(self) -> u64 {
                match self {
                    $(Handle::$name(h) => h.0,)*
                }
            }
        }
    };
}

define_handle! {
    /// A server session (the automation server object).
    SessionHandle,
    /// The group collection of a session.
    GroupingHandle,
    /// One subscription group.
    GroupHandle,
    /// The item collection of a group.
    ContainerHandle,
    /// One registered item.
    ItemHandle,
    /// A namespace browse cursor.
    CursorHandle,
}

/// Raw result of a cached read, before quality normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    /// The value.
    pub value: Value,

    /// Quality as reported; some servers hand out wider integers than `i16`.
    pub quality: Value,

    /// Server timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Capability the client consumes to talk to an OPC DA server.
pub trait ServerDriver: Send + Sync {
    /// Returns a name for log lines.
    fn name(&self) -> &str;

    // =========================================================================
    // Session
    // =========================================================================

    /// Creates a new, unconnected session.
    fn create_session(&self) -> DriverResult<SessionHandle>;

    /// Connects `session` to `server` on `node`.
    fn connect(&self, session: SessionHandle, server: &str, node: &str) -> DriverResult<()>;

    /// Disconnects `session`.
    fn disconnect(&self, session: SessionHandle) -> DriverResult<()>;

    /// Returns the raw server state code; `1` means running.
    fn server_state(&self, session: SessionHandle) -> DriverResult<i32>;

    /// Lists the program identifiers of the servers installed on `node`.
    fn list_servers(&self, node: &str) -> DriverResult<Vec<String>>;

    /// Lists the public group names of the connected server.
    fn public_groups(&self, session: SessionHandle) -> DriverResult<Vec<String>>;

    // =========================================================================
    // Groups and items
    // =========================================================================

    /// Returns the group collection of `session`.
    fn create_grouping(&self, session: SessionHandle) -> DriverResult<GroupingHandle>;

    /// Adds a subscription group.
    fn add_group(&self, grouping: GroupingHandle) -> DriverResult<GroupHandle>;

    /// Returns the item collection of `group`.
    fn item_container(&self, group: GroupHandle) -> DriverResult<ContainerHandle>;

    /// Registers `tag`; fails if the tag is not in the server's address space.
    ///
    /// `Ok(None)` means the call went through but no usable handle came back.
    fn add_item(
        &self,
        container: ContainerHandle,
        tag: &str,
        client_handle: i32,
    ) -> DriverResult<Option<ItemHandle>>;

    /// Reads value, quality and timestamp from `source`.
    fn read(&self, item: ItemHandle, source: DataSource) -> DriverResult<RawReading>;

    /// Writes `value` unchanged to the item.
    fn write(&self, item: ItemHandle, value: &Value) -> DriverResult<()>;

    // =========================================================================
    // Browsing
    // =========================================================================

    /// Creates a browse cursor over the namespace of `session`.
    fn create_cursor(&self, session: SessionHandle) -> DriverResult<CursorHandle>;

    /// Moves the cursor to the root of the namespace.
    fn move_to_root(&self, cursor: CursorHandle) -> DriverResult<()>;

    /// Moves the cursor one level up.
    fn move_up(&self, cursor: CursorHandle) -> DriverResult<()>;

    /// Moves the cursor into `branch`.
    fn move_down(&self, cursor: CursorHandle, branch: &str) -> DriverResult<()>;

    /// Moves the cursor to the absolute branch path.
    fn move_to(&self, cursor: CursorHandle, path: &[String]) -> DriverResult<()>;

    /// Returns the current cursor position.
    fn current_position(&self, cursor: CursorHandle) -> DriverResult<String>;

    /// Lists the branch names under the cursor.
    fn show_branches(&self, cursor: CursorHandle) -> DriverResult<Vec<String>>;

    /// Lists the leaf names under the cursor.
    fn show_leafs(&self, cursor: CursorHandle) -> DriverResult<Vec<String>>;

    /// Resolves the tag identifier of a leaf under the cursor.
    fn item_id(&self, cursor: CursorHandle, leaf: &str) -> DriverResult<String>;

    // =========================================================================
    // Lifetime
    // =========================================================================

    /// Releases a handle. Releasing an unknown handle is ignored.
    fn release(&self, handle: Handle);
}
