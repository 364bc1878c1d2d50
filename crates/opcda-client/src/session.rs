// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session setup shared by [`Connection`](crate::Connection) and
//! [`Browser`](crate::Browser).
//!
//! # Connect Sequence
//!
//! ```text
//! disconnect (if connected)
//!   └─► connect(server, node)
//!         └─► grouping ─► group ─► item container
//!                                     │
//!              release grouping + group
//! ```
//!
//! Every step maps to its own [`ConnectError`] variant. Nothing is retried
//! here; [`try_connect`] walks the node list and the connection's recovery
//! loop repeats the whole sequence.

use std::sync::Arc;

use opcda_core::driver::{ServerDriver, SessionHandle};
use opcda_core::error::{AggregateError, ConnectError, OpcDaResult};
use opcda_core::types::ServerState;
use tracing::{debug, info, warn};

use crate::registry::ItemRegistry;

/// Context of the aggregate returned when every node failed.
pub const TRY_CONNECT_CONTEXT: &str = "TryConnect was not successful";

/// Connects `session` to `server` on `node` and opens an item container.
pub fn connect<D: ServerDriver>(
    driver: &Arc<D>,
    session: SessionHandle,
    server: &str,
    node: &str,
) -> OpcDaResult<ItemRegistry<D>> {
    disconnect(driver.as_ref(), session);

    driver
        .connect(session, server, node)
        .map_err(|source| ConnectError::connection_failed(server, node, source))?;

    let grouping = driver
        .create_grouping(session)
        .map_err(|source| ConnectError::GroupingUnavailable { source })?;

    let group = match driver.add_group(grouping) {
        Ok(group) => group,
        Err(source) => {
            driver.release(grouping.into());
            return Err(ConnectError::AddGroupFailed { source }.into());
        }
    };

    let container = driver.item_container(group);
    driver.release(group.into());
    driver.release(grouping.into());
    let container = container.map_err(|source| ConnectError::ContainerUnavailable { source })?;

    debug!(server, node, container = %container, "Session connected");
    Ok(ItemRegistry::new(Arc::clone(driver), container))
}

/// Tries [`connect`] against each node in order and returns the first success.
///
/// When every node fails the per-node errors are aggregated, keyed by node.
pub fn try_connect<D, S>(
    driver: &Arc<D>,
    session: SessionHandle,
    server: &str,
    nodes: &[S],
) -> OpcDaResult<ItemRegistry<D>>
where
    D: ServerDriver,
    S: AsRef<str>,
{
    let mut errors = AggregateError::new(TRY_CONNECT_CONTEXT);

    for node in nodes {
        let node = node.as_ref();
        match connect(driver, session, server, node) {
            Ok(registry) => {
                info!(server, node, driver = driver.name(), "Connected to OPC server");
                return Ok(registry);
            }
            Err(e) => {
                debug!(server, node, error = %e, "Node refused connection");
                errors.push(node, e);
            }
        }
    }

    Err(errors.into())
}

/// Returns `true` if the server behind `session` reports the running state.
///
/// A failing state query counts as disconnected.
pub fn is_connected<D: ServerDriver + ?Sized>(driver: &D, session: SessionHandle) -> bool {
    matches!(
        driver.server_state(session),
        Ok(code) if code == ServerState::RUNNING_CODE
    )
}

/// Disconnects `session` if it is connected. Failures are only logged.
pub fn disconnect<D: ServerDriver + ?Sized>(driver: &D, session: SessionHandle) {
    if is_connected(driver, session) {
        if let Err(e) = driver.disconnect(session) {
            warn!(session = %session, error = %e, "Disconnect failed");
        }
    }
}

/// Disconnects and releases `session`.
pub fn release_session<D: ServerDriver + ?Sized>(driver: &D, session: SessionHandle) {
    disconnect(driver, session);
    driver.release(session.into());
}
