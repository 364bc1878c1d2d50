// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Namespace browsing.
//!
//! A [`Browser`] owns its own session and one browse cursor. Navigation is
//! best effort: when the session is not connected every call does nothing
//! and enumerations come back empty. Driver errors during navigation are
//! logged and dropped.
//!
//! [`Browser::build_tree`] walks the whole namespace into a [`Tree`] and is
//! the one browse operation that reports errors.

use std::fmt;
use std::sync::Arc;

use opcda_core::driver::{CursorHandle, ServerDriver, SessionHandle};
use opcda_core::error::{ConnectError, DriverResult, OpcDaResult};
use opcda_core::tree::{Leaf, Tree};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::session;

/// Name given to the root node of a materialized tree.
pub const ROOT_NAME: &str = "root";

struct BrowserState {
    cursor: Option<CursorHandle>,
    position: String,
    closed: bool,
}

/// Stateful navigation over the namespace of one server.
pub struct Browser<D: ServerDriver> {
    driver: Arc<D>,
    session: SessionHandle,
    state: Mutex<BrowserState>,
}

impl<D: ServerDriver> Browser<D> {
    /// Opens a session on the first node that answers and positions a
    /// cursor at the root.
    pub fn new<S: AsRef<str>>(driver: Arc<D>, server: &str, nodes: &[S]) -> OpcDaResult<Self> {
        let session = driver
            .create_session()
            .map_err(|source| ConnectError::SessionUnavailable { source })?;

        match session::try_connect(&driver, session, server, nodes) {
            // Browsing needs the session only, not an item container.
            Ok(mut registry) => registry.close(),
            Err(e) => {
                session::release_session(driver.as_ref(), session);
                return Err(e);
            }
        }

        let cursor = match driver.create_cursor(session) {
            Ok(cursor) => cursor,
            Err(source) => {
                session::release_session(driver.as_ref(), session);
                return Err(ConnectError::CursorUnavailable { source }.into());
            }
        };

        if let Err(e) = driver.move_to_root(cursor) {
            warn!(error = %e, "Cannot move browse cursor to root");
        }
        debug!(server, cursor = %cursor, "Browser ready");

        Ok(Self {
            driver,
            session,
            state: Mutex::new(BrowserState {
                cursor: Some(cursor),
                position: String::new(),
                closed: false,
            }),
        })
    }

    /// Opens a browser for the server and nodes of `config`.
    pub fn from_config(driver: Arc<D>, config: &ClientConfig) -> OpcDaResult<Self> {
        config.validate()?;
        Self::new(driver, &config.server, &config.nodes)
    }

    /// Returns `true` if the browser session reports the running state.
    pub fn is_connected(&self) -> bool {
        session::is_connected(self.driver.as_ref(), self.session)
    }

    fn live_cursor(&self, state: &BrowserState) -> Option<CursorHandle> {
        let cursor = state.cursor?;
        self.is_connected().then_some(cursor)
    }

    fn navigate(&self, op: &str, f: impl FnOnce(&D, CursorHandle) -> DriverResult<()>) {
        let state = self.state.lock();
        if let Some(cursor) = self.live_cursor(&state) {
            if let Err(e) = f(self.driver.as_ref(), cursor) {
                warn!(op, error = %e, "Browse navigation failed");
            }
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Moves to an absolute branch path.
    pub fn move_to<S: AsRef<str>>(&self, path: &[S]) {
        let path: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        self.navigate("move_to", |driver, cursor| driver.move_to(cursor, &path));
    }

    /// Moves to the root.
    pub fn move_to_root(&self) {
        self.navigate("move_to_root", |driver, cursor| driver.move_to_root(cursor));
    }

    /// Moves one level up.
    ///
    /// Some servers drop the branch list here; call [`Browser::show_branches`]
    /// before the next [`Browser::move_down`].
    pub fn move_up(&self) {
        self.navigate("move_up", |driver, cursor| driver.move_up(cursor));
    }

    /// Moves into `branch`.
    pub fn move_down(&self, branch: &str) {
        self.navigate("move_down", |driver, cursor| driver.move_down(cursor, branch));
    }

    /// Current cursor position.
    ///
    /// Falls back to the last known position when disconnected or when the
    /// query fails.
    pub fn position(&self) -> String {
        let mut state = self.state.lock();
        if let Some(cursor) = self.live_cursor(&state) {
            match self.driver.current_position(cursor) {
                Ok(position) => state.position = position,
                Err(e) => warn!(error = %e, "Cannot query browse position"),
            }
        }
        state.position.clone()
    }

    // =========================================================================
    // Enumeration
    // =========================================================================

    /// Branch names under the current position.
    pub fn show_branches(&self) -> Vec<String> {
        let state = self.state.lock();
        let Some(cursor) = self.live_cursor(&state) else {
            return Vec::new();
        };
        self.driver.show_branches(cursor).unwrap_or_else(|e| {
            warn!(error = %e, "Cannot list branches");
            Vec::new()
        })
    }

    /// Leaves under the current position, with their tag identifiers.
    pub fn show_leafs(&self) -> Vec<Leaf> {
        let state = self.state.lock();
        let Some(cursor) = self.live_cursor(&state) else {
            return Vec::new();
        };
        leaves_at(self.driver.as_ref(), cursor).unwrap_or_else(|e| {
            warn!(error = %e, "Cannot list leaves");
            Vec::new()
        })
    }

    /// Moves to the root and materializes the whole namespace.
    pub fn build_tree(&self) -> OpcDaResult<Tree> {
        let mut state = self.state.lock();
        let cursor = self.live_cursor(&state).ok_or(ConnectError::NotConnected)?;

        self.driver.move_to_root(cursor)?;
        let mut root = Tree::new(ROOT_NAME);
        materialize(self.driver.as_ref(), cursor, &mut root)?;

        if let Ok(position) = self.driver.current_position(cursor) {
            state.position = position;
        }
        debug!(tags = root.leaf_count(), "Namespace materialized");
        Ok(root)
    }

    // =========================================================================
    // Lifetime
    // =========================================================================

    /// Releases the cursor and the session.
    pub fn close(self) {
        self.shutdown();
    }

    fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        if let Some(cursor) = state.cursor.take() {
            self.driver.release(cursor.into());
        }
        session::release_session(self.driver.as_ref(), self.session);
        state.closed = true;
        debug!("Browser closed");
    }
}

impl<D: ServerDriver> Drop for Browser<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<D: ServerDriver> fmt::Debug for Browser<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Browser")
            .field("driver", &self.driver.name())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Materialization
// =============================================================================

fn leaves_at<D: ServerDriver + ?Sized>(
    driver: &D,
    cursor: CursorHandle,
) -> DriverResult<Vec<Leaf>> {
    driver
        .show_leafs(cursor)?
        .into_iter()
        .map(|name| {
            let item_id = driver.item_id(cursor, &name)?;
            Ok(Leaf::new(name, item_id))
        })
        .collect()
}

/// Fills `node` from the cursor position, depth first.
///
/// The cursor is back where it started when this returns, also on error,
/// unless moving back up is what failed.
fn materialize<D: ServerDriver + ?Sized>(
    driver: &D,
    cursor: CursorHandle,
    node: &mut Tree,
) -> DriverResult<()> {
    for leaf in leaves_at(driver, cursor)? {
        node.push_leaf(leaf);
    }

    // Moving up invalidates the branch list on some servers, so it is
    // fetched again after every child.
    let mut branches = driver.show_branches(cursor)?;
    let mut index = 0;
    while index < branches.len() {
        let name = branches[index].clone();
        driver.move_down(cursor, &name)?;

        let mut child = Tree::child_of(node, name);
        let walked = materialize(driver, cursor, &mut child);
        driver.move_up(cursor)?;
        walked?;

        node.push_branch(child);
        branches = driver.show_branches(cursor)?;
        index += 1;
    }

    Ok(())
}

/// Connects a throwaway browser, materializes the namespace and releases
/// everything again.
pub fn create_tree<D, S>(driver: Arc<D>, server: &str, nodes: &[S]) -> OpcDaResult<Tree>
where
    D: ServerDriver,
    S: AsRef<str>,
{
    let browser = Browser::new(driver, server, nodes)?;
    let tree = browser.build_tree();
    browser.close();
    tree
}
