// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection manager.
//!
//! A [`Connection`] owns one driver session and the [`ItemRegistry`] of the
//! tags it works with. Every operation that touches the registry runs under
//! one mutex, so callers on any number of threads are fully serialized.
//!
//! # Recovery
//!
//! A failed read does not surface as an error. The caller gets a zero
//! [`Item`] (or a shortened map from [`Connection::read`]) and the
//! connection checks the server state. If the server is gone it reconnects,
//! on the calling thread and inside the lock, until a node answers again:
//!
//! ```text
//!            read failed
//!                 │
//!        connected? ── yes ──► done
//!                 │ no
//!                 ▼
//!   ┌──► close registry, try_connect ── ok ──► re-add tags ──► done
//!   │             │ err
//!   └── sleep(policy.delay_for_attempt(n))
//! ```
//!
//! Re-added tags come back read-write. [`Connection::state`] reports
//! [`ConnectionState::Recovering`] while the loop runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use opcda_core::driver::{ServerDriver, SessionHandle};
use opcda_core::error::{ConnectError, ItemError, OpcDaError, OpcDaResult};
use opcda_core::types::{ConnectionState, Item, Value};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::recovery::RecoveryPolicy;
use crate::registry::ItemRegistry;
use crate::session;

// =============================================================================
// ConnectionStats
// =============================================================================

/// Operation counters of a connection.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    reads: AtomicU64,
    read_failures: AtomicU64,
    writes: AtomicU64,
    recoveries: AtomicU64,
    reconnect_attempts: AtomicU64,
}

impl ConnectionStats {
    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_recovery(&self) {
        self.recoveries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Successful item reads.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Failed item reads.
    pub fn read_failures(&self) -> u64 {
        self.read_failures.load(Ordering::Relaxed)
    }

    /// Successful writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Completed recoveries.
    pub fn recoveries(&self) -> u64 {
        self.recoveries.load(Ordering::Relaxed)
    }

    /// Reconnect attempts made by recovery loops, successful or not.
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Guarded part of a connection.
struct Inner<D: ServerDriver> {
    registry: Option<ItemRegistry<D>>,
    closed: bool,
}

/// A thread-safe, blocking connection to one OPC DA server.
pub struct Connection<D: ServerDriver> {
    driver: Arc<D>,
    session: SessionHandle,
    server: String,
    nodes: Vec<String>,
    policy: RecoveryPolicy,
    inner: Mutex<Inner<D>>,
    recovering: AtomicBool,
    stats: ConnectionStats,
}

impl<D: ServerDriver> Connection<D> {
    /// Connects to `server` on the first node that answers and adds `tags`.
    ///
    /// If any tag cannot be added everything acquired so far is released and
    /// the aggregate error is returned.
    pub fn new<S: AsRef<str>>(
        driver: Arc<D>,
        server: impl Into<String>,
        nodes: Vec<String>,
        tags: &[S],
    ) -> OpcDaResult<Self> {
        Self::with_policy(driver, server, nodes, tags, RecoveryPolicy::default())
    }

    /// Same as [`Connection::new`] with an explicit recovery policy.
    pub fn with_policy<S: AsRef<str>>(
        driver: Arc<D>,
        server: impl Into<String>,
        nodes: Vec<String>,
        tags: &[S],
        policy: RecoveryPolicy,
    ) -> OpcDaResult<Self> {
        let server = server.into();
        let session = driver
            .create_session()
            .map_err(|source| ConnectError::SessionUnavailable { source })?;

        let mut registry = match session::try_connect(&driver, session, &server, &nodes) {
            Ok(registry) => registry,
            Err(e) => {
                session::release_session(driver.as_ref(), session);
                return Err(e);
            }
        };

        if let Err(e) = registry.add(tags) {
            registry.close();
            session::release_session(driver.as_ref(), session);
            return Err(e);
        }

        info!(
            server = %server,
            tags = registry.len(),
            "Connection established"
        );

        Ok(Self {
            driver,
            session,
            server,
            nodes,
            policy,
            inner: Mutex::new(Inner {
                registry: Some(registry),
                closed: false,
            }),
            recovering: AtomicBool::new(false),
            stats: ConnectionStats::default(),
        })
    }

    /// Builds a connection from a validated configuration.
    pub fn from_config(driver: Arc<D>, config: &ClientConfig) -> OpcDaResult<Self> {
        config.validate()?;
        Self::with_policy(
            driver,
            config.server.clone(),
            config.nodes.clone(),
            &config.tags,
            config.recovery,
        )
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Server program identifier.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Candidate nodes, in the order they are tried.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Recovery pacing.
    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    /// Operation counters.
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Driver session handle.
    pub fn session(&self) -> SessionHandle {
        self.session
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Returns `true` if the server reports the running state.
    ///
    /// Does not take the lock; a failing state query counts as disconnected.
    pub fn is_connected(&self) -> bool {
        session::is_connected(self.driver.as_ref(), self.session)
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        if self.recovering.load(Ordering::Acquire) {
            ConnectionState::Recovering
        } else if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    // =========================================================================
    // Reads and writes
    // =========================================================================

    /// Reads one registered tag.
    ///
    /// Unknown tags and failed reads yield [`Item::default`]. A failed read
    /// also runs recovery before returning.
    pub fn read_item(&self, tag: &str) -> Item {
        let mut inner = self.inner.lock();
        let Some(registry) = inner.registry.as_ref() else {
            warn!(tag, "Read on closed connection");
            return Item::default();
        };

        match registry.read(tag) {
            Ok(item) => {
                self.stats.record_read();
                item
            }
            Err(e @ ItemError::NotRegistered { .. }) => {
                warn!(tag, "{e}");
                Item::default()
            }
            Err(e) => {
                self.stats.record_read_failure();
                OpcDaError::from(e).log("read_item");
                self.fix(&mut inner);
                Item::default()
            }
        }
    }

    /// Reads every tag that is not write-only.
    ///
    /// The first failure stops the pass and runs recovery; tags not reached
    /// are absent from the result.
    pub fn read(&self) -> HashMap<String, Item> {
        let mut inner = self.inner.lock();
        let mut items = HashMap::new();
        let Some(registry) = inner.registry.as_ref() else {
            warn!("Read on closed connection");
            return items;
        };

        let mut failure = None;
        for tag in registry.readable() {
            match registry.read(&tag) {
                Ok(item) => {
                    self.stats.record_read();
                    items.insert(tag, item);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            self.stats.record_read_failure();
            OpcDaError::from(e).log("read");
            self.fix(&mut inner);
        }
        items
    }

    /// Writes `value` to `tag`.
    ///
    /// An unknown tag is added first and marked write-only, so later bulk
    /// reads skip it.
    pub fn write(&self, tag: &str, value: impl Into<Value>) -> OpcDaResult<()> {
        let mut inner = self.inner.lock();
        let registry = inner.registry.as_mut().ok_or(ConnectError::Closed)?;

        if !registry.contains(tag) {
            registry
                .add_single(tag)
                .map_err(|e| ItemError::AddFailed {
                    tag: tag.to_string(),
                    source: Box::new(e),
                })?;
            registry.set_write_only(tag, true);
            debug!(tag, "Tag added as write-only");
        }

        registry.write(tag, &value.into())?;
        self.stats.record_write();
        Ok(())
    }

    // =========================================================================
    // Working set
    // =========================================================================

    /// Adds tags; see [`ItemRegistry::add`].
    pub fn add<S: AsRef<str>>(&self, tags: &[S]) -> OpcDaResult<()> {
        let mut inner = self.inner.lock();
        let registry = inner.registry.as_mut().ok_or(ConnectError::Closed)?;
        registry.add(tags)
    }

    /// Removes a tag; absent tags are ignored.
    pub fn remove(&self, tag: &str) {
        if let Some(registry) = self.inner.lock().registry.as_mut() {
            registry.remove(tag);
        }
    }

    /// Snapshot of the registered tags.
    pub fn tags(&self) -> Vec<String> {
        self.inner
            .lock()
            .registry
            .as_ref()
            .map(ItemRegistry::tags)
            .unwrap_or_default()
    }

    // =========================================================================
    // Server queries
    // =========================================================================

    /// Lists the servers installed on `node`. Empty on failure.
    pub fn list_servers(&self, node: &str) -> Vec<String> {
        match self.driver.list_servers(node) {
            Ok(servers) => servers.into_iter().filter(|s| !s.is_empty()).collect(),
            Err(e) => {
                warn!(node, error = %e, "Cannot list OPC servers");
                Vec::new()
            }
        }
    }

    /// Lists the public groups of the server. Empty when disconnected.
    pub fn public_group_names(&self) -> Vec<String> {
        if !self.is_connected() {
            return Vec::new();
        }
        match self.driver.public_groups(self.session) {
            Ok(groups) => groups.into_iter().filter(|g| !g.is_empty()).collect(),
            Err(e) => {
                warn!(error = %e, "Cannot list public groups");
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Lifetime
    // =========================================================================

    /// Releases the registry, disconnects and releases the session.
    ///
    /// Later calls are no-ops. Reads return zero items afterwards and
    /// writes fail with [`ConnectError::Closed`].
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        if let Some(mut registry) = inner.registry.take() {
            registry.close();
        }
        session::release_session(self.driver.as_ref(), self.session);
        inner.closed = true;
        info!(server = %self.server, "Connection closed");
    }

    /// Reconnects and re-adds every tag when the session is lost.
    ///
    /// Blocks until a node answers. Runs with the lock held.
    fn fix(&self, inner: &mut Inner<D>) {
        if self.is_connected() {
            debug!("Read failed but server is still running, skipping recovery");
            return;
        }

        self.recovering.store(true, Ordering::Release);
        let tags = inner
            .registry
            .as_ref()
            .map(ItemRegistry::tags)
            .unwrap_or_default();
        warn!(server = %self.server, tags = tags.len(), "Connection lost, recovering");

        let mut attempt: u32 = 0;
        let mut registry = loop {
            if let Some(mut old) = inner.registry.take() {
                old.close();
            }
            self.stats.record_reconnect_attempt();
            match session::try_connect(&self.driver, self.session, &self.server, &self.nodes) {
                Ok(registry) => break registry,
                Err(e) => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(attempt, delay = ?delay, error = %e, "Reconnect failed");
                    thread::sleep(delay);
                    attempt = attempt.saturating_add(1);
                }
            }
        };

        if let Err(e) = registry.add(&tags) {
            e.log("recovery");
        }
        info!(
            added = registry.len(),
            expected = tags.len(),
            attempts = attempt.saturating_add(1),
            "Connection recovered"
        );

        inner.registry = Some(registry);
        self.stats.record_recovery();
        self.recovering.store(false, Ordering::Release);
    }
}

impl<D: ServerDriver> Drop for Connection<D> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<D: ServerDriver> fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("driver", &self.driver.name())
            .field("server", &self.server)
            .field("nodes", &self.nodes)
            .field("session", &self.session)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
