// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Simulated Driver
//!
//! An in-memory [`ServerDriver`] that behaves like a single OPC DA server.
//!
//! ## Design Principles
//!
//! - The address space is an ordinary [`Tree`]; its leaves are the known tags
//! - Every handle it hands out is tracked until released, so tests can check
//!   for leaks and double releases
//! - Failures can be injected per setup step, per tag, or as a server outage
//!   that ends after a number of reconnect attempts
//! - Thread-safe; one mutex guards the whole simulated server

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use opcda_core::driver::{
    ContainerHandle, CursorHandle, GroupHandle, GroupingHandle, Handle, ItemHandle, RawReading,
    ServerDriver, SessionHandle,
};
use opcda_core::error::{DriverError, DriverResult};
use opcda_core::tree::Tree;
use opcda_core::types::{DataSource, Quality, ServerState, Value};

/// Error code used for every simulated automation failure (`E_FAIL`).
pub const E_FAIL: i32 = -2147467259;

const RPC_UNAVAILABLE: &str = "The RPC server is unavailable.\r\n";

/// Error code for tags outside the address space (`OPC_E_UNKNOWNITEMID`).
pub const OPC_E_UNKNOWNITEMID: i32 = -1073479673;

// =============================================================================
// Failure points
// =============================================================================

/// A driver call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// `create_session`.
    Session,
    /// `connect`.
    Connect,
    /// `create_grouping`.
    Grouping,
    /// `add_group`.
    Group,
    /// `item_container`.
    Container,
    /// `create_cursor`.
    Cursor,
    /// Every `write`.
    Write,
    /// Every cursor navigation call.
    Navigation,
    /// `list_servers`.
    ListServers,
}

/// Call counters, see [`SimulatedDriver::calls`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Attempts to connect a session, failed ones included.
    pub connects: u64,
    /// Disconnects of a connected session.
    pub disconnects: u64,
    /// `add_item` calls.
    pub adds: u64,
    /// Successful cached reads.
    pub reads: u64,
    /// Failed cached reads.
    pub failed_reads: u64,
    /// Reads that asked for the device instead of the cache.
    pub device_reads: u64,
    /// Successful writes.
    pub writes: u64,
    /// `move_down` calls.
    pub moves_down: u64,
    /// `move_up` calls.
    pub moves_up: u64,
    /// `show_branches` calls that returned a listing.
    pub branch_listings: u64,
    /// Releases of handles that were not live.
    pub unknown_releases: u64,
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone)]
struct Reading {
    value: Value,
    quality: Value,
}

#[derive(Debug)]
struct Cursor {
    session: u64,
    path: Vec<String>,
    /// Set by `move_up`; the branch list has to be fetched again before
    /// the next `move_down`.
    stale: bool,
}

#[derive(Debug, Default)]
struct SimState {
    next_handle: u64,
    running: bool,
    state_override: Option<i32>,
    outage: Option<usize>,
    reads_before_outage: Option<usize>,
    outage_attempts: Option<usize>,

    reachable_nodes: Option<HashSet<String>>,
    sessions: HashMap<u64, Option<String>>,
    live: HashMap<u64, Handle>,
    items: HashMap<u64, String>,
    cursors: HashMap<u64, Cursor>,

    values: HashMap<String, Reading>,
    rejected_tags: HashSet<String>,
    handleless_tags: HashSet<String>,
    failing_reads: HashSet<String>,
    fail_points: HashSet<FailPoint>,

    servers: Vec<String>,
    public_groups: Vec<String>,
    writes: Vec<(String, Value)>,
    calls: CallCounts,
}

impl SimState {
    fn allocate(&mut self, make: impl FnOnce(u64) -> Handle) -> u64 {
        self.next_handle += 1;
        let raw = self.next_handle;
        self.live.insert(raw, make(raw));
        raw
    }

    fn is_live(&self, raw: u64) -> bool {
        self.live.contains_key(&raw)
    }

    fn check(&self, point: FailPoint) -> DriverResult<()> {
        if self.fail_points.contains(&point) {
            Err(DriverError::with_code(E_FAIL, format!("simulated {point:?} failure")))
        } else {
            Ok(())
        }
    }

    fn session_connected(&self, session: u64) -> DriverResult<()> {
        match self.sessions.get(&session) {
            Some(Some(_)) if self.running => Ok(()),
            Some(_) => Err(DriverError::with_code(E_FAIL, "session is not connected")),
            None => Err(unknown_handle(session)),
        }
    }

    /// Takes the server down and drops every session.
    fn go_down(&mut self, attempts: Option<usize>) {
        self.running = false;
        self.outage = attempts;
        for node in self.sessions.values_mut() {
            *node = None;
        }
    }

    fn cursor(&self, cursor: CursorHandle) -> DriverResult<&Cursor> {
        let entry = self
            .cursors
            .get(&cursor.raw())
            .ok_or_else(|| unknown_handle(cursor.raw()))?;
        self.session_connected(entry.session)?;
        self.check(FailPoint::Navigation)?;
        Ok(entry)
    }
}

fn unknown_handle(raw: u64) -> DriverError {
    DriverError::with_code(E_FAIL, format!("unknown handle {raw}"))
}

fn navigate<'a>(root: &'a Tree, path: &[String]) -> Option<&'a Tree> {
    path.iter().try_fold(root, |node, name| {
        node.branches.iter().find(|branch| &branch.name == name)
    })
}

// =============================================================================
// SimulatedDriver
// =============================================================================

/// In-memory OPC DA server.
#[derive(Debug)]
pub struct SimulatedDriver {
    prog_id: String,
    namespace: Tree,
    state: Mutex<SimState>,
}

impl SimulatedDriver {
    /// Creates a running server named `prog_id` that exposes `namespace`.
    ///
    /// Every leaf of the namespace is a known tag with value `0i32` and good
    /// quality.
    pub fn new(prog_id: impl Into<String>, namespace: Tree) -> Self {
        let values = namespace
            .collect_tags()
            .into_iter()
            .map(|tag| {
                let reading = Reading {
                    value: Value::I32(0),
                    quality: Value::I16(Quality::GOOD.code()),
                };
                (tag, reading)
            })
            .collect();

        let prog_id = prog_id.into();
        Self {
            state: Mutex::new(SimState {
                running: true,
                values,
                servers: vec![prog_id.clone()],
                ..Default::default()
            }),
            prog_id,
            namespace,
        }
    }

    /// Wraps the driver in an `Arc`.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Program identifier the server answers to.
    pub fn prog_id(&self) -> &str {
        &self.prog_id
    }

    /// The simulated address space.
    pub fn namespace(&self) -> &Tree {
        &self.namespace
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Only the given nodes accept connections.
    pub fn set_reachable_nodes(&self, nodes: &[&str]) {
        self.state.lock().reachable_nodes = Some(nodes.iter().map(|n| n.to_string()).collect());
    }

    /// Servers reported by `list_servers`.
    pub fn set_servers(&self, servers: &[&str]) {
        self.state.lock().servers = servers.iter().map(|s| s.to_string()).collect();
    }

    /// Groups reported by `public_groups`.
    pub fn set_public_groups(&self, groups: &[&str]) {
        self.state.lock().public_groups = groups.iter().map(|g| g.to_string()).collect();
    }

    /// Sets the value of a tag, adding it to the address space if needed.
    pub fn set_value(&self, tag: &str, value: impl Into<Value>) {
        let mut state = self.state.lock();
        let value = value.into();
        state
            .values
            .entry(tag.to_string())
            .and_modify(|reading| reading.value = value.clone())
            .or_insert(Reading {
                value,
                quality: Value::I16(Quality::GOOD.code()),
            });
    }

    /// Sets the raw quality reported for a tag.
    pub fn set_raw_quality(&self, tag: &str, quality: impl Into<Value>) {
        if let Some(reading) = self.state.lock().values.get_mut(tag) {
            reading.quality = quality.into();
        }
    }

    /// Current value of a tag.
    pub fn value(&self, tag: &str) -> Option<Value> {
        self.state.lock().values.get(tag).map(|r| r.value.clone())
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.state.lock().writes.clone()
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    /// Makes every call of `point` fail.
    pub fn fail(&self, point: FailPoint) {
        self.state.lock().fail_points.insert(point);
    }

    /// Lets calls of `point` succeed again.
    pub fn heal(&self, point: FailPoint) {
        self.state.lock().fail_points.remove(&point);
    }

    /// `add_item` rejects `tag` as unknown.
    pub fn reject_tag(&self, tag: &str) {
        self.state.lock().rejected_tags.insert(tag.to_string());
    }

    /// `add_item` accepts `tag` but returns no handle.
    pub fn withhold_handle(&self, tag: &str) {
        self.state.lock().handleless_tags.insert(tag.to_string());
    }

    /// Reads of `tag` fail while the server keeps running.
    pub fn fail_reads_of(&self, tag: &str) {
        self.state.lock().failing_reads.insert(tag.to_string());
    }

    /// Reports `code` as the server state of connected sessions.
    pub fn set_server_state(&self, code: Option<i32>) {
        self.state.lock().state_override = code;
    }

    /// Starts or stops the server. Stopping drops every session.
    pub fn set_running(&self, running: bool) {
        let mut state = self.state.lock();
        if running {
            state.running = true;
            state.outage = None;
        } else {
            state.go_down(None);
        }
    }

    /// Stops the server until `attempts` connect calls have failed.
    pub fn start_outage(&self, attempts: usize) {
        self.state.lock().go_down(Some(attempts));
    }

    /// After `reads` more successful reads the server goes down, and stays
    /// down for `attempts` connect calls.
    pub fn outage_after_reads(&self, reads: usize, attempts: usize) {
        let mut state = self.state.lock();
        state.reads_before_outage = Some(reads);
        state.outage_attempts = Some(attempts);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Whether the simulated server is up.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Number of handles handed out and not released yet.
    pub fn live_handles(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Live handles, for diagnostics.
    pub fn live_handle_list(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.state.lock().live.values().copied().collect();
        handles.sort_by_key(|h| h.raw());
        handles
    }

    /// Number of live item handles.
    pub fn live_items(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Snapshot of the call counters.
    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    /// Current path of a cursor.
    pub fn cursor_path(&self, cursor: CursorHandle) -> Option<Vec<String>> {
        self.state
            .lock()
            .cursors
            .get(&cursor.raw())
            .map(|c| c.path.clone())
    }

    /// Paths of every live cursor.
    pub fn cursor_paths(&self) -> Vec<Vec<String>> {
        self.state
            .lock()
            .cursors
            .values()
            .map(|c| c.path.clone())
            .collect()
    }
}

impl ServerDriver for SimulatedDriver {
    fn name(&self) -> &str {
        "simulated"
    }

    fn create_session(&self) -> DriverResult<SessionHandle> {
        let mut state = self.state.lock();
        state.check(FailPoint::Session)?;
        let raw = state.allocate(|raw| SessionHandle(raw).into());
        state.sessions.insert(raw, None);
        Ok(SessionHandle(raw))
    }

    fn connect(&self, session: SessionHandle, server: &str, node: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.calls.connects += 1;
        if !state.sessions.contains_key(&session.raw()) {
            return Err(unknown_handle(session.raw()));
        }
        state.check(FailPoint::Connect)?;

        if !state.running {
            let outage = state.outage;
            match outage {
                Some(0) => {
                    state.running = true;
                    state.outage = None;
                }
                Some(remaining) => {
                    state.outage = Some(remaining - 1);
                    return Err(DriverError::with_code(E_FAIL, RPC_UNAVAILABLE));
                }
                None => {
                    return Err(DriverError::with_code(E_FAIL, RPC_UNAVAILABLE));
                }
            }
        }

        if server != self.prog_id {
            return Err(DriverError::with_code(E_FAIL, "Invalid class string\r\n")
                .with_sub_error(DriverError::new(format!("unknown server {server}"))));
        }
        if let Some(nodes) = &state.reachable_nodes {
            if !nodes.contains(node) {
                return Err(DriverError::with_code(E_FAIL, format!("node {node} unreachable")));
            }
        }

        state.sessions.insert(session.raw(), Some(node.to_string()));
        Ok(())
    }

    fn disconnect(&self, session: SessionHandle) -> DriverResult<()> {
        let mut state = self.state.lock();
        match state.sessions.get_mut(&session.raw()) {
            Some(node) => {
                if node.take().is_some() {
                    state.calls.disconnects += 1;
                }
                Ok(())
            }
            None => Err(unknown_handle(session.raw())),
        }
    }

    fn server_state(&self, session: SessionHandle) -> DriverResult<i32> {
        let state = self.state.lock();
        match state.sessions.get(&session.raw()) {
            None => Err(unknown_handle(session.raw())),
            Some(_) if !state.running => {
                Err(DriverError::with_code(E_FAIL, "The RPC server is unavailable."))
            }
            Some(None) => Ok(ServerState::Disconnected.code()),
            Some(Some(_)) => Ok(state.state_override.unwrap_or(ServerState::RUNNING_CODE)),
        }
    }

    fn list_servers(&self, _node: &str) -> DriverResult<Vec<String>> {
        let state = self.state.lock();
        state.check(FailPoint::ListServers)?;
        Ok(state.servers.clone())
    }

    fn public_groups(&self, session: SessionHandle) -> DriverResult<Vec<String>> {
        let state = self.state.lock();
        state.session_connected(session.raw())?;
        Ok(state.public_groups.clone())
    }

    fn create_grouping(&self, session: SessionHandle) -> DriverResult<GroupingHandle> {
        let mut state = self.state.lock();
        state.session_connected(session.raw())?;
        state.check(FailPoint::Grouping)?;
        Ok(GroupingHandle(state.allocate(|raw| GroupingHandle(raw).into())))
    }

    fn add_group(&self, grouping: GroupingHandle) -> DriverResult<GroupHandle> {
        let mut state = self.state.lock();
        if !state.is_live(grouping.raw()) {
            return Err(unknown_handle(grouping.raw()));
        }
        state.check(FailPoint::Group)?;
        Ok(GroupHandle(state.allocate(|raw| GroupHandle(raw).into())))
    }

    fn item_container(&self, group: GroupHandle) -> DriverResult<ContainerHandle> {
        let mut state = self.state.lock();
        if !state.is_live(group.raw()) {
            return Err(unknown_handle(group.raw()));
        }
        state.check(FailPoint::Container)?;
        Ok(ContainerHandle(state.allocate(|raw| ContainerHandle(raw).into())))
    }

    fn add_item(
        &self,
        container: ContainerHandle,
        tag: &str,
        _client_handle: i32,
    ) -> DriverResult<Option<ItemHandle>> {
        let mut state = self.state.lock();
        state.calls.adds += 1;
        if !state.is_live(container.raw()) {
            return Err(unknown_handle(container.raw()));
        }
        if !state.running {
            return Err(DriverError::with_code(E_FAIL, "The RPC server is unavailable."));
        }
        if state.rejected_tags.contains(tag) || !state.values.contains_key(tag) {
            return Err(DriverError::with_code(OPC_E_UNKNOWNITEMID, "Unknown item ID")
                .with_sub_error(DriverError::new(format!("{tag} is not in the address space"))));
        }
        if state.handleless_tags.contains(tag) {
            return Ok(None);
        }

        let raw = state.allocate(|raw| ItemHandle(raw).into());
        state.items.insert(raw, tag.to_string());
        Ok(Some(ItemHandle(raw)))
    }

    fn read(&self, item: ItemHandle, source: DataSource) -> DriverResult<RawReading> {
        let mut state = self.state.lock();
        if source == DataSource::Device {
            state.calls.device_reads += 1;
        }
        let tag = match state.items.get(&item.raw()) {
            Some(tag) => tag.clone(),
            None => return Err(unknown_handle(item.raw())),
        };

        if let Some(remaining) = state.reads_before_outage {
            if remaining == 0 {
                state.reads_before_outage = None;
                let attempts = state.outage_attempts.take();
                state.go_down(attempts);
            } else {
                state.reads_before_outage = Some(remaining - 1);
            }
        }

        if !state.running || state.failing_reads.contains(&tag) {
            state.calls.failed_reads += 1;
            return Err(DriverError::with_code(E_FAIL, format!("cannot read {tag}")));
        }

        let reading = state
            .values
            .get(&tag)
            .cloned()
            .ok_or_else(|| unknown_handle(item.raw()))?;
        state.calls.reads += 1;
        Ok(RawReading {
            value: reading.value,
            quality: reading.quality,
            timestamp: Utc::now(),
        })
    }

    fn write(&self, item: ItemHandle, value: &Value) -> DriverResult<()> {
        let mut state = self.state.lock();
        let tag = match state.items.get(&item.raw()) {
            Some(tag) => tag.clone(),
            None => return Err(unknown_handle(item.raw())),
        };
        if !state.running {
            return Err(DriverError::with_code(E_FAIL, "The RPC server is unavailable."));
        }
        state.check(FailPoint::Write)?;

        if let Some(reading) = state.values.get_mut(&tag) {
            reading.value = value.clone();
        }
        state.writes.push((tag, value.clone()));
        state.calls.writes += 1;
        Ok(())
    }

    fn create_cursor(&self, session: SessionHandle) -> DriverResult<CursorHandle> {
        let mut state = self.state.lock();
        state.session_connected(session.raw())?;
        state.check(FailPoint::Cursor)?;
        let raw = state.allocate(|raw| CursorHandle(raw).into());
        state.cursors.insert(
            raw,
            Cursor {
                session: session.raw(),
                path: Vec::new(),
                stale: false,
            },
        );
        Ok(CursorHandle(raw))
    }

    fn move_to_root(&self, cursor: CursorHandle) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.cursor(cursor)?;
        if let Some(entry) = state.cursors.get_mut(&cursor.raw()) {
            entry.path.clear();
            entry.stale = false;
        }
        Ok(())
    }

    fn move_up(&self, cursor: CursorHandle) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.cursor(cursor)?;
        state.calls.moves_up += 1;
        if let Some(entry) = state.cursors.get_mut(&cursor.raw()) {
            entry.path.pop();
            entry.stale = true;
        }
        Ok(())
    }

    fn move_down(&self, cursor: CursorHandle, branch: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        let current = state.cursor(cursor)?;
        let stale = current.stale;
        let mut path = current.path.clone();
        state.calls.moves_down += 1;
        if stale {
            return Err(DriverError::with_code(E_FAIL, "branch list is stale, list branches again"));
        }
        path.push(branch.to_string());
        if navigate(&self.namespace, &path).is_none() {
            return Err(DriverError::with_code(E_FAIL, format!("no branch {branch}")));
        }
        if let Some(entry) = state.cursors.get_mut(&cursor.raw()) {
            entry.path = path;
        }
        Ok(())
    }

    fn move_to(&self, cursor: CursorHandle, path: &[String]) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.cursor(cursor)?;
        if navigate(&self.namespace, path).is_none() {
            return Err(DriverError::with_code(E_FAIL, format!("no branch {}", path.join("."))));
        }
        if let Some(entry) = state.cursors.get_mut(&cursor.raw()) {
            entry.path = path.to_vec();
            entry.stale = false;
        }
        Ok(())
    }

    fn current_position(&self, cursor: CursorHandle) -> DriverResult<String> {
        let state = self.state.lock();
        Ok(state.cursor(cursor)?.path.join("."))
    }

    fn show_branches(&self, cursor: CursorHandle) -> DriverResult<Vec<String>> {
        let mut state = self.state.lock();
        let path = &state.cursor(cursor)?.path;
        let node = navigate(&self.namespace, path).ok_or_else(|| unknown_handle(cursor.raw()))?;
        let branches: Vec<String> = node.branches.iter().map(|b| b.name.clone()).collect();
        state.calls.branch_listings += 1;
        if let Some(entry) = state.cursors.get_mut(&cursor.raw()) {
            entry.stale = false;
        }
        Ok(branches)
    }

    fn show_leafs(&self, cursor: CursorHandle) -> DriverResult<Vec<String>> {
        let state = self.state.lock();
        let path = &state.cursor(cursor)?.path;
        let node = navigate(&self.namespace, path).ok_or_else(|| unknown_handle(cursor.raw()))?;
        Ok(node.leaves.iter().map(|l| l.name.clone()).collect())
    }

    fn item_id(&self, cursor: CursorHandle, leaf: &str) -> DriverResult<String> {
        let state = self.state.lock();
        let path = &state.cursor(cursor)?.path;
        navigate(&self.namespace, path)
            .and_then(|node| node.leaves.iter().find(|l| l.name == leaf))
            .map(|l| l.item_id.clone())
            .ok_or_else(|| DriverError::with_code(E_FAIL, format!("no leaf {leaf}")))
    }

    fn release(&self, handle: Handle) {
        let mut state = self.state.lock();
        let raw = handle.raw();
        if state.live.remove(&raw).is_none() {
            state.calls.unknown_releases += 1;
            return;
        }
        match handle {
            Handle::SessionHandle(_) => {
                state.sessions.remove(&raw);
            }
            Handle::ItemHandle(_) => {
                state.items.remove(&raw);
            }
            Handle::CursorHandle(_) => {
                state.cursors.remove(&raw);
            }
            _ => {}
        }
    }
}
