// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Working set of tags registered on the server.
//!
//! An [`ItemRegistry`] owns one item container handle and one item handle per
//! registered tag. Tags marked write-only stay registered but are skipped by
//! bulk reads.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use opcda_core::driver::{ContainerHandle, ItemHandle, ServerDriver};
use opcda_core::error::{AggregateError, DriverResult, ItemError, OpcDaResult};
use opcda_core::types::{DataSource, Item, Quality, Value};
use tracing::{debug, trace};

/// Client handle passed to the driver for every added item.
pub const CLIENT_HANDLE: i32 = 1;

/// Context of the aggregate returned by a batch add.
pub const ADD_TAGS_CONTEXT: &str = "failed to add tags";

/// A registered tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Driver item handle.
    pub handle: ItemHandle,

    /// Excluded from bulk reads.
    pub write_only: bool,
}

/// Tags registered in one item container.
pub struct ItemRegistry<D: ServerDriver> {
    driver: Arc<D>,
    container: Option<ContainerHandle>,
    items: BTreeMap<String, Entry>,
}

impl<D: ServerDriver> ItemRegistry<D> {
    /// Wraps an item container; the registry takes ownership of the handle.
    pub fn new(driver: Arc<D>, container: ContainerHandle) -> Self {
        Self {
            driver,
            container: Some(container),
            items: BTreeMap::new(),
        }
    }

    /// Returns the container handle, `None` once closed.
    pub fn container(&self) -> Option<ContainerHandle> {
        self.container
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Adds every tag independently.
    ///
    /// Tags that succeed stay registered. Failures are collected into an
    /// [`AggregateError`] keyed by tag.
    pub fn add<S: AsRef<str>>(&mut self, tags: &[S]) -> OpcDaResult<()> {
        let mut errors = AggregateError::new(ADD_TAGS_CONTEXT);
        for tag in tags {
            let tag = tag.as_ref();
            if let Err(e) = self.add_single(tag) {
                debug!(tag, error = %e, "Tag rejected");
                errors.push(tag, e);
            }
        }
        errors.into_result()
    }

    /// Registers one tag as read-write.
    ///
    /// A tag that is already registered gets a fresh handle; the old one is
    /// released.
    pub fn add_single(&mut self, tag: &str) -> Result<(), ItemError> {
        let container = self.container.ok_or_else(|| ItemError::ContainerClosed {
            tag: tag.to_string(),
        })?;

        let handle = self
            .driver
            .add_item(container, tag, CLIENT_HANDLE)
            .map_err(|e| ItemError::tag_not_found(tag, e))?
            .ok_or_else(|| ItemError::NoHandle {
                tag: tag.to_string(),
            })?;

        let entry = Entry {
            handle,
            write_only: false,
        };
        if let Some(previous) = self.items.insert(tag.to_string(), entry) {
            self.driver.release(previous.handle.into());
        }
        trace!(tag, handle = %handle, "Tag added");
        Ok(())
    }

    /// Releases and forgets `tag`. Unknown tags are ignored.
    pub fn remove(&mut self, tag: &str) {
        if let Some(entry) = self.items.remove(tag) {
            self.driver.release(entry.handle.into());
            trace!(tag, "Tag removed");
        }
    }

    /// Returns the entry of `tag`.
    pub fn get(&self, tag: &str) -> Option<Entry> {
        self.items.get(tag).copied()
    }

    /// Returns `true` if `tag` is registered.
    pub fn contains(&self, tag: &str) -> bool {
        self.items.contains_key(tag)
    }

    /// Returns every registered tag.
    pub fn tags(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    /// Returns the tags included in bulk reads.
    pub fn readable(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|(_, entry)| !entry.write_only)
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    /// Number of registered tags.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `true` if `tag` is registered and write-only.
    pub fn is_write_only(&self, tag: &str) -> bool {
        self.items.get(tag).is_some_and(|entry| entry.write_only)
    }

    /// Sets the write-only flag. Returns `false` if `tag` is not registered.
    pub fn set_write_only(&mut self, tag: &str, write_only: bool) -> bool {
        match self.items.get_mut(tag) {
            Some(entry) => {
                entry.write_only = write_only;
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // I/O
    // =========================================================================

    /// Reads `tag` from the server cache.
    pub fn read(&self, tag: &str) -> Result<Item, ItemError> {
        let entry = self.get(tag).ok_or_else(|| ItemError::not_registered(tag))?;
        self.read_handle(entry.handle)
            .map_err(|e| ItemError::read_failed(tag, e))
    }

    /// Reads an item handle from the server cache and normalizes its quality.
    pub fn read_handle(&self, handle: ItemHandle) -> DriverResult<Item> {
        let raw = self.driver.read(handle, DataSource::Cache)?;
        Ok(Item {
            value: raw.value,
            quality: Quality::normalize(&raw.quality),
            timestamp: raw.timestamp,
        })
    }

    /// Writes `value` to `tag`.
    pub fn write(&self, tag: &str, value: &Value) -> Result<(), ItemError> {
        let entry = self.get(tag).ok_or_else(|| ItemError::not_registered(tag))?;
        self.write_handle(entry.handle, value)
            .map_err(|e| ItemError::write_failed(tag, e))
    }

    /// Writes `value` to an item handle as is.
    pub fn write_handle(&self, handle: ItemHandle, value: &Value) -> DriverResult<()> {
        self.driver.write(handle, value)
    }

    // =========================================================================
    // Lifetime
    // =========================================================================

    /// Releases every item handle and the container. Safe to call twice.
    pub fn close(&mut self) {
        let released = self.items.len();
        for (_, entry) in std::mem::take(&mut self.items) {
            self.driver.release(entry.handle.into());
        }
        if let Some(container) = self.container.take() {
            self.driver.release(container.into());
            debug!(items = released, "Item registry closed");
        }
    }
}

impl<D: ServerDriver> Drop for ItemRegistry<D> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<D: ServerDriver> fmt::Debug for ItemRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemRegistry")
            .field("driver", &self.driver.name())
            .field("container", &self.container)
            .field("items", &self.items)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
