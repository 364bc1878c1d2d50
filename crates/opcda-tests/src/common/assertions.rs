// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Custom Test Assertions
//!
//! Domain-specific assertion helpers with informative failure messages.

use std::thread;
use std::time::{Duration, Instant};

use opcda_core::error::OpcDaError;
use opcda_core::types::{Item, Quality, Value};

use super::mocks::SimulatedDriver;

// =============================================================================
// Item Assertions
// =============================================================================

/// Assertion extensions for [`Item`].
pub trait ItemAssertions {
    /// Assert that the item has good quality.
    fn assert_good_quality(&self);

    /// Assert that the item has a specific quality code.
    fn assert_quality(&self, expected: Quality);

    /// Assert that the value matches.
    fn assert_value(&self, expected: impl Into<Value>);

    /// Assert that this is the zero item returned when no read happened.
    fn assert_zero(&self);
}

impl ItemAssertions for Item {
    fn assert_good_quality(&self) {
        assert!(
            self.quality.is_good(),
            "Expected good quality, but got {} for {}",
            self.quality,
            self
        );
    }

    fn assert_quality(&self, expected: Quality) {
        assert_eq!(
            self.quality, expected,
            "Expected quality {}, but got {}",
            expected, self.quality
        );
    }

    fn assert_value(&self, expected: impl Into<Value>) {
        let expected = expected.into();
        assert_eq!(
            self.value, expected,
            "Expected value {:?}, but got {:?}",
            expected, self.value
        );
    }

    fn assert_zero(&self) {
        assert!(self.is_zero(), "Expected the zero item, but got {self}");
    }
}

// =============================================================================
// Driver Assertions
// =============================================================================

/// Assert that every handle the driver handed out was released exactly once.
pub fn assert_no_leaks(driver: &SimulatedDriver) {
    assert_eq!(
        driver.live_handles(),
        0,
        "Leaked handles: {:?}",
        driver.live_handle_list()
    );
    assert_eq!(
        driver.calls().unknown_releases,
        0,
        "Handles were released twice or never existed"
    );
}

// =============================================================================
// Collection Assertions
// =============================================================================

/// Assert that two tag lists hold the same tags, ignoring order.
pub fn assert_same_tags<A, B>(actual: &[A], expected: &[B])
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let mut actual: Vec<&str> = actual.iter().map(|t| t.as_ref()).collect();
    let mut expected: Vec<&str> = expected.iter().map(|t| t.as_ref()).collect();
    actual.sort_unstable();
    expected.sort_unstable();
    assert_eq!(actual, expected, "Tag sets differ");
}

// =============================================================================
// Error Assertions
// =============================================================================

/// Assert that an error is an aggregate failing exactly for `keys`.
pub fn assert_aggregate_keys(error: &OpcDaError, keys: &[&str]) {
    match error {
        OpcDaError::Aggregate(aggregate) => {
            assert_eq!(aggregate.failed_keys(), keys, "Unexpected failing keys in {error}");
        }
        other => panic!("Expected aggregate error, got: {other}"),
    }
}

// =============================================================================
// Timing
// =============================================================================

/// Polls `condition` until it holds or `timeout` elapses.
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
