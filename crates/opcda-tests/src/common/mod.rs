// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! Shared helpers for the integration suites.
//!
//! ## Module Structure
//!
//! - `mocks`: the simulated OPC DA server
//! - `fixtures`: sample namespaces and ready-made servers
//! - `assertions`: custom assertion helpers

pub mod assertions;
pub mod fixtures;
pub mod mocks;

// Re-exports for convenience
pub use assertions::*;
pub use fixtures::*;
pub use mocks::*;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize test logging. Call this at the start of a test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,opcda_client=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}
