// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Sample namespaces and ready-made simulated servers.

use std::sync::Arc;

use opcda_core::tree::Tree;

use super::mocks::SimulatedDriver;

/// Program identifier of the simulated server.
pub const PROG_ID: &str = "Graybox.Simulator.1";

/// Node the simulated server listens on.
pub const NODE: &str = "localhost";

/// Namespace fixtures.
pub struct TreeFixtures;

impl TreeFixtures {
    /// `bandwidth` at the root, two leaves under `options`, three under
    /// `numeric`.
    pub fn sample() -> Tree {
        Tree::new("root")
            .with_leaf("bandwidth", "bandwidth")
            .with_branch("options", |b| {
                b.with_leaf("frequency", "options.frequency")
                    .with_leaf("amplitude", "options.amplitude")
            })
            .with_branch("numeric", |b| {
                b.with_leaf("sin", "numeric.sin")
                    .with_leaf("cos", "numeric.cos")
                    .with_leaf("tan", "numeric.tan")
            })
    }

    /// root → sim → dev1 with leaves `sim.dev1.t1` and `sim.dev1.t2`.
    pub fn sim_device() -> Tree {
        Tree::new("root").with_branch("sim", |s| {
            s.with_branch("dev1", |d| {
                d.with_leaf("t1", "sim.dev1.t1").with_leaf("t2", "sim.dev1.t2")
            })
        })
    }

    /// A namespace shaped like a typical simulation server.
    pub fn simulator() -> Tree {
        Tree::new("root")
            .with_leaf("bandwidth", "bandwidth")
            .with_branch("numeric", |n| {
                n.with_branch("sin", |b| {
                    b.with_leaf("int64", "numeric.sin.int64")
                        .with_leaf("float", "numeric.sin.float")
                })
                .with_branch("saw", |b| {
                    b.with_leaf("int64", "numeric.saw.int64")
                        .with_leaf("float", "numeric.saw.float")
                })
            })
            .with_branch("textual", |t| t.with_leaf("random", "textual.random"))
            .with_branch("storage", |s| {
                s.with_branch("numeric", |n| n.with_leaf("reg01", "storage.numeric.reg01"))
            })
    }

    /// Number of tags in [`TreeFixtures::simulator`].
    pub const SIMULATOR_TAGS: usize = 7;
}

/// Simulated server fixtures.
pub struct DriverFixtures;

impl DriverFixtures {
    /// A running server exposing [`TreeFixtures::simulator`] with distinct
    /// values per tag.
    pub fn simulator() -> Arc<SimulatedDriver> {
        let driver = SimulatedDriver::new(PROG_ID, TreeFixtures::simulator());
        driver.set_value("bandwidth", 1024i32);
        driver.set_value("numeric.sin.int64", 42i64);
        driver.set_value("numeric.sin.float", 0.5f32);
        driver.set_value("numeric.saw.int64", 7i64);
        driver.set_value("numeric.saw.float", 1.25f32);
        driver.set_value("textual.random", "lorem");
        driver.set_value("storage.numeric.reg01", 0i32);
        driver.shared()
    }

    /// A running server exposing `namespace`.
    pub fn with_namespace(namespace: Tree) -> Arc<SimulatedDriver> {
        SimulatedDriver::new(PROG_ID, namespace).shared()
    }
}

/// Node list with only the fixture node.
pub fn nodes() -> Vec<String> {
    vec![NODE.to_string()]
}

/// Every tag of the simulator namespace.
pub fn simulator_tags() -> Vec<String> {
    TreeFixtures::simulator().collect_tags()
}
