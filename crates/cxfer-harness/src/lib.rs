//! # cxfer-harness
//!
//! Drives the container file transfer interface through a fixed matrix of
//! round-trip cases and deliberately invalid writes, and reports per-case
//! outcomes.
//!
//! A run is linear: provision the cluster, execute every case in order,
//! tear the cluster down. Teardown happens on every exit path.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod case;
pub mod conformance;
pub mod report;
pub mod runner;
