//! Container backends, cluster acquisition, and file transfer for cxfer.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod cluster;
pub mod container;
pub mod exec;
pub mod state;
