//! # cxfer-common
//!
//! Shared types, the transfer error taxonomy, configuration models, and
//! constants used across the cxfer workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
