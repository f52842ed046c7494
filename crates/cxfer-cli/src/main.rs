//! # cxfer: container file transfer conformance test
//!
//! Provisions a single-node cluster, checks that files written into the
//! container read back byte for byte and that invalid writes fail with the
//! expected classification, then tears the cluster down.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}
