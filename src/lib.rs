//! Engine crate for a multi-tenant, multi-threaded object-storage load generator.
//!
//! The binary (`src/main.rs`) wires together the modules below; this library
//! exists mainly so the integration tests and benches can exercise the engine
//! without going through the CLI.

pub mod adapter;
pub mod args;
pub mod classifier;
pub mod client;
pub mod config;
pub mod credentials;
pub mod logging;
pub mod monitor;
pub mod pattern;
pub mod report;
pub mod supervisor;
pub mod trace;
pub mod worker;

#[cfg(test)]
pub mod test_utils;
