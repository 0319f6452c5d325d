//! Netwarden daemon library.
//!
//! Exposes the daemon's building blocks for integration testing.
//! In production `netwarden-daemon` runs as a binary (main.rs).

pub mod cli;
pub mod consumers;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
pub mod pid;
pub mod source;
