//! rctl-cli: Command-line interface for rctl
//!
//! Provides the `rctl` binary: save connection settings, run commands,
//! power and service operations, and watch the connection's health.

pub mod commands;
pub mod output;
