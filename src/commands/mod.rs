//! Command implementations for the CLI
//!
//! - start: Start the HTTP server
//! - test: Validate the configuration
//! - config: Display the effective configuration

pub mod config;
pub mod start;
