//! Command implementations for the CLI
//!
//! - serve: Start the datasource server
//! - check: Probe the remote logging service once
//! - groups: List log groups of a folder
//! - config: Configuration display and validation

pub mod check;
pub mod config;
pub mod groups;
pub mod serve;
