//! CLI command implementations
//!
//! This module contains the implementation of all CLI subcommands.

pub mod config;
pub mod connect;
mod prompt;
mod render;
pub mod stats;
