//! Command implementations for the CLI
//!
//! - ask: Send one prompt through the agent
//! - config: Configuration display and validation
//! - costs: Show the persisted cost counters

pub mod ask;
pub mod config;
pub mod costs;
