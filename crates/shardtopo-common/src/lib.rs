//! shardtopo Common - Shared types and utilities
//!
//! This crate provides the error taxonomy, configuration and domain types
//! used by the store adapters and the topology server.

pub mod config;
pub mod error;
pub mod types;

pub use config::TopoConfig;
pub use error::{Error, ErrorCode, Result, ResultExt};
pub use types::*;
