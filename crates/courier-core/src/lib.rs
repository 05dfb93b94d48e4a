//! courier-core: Shared types, errors, and configuration
//!
//! This crate provides the foundational types used across the Courier workspace,
//! including the ledger data provider interface the other crates build on.

pub mod config;
pub mod errors;
pub mod provider;
pub mod types;

pub use config::*;
pub use errors::*;
pub use provider::LedgerProvider;
pub use types::*;
