//! Core Kernel - Foundational types for the group ledger
//!
//! This crate provides the building blocks shared by the billing engine and
//! its storage adapters:
//! - Exact decimal amounts with fixed-scale formatting
//! - Strongly-typed identifiers
//! - Port marker and health-check traits
//! - A shared error type for configuration and validation failures

pub mod amount;
pub mod error;
pub mod identifiers;
pub mod ports;

pub use amount::{Amount, AmountError, DISPLAY_SCALE, STORAGE_SCALE};
pub use error::CoreError;
pub use identifiers::AccountId;
pub use ports::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable};
