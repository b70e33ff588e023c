//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL change source using Diesel
//! - **relay**: HTTP notifier for write-side processes outside the relay
//!
//! Adapters translate between domain types and infrastructure
//! representations and contain no relay logic.

pub mod persistence;
pub mod relay;
