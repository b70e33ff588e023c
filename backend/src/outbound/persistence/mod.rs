//! PostgreSQL persistence adapters using Diesel with `diesel-async` and a
//! `bb8` pool.
//!
//! The relay only reads: [`DieselChangeSource`] answers the change-source
//! port for every tracked table.

mod diesel_change_source;
mod pool;

pub use diesel_change_source::{DEFAULT_STORE_TIMEOUT, DieselChangeSource};
pub use pool::{DbPool, PoolConfig, PoolError};
