//! HTTP inbound adapter exposing the relay's REST endpoints.

pub mod clients;
pub mod emit;
pub mod error;
pub mod health;
pub mod state;

pub use error::{ApiResult, json_config};
