//! Relay domain: tracked tables, change events, and the services that move
//! them from the data store to realtime connections.
//!
//! Public surface:
//! - `TableName`, `TrackedTables`: validated identifiers of polled tables.
//! - `ChangeEvent`, `OutboundEvent`, `EventName`: what flows through the relay.
//! - `BroadcastHub`, `ClientRegistry`, `CheckpointMap`: in-memory state.
//! - `IngestService`, `PollScheduler`: the two producers of broadcasts.
//! - `RelayContext`: the above wired together for the composition root.
//! - `Error`, `ErrorCode`: HTTP-facing error payload.

pub mod broadcast_hub;
pub mod checkpoint;
pub mod client_registry;
pub mod connection;
pub mod error;
pub mod events;
pub mod ingest;
pub mod poll_scheduler;
pub mod ports;
pub mod relay;
pub mod tables;
pub mod trace_id;

pub use self::broadcast_hub::BroadcastHub;
pub use self::checkpoint::CheckpointMap;
pub use self::client_registry::{
    ClientId, ClientIdError, ClientRegistration, ClientRegistry, MAX_CLIENT_ID_LEN,
};
pub use self::connection::ConnectionId;
pub use self::error::{Error, ErrorCode};
pub use self::events::{
    Action, ChangeEvent, ChangeEventError, DERIVED_EVENT_RULES, DerivedEventRule, ERROR_EVENT,
    EventName, NEW_DATA_EVENT, OutboundEvent, PayloadCondition, REFRESH_DATA_EVENT,
    REGISTERED_EVENT, TABLE_DATA_EVENT,
};
pub use self::ingest::IngestService;
pub use self::poll_scheduler::{DEFAULT_POLL_INTERVAL, PollScheduler, TickReport};
pub use self::relay::RelayContext;
pub use self::tables::{
    DEFAULT_TRACKED_TABLES, MAX_TABLE_NAME_LEN, Row, TableName, TableNameError, TrackedTables,
};
pub use self::trace_id::TraceId;

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use villagelink::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<()> {
///     Err(Error::invalid_request("nope"))
/// }
/// assert!(handler().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
