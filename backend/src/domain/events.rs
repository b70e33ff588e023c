//! Change events and the outbound event vocabulary.
//!
//! Writers describe a committed change as `(table, action, data)`. The relay
//! turns it into one action-qualified event (`{action}_{table}`) plus any
//! events derived from [`DERIVED_EVENT_RULES`]. Adding a new derived event is
//! a new rule in that table, not a new branch in the ingest path.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use super::{Row, TableName, TableNameError};

/// Event carrying a full table snapshot: `{table, data}`.
pub const REFRESH_DATA_EVENT: &str = "refreshData";
/// Event carrying only the rows a poll tick saw change: `{table, data, timestamp}`.
pub const NEW_DATA_EVENT: &str = "newData";
/// Initial dataset sent after a client registers: `{<table>: rows, ...}`.
pub const TABLE_DATA_EVENT: &str = "tableData";
/// Acknowledgement of a `register` frame.
pub const REGISTERED_EVENT: &str = "registered";
/// Per-connection protocol error notice.
pub const ERROR_EVENT: &str = "error";

/// Name under which an event is pushed to realtime clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EventName(String);

impl EventName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// `{action}_{table}`, for example `new_announcements`.
    pub fn action_qualified(action: &Action, table: &str) -> Self {
        Self(format!("{action}_{table}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Open-vocabulary action tag such as `new` or `update`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action(String);

impl Action {
    pub const NEW: &'static str = "new";
    pub const UPDATE: &'static str = "update";

    /// Wrap a non-blank action tag; surrounding whitespace is removed.
    pub fn new(value: impl AsRef<str>) -> Option<Self> {
        let trimmed = value.as_ref().trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reasons an ingest payload is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeEventError {
    #[error("table, action and data are required")]
    Missing { fields: Vec<&'static str> },
    #[error("data must be a JSON object")]
    DataNotObject,
}

/// A committed change reported by a writer. Never persisted.
///
/// The table is kept as the writer sent it (trimmed). Event names use it
/// verbatim; only the snapshot read needs a validated [`TableName`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    table: String,
    action: Action,
    data: Map<String, Value>,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, action: Action, data: Map<String, Value>) -> Self {
        Self {
            table: table.into(),
            action,
            data,
        }
    }

    /// Validate the loosely typed fields of an ingest request.
    ///
    /// Blank strings and `null` count as missing. Every missing field is
    /// reported at once.
    pub fn from_parts(
        table: Option<&str>,
        action: Option<&str>,
        data: Option<Value>,
    ) -> Result<Self, ChangeEventError> {
        let table = table.map(str::trim).filter(|value| !value.is_empty());
        let action = action.and_then(Action::new);
        let data = data.filter(|value| !value.is_null());

        let mut missing = Vec::new();
        if table.is_none() {
            missing.push("table");
        }
        if action.is_none() {
            missing.push("action");
        }
        if data.is_none() {
            missing.push("data");
        }

        match (table, action, data) {
            (Some(table), Some(action), Some(data)) => {
                let Value::Object(data) = data else {
                    return Err(ChangeEventError::DataNotObject);
                };
                Ok(Self::new(table, action, data))
            }
            _ => Err(ChangeEventError::Missing { fields: missing }),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The table as a store identifier, for reading its snapshot.
    pub fn table_name(&self) -> Result<TableName, TableNameError> {
        TableName::new(self.table.as_str())
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Payload pushed to clients for this change.
    pub fn payload(&self) -> Value {
        Value::Object(self.data.clone())
    }

    /// The action-qualified event every change produces.
    pub fn primary_event(&self) -> EventName {
        EventName::action_qualified(&self.action, &self.table)
    }

    /// Events derived from [`DERIVED_EVENT_RULES`], in rule order.
    pub fn derived_events(&self) -> Vec<EventName> {
        DERIVED_EVENT_RULES
            .iter()
            .filter(|rule| rule.matches(self))
            .map(|rule| EventName::new(rule.event))
            .collect()
    }
}

/// Condition a derived-event rule places on the change payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadCondition {
    /// Always derive the event.
    Always,
    /// Derive when `data.category` equals the value, ignoring ASCII case.
    CategoryIs(&'static str),
}

impl PayloadCondition {
    fn holds(self, data: &Map<String, Value>) -> bool {
        match self {
            Self::Always => true,
            Self::CategoryIs(expected) => data
                .get("category")
                .and_then(Value::as_str)
                .is_some_and(|category| category.eq_ignore_ascii_case(expected)),
        }
    }
}

/// Maps `(table, action)` plus a payload condition to an extra event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedEventRule {
    pub table: &'static str,
    pub action: &'static str,
    pub condition: PayloadCondition,
    pub event: &'static str,
}

impl DerivedEventRule {
    fn matches(&self, change: &ChangeEvent) -> bool {
        change.table == self.table
            && change.action.as_str() == self.action
            && self.condition.holds(&change.data)
    }
}

/// Closed dispatch table of derived events.
///
/// New complaints and requests share the `comreqs` table; dashboards listen
/// for the category-specific names.
pub const DERIVED_EVENT_RULES: &[DerivedEventRule] = &[
    DerivedEventRule {
        table: "comreqs",
        action: Action::NEW,
        condition: PayloadCondition::CategoryIs("complaint"),
        event: "new_complaint",
    },
    DerivedEventRule {
        table: "comreqs",
        action: Action::NEW,
        condition: PayloadCondition::CategoryIs("request"),
        event: "new_request",
    },
];

/// A named payload delivered to every realtime connection.
///
/// Serialises as the wire frame `{"event": name, "data": payload}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEvent {
    pub event: EventName,
    pub data: Value,
}

impl OutboundEvent {
    pub fn new(event: EventName, data: Value) -> Self {
        Self { event, data }
    }

    /// `refreshData {table, data}`.
    pub fn snapshot(table: &TableName, rows: Vec<Row>) -> Self {
        Self::new(
            EventName::new(REFRESH_DATA_EVENT),
            json!({ "table": table, "data": rows }),
        )
    }

    /// `newData {table, data, timestamp}` for the rows a tick saw change.
    pub fn new_data(table: &TableName, rows: Vec<Row>, observed_at: DateTime<Utc>) -> Self {
        Self::new(
            EventName::new(NEW_DATA_EVENT),
            json!({
                "table": table,
                "data": rows,
                "timestamp": observed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
        )
    }

    /// `tableData {<table>: rows, ...}`.
    pub fn table_data(dataset: Map<String, Value>) -> Self {
        Self::new(EventName::new(TABLE_DATA_EVENT), Value::Object(dataset))
    }
}
