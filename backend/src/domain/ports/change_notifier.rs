//! Driving port through which write-side services announce committed changes.
//!
//! Per-entity endpoints (announcements, emergencies, feedback, ...) depend
//! on this narrow capability rather than on the relay itself, so tests can
//! swap in [`FixtureChangeNotifier`] and deployments can choose between the
//! in-process ingest service and the HTTP notifier.

use async_trait::async_trait;

use crate::domain::ChangeEvent;

use super::define_port_error;

define_port_error! {
    /// Failures reported to a writer that tried to announce a change.
    pub enum NotifyError {
        /// The relay refused the change as malformed.
        Rejected { message: String } => "change notification rejected: {message}",
        /// The relay could not be reached.
        Transport { message: String } => "change notification transport failed: {message}",
    }
}

/// Capability to tell the relay that a change was committed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Announce `change`. Success means the light event went out; snapshot
    /// refreshes that follow are best effort.
    async fn notify(&self, change: ChangeEvent) -> Result<(), NotifyError>;
}

/// Notifier that accepts every change and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureChangeNotifier;

#[async_trait]
impl ChangeNotifier for FixtureChangeNotifier {
    async fn notify(&self, _change: ChangeEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}
