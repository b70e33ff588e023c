//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports ([`ChangeSource`], [`ConnectionSink`]) are implemented by
//! outbound and transport adapters; the driving port [`ChangeNotifier`] is
//! what write-side services call.

mod macros;
pub(crate) use macros::define_port_error;

mod change_notifier;
mod change_source;
mod connection_sink;

#[cfg(test)]
pub use change_notifier::MockChangeNotifier;
pub use change_notifier::{ChangeNotifier, FixtureChangeNotifier, NotifyError};
#[cfg(test)]
pub use change_source::MockChangeSource;
pub use change_source::{ChangeSource, ChangeSourceError, FixtureChangeSource};
#[cfg(test)]
pub use connection_sink::MockConnectionSink;
pub use connection_sink::{ConnectionSink, DeliveryError};
