//! Adapters that reach a relay from outside its process.

mod http_notifier;

pub use http_notifier::RelayHttpNotifier;
