//! Correlation identifier that follows a request through the relay.
//!
//! The HTTP middleware opens a scope per request; detached work such as the
//! post-ingest snapshot refresh re-enters the same scope so its log lines
//! carry the originating identifier. Tokio task-locals are not inherited by
//! spawned tasks, so callers wrap spawned futures in [`TraceId::propagate`].

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use tokio::task_local;
use uuid::Uuid;

task_local! {
    static TRACE_ID: TraceId;
}

/// Per-request trace identifier exposed via task-local storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Generate a new random trace identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the identifier in scope for the current task, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        TRACE_ID.try_with(|id| *id).ok()
    }

    /// Run `fut` with `trace_id` in scope.
    ///
    /// # Examples
    /// ```
    /// use villagelink::domain::TraceId;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let trace_id = TraceId::generate();
    /// let observed = TraceId::scope(trace_id, async { TraceId::current() }).await;
    /// assert_eq!(observed, Some(trace_id));
    /// # });
    /// ```
    pub async fn scope<Fut>(trace_id: TraceId, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        TRACE_ID.scope(trace_id, fut).await
    }

    /// Run `fut` inside the caller's trace scope when one exists.
    pub async fn propagate<Fut>(current: Option<TraceId>, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        match current {
            Some(trace_id) => Self::scope(trace_id, fut).await,
            None => fut.await,
        }
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TraceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scope_exposes_identifier() {
        let expected = TraceId::generate();
        let observed = TraceId::scope(expected, async { TraceId::current() }).await;
        assert_eq!(observed, Some(expected));
    }

    #[tokio::test]
    async fn nothing_in_scope_outside_a_request() {
        assert!(TraceId::current().is_none());
    }

    #[tokio::test]
    async fn propagate_reenters_scope_in_spawned_task() {
        let expected = TraceId::generate();
        let observed = TraceId::scope(expected, async {
            let current = TraceId::current();
            tokio::spawn(TraceId::propagate(current, async { TraceId::current() }))
                .await
                .expect("spawned task")
        })
        .await;
        assert_eq!(observed, Some(expected));
    }

    #[tokio::test]
    async fn propagate_without_scope_runs_plainly() {
        let observed = TraceId::propagate(None, async { TraceId::current() }).await;
        assert!(observed.is_none());
    }

    #[test]
    fn parses_from_string() {
        let id: TraceId = "00000000-0000-0000-0000-000000000000"
            .parse()
            .expect("valid uuid");
        assert_eq!(id.to_string(), Uuid::nil().to_string());
    }
}
