//! Bounded wait for query completion.

use std::sync::Arc;
use std::time::Duration;

use crate::service::QueryService;
use crate::types::{QueryExecutionId, QueryState};
use crate::{Error, Result, TRACING_TARGET_POLL};

/// Waits for a batch of executions to reach a terminal state.
///
/// Statuses are fetched with one batch call per iteration, `interval` apart.
/// The last sleep is shortened so the cumulative wait lands exactly on the
/// timeout, where one final check happens. Timed-out executions are left
/// running on the service.
#[derive(Clone)]
pub struct Poller {
    service: Arc<dyn QueryService>,
    interval: Duration,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("service", &self.service.id())
            .field("interval", &self.interval)
            .finish()
    }
}

impl Poller {
    /// Create a poller checking `service` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero interval, which would never
    /// use up the wait budget.
    pub fn new(service: Arc<dyn QueryService>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::invalid_config("poll interval must be non-zero"));
        }
        Ok(Self { service, interval })
    }

    /// Interval between status checks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until every id is terminal or `timeout` of waiting has passed.
    ///
    /// Returns the final states in the order of `ids`, or `None` on timeout.
    /// An empty id list finishes immediately without a remote call.
    ///
    /// # Errors
    ///
    /// Status call failures are returned as-is; polling stops at the first one.
    #[tracing::instrument(
        name = "query.poll",
        target = TRACING_TARGET_POLL,
        skip_all,
        fields(ids = ids.len(), timeout_secs = timeout.as_secs(), checks)
    )]
    pub async fn wait(
        &self,
        ids: &[QueryExecutionId],
        timeout: Duration,
    ) -> Result<Option<Vec<QueryState>>> {
        if ids.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let mut waited = Duration::ZERO;
        let mut checks = 0u64;

        loop {
            let states = self.service.batch_get_status(ids).await?;
            checks += 1;

            if states.iter().all(|state| state.is_terminal()) {
                tracing::Span::current().record("checks", checks);
                tracing::debug!(
                    target: TRACING_TARGET_POLL,
                    waited_secs = waited.as_secs_f64(),
                    "All executions finished"
                );
                return Ok(Some(states));
            }

            if waited >= timeout {
                tracing::Span::current().record("checks", checks);
                tracing::warn!(
                    target: TRACING_TARGET_POLL,
                    ids = ?ids.iter().map(QueryExecutionId::as_str).collect::<Vec<_>>(),
                    waited_secs = waited.as_secs_f64(),
                    "Timed out waiting for queries; they keep running on the service"
                );
                return Ok(None);
            }

            let pause = self.interval.min(timeout - waited);
            tracing::trace!(
                target: TRACING_TARGET_POLL,
                pending = states.iter().filter(|state| !state.is_terminal()).count(),
                pause_secs = pause.as_secs_f64(),
                "Executions still running"
            );
            tokio::time::sleep(pause).await;
            waited += pause;
        }
    }
}
