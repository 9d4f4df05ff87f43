use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Execution state reported by the query service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryState {
    /// Accepted, waiting for capacity.
    Queued,
    /// Executing.
    Running,
    /// Finished; results are available.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped before finishing.
    Cancelled,
}

impl QueryState {
    /// Whether the query will not change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether the query finished successfully.
    pub fn is_succeeded(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Where a [`QueryManager`](crate::QueryManager) session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Nothing submitted yet.
    #[default]
    Uninitialized,
    /// A managed table exists.
    TableCreated,
    /// Statements were submitted and are not known to be finished.
    Querying,
    /// The last wait ended with every statement succeeded.
    Succeeded,
    /// The last wait ended with a failed or cancelled statement.
    Failed,
    /// The last wait ran out of budget.
    TimedOut,
    /// Cleanup ran.
    CleanedUp,
}
