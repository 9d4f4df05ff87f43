//! Scripted query service for tests.
//!
//! # Feature Flag
//!
//! Outside this crate's own tests the module is only available with the
//! `test-utils` feature:
//!
//! ```toml
//! [dev-dependencies]
//! sluice-query = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use sluice_query::mock::MockQueryService;
//! use sluice_query::types::QueryState;
//!
//! // Every statement needs two status checks; CREATE statements fail.
//! let service = MockQueryService::new()
//!     .with_checks_until_done(2)
//!     .with_outcome_for("CREATE", QueryState::Failed);
//! ```

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::service::QueryService;
use crate::types::{QueryExecutionId, QueryRequest, QueryState, ResultSet};
use crate::{Error, Result};

/// Behaviour scripted for statements whose text contains `pattern`.
#[derive(Debug, Clone)]
struct Script {
    pattern: String,
    checks: Option<u32>,
    outcome: Option<QueryState>,
}

#[derive(Debug)]
struct Execution {
    remaining_checks: u32,
    outcome: QueryState,
}

#[derive(Debug, Default)]
struct MockState {
    submissions: Vec<QueryRequest>,
    executions: HashMap<QueryExecutionId, Execution>,
    status_calls: u64,
    results: HashMap<QueryExecutionId, ResultSet>,
}

/// In-process [`QueryService`] with scripted latency, outcomes, and results.
///
/// Statements report [`QueryState::Running`] for a configured number of status
/// checks, then settle on their outcome. A statement scripted with
/// [`never_finish_for`](Self::never_finish_for) stays running forever.
#[derive(Debug)]
pub struct MockQueryService {
    checks_until_done: u32,
    outcome: QueryState,
    scripts: Vec<Script>,
    failing_submissions: Vec<String>,
    default_results: ResultSet,
    state: Mutex<MockState>,
}

impl Default for MockQueryService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockQueryService {
    const ID: &str = "mock";

    /// Every statement succeeds on its first status check with no rows.
    pub fn new() -> Self {
        Self {
            checks_until_done: 0,
            outcome: QueryState::Succeeded,
            scripts: Vec::new(),
            failing_submissions: Vec::new(),
            default_results: ResultSet::default(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Status checks a statement stays running for.
    pub fn with_checks_until_done(mut self, checks: u32) -> Self {
        self.checks_until_done = checks;
        self
    }

    /// Terminal state statements settle on.
    pub fn with_outcome(mut self, outcome: QueryState) -> Self {
        self.outcome = outcome;
        self
    }

    /// Terminal state for statements containing `pattern`.
    pub fn with_outcome_for(mut self, pattern: impl Into<String>, outcome: QueryState) -> Self {
        self.scripts.push(Script {
            pattern: pattern.into(),
            checks: None,
            outcome: Some(outcome),
        });
        self
    }

    /// Status checks for statements containing `pattern`.
    pub fn with_checks_for(mut self, pattern: impl Into<String>, checks: u32) -> Self {
        self.scripts.push(Script {
            pattern: pattern.into(),
            checks: Some(checks),
            outcome: None,
        });
        self
    }

    /// Statements containing `pattern` never leave the running state.
    pub fn never_finish_for(self, pattern: impl Into<String>) -> Self {
        self.with_checks_for(pattern, u32::MAX)
    }

    /// Submitting a statement containing `pattern` fails.
    pub fn fail_submissions_containing(mut self, pattern: impl Into<String>) -> Self {
        self.failing_submissions.push(pattern.into());
        self
    }

    /// Rows returned for every query (header row first).
    pub fn with_results(mut self, rows: Vec<Vec<String>>) -> Self {
        self.default_results = ResultSet::new(rows);
        self
    }

    /// Statement texts in submission order.
    pub async fn submitted(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.submissions.iter().map(|r| r.query.clone()).collect()
    }

    /// Full submissions in order.
    pub async fn submissions(&self) -> Vec<QueryRequest> {
        self.state.lock().await.submissions.clone()
    }

    /// Number of `batch_get_status` calls served.
    pub async fn status_calls(&self) -> u64 {
        self.state.lock().await.status_calls
    }

    fn script_for(&self, query: &str) -> Execution {
        let mut execution = Execution {
            remaining_checks: self.checks_until_done,
            outcome: self.outcome,
        };
        for script in self.scripts.iter().filter(|s| query.contains(&s.pattern)) {
            if let Some(checks) = script.checks {
                execution.remaining_checks = checks;
            }
            if let Some(outcome) = script.outcome {
                execution.outcome = outcome;
            }
        }
        execution
    }
}

#[async_trait::async_trait]
impl QueryService for MockQueryService {
    fn id(&self) -> &'static str {
        Self::ID
    }

    async fn start_query(&self, request: &QueryRequest) -> Result<QueryExecutionId> {
        if self
            .failing_submissions
            .iter()
            .any(|pattern| request.query.contains(pattern.as_str()))
        {
            return Err(Error::service(
                Self::ID,
                "start_query",
                "scripted submission failure",
            ));
        }

        let mut state = self.state.lock().await;
        state.submissions.push(request.clone());
        let id = QueryExecutionId::new(format!("exec-{:04}", state.submissions.len()));
        state.executions.insert(id.clone(), self.script_for(&request.query));
        state
            .results
            .insert(id.clone(), self.default_results.clone());
        Ok(id)
    }

    async fn batch_get_status(&self, ids: &[QueryExecutionId]) -> Result<Vec<QueryState>> {
        let mut state = self.state.lock().await;
        state.status_calls += 1;

        ids.iter()
            .map(|id| {
                let execution = state
                    .executions
                    .get_mut(id)
                    .ok_or_else(|| Error::UnknownExecution(id.clone()))?;
                if execution.remaining_checks == 0 {
                    return Ok(execution.outcome);
                }
                if execution.remaining_checks != u32::MAX {
                    execution.remaining_checks -= 1;
                }
                Ok(QueryState::Running)
            })
            .collect()
    }

    async fn get_query_results(&self, id: &QueryExecutionId) -> Result<ResultSet> {
        let state = self.state.lock().await;
        state
            .results
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownExecution(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: &str) -> QueryRequest {
        QueryRequest {
            query: query.to_string(),
            database: "logs".to_string(),
            output_location: "s3://results/".to_string(),
            workgroup: None,
        }
    }

    #[tokio::test]
    async fn statements_run_for_scripted_checks() {
        let service = MockQueryService::new()
            .with_checks_until_done(1)
            .with_outcome_for("bad", QueryState::Failed);
        let good = service.start_query(&request("SELECT 1")).await.unwrap();
        let bad = service.start_query(&request("SELECT bad")).await.unwrap();

        let states = service.batch_get_status(&[good.clone(), bad.clone()]).await.unwrap();
        assert_eq!(states, vec![QueryState::Running, QueryState::Running]);

        let states = service.batch_get_status(&[bad, good]).await.unwrap();
        assert_eq!(states, vec![QueryState::Failed, QueryState::Succeeded]);
        assert_eq!(service.status_calls().await, 2);
    }

    #[tokio::test]
    async fn unknown_ids_are_errors() {
        let service = MockQueryService::new();
        let err = service
            .batch_get_status(&[QueryExecutionId::from("missing")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownExecution(id) if id.as_str() == "missing"));
    }

    #[tokio::test]
    async fn scripted_submission_failure_is_not_recorded() {
        let service = MockQueryService::new().fail_submissions_containing("DROP");
        assert!(service.start_query(&request("DROP TABLE t")).await.is_err());
        assert!(service.submitted().await.is_empty());
    }
}
