//! Query session lifecycle: submit, wait, shape results, clean up.

use std::sync::Arc;
use std::time::Duration;

use sluice_object::ObjectClient;
use sluice_object::types::ObjectLocation;

use crate::poll::Poller;
use crate::report::{VersionReport, construct_report, parse_result_csv};
use crate::service::QueryService;
use crate::types::{QueryExecutionId, QueryJob, QueryRequest, QueryState, ResultSet, SessionState};
use crate::{Error, QueryConfig, Result, TRACING_TARGET_MANAGER};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Drives one query session against a [`QueryService`].
///
/// The manager owns at most one table, created with
/// [`create_table`](Self::create_table) and dropped by
/// [`drop_table`](Self::drop_table) or [`cleanup`](Self::cleanup). Staged input
/// objects are not its concern; see [`StagedData`](crate::StagedData).
///
/// Queries that do not finish within the configured timeout are reported as
/// `Ok(None)` and left running on the service.
pub struct QueryManager {
    service: Arc<dyn QueryService>,
    objects: ObjectClient,
    config: QueryConfig,
    result_location: ObjectLocation,
    poller: Poller,
    table: Option<String>,
    state: SessionState,
}

impl std::fmt::Debug for QueryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryManager")
            .field("service", &self.service.id())
            .field("objects", &self.objects)
            .field("config", &self.config)
            .field("table", &self.table)
            .field("state", &self.state)
            .finish()
    }
}

impl QueryManager {
    /// Create a session over `service`, reading and writing result files
    /// through `objects`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate.
    pub fn new(
        service: impl QueryService,
        objects: ObjectClient,
        config: QueryConfig,
    ) -> Result<Self> {
        Self::from_shared(Arc::new(service), objects, config)
    }

    /// Like [`new`](Self::new) for a service shared with other sessions.
    pub fn from_shared(
        service: Arc<dyn QueryService>,
        objects: ObjectClient,
        config: QueryConfig,
    ) -> Result<Self> {
        config.validate()?;
        let result_location = config.result_location()?;
        let poller = Poller::new(service.clone(), config.poll_interval())?;

        Ok(Self {
            service,
            objects,
            config,
            result_location,
            poller,
            table: None,
            state: SessionState::Uninitialized,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Name of the table this session owns, if any.
    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Session configuration.
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Submit `query` and return its execution id without waiting.
    ///
    /// The text is sent as-is against the configured database and result
    /// location.
    #[tracing::instrument(
        name = "query.submit",
        target = TRACING_TARGET_MANAGER,
        skip_all,
        fields(id)
    )]
    pub async fn submit(&mut self, query: &str) -> Result<QueryExecutionId> {
        let request = QueryRequest {
            query: query.to_string(),
            database: self.config.database.clone(),
            output_location: self.result_location.to_string(),
            workgroup: self.config.workgroup.clone(),
        };

        let id = self.service.start_query(&request).await?;
        tracing::Span::current().record("id", id.as_str());
        tracing::debug!(target: TRACING_TARGET_MANAGER, "Query submitted");

        self.state = SessionState::Querying;
        Ok(id)
    }

    /// One batch status check, in the order of `ids`.
    pub async fn statuses(&self, ids: &[QueryExecutionId]) -> Result<Vec<QueryState>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.service.batch_get_status(ids).await
    }

    /// Wait up to `timeout` for every id to finish.
    ///
    /// Returns the final states in the order of `ids`, or `None` on timeout.
    /// No cancellation is issued for executions still running.
    pub async fn poll_until_done(
        &mut self,
        ids: &[QueryExecutionId],
        timeout: Duration,
    ) -> Result<Option<Vec<QueryState>>> {
        let states = self.poller.wait(ids, timeout).await?;

        self.state = match &states {
            None => SessionState::TimedOut,
            Some(states) if states.iter().all(|s| s.is_succeeded()) => SessionState::Succeeded,
            Some(_) => SessionState::Failed,
        };
        Ok(states)
    }

    /// Submit `query` and wait for it with the configured timeout.
    ///
    /// Returns the job with its terminal state, or `None` on timeout.
    pub async fn execute(&mut self, query: &str) -> Result<Option<QueryJob>> {
        let id = self.submit(query).await?;
        let job = QueryJob::submitted(id, query);
        let timeout = self.config.timeout();

        let states = self.poll_until_done(std::slice::from_ref(&job.id), timeout).await?;
        Ok(states
            .and_then(|states| states.into_iter().next())
            .map(|state| QueryJob { state, ..job }))
    }

    /// Create a table named `name` over the configured data location.
    ///
    /// `template` may refer to the name as `{0}` or `{table}` and to the data
    /// location as `{1}` or `{location}`. The table is recorded as owned, and
    /// its name returned, only when the statement succeeds; a failed,
    /// cancelled, or timed-out statement yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TableExists`] while a table is still owned, and
    /// [`Error::InvalidConfig`] when no data location is configured.
    #[tracing::instrument(
        name = "query.create_table",
        target = TRACING_TARGET_MANAGER,
        skip_all,
        fields(table = %name)
    )]
    pub async fn create_table(&mut self, template: &str, name: &str) -> Result<Option<String>> {
        if let Some(owned) = &self.table {
            return Err(Error::TableExists(owned.clone()));
        }

        let location = self
            .config
            .data_location
            .clone()
            .ok_or_else(|| Error::invalid_config("a data location is required to create a table"))?;
        let statement = render_table_query(template, name, &location);

        let id = self.submit(&statement).await?;
        let timeout = self.config.timeout();
        let states = self.poll_until_done(&[id], timeout).await?;

        match states.as_deref() {
            Some([QueryState::Succeeded]) => {
                self.table = Some(name.to_string());
                self.state = SessionState::TableCreated;
                tracing::info!(
                    target: TRACING_TARGET_MANAGER,
                    location = %location,
                    "Table created"
                );
                Ok(Some(name.to_string()))
            }
            Some(states) => {
                tracing::warn!(
                    target: TRACING_TARGET_MANAGER,
                    states = ?states,
                    "Table creation did not succeed"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Drop the owned table.
    ///
    /// Sends a single `DROP TABLE IF EXISTS` without waiting for it and
    /// releases ownership.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoTable`] if this session owns no table.
    pub async fn drop_table(&mut self) -> Result<QueryExecutionId> {
        let name = self.table.clone().ok_or(Error::NoTable)?;
        let id = self.submit(&format!("DROP TABLE IF EXISTS {name}")).await?;

        self.table = None;
        tracing::info!(
            target: TRACING_TARGET_MANAGER,
            table = %name,
            id = %id,
            "Table drop submitted"
        );
        Ok(id)
    }

    /// Tear down what this session created. Safe to call more than once.
    ///
    /// Only the owned table is dropped; staged objects are discarded
    /// separately through [`StagedData::discard`](crate::StagedData::discard).
    pub async fn cleanup(&mut self) -> Result<()> {
        tracing::info!(
            target: TRACING_TARGET_MANAGER,
            table = ?self.table,
            "Cleaning up temporary tables"
        );

        if self.table.is_some() {
            self.drop_table().await?;
        }
        self.state = SessionState::CleanedUp;
        Ok(())
    }

    /// All result rows of a finished execution, from the service.
    pub async fn fetch_results(&self, id: &QueryExecutionId) -> Result<ResultSet> {
        self.service.get_query_results(id).await
    }

    /// Turn the raw result file of `id` into a JSON report at
    /// `destination/output_name`, then delete the raw file.
    ///
    /// Not restartable: once the raw file is deleted the report cannot be
    /// rebuilt from it.
    #[tracing::instrument(
        name = "query.fetch_and_shape",
        target = TRACING_TARGET_MANAGER,
        skip_all,
        fields(id = %id, destination = %destination, output_name = %output_name)
    )]
    pub async fn fetch_and_shape(
        &self,
        id: &QueryExecutionId,
        destination: &ObjectLocation,
        output_name: &str,
    ) -> Result<VersionReport> {
        let raw = self.result_location.join(&format!("{id}.csv"));
        let output = self.objects.get(&raw).await?;

        let rows = parse_result_csv(&output.data)?;
        let report = construct_report(&rows)?;

        let target = destination.join(output_name);
        let body = serde_json::to_vec(&report)?;
        self.objects
            .put(&target, body.into(), Some(JSON_CONTENT_TYPE))
            .await?;
        self.objects.delete(&raw).await?;

        tracing::info!(
            target: TRACING_TARGET_MANAGER,
            rows = rows.len(),
            count = report.count,
            report = %target,
            "Results shaped"
        );
        Ok(report)
    }
}

/// Fill the table name and data location into a table-creation template.
fn render_table_query(template: &str, name: &str, location: &str) -> String {
    template
        .replace("{0}", name)
        .replace("{table}", name)
        .replace("{1}", location)
        .replace("{location}", location)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use sluice_object::providers::{MemoryBackend, ObjectBackend};
    use sluice_object::transfer::TransferWalker;

    use super::*;
    use crate::mock::MockQueryService;
    use crate::staging::LogStaging;

    const CREATE: &str = "CREATE EXTERNAL TABLE {0} (line string) LOCATION '{1}'";

    struct Fixture {
        service: Arc<MockQueryService>,
        backend: Arc<MemoryBackend>,
    }

    impl Fixture {
        fn new(service: MockQueryService) -> Self {
            let backend = MemoryBackend::new()
                .with_bucket("results")
                .with_bucket("reports")
                .with_bucket("logs");
            Self {
                service: Arc::new(service),
                backend: Arc::new(backend),
            }
        }

        fn manager(&self, config: QueryConfig) -> QueryManager {
            QueryManager::from_shared(
                self.service.clone(),
                ObjectClient(self.backend.clone()),
                config,
            )
            .unwrap()
        }
    }

    fn config() -> QueryConfig {
        QueryConfig::new("logs_db", "s3://results/athena/")
            .with_data_location("s3://logs/tmp/cdn/")
            .with_timeout_secs(30)
    }

    #[test]
    fn renders_both_placeholder_styles() {
        assert_eq!(
            render_table_query("CREATE {0} AT {1}", "t", "b/p/"),
            "CREATE t AT b/p/"
        );
        assert_eq!(
            render_table_query("CREATE {table} AT {location}", "t", "b/p/"),
            "CREATE t AT b/p/"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn submit_uses_configured_database_and_output() {
        let fixture = Fixture::new(MockQueryService::new());
        let mut manager = fixture.manager(config().with_workgroup("analytics"));

        manager.submit("SELECT 1").await.unwrap();

        let submission = &fixture.service.submissions().await[0];
        assert_eq!(submission.database, "logs_db");
        assert_eq!(submission.output_location, "s3://results/athena/");
        assert_eq!(submission.workgroup.as_deref(), Some("analytics"));
        assert_eq!(manager.state(), SessionState::Querying);
    }

    #[tokio::test(start_paused = true)]
    async fn create_table_records_ownership_on_success() {
        let fixture = Fixture::new(MockQueryService::new().with_checks_until_done(1));
        let mut manager = fixture.manager(config());

        let name = manager.create_table(CREATE, "cdn_logs").await.unwrap();

        assert_eq!(name.as_deref(), Some("cdn_logs"));
        assert_eq!(manager.table_name(), Some("cdn_logs"));
        assert_eq!(manager.state(), SessionState::TableCreated);
        assert_eq!(
            fixture.service.submitted().await,
            vec!["CREATE EXTERNAL TABLE cdn_logs (line string) LOCATION 's3://logs/tmp/cdn/'"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_create_owns_nothing() {
        let fixture =
            Fixture::new(MockQueryService::new().with_outcome_for("CREATE", QueryState::Failed));
        let mut manager = fixture.manager(config());

        assert_eq!(manager.create_table(CREATE, "cdn_logs").await.unwrap(), None);
        assert_eq!(manager.table_name(), None);
        assert_eq!(manager.state(), SessionState::Failed);
        assert!(matches!(manager.drop_table().await, Err(Error::NoTable)));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_create_owns_nothing() {
        let fixture = Fixture::new(MockQueryService::new().never_finish_for("CREATE"));
        let mut manager = fixture.manager(config());

        assert_eq!(manager.create_table(CREATE, "cdn_logs").await.unwrap(), None);
        assert_eq!(manager.table_name(), None);
        assert_eq!(manager.state(), SessionState::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn create_table_requires_data_location() {
        let fixture = Fixture::new(MockQueryService::new());
        let mut manager = fixture.manager(QueryConfig::new("logs_db", "s3://results/"));

        let err = manager.create_table(CREATE, "t").await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert!(fixture.service.submitted().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_without_table_is_an_error() {
        let fixture = Fixture::new(MockQueryService::new());
        let mut manager = fixture.manager(config());

        assert!(matches!(manager.drop_table().await, Err(Error::NoTable)));
        assert!(fixture.service.submitted().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_sends_exactly_one_statement() {
        let fixture = Fixture::new(MockQueryService::new());
        let mut manager = fixture.manager(config());
        manager.create_table(CREATE, "cdn_logs").await.unwrap();

        manager.drop_table().await.unwrap();

        let submitted = fixture.service.submitted().await;
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[1], "DROP TABLE IF EXISTS cdn_logs");
        assert_eq!(manager.table_name(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_is_idempotent() {
        let fixture = Fixture::new(MockQueryService::new());
        let mut manager = fixture.manager(config());
        manager.create_table(CREATE, "cdn_logs").await.unwrap();

        manager.cleanup().await.unwrap();
        manager.cleanup().await.unwrap();

        let drops = fixture
            .service
            .submitted()
            .await
            .into_iter()
            .filter(|q| q.starts_with("DROP"))
            .count();
        assert_eq!(drops, 1);
        assert_eq!(manager.state(), SessionState::CleanedUp);
    }

    #[tokio::test(start_paused = true)]
    async fn second_create_while_owned_is_refused() {
        let fixture = Fixture::new(MockQueryService::new());
        let mut manager = fixture.manager(config());
        manager.create_table(CREATE, "cdn_logs").await.unwrap();

        let err = manager.create_table(CREATE, "other_logs").await.unwrap_err();
        assert!(matches!(err, Error::TableExists(ref name) if name == "cdn_logs"));
        assert_eq!(manager.table_name(), Some("cdn_logs"));
        assert_eq!(fixture.service.submitted().await.len(), 1);

        manager.drop_table().await.unwrap();
        let name = manager.create_table(CREATE, "other_logs").await.unwrap();
        assert_eq!(name.as_deref(), Some("other_logs"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_drop_submission_keeps_table_owned() {
        let fixture = Fixture::new(MockQueryService::new().fail_submissions_containing("DROP"));
        let mut manager = fixture.manager(config());
        manager.create_table(CREATE, "cdn_logs").await.unwrap();

        let err = manager.drop_table().await.unwrap_err();
        assert!(matches!(err, Error::Service { .. }));
        assert_eq!(manager.table_name(), Some("cdn_logs"));

        let err = manager.cleanup().await.unwrap_err();
        assert!(matches!(err, Error::Service { .. }));
        assert_eq!(manager.table_name(), Some("cdn_logs"));
        assert_ne!(manager.state(), SessionState::CleanedUp);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_create_submission_propagates() {
        let fixture =
            Fixture::new(MockQueryService::new().fail_submissions_containing("CREATE"));
        let mut manager = fixture.manager(config());

        let err = manager.create_table(CREATE, "cdn_logs").await.unwrap_err();
        assert!(matches!(err, Error::Service { .. }));
        assert_eq!(manager.table_name(), None);
        assert_eq!(manager.state(), SessionState::Uninitialized);
        assert!(matches!(manager.drop_table().await, Err(Error::NoTable)));
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_without_table_sends_nothing() {
        let fixture = Fixture::new(MockQueryService::new());
        let mut manager = fixture.manager(config());

        manager.cleanup().await.unwrap();
        assert!(fixture.service.submitted().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn execute_reports_terminal_state() {
        let fixture = Fixture::new(
            MockQueryService::new()
                .with_checks_until_done(2)
                .with_outcome_for("broken", QueryState::Failed),
        );
        let mut manager = fixture.manager(config());

        let job = manager.execute("SELECT 1").await.unwrap().unwrap();
        assert_eq!(job.state, QueryState::Succeeded);
        assert_eq!(job.query, "SELECT 1");

        let job = manager.execute("SELECT broken").await.unwrap().unwrap();
        assert_eq!(job.state, QueryState::Failed);
        assert_eq!(manager.state(), SessionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_times_out_to_none() {
        let fixture = Fixture::new(MockQueryService::new().never_finish_for("slow"));
        let mut manager = fixture.manager(config().with_timeout_secs(7));

        assert!(manager.execute("SELECT slow").await.unwrap().is_none());
        assert_eq!(manager.state(), SessionState::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_results_returns_service_rows() {
        let rows = vec![
            vec!["day".to_string(), "version".to_string(), "hits".to_string()],
            vec!["d1".to_string(), "v1".to_string(), "3".to_string()],
        ];
        let fixture = Fixture::new(MockQueryService::new().with_results(rows.clone()));
        let mut manager = fixture.manager(config());

        let id = manager.submit("SELECT 1").await.unwrap();
        let results = manager.fetch_results(&id).await.unwrap();
        assert_eq!(results.rows, rows);
        assert_eq!(results.data_rows().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_and_shape_writes_report_and_removes_raw_csv() {
        let fixture = Fixture::new(MockQueryService::new());
        let mut manager = fixture.manager(config());
        let id = manager.submit("SELECT version, count(*)").await.unwrap();

        let raw = ObjectLocation::new("results", format!("athena/{id}.csv"));
        fixture
            .backend
            .put_object(
                &raw,
                Bytes::from_static(b"day,version,hits\nd1,v1,3\nd1,v2,5\n"),
                None,
            )
            .await
            .unwrap();

        let destination = ObjectLocation::new("reports", "daily");
        let report = manager
            .fetch_and_shape(&id, &destination, "versions.json")
            .await
            .unwrap();
        assert_eq!(report.count, 8);

        let written = fixture
            .backend
            .get_object(&ObjectLocation::new("reports", "daily/versions.json"))
            .await
            .unwrap();
        assert_eq!(written.content_type.as_deref(), Some(JSON_CONTENT_TYPE));
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&written.data).unwrap(),
            serde_json::json!({"versions": {"v1": 3, "v2": 5}, "count": 8})
        );
        assert!(fixture.backend.keys("results").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_csv_leaves_raw_file() {
        let fixture = Fixture::new(MockQueryService::new());
        let manager = fixture.manager(config());
        let id = QueryExecutionId::from("exec-9");

        let raw = ObjectLocation::new("results", "athena/exec-9.csv");
        fixture
            .backend
            .put_object(&raw, Bytes::from_static(b"h,v,c\nd1,v1,x\n"), None)
            .await
            .unwrap();

        let err = manager
            .fetch_and_shape(&id, &ObjectLocation::bucket("reports"), "out.json")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedRow { row: 1, .. }));
        assert_eq!(fixture.backend.keys("results").await, vec!["athena/exec-9.csv"]);
        assert!(fixture.backend.keys("reports").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn log_session_end_to_end() {
        let fixture = Fixture::new(MockQueryService::new().with_checks_until_done(1));
        for key in ["cdn/E2X.2019-01-01.gz", "cdn/E2X.2019-01-02.gz", "cdn/other.gz"] {
            fixture
                .backend
                .put_object(&ObjectLocation::new("logs", key), Bytes::from_static(b"l"), None)
                .await
                .unwrap();
        }

        let walker = TransferWalker::new(ObjectClient(fixture.backend.clone()));
        let staged = LogStaging::new(walker, "logs", "cdn/E2X.2019")
            .stage()
            .await
            .unwrap();
        assert_eq!(staged.summary().objects, 2);

        let mut manager =
            fixture.manager(config().with_data_location(staged.table_location()));
        manager.create_table(CREATE, "cdn_logs").await.unwrap();
        assert_eq!(manager.table_name(), Some("cdn_logs"));

        let job = manager.execute("SELECT version, count(*) FROM cdn_logs").await.unwrap();
        assert_eq!(job.map(|j| j.state), Some(QueryState::Succeeded));

        manager.cleanup().await.unwrap();
        staged.discard().await.unwrap();

        assert_eq!(
            fixture.backend.keys("logs").await,
            vec!["cdn/E2X.2019-01-01.gz", "cdn/E2X.2019-01-02.gz", "cdn/other.gz"]
        );
        assert_eq!(manager.state(), SessionState::CleanedUp);
    }
}
