//! Amazon Athena provider using [`aws_sdk_athena`].

use std::collections::HashMap;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_athena::Client;
use aws_sdk_athena::error::{DisplayErrorContext, SdkError};
use aws_sdk_athena::types::{QueryExecutionContext, ResultConfiguration};

use super::QueryService;
use crate::types::{QueryExecutionId, QueryRequest, QueryState, ResultSet};
use crate::{AthenaConfig, Error, Result, TRACING_TARGET_SERVICE};

/// Most ids `BatchGetQueryExecution` accepts per call.
const MAX_BATCH_IDS: usize = 50;

/// Athena-backed [`QueryService`].
#[derive(Debug, Clone)]
pub struct AthenaService {
    client: Client,
}

impl AthenaService {
    const ID: &str = "athena";

    /// Build a client from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub async fn connect(config: &AthenaConfig) -> Result<Self> {
        config.validate()?;

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_athena::config::Builder::from(&shared);

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            let credentials = aws_sdk_athena::config::Credentials::new(
                key_id,
                secret,
                config.session_token.clone(),
                None,
                "sluice-config",
            );
            builder = builder.credentials_provider(credentials);
        }

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        tracing::info!(
            target: TRACING_TARGET_SERVICE,
            region = %config.region,
            endpoint = ?config.endpoint,
            "Athena service initialized"
        );

        Ok(Self::from_client(Client::from_conf(builder.build())))
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn from_sdk_error<E>(operation: &'static str, err: SdkError<E>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    Error::service(AthenaService::ID, operation, message).with_source(err)
}

#[async_trait::async_trait]
impl QueryService for AthenaService {
    fn id(&self) -> &'static str {
        Self::ID
    }

    async fn start_query(&self, request: &QueryRequest) -> Result<QueryExecutionId> {
        let context = QueryExecutionContext::builder()
            .database(&request.database)
            .build();
        let result_config = ResultConfiguration::builder()
            .output_location(&request.output_location)
            .build();

        let output = self
            .client
            .start_query_execution()
            .query_string(&request.query)
            .query_execution_context(context)
            .result_configuration(result_config)
            .set_work_group(request.workgroup.clone())
            .send()
            .await
            .map_err(|e| from_sdk_error("start_query_execution", e))?;

        output
            .query_execution_id()
            .map(QueryExecutionId::from)
            .ok_or(Error::MissingExecutionId)
    }

    async fn batch_get_status(&self, ids: &[QueryExecutionId]) -> Result<Vec<QueryState>> {
        let mut states = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_BATCH_IDS) {
            let output = self
                .client
                .batch_get_query_execution()
                .set_query_execution_ids(Some(chunk.iter().map(|id| id.to_string()).collect()))
                .send()
                .await
                .map_err(|e| from_sdk_error("batch_get_query_execution", e))?;

            for unprocessed in output.unprocessed_query_execution_ids() {
                tracing::warn!(
                    target: TRACING_TARGET_SERVICE,
                    id = ?unprocessed.query_execution_id(),
                    error = ?unprocessed.error_message(),
                    "Execution not processed by status batch"
                );
            }

            for execution in output.query_executions() {
                let (Some(id), Some(state)) = (
                    execution.query_execution_id(),
                    execution.status().and_then(|status| status.state()),
                ) else {
                    continue;
                };

                let state = state.as_str().parse::<QueryState>().map_err(|_| {
                    Error::service(
                        Self::ID,
                        "batch_get_query_execution",
                        format!("unrecognized state '{}' for '{id}'", state.as_str()),
                    )
                })?;
                states.insert(id.to_string(), state);
            }
        }

        ids.iter()
            .map(|id| {
                states
                    .get(id.as_str())
                    .copied()
                    .ok_or_else(|| Error::UnknownExecution(id.clone()))
            })
            .collect()
    }

    async fn get_query_results(&self, id: &QueryExecutionId) -> Result<ResultSet> {
        let mut rows = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .get_query_results()
                .query_execution_id(id.as_str())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| from_sdk_error("get_query_results", e))?;

            if let Some(result_set) = output.result_set() {
                rows.extend(result_set.rows().iter().map(|row| {
                    row.data()
                        .iter()
                        .map(|datum| datum.var_char_value().unwrap_or_default().to_string())
                        .collect::<Vec<_>>()
                }));
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        tracing::debug!(
            target: TRACING_TARGET_SERVICE,
            id = %id,
            rows = rows.len(),
            "Fetched query results"
        );

        Ok(ResultSet::new(rows))
    }
}
