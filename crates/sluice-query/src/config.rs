//! Query service and session configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use sluice_object::types::ObjectLocation;

use crate::{Error, Result};

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    300
}

/// Explicit connection settings for the Athena query service.
///
/// Region and endpoint are never taken from ambient process state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct AthenaConfig {
    /// AWS region (defaults to `us-east-1`).
    #[cfg_attr(
        feature = "config",
        arg(long = "athena-region", env = "ATHENA_REGION", default_value = "us-east-1")
    )]
    #[serde(default = "default_region")]
    pub region: String,

    /// Endpoint URL override.
    #[cfg_attr(feature = "config", arg(long = "athena-endpoint", env = "ATHENA_ENDPOINT"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Access key ID for static credentials.
    #[cfg_attr(
        feature = "config",
        arg(long = "athena-access-key-id", env = "ATHENA_ACCESS_KEY_ID")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    /// Secret access key for static credentials.
    #[cfg_attr(
        feature = "config",
        arg(long = "athena-secret-access-key", env = "ATHENA_SECRET_ACCESS_KEY")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    /// Session token for temporary credentials.
    #[cfg_attr(
        feature = "config",
        arg(long = "athena-session-token", env = "ATHENA_SESSION_TOKEN")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl Default for AthenaConfig {
    fn default() -> Self {
        Self::new(default_region())
    }
}

impl AthenaConfig {
    /// Creates a new Athena configuration for `region`.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
        }
    }

    /// Sets the endpoint override.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets static access credentials.
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the region is empty or only one of
    /// the static key pair is set.
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(Error::invalid_config("athena region cannot be empty"));
        }

        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(Error::invalid_config(
                "athena config requires both access_key_id and secret_access_key when either is set",
            ));
        }

        Ok(())
    }
}

/// Settings for one query session.
///
/// One config drives both plain query sessions and log-analysis sessions;
/// the latter set `data_location` from [`StagedData`](crate::StagedData).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    /// Database every statement runs against.
    #[cfg_attr(feature = "config", arg(long = "query-database", env = "QUERY_DATABASE"))]
    pub database: String,

    /// Where the service writes raw results, as `s3://bucket/prefix/`.
    #[cfg_attr(
        feature = "config",
        arg(long = "query-result-location", env = "QUERY_RESULT_LOCATION")
    )]
    pub result_location: String,

    /// Location managed tables are created over.
    #[cfg_attr(
        feature = "config",
        arg(long = "query-data-location", env = "QUERY_DATA_LOCATION")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_location: Option<String>,

    /// Workgroup to submit statements in.
    #[cfg_attr(feature = "config", arg(long = "query-workgroup", env = "QUERY_WORKGROUP"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workgroup: Option<String>,

    /// Seconds between status checks while waiting.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "query-poll-interval-secs",
            env = "QUERY_POLL_INTERVAL_SECS",
            default_value = "5"
        )
    )]
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds to wait for statements before giving up.
    #[cfg_attr(
        feature = "config",
        arg(long = "query-timeout-secs", env = "QUERY_TIMEOUT_SECS", default_value = "300")
    )]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl QueryConfig {
    /// Creates a session config with the default poll interval and timeout.
    pub fn new(database: impl Into<String>, result_location: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            result_location: result_location.into(),
            data_location: None,
            workgroup: None,
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Sets the location managed tables are created over.
    pub fn with_data_location(mut self, data_location: impl Into<String>) -> Self {
        self.data_location = Some(data_location.into());
        self
    }

    /// Sets the workgroup.
    pub fn with_workgroup(mut self, workgroup: impl Into<String>) -> Self {
        self.workgroup = Some(workgroup.into());
        self
    }

    /// Sets the poll interval in seconds.
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Sets the wait budget in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Interval between status checks.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Total wait budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parsed result location.
    ///
    /// # Errors
    ///
    /// Returns an error if `result_location` names no bucket.
    pub fn result_location(&self) -> Result<ObjectLocation> {
        Ok(self.result_location.parse()?)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty database, a zero poll
    /// interval, or an unparseable result location.
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(Error::invalid_config("database cannot be empty"));
        }

        if self.poll_interval_secs == 0 {
            return Err(Error::invalid_config("poll interval must be at least one second"));
        }

        if self.result_location.parse::<ObjectLocation>().is_err() {
            return Err(Error::invalid_config(format!(
                "result location '{}' names no bucket",
                self.result_location
            )));
        }

        Ok(())
    }
}
