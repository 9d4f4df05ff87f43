//! S3-compatible provider using [`aws_sdk_s3`].
//!
//! Works with AWS S3, MinIO, and any S3-compatible service.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
#[cfg(feature = "config")]
use clap::Args;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use super::ObjectBackend;
use crate::TRACING_TARGET_CLIENT;
use crate::client::GetOutput;
use crate::types::{Error, ListRequest, ListingPage, ObjectLocation, Result};

/// Characters of a key left as-is inside an `x-amz-copy-source` header.
const COPY_SOURCE_KEY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Explicit connection settings for an S3-compatible store.
///
/// Region and endpoint are never taken from ambient process state; when no
/// static keys are given the default AWS credential chain is consulted for
/// credentials only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    /// AWS region (defaults to `us-east-1`).
    #[cfg_attr(
        feature = "config",
        arg(long = "s3-region", env = "S3_REGION", default_value = "us-east-1")
    )]
    #[serde(default = "default_region")]
    pub region: String,

    /// Endpoint URL (e.g. `http://localhost:9000` for MinIO).
    #[cfg_attr(feature = "config", arg(long = "s3-endpoint", env = "S3_ENDPOINT"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Access key ID for static credentials.
    #[cfg_attr(
        feature = "config",
        arg(long = "s3-access-key-id", env = "S3_ACCESS_KEY_ID")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    /// Secret access key for static credentials.
    #[cfg_attr(
        feature = "config",
        arg(long = "s3-secret-access-key", env = "S3_SECRET_ACCESS_KEY")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    /// Session token for temporary credentials.
    #[cfg_attr(
        feature = "config",
        arg(long = "s3-session-token", env = "S3_SESSION_TOKEN")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Use path-style URLs (`endpoint/bucket/key`). Required by MinIO.
    #[cfg_attr(
        feature = "config",
        arg(long = "s3-force-path-style", env = "S3_FORCE_PATH_STYLE")
    )]
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for S3Config {
    fn default() -> Self {
        Self::new(default_region())
    }
}

impl S3Config {
    /// Creates a new S3 configuration for `region`.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            force_path_style: false,
        }
    }

    /// Sets the custom endpoint (for S3-compatible storage).
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

    /// Sets whether to use path-style requests.
    pub fn with_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
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
            return Err(Error::invalid_config("s3 region cannot be empty"));
        }

        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(Error::invalid_config(
                "s3 config requires both access_key_id and secret_access_key when either is set",
            ));
        }

        Ok(())
    }
}

/// S3-backed [`ObjectBackend`].
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
}

impl S3Backend {
    const ID: &str = "s3";

    /// Build a client from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub async fn connect(config: &S3Config) -> Result<Self> {
        config.validate()?;

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            let credentials = aws_sdk_s3::config::Credentials::new(
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

        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        tracing::info!(
            target: TRACING_TARGET_CLIENT,
            region = %config.region,
            endpoint = ?config.endpoint,
            path_style = config.force_path_style,
            "S3 backend initialized"
        );

        Ok(Self::from_client(Client::from_conf(builder.build())))
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// Convert an SDK error into a crate [`Error`].
fn from_sdk_error<E>(operation: &'static str, err: SdkError<E>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let retryable = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(service_err) => service_err.raw().status().as_u16() >= 500,
        _ => false,
    };
    let message = DisplayErrorContext(&err).to_string();
    Error::backend(S3Backend::ID, operation, message, retryable).with_source(err)
}

/// Whether the service answered 404 for this request.
fn is_not_found<E>(err: &SdkError<E>) -> bool {
    matches!(err, SdkError::ServiceError(service_err) if service_err.raw().status().as_u16() == 404)
}

#[async_trait::async_trait]
impl ObjectBackend for S3Backend {
    fn id(&self) -> &'static str {
        Self::ID
    }

    async fn list_page(&self, request: &ListRequest) -> Result<ListingPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&request.bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.clone())
            .set_continuation_token(request.continuation_token.clone())
            .set_max_keys(request.max_keys)
            .send()
            .await
            .map_err(|e| from_sdk_error("list_objects_v2", e))?;

        Ok(ListingPage {
            keys: output
                .contents()
                .iter()
                .filter_map(|object| object.key().map(str::to_string))
                .collect(),
            common_prefixes: output
                .common_prefixes()
                .iter()
                .filter_map(|common| common.prefix().map(str::to_string))
                .collect(),
            next_token: output.next_continuation_token().map(str::to_string),
        })
    }

    async fn copy_object(&self, source: &ObjectLocation, target: &ObjectLocation) -> Result<()> {
        let copy_source = format!(
            "{}/{}",
            source.bucket,
            utf8_percent_encode(&source.key, COPY_SOURCE_KEY)
        );

        self.client
            .copy_object()
            .copy_source(copy_source)
            .bucket(&target.bucket)
            .key(&target.key)
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    Error::not_found(&source.bucket, &source.key)
                } else {
                    from_sdk_error("copy_object", e)
                }
            })?;

        Ok(())
    }

    async fn delete_object(&self, location: &ObjectLocation) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| from_sdk_error("delete_object", e))?;

        Ok(())
    }

    async fn get_object(&self, location: &ObjectLocation) -> Result<GetOutput> {
        let output = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    Error::not_found(&location.bucket, &location.key)
                } else {
                    from_sdk_error("get_object", e)
                }
            })?;

        let content_type = output.content_type().map(str::to_string);
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| {
                Error::backend(Self::ID, "get_object", e.to_string(), true).with_source(e)
            })?
            .into_bytes();

        Ok(GetOutput::new(data).with_content_type(content_type))
    }

    async fn put_object(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .body(ByteStream::from(data))
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| from_sdk_error("put_object", e))?;

        Ok(())
    }
}
