//! Staging raw logs under a working prefix for table creation.

use sluice_object::transfer::{TransferOutcome, TransferSummary, TransferWalker};
use sluice_object::types::ObjectLocation;

use crate::{Result, TRACING_TARGET_STAGING};

/// Prefix staged copies are written under.
const STAGING_ROOT: &str = "tmp/";

/// Copies `data_bucket/log_prefix` to `data_bucket/tmp/<log_prefix>`.
#[derive(Debug, Clone)]
pub struct LogStaging {
    walker: TransferWalker,
    data_bucket: String,
    log_prefix: String,
}

impl LogStaging {
    /// Stage objects under `log_prefix` in `data_bucket`.
    pub fn new(
        walker: TransferWalker,
        data_bucket: impl Into<String>,
        log_prefix: impl Into<String>,
    ) -> Self {
        Self {
            walker,
            data_bucket: data_bucket.into(),
            log_prefix: log_prefix.into(),
        }
    }

    /// Key prefix staged copies land under.
    pub fn staged_prefix(&self) -> String {
        format!("{STAGING_ROOT}{}", self.log_prefix)
    }

    /// Copy the logs into the staging prefix.
    ///
    /// # Errors
    ///
    /// Returns the first transfer error, or [`Error::Rejected`](crate::Error::Rejected)
    /// if the data bucket is empty.
    pub async fn stage(&self) -> Result<StagedData> {
        let staged_prefix = self.staged_prefix();
        let summary = into_summary(
            self.walker
                .copy_objects(
                    &self.data_bucket,
                    &self.data_bucket,
                    &self.log_prefix,
                    &staged_prefix,
                )
                .await?,
        )?;

        tracing::info!(
            target: TRACING_TARGET_STAGING,
            bucket = %self.data_bucket,
            prefix = %self.log_prefix,
            staged = %staged_prefix,
            objects = summary.objects,
            "Logs staged"
        );

        Ok(StagedData {
            walker: self.walker.clone(),
            location: ObjectLocation::new(self.data_bucket.clone(), staged_prefix),
            summary,
        })
    }
}

/// Logs copied by [`LogStaging::stage`].
///
/// Staged objects stay until [`discard`](Self::discard) is called; dropping
/// this value leaves them in place.
#[derive(Debug, Clone)]
#[must_use = "staged objects remain until discarded"]
pub struct StagedData {
    walker: TransferWalker,
    location: ObjectLocation,
    summary: TransferSummary,
}

impl StagedData {
    /// Bucket and key prefix of the staged copies.
    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    /// Counters of the staging copy.
    pub fn summary(&self) -> &TransferSummary {
        &self.summary
    }

    /// Directory a table over the staged logs should point at:
    /// `s3://<bucket>/<staged prefix up to its last '/'>/`.
    pub fn table_location(&self) -> String {
        let key = &self.location.key;
        let parent = key.rsplit_once('/').map_or(key.as_str(), |(parent, _)| parent);
        format!("{}/", ObjectLocation::new(self.location.bucket.clone(), parent))
    }

    /// Delete the staged copies.
    ///
    /// # Errors
    ///
    /// Returns the first transfer error.
    pub async fn discard(self) -> Result<TransferSummary> {
        let summary = into_summary(
            self.walker
                .delete_objects(&self.location.bucket, &self.location.key)
                .await?,
        )?;

        tracing::info!(
            target: TRACING_TARGET_STAGING,
            staged = %self.location,
            objects = summary.objects,
            "Staged logs discarded"
        );
        Ok(summary)
    }
}

fn into_summary(outcome: TransferOutcome) -> Result<TransferSummary> {
    match outcome {
        TransferOutcome::Completed(summary) => Ok(summary),
        TransferOutcome::Rejected(rejection) => Err(rejection.into()),
    }
}
