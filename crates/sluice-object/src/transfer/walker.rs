//! The transfer walker.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::request::{Rejection, TransferOp, TransferRequest};
use crate::TRACING_TARGET_TRANSFER;
use crate::client::ObjectClient;
use crate::types::{Error, ListRequest, ObjectLocation, Result};

/// Counters for a completed walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSummary {
    /// Operation that was applied.
    pub op: TransferOp,
    /// Listing pages fetched.
    pub pages: u64,
    /// Objects copied or deleted.
    pub objects: u64,
}

impl TransferSummary {
    fn new(op: TransferOp) -> Self {
        Self {
            op,
            pages: 0,
            objects: 0,
        }
    }
}

/// Result of [`TransferWalker::transfer`] when no remote call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a rejected transfer did nothing"]
pub enum TransferOutcome {
    /// Every listed object was processed.
    Completed(TransferSummary),
    /// The request was refused before any remote call.
    Rejected(Rejection),
}

impl TransferOutcome {
    /// Whether the walk ran to completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Summary of a completed walk.
    pub fn summary(&self) -> Option<&TransferSummary> {
        match self {
            Self::Completed(summary) => Some(summary),
            Self::Rejected(_) => None,
        }
    }

    /// Reason a request was refused.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Completed(_) => None,
            Self::Rejected(rejection) => Some(*rejection),
        }
    }
}

/// Pages through a bucket listing and copies or deletes every returned key.
///
/// Keys are processed one at a time in listing order; each continuation token
/// is requested exactly once. Remote failures abort the walk and are returned
/// unchanged.
#[derive(Debug, Clone)]
pub struct TransferWalker {
    client: ObjectClient,
}

impl TransferWalker {
    /// Create a walker over `client`.
    pub fn new(client: ObjectClient) -> Self {
        Self { client }
    }

    /// The bucket client this walker drives.
    pub fn client(&self) -> &ObjectClient {
        &self.client
    }

    /// Run `request` to completion.
    ///
    /// Invalid requests come back as [`TransferOutcome::Rejected`] without
    /// touching the backend.
    ///
    /// # Errors
    ///
    /// Returns the first backend error, or [`Error::PaginationLoop`] if the
    /// backend hands out a continuation token twice.
    #[tracing::instrument(
        name = "object.transfer",
        target = TRACING_TARGET_TRANSFER,
        skip_all,
        fields(
            op = %request.op,
            bucket = %request.source_bucket,
            prefix = %request.prefix,
            pages,
            objects
        )
    )]
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        if let Err(rejection) = request.validate() {
            tracing::warn!(
                target: TRACING_TARGET_TRANSFER,
                reason = %rejection,
                "Transfer request rejected"
            );
            return Ok(TransferOutcome::Rejected(rejection));
        }

        let mut summary = TransferSummary::new(request.op);
        let mut used_tokens = HashSet::new();
        let mut token: Option<String> = None;

        loop {
            let mut list = ListRequest::new(&request.source_bucket, &request.prefix)
                .with_delimiter(request.delimiter.clone())
                .with_continuation_token(token.take());
            if let Some(page_size) = request.page_size {
                list = list.with_max_keys(page_size);
            }

            let page = self.client.list_page(&list).await?;
            summary.pages += 1;

            tracing::debug!(
                target: TRACING_TARGET_TRANSFER,
                page = summary.pages,
                keys = page.keys.len(),
                skipped_prefixes = page.common_prefixes.len(),
                "Listing page received"
            );

            for key in &page.keys {
                self.apply(request, key).await?;
                summary.objects += 1;
            }

            match page.next_token {
                Some(next) if !used_tokens.insert(next.clone()) => {
                    return Err(Error::PaginationLoop {
                        bucket: request.source_bucket.clone(),
                        prefix: request.prefix.clone(),
                        token: next,
                    });
                }
                Some(next) => token = Some(next),
                None => break,
            }
        }

        let span = tracing::Span::current();
        span.record("pages", summary.pages);
        span.record("objects", summary.objects);

        tracing::info!(
            target: TRACING_TARGET_TRANSFER,
            op = %summary.op,
            pages = summary.pages,
            objects = summary.objects,
            "Transfer completed"
        );

        Ok(TransferOutcome::Completed(summary))
    }

    /// Copy `source_bucket/prefix` into `target_bucket`, rewriting the leading
    /// prefix to `target_prefix` when it is non-empty.
    pub async fn copy_objects(
        &self,
        source_bucket: &str,
        target_bucket: &str,
        prefix: &str,
        target_prefix: &str,
    ) -> Result<TransferOutcome> {
        let request = TransferRequest::copy(source_bucket, target_bucket, prefix)
            .with_target_prefix(target_prefix);
        self.transfer(&request).await
    }

    /// Delete everything under `bucket/prefix`. An empty prefix is rejected.
    pub async fn delete_objects(&self, bucket: &str, prefix: &str) -> Result<TransferOutcome> {
        self.transfer(&TransferRequest::delete(bucket, prefix)).await
    }

    async fn apply(&self, request: &TransferRequest, key: &str) -> Result<()> {
        let source = ObjectLocation::new(&request.source_bucket, key);

        match request.op {
            TransferOp::Copy => {
                let target_bucket = request.target_bucket.as_deref().unwrap_or_default();
                let target = ObjectLocation::new(target_bucket, request.destination_key(key));
                tracing::debug!(
                    target: TRACING_TARGET_TRANSFER,
                    src = %source,
                    dst = %target,
                    "Copying object"
                );
                self.client.copy(&source, &target).await
            }
            TransferOp::Delete => {
                tracing::debug!(
                    target: TRACING_TARGET_TRANSFER,
                    location = %source,
                    "Deleting object"
                );
                self.client.delete(&source).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;

    use super::*;
    use crate::client::GetOutput;
    use crate::providers::{MemoryBackend, ObjectBackend};
    use crate::types::ListingPage;

    async fn seed(backend: &MemoryBackend, bucket: &str, keys: &[&str]) {
        for key in keys {
            backend
                .put_object(
                    &ObjectLocation::new(bucket, *key),
                    Bytes::from(key.to_string()),
                    None,
                )
                .await
                .unwrap();
        }
    }

    fn walker(backend: Arc<MemoryBackend>) -> TransferWalker {
        TransferWalker::new(ObjectClient(backend))
    }

    /// Delegates to a [`MemoryBackend`], records applied keys in order, and
    /// fails copies of one chosen key.
    struct RecordingBackend {
        inner: MemoryBackend,
        applied: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    #[async_trait::async_trait]
    impl ObjectBackend for RecordingBackend {
        fn id(&self) -> &'static str {
            "recording"
        }

        async fn list_page(&self, request: &ListRequest) -> Result<ListingPage> {
            self.inner.list_page(request).await
        }

        async fn copy_object(
            &self,
            source: &ObjectLocation,
            target: &ObjectLocation,
        ) -> Result<()> {
            if self.fail_on.as_deref() == Some(source.key.as_str()) {
                return Err(Error::backend("recording", "copy_object", "boom", true));
            }
            self.applied.lock().unwrap().push(source.key.clone());
            self.inner.copy_object(source, target).await
        }

        async fn delete_object(&self, location: &ObjectLocation) -> Result<()> {
            self.applied.lock().unwrap().push(location.key.clone());
            self.inner.delete_object(location).await
        }

        async fn get_object(&self, location: &ObjectLocation) -> Result<GetOutput> {
            self.inner.get_object(location).await
        }

        async fn put_object(
            &self,
            location: &ObjectLocation,
            data: Bytes,
            content_type: Option<&str>,
        ) -> Result<()> {
            self.inner.put_object(location, data, content_type).await
        }
    }

    /// Always claims there is another page behind the same token.
    struct LoopingBackend;

    #[async_trait::async_trait]
    impl ObjectBackend for LoopingBackend {
        fn id(&self) -> &'static str {
            "looping"
        }

        async fn list_page(&self, _request: &ListRequest) -> Result<ListingPage> {
            Ok(ListingPage {
                keys: vec![],
                common_prefixes: vec![],
                next_token: Some("again".into()),
            })
        }

        async fn copy_object(&self, _: &ObjectLocation, _: &ObjectLocation) -> Result<()> {
            Ok(())
        }

        async fn delete_object(&self, _: &ObjectLocation) -> Result<()> {
            Ok(())
        }

        async fn get_object(&self, location: &ObjectLocation) -> Result<GetOutput> {
            Err(Error::not_found(&location.bucket, &location.key))
        }

        async fn put_object(&self, _: &ObjectLocation, _: Bytes, _: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn copy_visits_every_page_once_in_order() {
        let inner = MemoryBackend::new()
            .with_bucket("logs")
            .with_bucket("archive")
            .with_page_size(2);
        let keys = ["app/a.log", "app/b.log", "app/c.log", "app/d.log", "app/e.log"];
        seed(&inner, "logs", &keys).await;

        let backend = Arc::new(RecordingBackend {
            inner,
            applied: Mutex::new(Vec::new()),
            fail_on: None,
        });
        let walker = TransferWalker::new(ObjectClient(backend.clone()));

        let outcome = walker
            .copy_objects("logs", "archive", "app/", "")
            .await
            .unwrap();

        let summary = outcome.summary().unwrap();
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.objects, 5);
        assert_eq!(*backend.applied.lock().unwrap(), keys);
        assert_eq!(backend.inner.keys("archive").await, keys);
    }

    #[tokio::test]
    async fn copy_twice_yields_same_destination_keys() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_bucket("logs")
                .with_bucket("archive")
                .with_page_size(2),
        );
        seed(&backend, "logs", &["app/1.log", "app/2.log", "app/3.log"]).await;
        let walker = walker(backend.clone());

        walker
            .copy_objects("logs", "archive", "app/", "2019/app/")
            .await
            .unwrap();
        let first = backend.keys("archive").await;

        walker
            .copy_objects("logs", "archive", "app/", "2019/app/")
            .await
            .unwrap();
        let second = backend.keys("archive").await;

        assert_eq!(first, vec!["2019/app/1.log", "2019/app/2.log", "2019/app/3.log"]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn staging_copy_rewrites_prefix_within_bucket() {
        let backend = Arc::new(MemoryBackend::new().with_bucket("logs"));
        seed(&backend, "logs", &["logs/app/file1.log", "logs/app/file2.log"]).await;

        let outcome = walker(backend.clone())
            .copy_objects("logs", "logs", "logs/app/", "tmp/logs/app/")
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert_eq!(
            backend.keys("logs").await,
            vec![
                "logs/app/file1.log",
                "logs/app/file2.log",
                "tmp/logs/app/file1.log",
                "tmp/logs/app/file2.log",
            ]
        );
    }

    #[tokio::test]
    async fn delete_with_empty_prefix_makes_no_remote_call() {
        let backend = Arc::new(MemoryBackend::new().with_bucket("logs"));
        seed(&backend, "logs", &["a.log"]).await;
        let before = backend.request_count();

        let outcome = walker(backend.clone())
            .delete_objects("logs", "")
            .await
            .unwrap();

        assert_eq!(outcome.rejection(), Some(Rejection::EmptyDeletePrefix));
        assert_eq!(backend.request_count(), before);
        assert_eq!(backend.keys("logs").await, vec!["a.log"]);
    }

    #[tokio::test]
    async fn copy_without_target_makes_no_remote_call() {
        let backend = Arc::new(MemoryBackend::new().with_bucket("logs"));

        let outcome = walker(backend.clone())
            .copy_objects("logs", "", "app/", "")
            .await
            .unwrap();

        assert_eq!(outcome.rejection(), Some(Rejection::MissingTargetBucket));
        assert!(outcome.summary().is_none());
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn copy_back_under_source_prefix_is_rejected() {
        let backend = Arc::new(MemoryBackend::new().with_bucket("b").with_page_size(1));
        seed(&backend, "b", &["a1", "a2"]).await;
        let before = backend.request_count();

        let request = TransferRequest::copy("b", "b", "a").with_target_prefix("ab");
        let outcome = walker(backend.clone()).transfer(&request).await.unwrap();

        assert_eq!(outcome.rejection(), Some(Rejection::OverlappingTarget));
        assert_eq!(backend.request_count(), before);
        assert_eq!(backend.keys("b").await, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn delete_stops_at_delimiter_unless_recursive() {
        let backend = Arc::new(MemoryBackend::new().with_bucket("logs"));
        seed(
            &backend,
            "logs",
            &["tmp/a.log", "tmp/nested/b.log", "keep/c.log"],
        )
        .await;
        let walker = walker(backend.clone());

        walker.delete_objects("logs", "tmp/").await.unwrap();
        assert_eq!(
            backend.keys("logs").await,
            vec!["keep/c.log", "tmp/nested/b.log"]
        );

        let request = TransferRequest::delete("logs", "tmp/").recursive();
        let outcome = walker.transfer(&request).await.unwrap();
        assert_eq!(outcome.summary().unwrap().objects, 1);
        assert_eq!(backend.keys("logs").await, vec!["keep/c.log"]);
    }

    #[tokio::test]
    async fn object_failure_aborts_remaining_walk() {
        let inner = MemoryBackend::new()
            .with_bucket("logs")
            .with_bucket("archive")
            .with_page_size(2);
        seed(&inner, "logs", &["app/1", "app/2", "app/3", "app/4"]).await;

        let backend = Arc::new(RecordingBackend {
            inner,
            applied: Mutex::new(Vec::new()),
            fail_on: Some("app/3".into()),
        });
        let walker = TransferWalker::new(ObjectClient(backend.clone()));

        let err = walker
            .copy_objects("logs", "archive", "app/", "")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Backend { operation: "copy_object", .. }));
        assert_eq!(*backend.applied.lock().unwrap(), vec!["app/1", "app/2"]);
        assert_eq!(backend.inner.keys("archive").await, vec!["app/1", "app/2"]);
    }

    #[tokio::test]
    async fn repeated_token_is_an_error() {
        let walker = TransferWalker::new(ObjectClient::new(LoopingBackend));
        let err = walker.delete_objects("logs", "tmp/").await.unwrap_err();
        assert!(matches!(err, Error::PaginationLoop { token, .. } if token == "again"));
    }

    #[tokio::test]
    async fn missing_source_bucket_propagates() {
        let backend = Arc::new(MemoryBackend::new());
        let err = walker(backend)
            .delete_objects("gone", "tmp/")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BucketNotFound { .. }));
    }
}
