//! Unified bucket client backed by [`ObjectBackend`].
//!
//! [`ObjectClient`] is a thin, cloneable wrapper around
//! `Arc<dyn ObjectBackend>` that takes plain bucket/key strings. Every public
//! method is instrumented with [`tracing`] for observability.

use std::sync::Arc;

use bytes::Bytes;

use crate::TRACING_TARGET_CLIENT;
use crate::providers::ObjectBackend;
use crate::types::{ListRequest, ListingPage, ObjectLocation, Result};

mod get_output;

pub use get_output::GetOutput;

/// Cloneable handle to any [`ObjectBackend`] (S3, in-memory, ...).
#[derive(Clone)]
pub struct ObjectClient(pub Arc<dyn ObjectBackend>);

impl std::fmt::Debug for ObjectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjectClient").field(&self.0.id()).finish()
    }
}

impl ObjectClient {
    /// Wrap a concrete [`ObjectBackend`] implementation.
    pub fn new(backend: impl ObjectBackend) -> Self {
        Self(Arc::new(backend))
    }

    /// Identifier of the wrapped backend.
    pub fn backend_id(&self) -> &'static str {
        self.0.id()
    }

    /// Fetch one listing page.
    #[tracing::instrument(
        name = "object.list_page",
        target = TRACING_TARGET_CLIENT,
        skip_all,
        fields(bucket = %request.bucket, prefix = %request.prefix, keys)
    )]
    pub async fn list_page(&self, request: &ListRequest) -> Result<ListingPage> {
        let page = self.0.list_page(request).await?;
        tracing::Span::current().record("keys", page.keys.len());
        Ok(page)
    }

    /// Copy `source` to `target`, possibly across buckets.
    #[tracing::instrument(
        name = "object.copy",
        target = TRACING_TARGET_CLIENT,
        skip_all,
        fields(src = %source, dst = %target)
    )]
    pub async fn copy(&self, source: &ObjectLocation, target: &ObjectLocation) -> Result<()> {
        self.0.copy_object(source, target).await
    }

    /// Delete the object at `location`.
    #[tracing::instrument(
        name = "object.delete",
        target = TRACING_TARGET_CLIENT,
        skip_all,
        fields(location = %location)
    )]
    pub async fn delete(&self, location: &ObjectLocation) -> Result<()> {
        self.0.delete_object(location).await
    }

    /// Retrieve the raw bytes and content-type stored at `location`.
    #[tracing::instrument(
        name = "object.get",
        target = TRACING_TARGET_CLIENT,
        skip_all,
        fields(location = %location, size)
    )]
    pub async fn get(&self, location: &ObjectLocation) -> Result<GetOutput> {
        let output = self.0.get_object(location).await?;
        tracing::Span::current().record("size", output.data.len());
        Ok(output)
    }

    /// Upload `data` to `location`, optionally setting the content-type.
    #[tracing::instrument(
        name = "object.put",
        target = TRACING_TARGET_CLIENT,
        skip_all,
        fields(location = %location, size = data.len())
    )]
    pub async fn put(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<()> {
        self.0.put_object(location, data, content_type).await
    }
}
