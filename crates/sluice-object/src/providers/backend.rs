//! Backend trait implemented by every bucket store.

use bytes::Bytes;

use crate::client::GetOutput;
use crate::types::{ListRequest, ListingPage, ObjectLocation, Result};

/// Remote operations of an S3-style bucket store.
///
/// Every method is a single remote call. Implementations do not retry and do
/// not paginate on their own; [`TransferWalker`](crate::transfer::TransferWalker)
/// drives pagination through [`list_page`](Self::list_page).
#[async_trait::async_trait]
pub trait ObjectBackend: Send + Sync + 'static {
    /// Unique identifier (e.g. "s3", "memory").
    fn id(&self) -> &'static str;

    /// Fetch one page of keys under `request.prefix`.
    async fn list_page(&self, request: &ListRequest) -> Result<ListingPage>;

    /// Server-side copy of `source` to `target`. Buckets may differ.
    async fn copy_object(&self, source: &ObjectLocation, target: &ObjectLocation) -> Result<()>;

    /// Delete the object at `location`. Deleting a missing key succeeds.
    async fn delete_object(&self, location: &ObjectLocation) -> Result<()>;

    /// Download the object at `location`.
    async fn get_object(&self, location: &ObjectLocation) -> Result<GetOutput>;

    /// Upload `data` to `location`, optionally setting the content-type.
    async fn put_object(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<()>;
}
