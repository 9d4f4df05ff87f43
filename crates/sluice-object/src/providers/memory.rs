//! In-process bucket store with S3 listing semantics.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::ObjectBackend;
use crate::client::GetOutput;
use crate::types::{Error, ListRequest, ListingPage, ObjectLocation, Result};

/// Default page size, matching the S3 `max-keys` default.
const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

/// Listing entry: either an object key or a prefix rolled up by the delimiter.
#[derive(Debug)]
enum Entry<'a> {
    Key(&'a str),
    CommonPrefix(&'a str),
}

impl Entry<'_> {
    fn name(&self) -> &str {
        match self {
            Self::Key(name) | Self::CommonPrefix(name) => name,
        }
    }
}

/// Multi-bucket, in-memory [`ObjectBackend`].
///
/// Listings follow S3 rules: the prefix is a plain string prefix, keys whose
/// remainder contains the delimiter collapse into common prefixes, and pages
/// hold at most `page_size` entries (keys plus common prefixes). Continuation
/// tokens are opaque.
///
/// Buckets must exist before objects can be written into them.
#[derive(Debug)]
pub struct MemoryBackend {
    buckets: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
    page_size: usize,
    requests: AtomicU64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty store with no buckets.
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            requests: AtomicU64::new(0),
        }
    }

    /// Add an empty bucket.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.get_mut().entry(bucket.into()).or_default();
        self
    }

    /// Bound every listing page to `page_size` entries.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Create `bucket` if it does not exist.
    pub async fn create_bucket(&self, bucket: impl Into<String>) {
        self.buckets
            .write()
            .await
            .entry(bucket.into())
            .or_default();
    }

    /// All keys currently stored in `bucket`, sorted.
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of remote calls served so far.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn encode_token(last: &str) -> String {
        URL_SAFE_NO_PAD.encode(last)
    }

    fn decode_token(token: &str) -> Result<String> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| Error::InvalidToken(token.to_string()))?;
        String::from_utf8(raw).map_err(|_| Error::InvalidToken(token.to_string()))
    }
}

/// Builds the sorted entry list for a listing, rolling keys up into common
/// prefixes when a delimiter is given.
fn entries<'a>(
    objects: &'a BTreeMap<String, StoredObject>,
    prefix: &str,
    delimiter: Option<&str>,
) -> Vec<Entry<'a>> {
    let mut entries: Vec<Entry<'a>> = Vec::new();

    for key in objects.keys().filter(|key| key.starts_with(prefix)) {
        let rest = &key[prefix.len()..];
        let rolled_up = delimiter.and_then(|d| rest.find(d).map(|at| prefix.len() + at + d.len()));

        match rolled_up {
            Some(end) => {
                let common = &key[..end];
                // Keys sharing a common prefix are contiguous in sorted order.
                if !matches!(entries.last(), Some(Entry::CommonPrefix(last)) if *last == common) {
                    entries.push(Entry::CommonPrefix(common));
                }
            }
            None => entries.push(Entry::Key(key)),
        }
    }

    entries
}

#[async_trait::async_trait]
impl ObjectBackend for MemoryBackend {
    fn id(&self) -> &'static str {
        "memory"
    }

    async fn list_page(&self, request: &ListRequest) -> Result<ListingPage> {
        self.record_request();

        let start_after = request
            .continuation_token
            .as_deref()
            .map(Self::decode_token)
            .transpose()?;

        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(&request.bucket)
            .ok_or_else(|| Error::bucket_not_found(&request.bucket))?;

        let page_size = request
            .max_keys
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(self.page_size);

        let mut remaining = entries(objects, &request.prefix, request.delimiter.as_deref())
            .into_iter()
            .filter(|entry| match &start_after {
                Some(after) => entry.name() > after.as_str(),
                None => true,
            })
            .peekable();

        let mut page = ListingPage::default();
        let mut last = None;
        for entry in remaining.by_ref().take(page_size) {
            last = Some(entry.name().to_string());
            match entry {
                Entry::Key(key) => page.keys.push(key.to_string()),
                Entry::CommonPrefix(common) => page.common_prefixes.push(common.to_string()),
            }
        }

        if remaining.peek().is_some() {
            page.next_token = last.as_deref().map(Self::encode_token);
        }

        Ok(page)
    }

    async fn copy_object(&self, source: &ObjectLocation, target: &ObjectLocation) -> Result<()> {
        self.record_request();

        let mut buckets = self.buckets.write().await;
        let object = buckets
            .get(&source.bucket)
            .ok_or_else(|| Error::bucket_not_found(&source.bucket))?
            .get(&source.key)
            .cloned()
            .ok_or_else(|| Error::not_found(&source.bucket, &source.key))?;

        buckets
            .get_mut(&target.bucket)
            .ok_or_else(|| Error::bucket_not_found(&target.bucket))?
            .insert(target.key.clone(), object);

        Ok(())
    }

    async fn delete_object(&self, location: &ObjectLocation) -> Result<()> {
        self.record_request();

        self.buckets
            .write()
            .await
            .get_mut(&location.bucket)
            .ok_or_else(|| Error::bucket_not_found(&location.bucket))?
            .remove(&location.key);

        Ok(())
    }

    async fn get_object(&self, location: &ObjectLocation) -> Result<GetOutput> {
        self.record_request();

        let buckets = self.buckets.read().await;
        let object = buckets
            .get(&location.bucket)
            .ok_or_else(|| Error::bucket_not_found(&location.bucket))?
            .get(&location.key)
            .ok_or_else(|| Error::not_found(&location.bucket, &location.key))?;

        Ok(GetOutput::new(object.data.clone()).with_content_type(object.content_type.clone()))
    }

    async fn put_object(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<()> {
        self.record_request();

        self.buckets
            .write()
            .await
            .get_mut(&location.bucket)
            .ok_or_else(|| Error::bucket_not_found(&location.bucket))?
            .insert(
                location.key.clone(),
                StoredObject {
                    data,
                    content_type: content_type.map(str::to_string),
                },
            );

        Ok(())
    }
}
