//! Result type for [`ObjectClient::get`](super::ObjectClient::get).

use bytes::Bytes;

/// Result of a successful object download.
#[derive(Debug, Clone)]
pub struct GetOutput {
    /// Raw bytes of the retrieved object.
    pub data: Bytes,
    /// MIME content-type, if the backend provides one.
    pub content_type: Option<String>,
}

impl GetOutput {
    /// Create an output without a content-type.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            content_type: None,
        }
    }

    /// Attach a content-type (MIME).
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }
}
