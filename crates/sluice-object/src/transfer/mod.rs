//! Paginated bulk copy/delete over a bucket prefix.
//!
//! A [`TransferWalker`] lists `source_bucket/prefix` page by page and applies
//! one [`TransferOp`] to every object key it returns. Walks are not
//! transactional: a failure stops the walk where it is, and re-running the
//! same request is safe because per-object copy and delete are idempotent.

mod request;
mod walker;

pub use request::{DEFAULT_DELIMITER, Rejection, TransferOp, TransferRequest};
pub use walker::{TransferOutcome, TransferSummary, TransferWalker};
