//! Convenience re-exports.

pub use crate::client::{GetOutput, ObjectClient};
pub use crate::providers::{MemoryBackend, ObjectBackend, S3Backend, S3Config};
pub use crate::transfer::{
    Rejection, TransferOp, TransferOutcome, TransferRequest, TransferSummary, TransferWalker,
};
pub use crate::types::{Error, ListRequest, ListingPage, ObjectLocation, Result};
