//! Backend trait and bucket store providers.

mod backend;
mod memory;
mod s3;

pub use backend::ObjectBackend;
pub use memory::MemoryBackend;
pub use s3::{S3Backend, S3Config};
